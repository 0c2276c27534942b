use palette::Srgb;

/// 8-bit RGB color used throughout the renderer
pub type Rgb = Srgb<u8>;

pub const WHITE: Rgb = Srgb::new(255, 255, 255);

/// A decoded video frame in packed RGB24 order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed RGB24 buffer. Returns `None` when the buffer size does not
    /// match the dimensions or either dimension is zero.
    pub fn from_rgb24(width: usize, height: usize, data: Vec<u8>) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != width * height * 3 {
            return None;
        }
        Some(Self { width, height, data })
    }

    /// Build a frame from a per-pixel function, mostly useful for tests.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> Rgb) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let c = f(x, y);
                data.extend_from_slice(&[c.red, c.green, c.blue]);
            }
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Give back the pixel buffer so the next frame can reuse it.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Pixel at `(y, x)`, clamped to the frame bounds.
    #[inline]
    pub fn pixel(&self, y: isize, x: isize) -> Rgb {
        let y = y.clamp(0, self.height as isize - 1) as usize;
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let i = (y * self.width + x) * 3;
        Srgb::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }
}

/// Pixel neighborhood covered by one terminal cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    /// Scale factors mapping a `cols`×`rows` grid onto `frame`.
    pub fn for_grid(frame: &Frame, cols: u16, rows: u16) -> Self {
        Self {
            x: frame.width() as f32 / cols.max(1) as f32,
            y: frame.height() as f32 / rows.max(1) as f32,
        }
    }

    /// Half-cell offset in whole pixels, `(dy, dx)`.
    #[inline]
    fn half(&self) -> (isize, isize) {
        ((self.y as isize) / 2, (self.x as isize) / 2)
    }
}

/// The four quadrant samples of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: Rgb,
    pub top_right: Rgb,
    pub bottom_left: Rgb,
    pub bottom_right: Rgb,
}

/// Source pixel coordinates of a cell's top-left corner.
#[inline]
pub fn cell_origin(row: u16, col: u16, scale: Scale) -> (isize, isize) {
    (
        (row as f32 * scale.y) as isize,
        (col as f32 * scale.x) as isize,
    )
}

/// Pixel at the top-left corner of the cell.
#[inline]
pub fn sample(frame: &Frame, row: u16, col: u16, scale: Scale) -> Rgb {
    let (y, x) = cell_origin(row, col, scale);
    frame.pixel(y, x)
}

/// Pixel at a whole-pixel offset from the cell's top-left corner.
#[inline]
pub fn sample_offset(frame: &Frame, row: u16, col: u16, scale: Scale, dy: isize, dx: isize) -> Rgb {
    let (y, x) = cell_origin(row, col, scale);
    frame.pixel(y + dy, x + dx)
}

/// Top-left, top-right, bottom-left and bottom-right samples of a cell.
pub fn sample_quad(frame: &Frame, row: u16, col: u16, scale: Scale) -> Quad {
    let (y, x) = cell_origin(row, col, scale);
    let (hy, hx) = scale.half();
    Quad {
        top_left: frame.pixel(y, x),
        top_right: frame.pixel(y, x + hx),
        bottom_left: frame.pixel(y + hy, x),
        bottom_right: frame.pixel(y + hy, x + hx),
    }
}

/// Vertical half-cell offset used for edge probes above and below a cell.
#[inline]
pub fn half_row(scale: Scale) -> isize {
    scale.half().0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: usize, h: usize) -> Frame {
        Frame::from_fn(w, h, |x, y| Srgb::new(x as u8, y as u8, 0))
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(Frame::from_rgb24(2, 2, vec![0; 11]).is_none());
        assert!(Frame::from_rgb24(0, 2, vec![]).is_none());
        assert!(Frame::from_rgb24(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn sample_floors_scaled_coordinates() {
        let frame = gradient(10, 10);
        let scale = Scale { x: 2.5, y: 1.5 };
        let px = sample(&frame, 3, 3, scale);
        assert_eq!((px.red, px.green), (7, 4));
    }

    #[test]
    fn quad_uses_half_cell_offsets() {
        let frame = gradient(8, 8);
        let scale = Scale::for_grid(&frame, 2, 2);
        let quad = sample_quad(&frame, 1, 1, scale);
        assert_eq!((quad.top_left.red, quad.top_left.green), (4, 4));
        assert_eq!((quad.top_right.red, quad.top_right.green), (6, 4));
        assert_eq!((quad.bottom_left.red, quad.bottom_left.green), (4, 6));
        assert_eq!((quad.bottom_right.red, quad.bottom_right.green), (6, 6));
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        let frame = gradient(4, 4);
        let scale = Scale { x: 3.0, y: 3.0 };
        let quad = sample_quad(&frame, 5, 5, scale);
        assert_eq!(quad.bottom_right, Srgb::new(3, 3, 0));
        assert_eq!(sample_offset(&frame, 0, 0, scale, -1, -1), Srgb::new(0, 0, 0));
    }
}
