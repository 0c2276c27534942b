//! Sub-cell glyph selection for the dynamic resolution mode.
//!
//! A cell is approximated by one of a small set of block glyphs that split it
//! into two colored regions. The split is chosen greedily from the four
//! quadrant samples; half splits are then refined to eighths by probing the
//! frame along the split axis.

use palette::Srgb;

use super::frame::{cell_origin, Frame, Quad, Rgb, Scale};
use super::quantize::distance;

/// Weight applied to single-corner scores so splits are preferred.
pub const CORNER_WEIGHT: f32 = 0.035;

/// Lower blocks from 7/8 down to 1/8 of the cell height.
pub const LOWER_BLOCKS: [&str; 7] = ["▇", "▆", "▅", "▄", "▃", "▂", "▁"];
/// Left blocks from 7/8 down to 1/8 of the cell width.
pub const LEFT_BLOCKS: [&str; 7] = ["▉", "▊", "▋", "▌", "▍", "▎", "▏"];

/// Number of probes along a refined split axis.
const PROBES: usize = 7;

/// How a cell is partitioned into two regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    /// Top half against bottom half.
    Horizontal,
    /// Left half against right half.
    Vertical,
    /// Top-left/bottom-right against top-right/bottom-left.
    Diagonal,
    TopRight,
    TopLeft,
    BottomLeft,
    BottomRight,
}

/// Scores for every candidate split of a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitScores {
    pub horizontal: f32,
    pub vertical: f32,
    pub diagonal: f32,
    pub top_right: f32,
    pub top_left: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl SplitScores {
    pub fn compute(q: &Quad) -> Self {
        let d = |a: [f32; 3], b: [f32; 3]| {
            (a[0] - b[0]).abs() + (a[1] - b[1]).abs() + (a[2] - b[2]).abs()
        };
        let (tl, tr, bl, br) = (
            channels(q.top_left),
            channels(q.top_right),
            channels(q.bottom_left),
            channels(q.bottom_right),
        );
        Self {
            horizontal: d(mean(&[tl, tr]), mean(&[bl, br])),
            vertical: d(mean(&[tl, bl]), mean(&[tr, br])),
            diagonal: d(mean(&[tl, br]), mean(&[tr, bl])),
            top_right: d(tr, mean(&[tl, bl, br])) * CORNER_WEIGHT,
            top_left: d(tl, mean(&[tr, bl, br])) * CORNER_WEIGHT,
            bottom_left: d(bl, mean(&[tl, tr, br])) * CORNER_WEIGHT,
            bottom_right: d(br, mean(&[tl, tr, bl])) * CORNER_WEIGHT,
        }
    }

    /// Highest scoring split; on ties the earlier candidate wins.
    pub fn best(&self) -> Split {
        let ranked = [
            (Split::Horizontal, self.horizontal),
            (Split::Vertical, self.vertical),
            (Split::Diagonal, self.diagonal),
            (Split::TopRight, self.top_right),
            (Split::TopLeft, self.top_left),
            (Split::BottomLeft, self.bottom_left),
            (Split::BottomRight, self.bottom_right),
        ];
        let mut best = ranked[0];
        for &(split, score) in &ranked[1..] {
            if score > best.1 {
                best = (split, score);
            }
        }
        best.0
    }
}

/// Glyph plus the colors drawn behind and in front of it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGlyph {
    pub glyph: &'static str,
    pub fg: Rgb,
    pub bg: Rgb,
}

/// Pick the glyph and colors approximating a cell.
pub fn select(frame: &Frame, row: u16, col: u16, scale: Scale, q: &Quad) -> CellGlyph {
    split_glyph(SplitScores::compute(q).best(), frame, row, col, scale, q)
}

fn split_glyph(split: Split, frame: &Frame, row: u16, col: u16, scale: Scale, q: &Quad) -> CellGlyph {
    match split {
        Split::Horizontal => {
            let top = average(&[q.top_left, q.top_right]);
            let bottom = average(&[q.bottom_left, q.bottom_right]);
            let (oy, ox) = cell_origin(row, col, scale);
            let k = boundary(top, |k| {
                frame.pixel(oy + (k as f32 * scale.y / 8.0) as isize, ox)
            });
            CellGlyph {
                glyph: LOWER_BLOCKS[k],
                fg: bottom,
                bg: top,
            }
        }
        Split::Vertical => {
            let left = average(&[q.top_left, q.bottom_left]);
            let right = average(&[q.top_right, q.bottom_right]);
            let (oy, ox) = cell_origin(row, col, scale);
            let k = boundary(left, |k| {
                frame.pixel(oy, ox + (k as f32 * scale.x / 8.0) as isize)
            });
            CellGlyph {
                glyph: LEFT_BLOCKS[PROBES - 1 - k],
                fg: left,
                bg: right,
            }
        }
        Split::Diagonal => CellGlyph {
            glyph: "▞",
            fg: average(&[q.top_right, q.bottom_left]),
            bg: average(&[q.top_left, q.bottom_right]),
        },
        Split::TopRight => CellGlyph {
            glyph: "▝",
            fg: q.top_right,
            bg: average(&[q.top_left, q.bottom_left, q.bottom_right]),
        },
        Split::TopLeft => CellGlyph {
            glyph: "▘",
            fg: q.top_left,
            bg: average(&[q.top_right, q.bottom_left, q.bottom_right]),
        },
        Split::BottomLeft => CellGlyph {
            glyph: "▖",
            fg: q.bottom_left,
            bg: average(&[q.top_left, q.top_right, q.bottom_right]),
        },
        Split::BottomRight => CellGlyph {
            glyph: "▗",
            fg: q.bottom_right,
            bg: average(&[q.top_left, q.top_right, q.bottom_left]),
        },
    }
}

/// Index `k` in `1..=6` such that the first region extends through probe `k`.
///
/// Probes sit at `k/8` of the cell for `k` in `1..=7`; the boundary is placed
/// after the probe whose distance to `reference` changes most to the next.
fn boundary(reference: Rgb, probe: impl Fn(usize) -> Rgb) -> usize {
    let mut differences = [0u32; PROBES];
    for (i, d) in differences.iter_mut().enumerate() {
        *d = distance(probe(i + 1), reference);
    }
    let mut best = 1;
    let mut best_delta = -1i64;
    for k in 1..PROBES {
        let delta = (differences[k - 1] as i64 - differences[k] as i64).abs();
        if delta > best_delta {
            best_delta = delta;
            best = k;
        }
    }
    best
}

fn channels(c: Rgb) -> [f32; 3] {
    [c.red as f32, c.green as f32, c.blue as f32]
}

fn mean(values: &[[f32; 3]]) -> [f32; 3] {
    let n = values.len() as f32;
    let mut sum = [0.0; 3];
    for v in values {
        sum[0] += v[0];
        sum[1] += v[1];
        sum[2] += v[2];
    }
    [sum[0] / n, sum[1] / n, sum[2] / n]
}

/// Truncating per-channel average of the given colors.
pub fn average(colors: &[Rgb]) -> Rgb {
    let n = colors.len().max(1) as u32;
    let (mut r, mut g, mut b) = (0u32, 0u32, 0u32);
    for c in colors {
        r += c.red as u32;
        g += c.green as u32;
        b += c.blue as u32;
    }
    Srgb::new((r / n) as u8, (g / n) as u8, (b / n) as u8)
}
