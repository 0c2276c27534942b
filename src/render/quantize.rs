//! Color quantization strategies.
//!
//! Every function here is total: channels are clamped to `[0, 255]` and ramp
//! or palette indices are clamped to the range of their target table.

use palette::Srgb;

use super::frame::Rgb;

/// Shading ramp used by monochrome mode, darkest first.
pub const MONOCHROME_RAMP: [&str; 6] = [" ", ".", "░", "▒", "▓", "█"];

/// Short character gradient for the ascii-art mode.
pub const ASCII_ART_RAMP: &str = " .,-=+*/OQ&%@#NM";

/// Long character gradient for the full-ascii mode.
pub const ASCII_FULL_RAMP: &str =
    " `.-'\",:~_;!|^><+r*?=\\L/v()ic7x1z{tJ}lsT[]FnuCYjofy2ae3I5VSkwZ4mXPGhEqpAK6$bd9HODRgMUW%8N0&B#Q@";

const MONOCHROME_DIVISOR: f32 = 25.6;

/// Luminance above which a cell is considered a bright edge candidate.
pub const EDGE_BRIGHT: f32 = 240.0;
/// Luminance below which the neighbor of an edge candidate counts as black.
pub const EDGE_DARK: f32 = 16.0;

/// Perceptual luminance, `0.2125R + 0.7154G + 0.0721B`.
#[inline]
pub fn luminance(c: Rgb) -> f32 {
    0.2125 * c.red as f32 + 0.7154 * c.green as f32 + 0.0721 * c.blue as f32
}

/// Sum of absolute per-channel differences.
#[inline]
pub fn distance(a: Rgb, b: Rgb) -> u32 {
    a.red.abs_diff(b.red) as u32 + a.green.abs_diff(b.green) as u32 + a.blue.abs_diff(b.blue) as u32
}

/// Which sample of a vertically stacked pair is being reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairHalf {
    Top,
    Bottom,
}

/// Ordered-dither color reduction for true color output.
///
/// With `step <= 0` this is the identity.
pub fn reduce_color(c: Rgb, step: i32, row: u16, col: u16, half: PairHalf) -> Rgb {
    if step <= 0 {
        return c;
    }
    let step = step as f32;
    let dither = ((row as u32 + col as u32) % 2) as f32 / 2.1;
    let dither = match half {
        PairHalf::Top => dither,
        PairHalf::Bottom => -dither,
    };
    let reduce = |v: u8| ((v as f32 / step + dither).round() * step).clamp(0.0, 255.0) as u8;
    Srgb::new(reduce(c.red), reduce(c.green), reduce(c.blue))
}

/// Map a color to an index of the standard 256-color palette.
///
/// Channels are bucketed to `0..=5`; rounding is used instead of flooring when
/// `round` is set so neighboring columns alternate and banding breaks up.
/// Neutral colors use the 24-step grayscale ramp at 232..=255.
pub fn palette_index(c: Rgb, round: bool) -> u8 {
    let bucket = |v: u8| {
        let scaled = v as f32 / 51.0;
        let b = if round { scaled.round() } else { scaled.floor() };
        b.clamp(0.0, 5.0) as u8
    };
    let (r, g, b) = (bucket(c.red), bucket(c.green), bucket(c.blue));
    if r == g && g == b {
        (r as f32 * 4.6).round() as u8 + 232
    } else {
        b + g * 6 + r * 36 + 16
    }
}

/// Palette index for one half of a stacked pair at column `col`.
///
/// The top sample rounds on odd columns, the bottom sample on even columns.
pub fn palette_index_for(c: Rgb, col: u16, half: PairHalf) -> u8 {
    let odd = col % 2 == 1;
    let round = match half {
        PairHalf::Top => odd,
        PairHalf::Bottom => !odd,
    };
    palette_index(c, round)
}

/// Quantize a scaled luminance value onto a ramp of `len` entries.
///
/// `scaled` is expected to span roughly twice the ramp length; odd buckets
/// are pushed to a neighboring even bucket in a checkerboard pattern and the
/// result is halved.
fn ramp_bucket(scaled: f32, row: u16, col: u16, len: usize) -> usize {
    let rounded = scaled.round();
    let mut value = rounded;
    if (rounded as i64) % 2 == 1 {
        let even_cell = (row as u32 + col as u32) % 2 == 0;
        value = if even_cell && scaled < rounded - 0.4 {
            rounded - 1.0
        } else {
            rounded + 1.0
        };
    }
    let index = (value / 2.0).max(0.0) as usize;
    index.min(len.saturating_sub(1))
}

/// Index into [`MONOCHROME_RAMP`] for a color at `(row, col)`.
pub fn monochrome_level(c: Rgb, row: u16, col: u16) -> usize {
    ramp_bucket(luminance(c) / MONOCHROME_DIVISOR, row, col, MONOCHROME_RAMP.len())
}

/// Index into an ascii `ramp` for a color at `(row, col)`.
pub fn ascii_level(c: Rgb, row: u16, col: u16, ramp: &str) -> usize {
    let divisor = 255.0 / (ramp.len() * 2) as f32;
    ramp_bucket(luminance(c) / divisor, row, col, ramp.len())
}

/// Hard horizontal edge glyph for a bright cell against a dark neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Dark above: the lit half is the lower one.
    Lower,
    /// Dark below: the lit half is the upper one.
    Upper,
}

pub fn monochrome_edge(c: Rgb, above: Rgb, below: Rgb) -> Option<Edge> {
    let l = luminance(c);
    if l <= EDGE_BRIGHT {
        return None;
    }
    if luminance(above) < EDGE_DARK {
        Some(Edge::Lower)
    } else if luminance(below) < EDGE_DARK {
        Some(Edge::Upper)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(v: u8) -> Rgb {
        Srgb::new(v, v, v)
    }

    #[test]
    fn full_ramp_has_ninety_five_levels() {
        assert_eq!(ASCII_ART_RAMP.len(), 16);
        assert_eq!(ASCII_FULL_RAMP.len(), 95);
    }

    #[test]
    fn mid_gray_monochrome_at_both_even_parities() {
        // 128 / 25.6 = 5 rounds to an odd bucket and is pushed up to 6.
        assert_eq!(monochrome_level(gray(128), 0, 0), 3);
        assert_eq!(monochrome_level(gray(128), 1, 1), 3);
        assert_eq!(MONOCHROME_RAMP[3], "▒");
    }

    #[test]
    fn undershoot_pushes_odd_bucket_down_on_even_cells() {
        // luminance 27 -> 1.0546, rounds to odd 1 without undershoot: up.
        assert_eq!(monochrome_level(gray(27), 0, 0), 1);
        // luminance 16 -> 0.625, rounds to 1 and undershoots by 0.375: up.
        assert_eq!(monochrome_level(gray(16), 0, 0), 1);
        // luminance 14 -> 0.546, undershoots by 0.45: down on even cells only.
        assert_eq!(monochrome_level(gray(14), 0, 0), 0);
        assert_eq!(monochrome_level(gray(14), 0, 1), 1);
    }

    #[test]
    fn ramp_levels_are_monotonic_in_luminance() {
        for (row, col) in [(0, 0), (0, 1)] {
            let mut previous_mono = 0;
            let mut previous_art = 0;
            let mut previous_full = 0;
            for v in 0..=255u8 {
                let mono = monochrome_level(gray(v), row, col);
                let art = ascii_level(gray(v), row, col, ASCII_ART_RAMP);
                let full = ascii_level(gray(v), row, col, ASCII_FULL_RAMP);
                assert!(mono >= previous_mono, "mono dropped at {v}");
                assert!(art >= previous_art, "art dropped at {v}");
                assert!(full >= previous_full, "full dropped at {v}");
                previous_mono = mono;
                previous_art = art;
                previous_full = full;
            }
            assert_eq!(previous_mono, MONOCHROME_RAMP.len() - 1);
            assert_eq!(previous_art, ASCII_ART_RAMP.len() - 1);
            assert_eq!(previous_full, ASCII_FULL_RAMP.len() - 1);
        }
    }

    #[test]
    fn palette_index_is_total() {
        for r in (0..=255u16).step_by(5) {
            for g in (0..=255u16).step_by(5) {
                for b in (0..=255u16).step_by(5) {
                    let c = Srgb::new(r as u8, g as u8, b as u8);
                    for round in [false, true] {
                        let idx = palette_index(c, round);
                        assert!(idx >= 16);
                        if r == g && g == b {
                            assert!(idx >= 232);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn palette_index_examples() {
        assert_eq!(palette_index(Srgb::new(255, 0, 0), false), 196);
        assert_eq!(palette_index(Srgb::new(0, 0, 255), false), 21);
        assert_eq!(palette_index(gray(0), false), 232);
        assert_eq!(palette_index(gray(255), false), 255);
        // 40/51 floors to 0 and rounds to 1
        assert_eq!(palette_index(Srgb::new(40, 0, 0), false), 232);
        assert_eq!(palette_index(Srgb::new(40, 0, 0), true), 52);
    }

    #[test]
    fn palette_rounding_alternates_by_column() {
        let c = Srgb::new(40, 0, 0);
        assert_eq!(palette_index_for(c, 1, PairHalf::Top), 52);
        assert_eq!(palette_index_for(c, 0, PairHalf::Top), 232);
        assert_eq!(palette_index_for(c, 0, PairHalf::Bottom), 52);
        assert_eq!(palette_index_for(c, 1, PairHalf::Bottom), 232);
    }

    #[test]
    fn reduction_disabled_is_identity() {
        let c = Srgb::new(13, 77, 201);
        assert_eq!(reduce_color(c, 0, 3, 4, PairHalf::Top), c);
        assert_eq!(reduce_color(c, -1, 3, 4, PairHalf::Bottom), c);
    }

    #[test]
    fn reduction_dithers_pairs_apart() {
        let c = Srgb::new(100, 100, 100);
        // even cell: no dither, 100/32 = 3.125 -> 3 -> 96
        assert_eq!(reduce_color(c, 32, 0, 0, PairHalf::Top), gray(96));
        // odd cell: +-0.476
        assert_eq!(reduce_color(c, 32, 0, 1, PairHalf::Top), gray(128));
        assert_eq!(reduce_color(c, 32, 0, 1, PairHalf::Bottom), gray(96));
        // never leaves the channel range
        assert_eq!(reduce_color(gray(255), 100, 0, 1, PairHalf::Top), gray(255));
    }

    #[test]
    fn edge_detection_needs_bright_cell_and_dark_neighbor() {
        let white = gray(255);
        let black = gray(0);
        assert_eq!(monochrome_edge(white, black, white), Some(Edge::Lower));
        assert_eq!(monochrome_edge(white, white, black), Some(Edge::Upper));
        assert_eq!(monochrome_edge(white, white, white), None);
        assert_eq!(monochrome_edge(gray(200), black, black), None);
    }
}
