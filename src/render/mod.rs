//! Frame to terminal cell rendering.
//!
//! [`RenderSession`] owns everything that persists between frames: the color
//! mode, grid geometry, and the per-cell memory used to skip unchanged cells.
//! Each call to [`RenderSession::render`] walks the grid row by row and
//! appends the escape stream for one frame to an output buffer.

pub mod ansi;
pub mod diff;
pub mod frame;
pub mod glyph;
pub mod quantize;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use diff::{CellState, FrameDiffer, Paint, PROTECTED_ROWS};
use frame::{half_row, sample_offset, sample_quad, Quad, Scale, WHITE};
use quantize::{Edge, PairHalf};

pub use frame::{Frame, Rgb};

/// Output encoding for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// 24-bit color with half blocks
    #[default]
    #[value(name = "color", alias = "c")]
    #[serde(rename = "color")]
    TrueColor,
    /// 24-bit color with sub-cell block glyphs
    #[value(name = "dynamic", alias = "d")]
    #[serde(rename = "dynamic")]
    DynamicResolution,
    /// 256-color palette with half blocks
    #[value(name = "256", alias = "256-compatibility")]
    #[serde(rename = "256")]
    Palette256,
    /// Shading blocks, no color
    #[value(alias = "m")]
    Monochrome,
    /// Short ascii gradient
    #[value(name = "ascii-art", alias = "a")]
    AsciiArt,
    /// Long ascii gradient
    #[value(name = "full-ascii", alias = "f")]
    #[serde(rename = "full-ascii")]
    AsciiFull,
}

impl ColorMode {
    /// Whether unchanged cells may be skipped in this mode.
    ///
    /// Dynamic resolution picks glyphs from four samples, so a single
    /// representative color cannot tell whether a cell changed.
    pub fn skips_unchanged(self) -> bool {
        self != ColorMode::DynamicResolution
    }

    /// Whether the output carries color escapes at all.
    pub fn is_colorful(self) -> bool {
        matches!(
            self,
            ColorMode::TrueColor | ColorMode::DynamicResolution | ColorMode::Palette256
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorMode::TrueColor => "color",
            ColorMode::DynamicResolution => "dynamic",
            ColorMode::Palette256 => "256",
            ColorMode::Monochrome => "monochrome",
            ColorMode::AsciiArt => "ascii-art",
            ColorMode::AsciiFull => "full-ascii",
        }
    }
}

/// Per-session rendering switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Allow block and shade characters outside ascii.
    pub unicode: bool,
    /// Color reduction step for true color output; `<= 0` disables.
    pub color_reduce: i32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            unicode: true,
            color_reduce: -1,
        }
    }
}

/// Columns at the start of a row that are covered by overlay text.
pub trait OverlayMask {
    fn covered_columns(&self, row: u16) -> usize;
}

/// An overlay that covers nothing.
pub struct NoOverlay;

impl OverlayMask for NoOverlay {
    fn covered_columns(&self, _row: u16) -> usize {
        0
    }
}

pub struct RenderSession {
    mode: ColorMode,
    options: RenderOptions,
    cols: u16,
    rows: u16,
    differ: FrameDiffer,
}

impl RenderSession {
    pub fn new(mode: ColorMode, options: RenderOptions, cols: u16, rows: u16) -> Self {
        Self {
            mode,
            options,
            cols,
            rows,
            differ: FrameDiffer::new(cols, rows),
        }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Grid size as `(cols, rows)`.
    pub fn geometry(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Adopt a new grid size; the next frame is drawn in full.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) == (self.cols, self.rows) {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.differ = FrameDiffer::new(cols, rows);
    }

    /// Force the next frame to be drawn in full.
    pub fn invalidate(&mut self) {
        self.differ.invalidate();
    }

    /// Append the escape stream for `frame` to `out`.
    pub fn render(&mut self, frame: &Frame, overlay: &impl OverlayMask, out: &mut String) {
        if self.differ.dimensions() != (self.cols, self.rows) {
            self.differ = FrameDiffer::new(self.cols, self.rows);
        }
        let scale = Scale::for_grid(frame, self.cols, self.rows);

        if self.mode == ColorMode::Monochrome {
            out.push_str(ansi::WHITE_ON_BLACK);
        }
        out.push_str(ansi::CURSOR_HOME);
        out.push_str(ansi::HIDE_CURSOR);

        for row in 0..self.rows {
            let covered = if row < PROTECTED_ROWS {
                overlay.covered_columns(row)
            } else {
                0
            };
            let mut last_col: i32 = -1;

            for col in 0..self.cols {
                if (col as usize) < covered {
                    continue;
                }

                let quad = sample_quad(frame, row, col, scale);
                let representative = quad.bottom_left;
                if self.mode.skips_unchanged() && self.differ.unchanged(row, col, representative) {
                    continue;
                }

                let gap = col as i32 - last_col - 1;
                if gap > 0 {
                    ansi::forward(out, gap as u16);
                }

                let mut state = self.draw_cell(frame, row, col, scale, quad, out);
                state.representative = representative;
                self.differ.commit(row, col, state);
                last_col = col as i32;
            }

            if row + 1 != self.rows {
                out.push_str(ansi::NEWLINE);
            }
        }

        out.push_str(ansi::RESET);
    }

    fn draw_cell(
        &self,
        frame: &Frame,
        row: u16,
        col: u16,
        scale: Scale,
        quad: Quad,
        out: &mut String,
    ) -> CellState {
        let half_block = if self.options.unicode { "▄" } else { "_" };
        let mut state = CellState {
            representative: quad.bottom_left,
            glyph: " ",
            fg: None,
            bg: None,
        };

        match self.mode {
            ColorMode::TrueColor => {
                let step = self.options.color_reduce;
                let top = quantize::reduce_color(quad.top_left, step, row, col, PairHalf::Top);
                let bottom =
                    quantize::reduce_color(quad.bottom_left, step, row, col, PairHalf::Bottom);

                ansi::bg_rgb(out, top);
                state.bg = Some(Paint::Rgb(top));
                if quantize::distance(top, bottom) == 0 {
                    out.push(' ');
                } else {
                    ansi::fg_rgb(out, bottom);
                    out.push_str(half_block);
                    state.fg = Some(Paint::Rgb(bottom));
                    state.glyph = half_block;
                }
            }
            ColorMode::Palette256 => {
                let top = quantize::palette_index_for(quad.top_left, col, PairHalf::Top);
                let bottom = quantize::palette_index_for(quad.bottom_left, col, PairHalf::Bottom);

                ansi::bg_indexed(out, top);
                ansi::fg_indexed(out, bottom);
                out.push_str(half_block);
                state.bg = Some(Paint::Indexed(top));
                state.fg = Some(Paint::Indexed(bottom));
                state.glyph = half_block;
            }
            ColorMode::Monochrome => {
                let pixel = quad.top_left;
                let half = half_row(scale);
                let above = if row == 0 {
                    WHITE
                } else {
                    sample_offset(frame, row, col, scale, -half, 0)
                };
                let below = if row + 1 == self.rows {
                    WHITE
                } else {
                    sample_offset(frame, row, col, scale, half, 0)
                };

                state.glyph = match quantize::monochrome_edge(pixel, above, below) {
                    Some(Edge::Lower) if self.options.unicode => "▄",
                    Some(Edge::Lower) => ",",
                    Some(Edge::Upper) if self.options.unicode => "▀",
                    Some(Edge::Upper) => "'",
                    None => {
                        quantize::MONOCHROME_RAMP[quantize::monochrome_level(pixel, row, col)]
                    }
                };
                out.push_str(state.glyph);
            }
            ColorMode::AsciiArt | ColorMode::AsciiFull => {
                let ramp = if self.mode == ColorMode::AsciiArt {
                    quantize::ASCII_ART_RAMP
                } else {
                    quantize::ASCII_FULL_RAMP
                };
                let i = quantize::ascii_level(quad.top_left, row, col, ramp);
                state.glyph = &ramp[i..i + 1];
                out.push_str(state.glyph);
            }
            ColorMode::DynamicResolution => {
                let step = self.options.color_reduce;
                let reduced = Quad {
                    top_left: quantize::reduce_color(quad.top_left, step, row, col, PairHalf::Top),
                    top_right: quantize::reduce_color(quad.top_right, step, row, col, PairHalf::Top),
                    bottom_left: quantize::reduce_color(
                        quad.bottom_left,
                        step,
                        row,
                        col,
                        PairHalf::Bottom,
                    ),
                    bottom_right: quantize::reduce_color(
                        quad.bottom_right,
                        step,
                        row,
                        col,
                        PairHalf::Bottom,
                    ),
                };
                let cell = glyph::select(frame, row, col, scale, &reduced);

                ansi::bg_rgb(out, cell.bg);
                ansi::fg_rgb(out, cell.fg);
                out.push_str(cell.glyph);
                state.bg = Some(Paint::Rgb(cell.bg));
                state.fg = Some(Paint::Rgb(cell.fg));
                state.glyph = cell.glyph;
            }
        }

        state
    }
}
