use super::frame::Rgb;
use super::quantize::distance;

/// Rows reserved for the notification overlay; never skipped so expired
/// notifications are painted over on the next frame.
pub const PROTECTED_ROWS: u16 = 8;

/// Cells whose representative color moved less than this are not redrawn.
pub const SKIP_THRESHOLD: u32 = 2;

/// A color as it was sent to the terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Rgb(Rgb),
    Indexed(u8),
}

/// What was last written to a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellState {
    pub representative: Rgb,
    pub glyph: &'static str,
    pub fg: Option<Paint>,
    pub bg: Option<Paint>,
}

/// Per-cell memory of the previous frame.
#[derive(Debug, Clone)]
pub struct FrameDiffer {
    cols: u16,
    rows: u16,
    cells: Vec<Option<CellState>>,
}

impl FrameDiffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![None; cols as usize * rows as usize],
        }
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    /// Forget everything so the next frame is drawn in full.
    pub fn invalidate(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }

    fn index(&self, row: u16, col: u16) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row as usize * self.cols as usize + col as usize)
    }

    pub fn get(&self, row: u16, col: u16) -> Option<&CellState> {
        self.index(row, col).and_then(|i| self.cells[i].as_ref())
    }

    /// True when the cell can keep what the terminal already shows.
    ///
    /// Cells outside the tracked grid are never skipped.
    pub fn unchanged(&self, row: u16, col: u16, representative: Rgb) -> bool {
        if row < PROTECTED_ROWS {
            return false;
        }
        match self.get(row, col) {
            Some(prev) => distance(prev.representative, representative) < SKIP_THRESHOLD,
            None => false,
        }
    }

    pub fn commit(&mut self, row: u16, col: u16, state: CellState) {
        if let Some(i) = self.index(row, col) {
            self.cells[i] = Some(state);
        }
    }
}
