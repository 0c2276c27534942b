use std::collections::VecDeque;
use std::time::Duration;

use crate::render::{ansi, OverlayMask};

/// Maximum number of notifications shown at once, one per row.
pub const CAPACITY: usize = 8;

/// How long a notification stays on screen.
pub const LIFETIME: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub text: String,
    remaining_ms: i64,
}

impl Notification {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            remaining_ms: LIFETIME.as_millis() as i64,
        }
    }

    pub fn remaining(&self) -> Duration {
        Duration::from_millis(self.remaining_ms.max(0) as u64)
    }
}

/// Short-lived status lines drawn over the top rows of the video.
#[derive(Debug)]
pub struct NotificationOverlay {
    items: VecDeque<Notification>,
    /// Slots that fit on screen without scrolling it
    visible_slots: usize,
    /// Grid width; longer texts are cut
    width: usize,
}

impl Default for NotificationOverlay {
    fn default() -> Self {
        Self {
            items: VecDeque::with_capacity(CAPACITY),
            visible_slots: CAPACITY,
            width: usize::MAX,
        }
    }
}

impl NotificationOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit drawing to a `cols`×`rows` grid.
    ///
    /// The last row is never used, since a newline there would scroll.
    pub fn fit(&mut self, cols: u16, rows: u16) {
        self.visible_slots = CAPACITY.min(rows.saturating_sub(1) as usize);
        self.width = cols as usize;
    }

    /// Show `text`, evicting the oldest notification when full.
    pub fn post(&mut self, text: impl Into<String>) {
        if self.items.len() == CAPACITY {
            self.items.pop_front();
        }
        self.items.push_back(Notification::new(text));
    }

    /// Age every notification and drop the ones that ran out.
    ///
    /// Returns how many expired.
    pub fn advance(&mut self, elapsed: Duration) -> usize {
        let before = self.items.len();
        let elapsed = elapsed.as_millis() as i64;
        self.items.retain_mut(|n| {
            n.remaining_ms -= elapsed;
            n.remaining_ms > 0
        });
        before - self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    /// Text shown in `slot`, cut to the grid width.
    fn visible_text(&self, slot: usize) -> Option<&str> {
        if slot >= self.visible_slots {
            return None;
        }
        let text = self.items.get(slot)?.text.as_str();
        Some(match text.char_indices().nth(self.width) {
            Some((end, _)) => &text[..end],
            None => text,
        })
    }

    /// Append the overlay drawing: one line per visible slot starting at the
    /// top-left.
    pub fn draw(&self, colorful: bool, out: &mut String) {
        if self.visible_slots == 0 {
            return;
        }
        out.push_str(ansi::CURSOR_HOME);
        for slot in 0..self.visible_slots {
            if let Some(text) = self.visible_text(slot) {
                if colorful {
                    out.push_str(ansi::WHITE_ON_BLACK);
                    out.push_str(text);
                    out.push_str(ansi::RESET);
                } else {
                    out.push_str(text);
                }
            }
            out.push_str(ansi::NEWLINE);
        }
    }
}

impl OverlayMask for NotificationOverlay {
    fn covered_columns(&self, row: u16) -> usize {
        self.visible_text(row as usize)
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }
}
