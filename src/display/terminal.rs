use anyhow::{Context, Result};
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use std::io::{stdout, Write};
use tracing::{debug, warn};

use crate::render::ansi;

/// Current terminal size as `(cols, rows)`.
pub fn grid_size() -> Result<(u16, u16)> {
    terminal::size().context("Failed to query terminal size")
}

/// Prepare the terminal for playback.
///
/// Pushes the current screen contents into scrollback with `rows` newlines so
/// the video draws over a blank area and hides the cursor. Raw mode is only
/// entered when `raw` is set; it turns Ctrl-C into a key event, so without a
/// keyboard reader it must stay off for Ctrl-C to raise SIGINT.
pub fn setup(rows: u16, raw: bool) -> Result<()> {
    let mut out = stdout().lock();
    out.write_all("\n".repeat(rows as usize).as_bytes())?;
    out.write_all(ansi::HIDE_CURSOR.as_bytes())?;
    out.flush()?;
    if raw {
        enable_raw_mode().context("Failed to enable raw mode")?;
    }
    debug!("Terminal set up for {} rows (raw mode: {})", rows, raw);
    Ok(())
}

/// Escape sequence that undoes everything playback did to the screen.
pub fn restore_sequence() -> String {
    [ansi::RESET, ansi::CURSOR_HOME, ansi::CLEAR_BELOW, ansi::SHOW_CURSOR].concat()
}

/// Reset attributes, clear the screen, show the cursor and leave raw mode if
/// `raw` says [`setup`] entered it.
///
/// Failures are logged rather than returned: this runs during teardown where
/// nothing more can be done about them.
pub fn restore(raw: bool) {
    let mut out = stdout().lock();
    if let Err(e) = out
        .write_all(restore_sequence().as_bytes())
        .and_then(|_| out.flush())
    {
        warn!("Failed to reset terminal: {}", e);
    }
    if raw {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_clears_and_shows_cursor() {
        assert_eq!(restore_sequence(), "\x1b[0m\x1b[H\x1b[J\x1b[?25h");
    }
}
