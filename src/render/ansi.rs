//! Escape sequences written by the compositor and the overlay.

use std::fmt::Write;

use super::frame::Rgb;

pub const CURSOR_HOME: &str = "\x1b[H";
pub const HIDE_CURSOR: &str = "\x1b[?25l";
pub const SHOW_CURSOR: &str = "\x1b[?25h";
pub const CLEAR_BELOW: &str = "\x1b[J";
pub const RESET: &str = "\x1b[0m";
/// White on black, used for monochrome output and notifications.
pub const WHITE_ON_BLACK: &str = "\x1b[37;40m";
pub const NEWLINE: &str = "\r\n";

pub fn bg_rgb(out: &mut String, c: Rgb) {
    let _ = write!(out, "\x1b[48;2;{};{};{}m", c.red, c.green, c.blue);
}

pub fn fg_rgb(out: &mut String, c: Rgb) {
    let _ = write!(out, "\x1b[38;2;{};{};{}m", c.red, c.green, c.blue);
}

pub fn bg_indexed(out: &mut String, index: u8) {
    let _ = write!(out, "\x1b[48;5;{}m", index);
}

pub fn fg_indexed(out: &mut String, index: u8) {
    let _ = write!(out, "\x1b[38;5;{}m", index);
}

/// Move the cursor `n` columns right.
pub fn forward(out: &mut String, n: u16) {
    let _ = write!(out, "\x1b[{}C", n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use palette::Srgb;

    #[test]
    fn sequences_are_exact() {
        let mut out = String::new();
        bg_rgb(&mut out, Srgb::new(1, 2, 3));
        fg_rgb(&mut out, Srgb::new(4, 5, 6));
        bg_indexed(&mut out, 232);
        fg_indexed(&mut out, 16);
        forward(&mut out, 12);
        assert_eq!(
            out,
            "\x1b[48;2;1;2;3m\x1b[38;2;4;5;6m\x1b[48;5;232m\x1b[38;5;16m\x1b[12C"
        );
    }
}
