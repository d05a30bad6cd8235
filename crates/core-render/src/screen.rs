//! Scratch screen buffer: renders a prompt + command line into a virtual
//! grid, tracking where the cursor lands. Never reasons about "where the
//! terminal cursor currently is" -- `diff` always rewrites a delta relative
//! to this known model, which is what eliminates wrap-induced cursor
//! ambiguity.

use crate::{Cell, CellFlags, Frame};
use core_text::grapheme;

const TAB_STOP: usize = 8;
/// Readline-style bracket markers recognized in prompt text and skipped for
/// width calculation, never emitted to the terminal.
const BRACKET_START: char = '\u{1}';
const BRACKET_END: char = '\u{2}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPos {
    pub row: u16,
    pub col: u16,
}

/// A rendered prompt + command, as a `Frame` plus the resolved cursor
/// position.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    pub frame: Frame,
    pub cursor: CursorPos,
}

struct Cursor {
    row: u16,
    col: u16,
}

fn is_ansi_escape_start(bytes: &[u8], i: usize) -> bool {
    bytes.get(i) == Some(&0x1b)
}

/// Length in bytes of an ANSI CSI/OSC escape sequence starting at `i`
/// (including the leading ESC). Returns 1 if this isn't a recognized
/// sequence, so the caller always makes forward progress.
fn ansi_escape_len(bytes: &[u8], i: usize) -> usize {
    if bytes.get(i + 1) != Some(&b'[') {
        return 1;
    }
    let mut j = i + 2;
    while j < bytes.len() {
        let b = bytes[j];
        if (0x40..=0x7e).contains(&b) {
            return j - i + 1;
        }
        j += 1;
    }
    j - i
}

fn advance_wrapping(cur: &mut Cursor, width: u16, cols: u16, rows: u16) {
    if cur.col as u32 + width as u32 > cols as u32 {
        cur.col = 0;
        cur.row = (cur.row + 1).min(rows.saturating_sub(1));
    }
}

/// Walk `text` writing visible clusters into `frame`, handling ANSI escapes
/// (skipped, zero width), bracket markers (skipped for width), `\n`
/// (moves to column 0 of the next row), and `\t` (advances to the next
/// multiple of 8). Wide clusters advance by their display width and wrap if
/// they would overflow the row.
///
/// If `track_cursor` is set, captures the cursor position in `out_cursor`
/// the moment `byte_counter` (counted only over the bytes of `text` itself)
/// equals `cursor_byte_offset`, or once `text` is fully consumed.
#[allow(clippy::too_many_arguments)]
fn write_segment(
    frame: &mut Frame,
    text: &str,
    cur: &mut Cursor,
    track_cursor: bool,
    cursor_byte_offset: usize,
    out_cursor: &mut Option<CursorPos>,
) {
    let bytes = text.as_bytes();
    let mut i = 0usize;
    let mut byte_counter = 0usize;

    let maybe_capture = |byte_counter: usize, cur: &Cursor, out_cursor: &mut Option<CursorPos>| {
        if track_cursor && out_cursor.is_none() && byte_counter == cursor_byte_offset {
            *out_cursor = Some(CursorPos {
                row: cur.row,
                col: cur.col,
            });
        }
    };

    maybe_capture(byte_counter, cur, out_cursor);

    while i < bytes.len() {
        if is_ansi_escape_start(bytes, i) {
            let len = ansi_escape_len(bytes, i);
            byte_counter += len;
            i += len;
            maybe_capture(byte_counter, cur, out_cursor);
            continue;
        }
        let ch = text[i..].chars().next().expect("valid utf-8 boundary");
        if ch == BRACKET_START || ch == BRACKET_END {
            byte_counter += ch.len_utf8();
            i += ch.len_utf8();
            maybe_capture(byte_counter, cur, out_cursor);
            continue;
        }
        if ch == '\n' {
            byte_counter += 1;
            i += 1;
            cur.col = 0;
            cur.row = (cur.row + 1).min(frame.height.saturating_sub(1));
            maybe_capture(byte_counter, cur, out_cursor);
            continue;
        }
        if ch == '\t' {
            let next_stop = ((cur.col as usize / TAB_STOP) + 1) * TAB_STOP;
            let target = next_stop.min(frame.width as usize) as u16;
            frame.set_cluster(cur.col, cur.row, " ", target.saturating_sub(cur.col).max(1), CellFlags::empty());
            cur.col = target;
            byte_counter += 1;
            i += 1;
            maybe_capture(byte_counter, cur, out_cursor);
            continue;
        }

        let rest = &text[i..];
        let g = grapheme::iter(rest)
            .next()
            .unwrap_or(&rest[..ch.len_utf8()]);
        let w = grapheme::cluster_width(g).max(1) as u16;
        advance_wrapping(cur, w, frame.width, frame.height);
        frame.set_cluster(cur.col, cur.row, g, w, CellFlags::empty());
        cur.col = (cur.col + w).min(frame.width);
        byte_counter += g.len();
        i += g.len();
        maybe_capture(byte_counter, cur, out_cursor);
    }

    if track_cursor && out_cursor.is_none() {
        *out_cursor = Some(CursorPos {
            row: cur.row,
            col: cur.col,
        });
    }
}

impl ScreenBuffer {
    /// Render `prompt` followed by `command` into a `num_cols` x `num_rows`
    /// grid, capturing the cursor position corresponding to
    /// `cursor_byte_offset` bytes into `command`.
    pub fn render(prompt: &str, command: &str, cursor_byte_offset: usize, num_cols: u16, num_rows: u16) -> Self {
        let mut frame = Frame::new(num_cols.max(1), num_rows.max(1));
        let mut cur = Cursor { row: 0, col: 0 };
        let mut out_cursor = None;

        write_segment(&mut frame, prompt, &mut cur, false, 0, &mut out_cursor);
        write_segment(
            &mut frame,
            command,
            &mut cur,
            true,
            cursor_byte_offset,
            &mut out_cursor,
        );

        let cursor = out_cursor.unwrap_or(CursorPos {
            row: cur.row,
            col: cur.col,
        });
        ScreenBuffer { frame, cursor }
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.frame.get(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_prompt_and_command() {
        let sb = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        assert_eq!(sb.cursor, CursorPos { row: 0, col: 4 });
        assert_eq!(sb.frame.line_clusters(0)[..4], ["$", " ", "l", "s"]);
    }

    #[test]
    fn cursor_mid_command() {
        let sb = ScreenBuffer::render("$ ", "echo hi", 4, 80, 24);
        assert_eq!(sb.cursor.col, 2 + 4);
    }

    #[test]
    fn tab_advances_to_next_stop() {
        let sb = ScreenBuffer::render("", "a\tb", 100, 80, 24);
        assert_eq!(sb.cursor.col, 9);
    }

    #[test]
    fn wide_char_advances_two_and_wraps() {
        let sb = ScreenBuffer::render("", "\u{6F22}", 100, 3, 24);
        assert_eq!(sb.cursor, CursorPos { row: 0, col: 2 });
    }

    #[test]
    fn ansi_escape_skipped_for_width() {
        let sb = ScreenBuffer::render("", "\x1b[31ma\x1b[0m", 100, 80, 24);
        assert_eq!(sb.cursor.col, 1);
    }

    #[test]
    fn bracket_markers_skipped_for_width() {
        let sb = ScreenBuffer::render("\u{1}\x1b[1m\u{2}$ ", "x", 1, 80, 24);
        assert_eq!(sb.cursor.col, 3);
    }

    #[test]
    fn newline_moves_to_next_row() {
        let sb = ScreenBuffer::render("", "a\nb", 100, 80, 24);
        assert_eq!(sb.cursor, CursorPos { row: 1, col: 1 });
    }
}
