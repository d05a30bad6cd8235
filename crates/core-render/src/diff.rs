//! Minimal screen diffing: never reason about where the terminal cursor
//! "is" -- always rewrite the delta between two `ScreenBuffer`s relative to
//! the known model.

use crate::screen::ScreenBuffer;

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenChange {
    WriteText { row: u16, col: u16, text: String },
    ClearToEol { row: u16, col: u16 },
    ClearToEos { row: u16, col: u16 },
    MoveCursor { row: u16, col: u16 },
}

fn leader_start(frame: &crate::Frame, row: u16, x: u16) -> u16 {
    let mut xx = x;
    loop {
        match frame.get(xx, row) {
            Some(cell) if cell.is_leader() => return xx,
            Some(_) if xx > 0 => xx -= 1,
            _ => return xx,
        }
    }
}

fn row_text_range(frame: &crate::Frame, row: u16, from: u16, to_inclusive: u16) -> String {
    frame
        .row_leaders(row)
        .filter(|(_, w, _, x)| *x + *w > from && *x <= to_inclusive)
        .map(|(c, _, _, _)| c)
        .collect()
}

fn row_diff_bounds(old: &crate::Frame, new: &crate::Frame, row: u16, cols: u16) -> Option<(u16, u16)> {
    let mut first = None;
    let mut last = None;
    for x in 0..cols {
        if old.get(x, row) != new.get(x, row) {
            if first.is_none() {
                first = Some(x);
            }
            last = Some(x);
        }
    }
    first.zip(last)
}

/// Diff two screen buffers into a minimal set of writes. Rows beyond the
/// new buffer's height collapse into a single `ClearToEos` and stop
/// scanning further rows.
pub fn diff(old: &ScreenBuffer, new: &ScreenBuffer) -> Vec<ScreenChange> {
    let mut changes = Vec::new();
    let max_rows = old.frame.height.max(new.frame.height);
    let cols = old.frame.width.min(new.frame.width);

    for row in 0..max_rows {
        if row >= new.frame.height {
            changes.push(ScreenChange::ClearToEos { row, col: 0 });
            break;
        }
        if row >= old.frame.height {
            // New row with no prior counterpart: emit it in full.
            let text = row_text_range(&new.frame, row, 0, cols.saturating_sub(1));
            if !text.is_empty() {
                changes.push(ScreenChange::WriteText { row, col: 0, text });
            }
            continue;
        }

        let Some((first, last)) = row_diff_bounds(&old.frame, &new.frame, row, cols) else {
            continue;
        };
        let start = leader_start(&new.frame, row, first);
        let text = row_text_range(&new.frame, row, start, last);
        if !text.is_empty() {
            changes.push(ScreenChange::WriteText {
                row,
                col: start,
                text,
            });
        }

        let old_row_len = old.frame.row_leaders(row).map(|(_, w, _, x)| x + w).max().unwrap_or(0);
        let new_row_len = new.frame.row_leaders(row).map(|(_, w, _, x)| x + w).max().unwrap_or(0);
        if new_row_len < old_row_len {
            changes.push(ScreenChange::ClearToEol {
                row,
                col: new_row_len,
            });
        }
    }

    if old.cursor != new.cursor {
        changes.push(ScreenChange::MoveCursor {
            row: new.cursor.row,
            col: new.cursor.col,
        });
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_buffers_produce_no_changes() {
        let a = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        let b = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn appended_text_emits_single_write() {
        let old = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        let new = ScreenBuffer::render("$ ", "ls -la", 6, 80, 24);
        let changes = diff(&old, &new);
        assert!(changes
            .iter()
            .any(|c| matches!(c, ScreenChange::WriteText { text, .. } if text.contains("-la"))));
    }

    #[test]
    fn shortened_row_emits_clear_to_eol() {
        let old = ScreenBuffer::render("$ ", "ls -la", 6, 80, 24);
        let new = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        let changes = diff(&old, &new);
        assert!(changes
            .iter()
            .any(|c| matches!(c, ScreenChange::ClearToEol { .. })));
    }

    #[test]
    fn cursor_move_appended_when_changed() {
        let old = ScreenBuffer::render("$ ", "ls", 0, 80, 24);
        let new = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        let changes = diff(&old, &new);
        assert!(matches!(changes.last(), Some(ScreenChange::MoveCursor { .. })));
    }

    #[test]
    fn shrunk_height_clears_from_boundary_row_not_zero() {
        let old = ScreenBuffer::render("$ ", "ls", 2, 80, 24);
        let new = ScreenBuffer::render("$ ", "ls", 2, 80, 5);
        let changes = diff(&old, &new);
        let clear = changes
            .iter()
            .find(|c| matches!(c, ScreenChange::ClearToEos { .. }))
            .expect("shrunk frame emits a ClearToEos");
        assert_eq!(clear, &ScreenChange::ClearToEos { row: 5, col: 0 });
    }
}
