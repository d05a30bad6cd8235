//! `apply(changes, sink)`: translate a `ScreenChange` list into writer
//! commands and flush once. For each change, emit a cursor-position
//! sequence then the payload (text, clear-to-eol, clear-to-eos, or nothing
//! for a pure move).

use std::io::Write;

use anyhow::Result;

use crate::diff::ScreenChange;
use crate::writer::Writer;

/// Build and flush the writer commands for `changes` against `sink`.
pub fn apply<W: Write>(changes: &[ScreenChange], sink: &mut W) -> Result<()> {
    let mut writer = Writer::new();
    for change in changes {
        match change {
            ScreenChange::WriteText { row, col, text } => {
                writer.move_to(*col, *row);
                writer.print(text.clone());
            }
            ScreenChange::ClearToEol { row, col } => {
                writer.move_to(*col, *row);
                writer.clear_to_eol();
            }
            ScreenChange::ClearToEos { row, col } => {
                writer.move_to(*col, *row);
                writer.clear_to_eos();
            }
            ScreenChange::MoveCursor { row, col } => {
                writer.move_to(*col, *row);
            }
        }
    }
    writer.flush_to(sink)
}
