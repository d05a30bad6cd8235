//! Terminal writer abstraction: a short-lived batch of commands built from a
//! `ScreenDiff` and flushed once via `crossterm::queue!` against any `Write`
//! sink, so the same path is exercised against real stdout or an in-memory
//! buffer in tests.

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::Write;

#[derive(Debug)]
pub enum Command {
    MoveTo(u16, u16),
    ClearToEol,
    ClearToEos,
    Print(String),
}

#[derive(Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }

    pub fn move_to(&mut self, x: u16, y: u16) {
        self.cmds.push(Command::MoveTo(x, y));
    }

    pub fn clear_to_eol(&mut self) {
        self.cmds.push(Command::ClearToEol);
    }

    pub fn clear_to_eos(&mut self) {
        self.cmds.push(Command::ClearToEos);
    }

    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Emit every queued command to `sink`, then flush once.
    pub fn flush_to<W: Write>(self, sink: &mut W) -> Result<()> {
        for c in self.cmds {
            match c {
                Command::MoveTo(x, y) => {
                    queue!(sink, MoveTo(x, y))?;
                }
                Command::ClearToEol => {
                    queue!(sink, Clear(ClearType::UntilNewLine))?;
                }
                Command::ClearToEos => {
                    queue!(sink, Clear(ClearType::FromCursorDown))?;
                }
                Command::Print(s) => {
                    queue!(sink, Print(s))?;
                }
            }
        }
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flushes_in_order_to_buffer() {
        let mut w = Writer::new();
        w.move_to(2, 1);
        w.print("hi");
        w.clear_to_eol();
        let mut buf = Vec::new();
        w.flush_to(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }

    #[test]
    fn empty_writer_emits_nothing_but_still_succeeds() {
        let w = Writer::new();
        assert!(w.is_empty());
        let mut buf = Vec::new();
        w.flush_to(&mut buf).unwrap();
    }
}
