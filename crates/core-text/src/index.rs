//! Six-array UTF-8 index.
//!
//! Maps between four coordinate spaces over a buffer's text: byte offset,
//! codepoint index, grapheme-cluster index, and display column. Rebuilt from
//! a full byte-slice snapshot; queries against a stale or never-built index
//! return `IndexError::InvalidState`.
//!
//! The validation pass below is a hand-rolled UTF-8 decoder rather than a
//! call to `std::str::from_utf8`, because the contract requires distinct
//! error kinds for overlong encodings, lone surrogates, and truncated
//! sequences -- detail `from_utf8`'s single `Utf8Error` doesn't expose.
//! `rebuild` takes raw `&[u8]` rather than `&str` so this validation pass
//! is reachable through any legitimate caller, not just malformed bytes
//! smuggled in through `unsafe` test helpers.

use crate::width::codepoint_width;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("index queried before rebuild or after invalidation")]
    InvalidState,
    #[error("index {index} out of range (len {len})")]
    InvalidRange { index: usize, len: usize },
    #[error("invalid UTF-8 at byte offset {offset}: {reason}")]
    InvalidEncoding { offset: usize, reason: &'static str },
}

type Result<T> = std::result::Result<T, IndexError>;

/// Byte/codepoint/grapheme/display index over a single text snapshot.
///
/// Six parallel arrays, built in one forward pass over validated UTF-8 bytes:
/// - `byte_to_codepoint[byte]`      -> codepoint index that byte belongs to
/// - `codepoint_to_byte[cp]`        -> byte offset where that codepoint starts
/// - `grapheme_to_codepoint[g]`     -> first codepoint index of grapheme `g`
/// - `codepoint_to_grapheme[cp]`    -> grapheme index that codepoint belongs to
/// - `grapheme_to_display[g]`       -> display column where grapheme `g` starts
/// - `display_to_grapheme[col]`     -> grapheme index occupying display column `col`
#[derive(Debug, Default)]
pub struct Utf8Index {
    built: bool,
    byte_len: usize,
    codepoint_count: usize,
    grapheme_count: usize,
    display_width: usize,
    byte_to_codepoint: Vec<usize>,
    codepoint_to_byte: Vec<usize>,
    codepoint_to_grapheme: Vec<usize>,
    grapheme_to_codepoint: Vec<usize>,
    grapheme_to_display: Vec<usize>,
    display_to_grapheme: Vec<usize>,
}

/// Validate raw bytes as UTF-8, returning the decoded codepoints with their
/// starting byte offsets. Rejects overlong encodings, surrogate codepoints,
/// and truncated multi-byte sequences with a precise `offset`.
fn validate_utf8(bytes: &[u8]) -> Result<Vec<(usize, char)>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        let (len, min_cp): (usize, u32) = if b0 & 0x80 == 0 {
            (1, 0)
        } else if b0 & 0xE0 == 0xC0 {
            (2, 0x80)
        } else if b0 & 0xF0 == 0xE0 {
            (3, 0x800)
        } else if b0 & 0xF8 == 0xF0 {
            (4, 0x10000)
        } else {
            return Err(IndexError::InvalidEncoding {
                offset: i,
                reason: "invalid leading byte",
            });
        };
        if i + len > bytes.len() {
            return Err(IndexError::InvalidEncoding {
                offset: i,
                reason: "truncated sequence",
            });
        }
        let mut cp: u32 = if len == 1 {
            b0 as u32
        } else {
            (b0 as u32) & (0x7F >> len)
        };
        for k in 1..len {
            let bk = bytes[i + k];
            if bk & 0xC0 != 0x80 {
                return Err(IndexError::InvalidEncoding {
                    offset: i,
                    reason: "missing continuation byte",
                });
            }
            cp = (cp << 6) | (bk & 0x3F) as u32;
        }
        if len > 1 && cp < min_cp {
            return Err(IndexError::InvalidEncoding {
                offset: i,
                reason: "overlong encoding",
            });
        }
        if (0xD800..=0xDFFF).contains(&cp) {
            return Err(IndexError::InvalidEncoding {
                offset: i,
                reason: "lone surrogate",
            });
        }
        if cp > 0x10FFFF {
            return Err(IndexError::InvalidEncoding {
                offset: i,
                reason: "codepoint out of range",
            });
        }
        let c = char::from_u32(cp).ok_or(IndexError::InvalidEncoding {
            offset: i,
            reason: "codepoint out of range",
        })?;
        out.push((i, c));
        i += len;
    }
    Ok(out)
}

impl Utf8Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all six arrays from a full text snapshot, given as raw bytes
    /// so the UTF-8 validation pass below is reachable through the public
    /// API rather than only through `&str`'s already-guaranteed-valid input.
    /// O(n) in byte length.
    pub fn rebuild(&mut self, bytes: &[u8]) -> Result<()> {
        self.invalidate();
        let codepoints = validate_utf8(bytes)?;
        let text: String = codepoints.iter().map(|(_, c)| *c).collect();

        self.byte_len = bytes.len();
        self.codepoint_count = codepoints.len();
        self.byte_to_codepoint = vec![0; self.byte_len + 1];
        self.codepoint_to_byte = Vec::with_capacity(self.codepoint_count + 1);
        self.codepoint_to_grapheme = vec![0; self.codepoint_count];

        for (cp_idx, (byte_off, _)) in codepoints.iter().enumerate() {
            self.codepoint_to_byte.push(*byte_off);
            let next_byte = codepoints
                .get(cp_idx + 1)
                .map(|(b, _)| *b)
                .unwrap_or(self.byte_len);
            for b in *byte_off..next_byte {
                self.byte_to_codepoint[b] = cp_idx;
            }
        }
        self.codepoint_to_byte.push(self.byte_len);
        self.byte_to_codepoint[self.byte_len] = self.codepoint_count;

        let mut display_col = 0usize;
        for (g_idx, g) in text.graphemes(true).enumerate() {
            let g_start_byte = g.as_ptr() as usize - text.as_ptr() as usize;
            let cp_idx = self.byte_to_codepoint[g_start_byte];
            self.grapheme_to_codepoint.push(cp_idx);
            self.grapheme_to_display.push(display_col);

            let g_cp_count = g.chars().count();
            for off in 0..g_cp_count {
                self.codepoint_to_grapheme[cp_idx + off] = g_idx;
            }

            let w: usize = g.chars().map(codepoint_width).map(|w| w as usize).sum();
            let w = w.max(1);
            for _ in 0..w {
                self.display_to_grapheme.push(g_idx);
            }
            display_col += w;
        }
        self.grapheme_count = text.graphemes(true).count();
        self.display_width = display_col;
        self.built = true;
        Ok(())
    }

    /// Mark the index stale; all queries fail with `InvalidState` until the
    /// next `rebuild`. Called whenever the owning buffer mutates.
    pub fn invalidate(&mut self) {
        self.built = false;
        self.byte_len = 0;
        self.codepoint_count = 0;
        self.grapheme_count = 0;
        self.display_width = 0;
        self.byte_to_codepoint.clear();
        self.codepoint_to_byte.clear();
        self.codepoint_to_grapheme.clear();
        self.grapheme_to_codepoint.clear();
        self.grapheme_to_display.clear();
        self.display_to_grapheme.clear();
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn codepoint_count(&self) -> usize {
        self.codepoint_count
    }

    pub fn grapheme_count(&self) -> usize {
        self.grapheme_count
    }

    pub fn display_width(&self) -> usize {
        self.display_width
    }

    fn require_built(&self) -> Result<()> {
        if self.built {
            Ok(())
        } else {
            Err(IndexError::InvalidState)
        }
    }

    pub fn byte_to_codepoint(&self, byte: usize) -> Result<usize> {
        self.require_built()?;
        self.byte_to_codepoint
            .get(byte)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: byte,
                len: self.byte_len,
            })
    }

    pub fn codepoint_to_byte(&self, codepoint: usize) -> Result<usize> {
        self.require_built()?;
        self.codepoint_to_byte
            .get(codepoint)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: codepoint,
                len: self.codepoint_count,
            })
    }

    pub fn codepoint_to_grapheme(&self, codepoint: usize) -> Result<usize> {
        self.require_built()?;
        if codepoint == self.codepoint_count {
            return Ok(self.grapheme_count);
        }
        self.codepoint_to_grapheme
            .get(codepoint)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: codepoint,
                len: self.codepoint_count,
            })
    }

    pub fn grapheme_to_codepoint(&self, grapheme: usize) -> Result<usize> {
        self.require_built()?;
        if grapheme == self.grapheme_count {
            return Ok(self.codepoint_count);
        }
        self.grapheme_to_codepoint
            .get(grapheme)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: grapheme,
                len: self.grapheme_count,
            })
    }

    pub fn grapheme_to_display(&self, grapheme: usize) -> Result<usize> {
        self.require_built()?;
        if grapheme == self.grapheme_count {
            return Ok(self.display_width);
        }
        self.grapheme_to_display
            .get(grapheme)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: grapheme,
                len: self.grapheme_count,
            })
    }

    pub fn display_to_grapheme(&self, column: usize) -> Result<usize> {
        self.require_built()?;
        if column == self.display_width {
            return Ok(self.grapheme_count);
        }
        self.display_to_grapheme
            .get(column)
            .copied()
            .ok_or(IndexError::InvalidRange {
                index: column,
                len: self.display_width,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_encoding() {
        let bytes = [0xC0, 0x80];
        let mut idx = Utf8Index::new();
        let err = idx.rebuild(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEncoding { .. }));
    }

    #[test]
    fn rejects_truncated_sequence() {
        let bytes = [0xE2, 0x82];
        let mut idx = Utf8Index::new();
        let err = idx.rebuild(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEncoding { .. }));
    }

    #[test]
    fn rejects_lone_surrogate() {
        let bytes = [0xED, 0xA0, 0x80];
        let mut idx = Utf8Index::new();
        let err = idx.rebuild(&bytes).unwrap_err();
        assert!(matches!(err, IndexError::InvalidEncoding { .. }));
    }

    #[test]
    fn query_before_build_fails() {
        let idx = Utf8Index::new();
        assert_eq!(idx.byte_to_codepoint(0), Err(IndexError::InvalidState));
    }

    #[test]
    fn ascii_roundtrip() {
        let mut idx = Utf8Index::new();
        idx.rebuild(b"abc").unwrap();
        assert_eq!(idx.codepoint_count(), 3);
        assert_eq!(idx.grapheme_count(), 3);
        assert_eq!(idx.display_width(), 3);
        assert_eq!(idx.byte_to_codepoint(1).unwrap(), 1);
        assert_eq!(idx.codepoint_to_byte(2).unwrap(), 2);
        assert_eq!(idx.grapheme_to_display(1).unwrap(), 1);
    }

    #[test]
    fn wide_char_display_mapping() {
        let mut idx = Utf8Index::new();
        idx.rebuild("a\u{6F22}b".as_bytes()).unwrap(); // a, CJK (width 2), b
        assert_eq!(idx.grapheme_count(), 3);
        assert_eq!(idx.display_width(), 4);
        assert_eq!(idx.grapheme_to_display(0).unwrap(), 0);
        assert_eq!(idx.grapheme_to_display(1).unwrap(), 1);
        assert_eq!(idx.grapheme_to_display(2).unwrap(), 3);
        assert_eq!(idx.display_to_grapheme(1).unwrap(), 1);
        assert_eq!(idx.display_to_grapheme(2).unwrap(), 1);
        assert_eq!(idx.display_to_grapheme(3).unwrap(), 2);
    }

    #[test]
    fn invalidate_clears_state() {
        let mut idx = Utf8Index::new();
        idx.rebuild(b"abc").unwrap();
        idx.invalidate();
        assert!(!idx.is_built());
        assert_eq!(idx.codepoint_to_byte(0), Err(IndexError::InvalidState));
    }

    #[test]
    fn combining_mark_single_grapheme() {
        let mut idx = Utf8Index::new();
        idx.rebuild("e\u{0301}".as_bytes()).unwrap();
        assert_eq!(idx.codepoint_count(), 2);
        assert_eq!(idx.grapheme_count(), 1);
        assert_eq!(idx.codepoint_to_grapheme(0).unwrap(), 0);
        assert_eq!(idx.codepoint_to_grapheme(1).unwrap(), 0);
    }
}
