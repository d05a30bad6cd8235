//! Grapheme-cluster display width engine.
//!
//! `egc_width` is the single authoritative function for terminal column width
//! of a grapheme cluster. It classifies the cluster (ASCII, narrow, wide,
//! emoji forms, combining-mark clusters) and maps the classification to a
//! width, biasing toward over-estimation for pictographic sequences since an
//! extra blank cell is harmless while under-estimation causes cursor drift.
//!
//! Invariants:
//! - All display-width decisions in this crate flow through `egc_width`.
//! - Zero-width codepoints (combining marks with a narrow base) contribute 0
//!   additional width beyond their base, per §3 ("zero-width continuation
//!   bytes not counted").

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EgcKind {
    Ascii,
    Narrow,
    Wide,
    EmojiSimple,
    EmojiModifier,
    EmojiKeycap,
    EmojiFlag,
    EmojiZwj,
    Combining(bool),
}

const ZWJ: char = '\u{200D}';
const KEYCAP_COMBINING: char = '\u{20E3}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_skin_tone_modifier(c: char) -> bool {
    ('\u{1F3FB}'..='\u{1F3FF}').contains(&c)
}

fn is_extended_pictographic(c: char) -> bool {
    ('\u{1F300}'..='\u{1FAFF}').contains(&c) || ('\u{2600}'..='\u{27BF}').contains(&c)
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
        || ('\u{1AB0}'..='\u{1AFF}').contains(&c)
        || ('\u{1DC0}'..='\u{1DFF}').contains(&c)
        || ('\u{20D0}'..='\u{20FF}').contains(&c)
        || ('\u{FE20}'..='\u{FE2F}').contains(&c)
}

fn classify(egc: &str) -> EgcKind {
    let mut chars = egc.chars();
    let Some(first) = chars.next() else {
        return EgcKind::Narrow;
    };
    let single = chars.next().is_none();

    if single {
        if first.is_ascii() {
            return EgcKind::Ascii;
        }
        if is_extended_pictographic(first) {
            return EgcKind::EmojiSimple;
        }
        let uwidth = UnicodeWidthChar::width(first).unwrap_or(1);
        return if uwidth == 2 {
            EgcKind::Wide
        } else {
            EgcKind::Narrow
        };
    }

    let mut count_ep = 0usize;
    let mut count_ri = 0usize;
    let mut has_zwj = false;
    let mut has_skin = false;
    let mut has_combining = false;
    let mut keycap_base = false;
    let mut ends_with_keycap = false;
    let mut any_wide = false;
    let mut base_wide_or_emoji = false;
    let mut saw_non_mark_base = false;
    let total = egc.chars().count();

    for (i, c) in egc.chars().enumerate() {
        if is_extended_pictographic(c) {
            count_ep += 1;
        }
        if is_regional_indicator(c) {
            count_ri += 1;
        }
        if c == ZWJ {
            has_zwj = true;
        }
        if is_skin_tone_modifier(c) {
            has_skin = true;
        }
        if is_combining_mark(c) {
            has_combining = true;
        }
        if c == KEYCAP_COMBINING && i == total - 1 {
            ends_with_keycap = true;
        }
        if !keycap_base && (c.is_ascii_digit() || c == '#' || c == '*') {
            keycap_base = true;
        }
        if UnicodeWidthChar::width(c).unwrap_or(1) == 2 {
            any_wide = true;
        }
        if !saw_non_mark_base && !is_combining_mark(c) {
            saw_non_mark_base = true;
            if is_extended_pictographic(c) || UnicodeWidthChar::width(c).unwrap_or(1) == 2 {
                base_wide_or_emoji = true;
            }
        }
    }

    if ends_with_keycap && keycap_base {
        return EgcKind::EmojiKeycap;
    }
    if count_ri == 2 && total == 2 {
        return EgcKind::EmojiFlag;
    }
    if has_zwj && count_ep >= 2 {
        return EgcKind::EmojiZwj;
    }
    if count_ep >= 1 && has_skin {
        return EgcKind::EmojiModifier;
    }
    if count_ep == 1 && !has_zwj {
        return EgcKind::EmojiSimple;
    }
    if has_combining {
        return EgcKind::Combining(base_wide_or_emoji);
    }
    if any_wide {
        return EgcKind::Wide;
    }
    if count_ep > 0 {
        return EgcKind::EmojiSimple;
    }
    EgcKind::Narrow
}

#[inline]
fn width_for_kind(kind: EgcKind) -> u16 {
    match kind {
        EgcKind::Ascii | EgcKind::Narrow => 1,
        EgcKind::Wide
        | EgcKind::EmojiSimple
        | EgcKind::EmojiModifier
        | EgcKind::EmojiKeycap
        | EgcKind::EmojiFlag
        | EgcKind::EmojiZwj => 2,
        EgcKind::Combining(base_wide) => {
            if base_wide {
                2
            } else {
                1
            }
        }
    }
}

/// Display column width of a single grapheme cluster. Empty input is 0.
///
/// Precondition: `egc` is a single grapheme-cluster boundary slice; callers
/// are expected to have already segmented the string.
pub fn egc_width(egc: &str) -> u16 {
    if egc.is_empty() {
        return 0;
    }
    let kind = classify(egc);
    let mut width = width_for_kind(kind);

    // Conservative widen fallback: any pictographic/regional-indicator signal
    // that slipped through classification as width 1 is bumped to 2, since
    // under-estimation causes cursor drift while over-estimation is benign.
    if width == 1 {
        let has_signal = egc
            .chars()
            .any(|c| is_extended_pictographic(c) || is_regional_indicator(c));
        if has_signal {
            width = 2;
        }
    }
    width
}

/// Width of a codepoint in isolation (used by the UTF-8 index's pass 1 width
/// accumulation, which sums per-codepoint widths rather than per-cluster).
/// Invalid/control codepoints default to width 1 per §4.1 ("invalid widths
/// treated as 1").
pub fn codepoint_width(c: char) -> u16 {
    if c.is_ascii() {
        return if c.is_ascii_control() { 0 } else { 1 };
    }
    if is_combining_mark(c) {
        return 0;
    }
    UnicodeWidthChar::width(c).unwrap_or(1) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_width_one() {
        assert_eq!(egc_width("a"), 1);
    }

    #[test]
    fn cjk_width_two() {
        assert_eq!(egc_width("漢"), 2);
    }

    #[test]
    fn combining_mark_narrow_base() {
        let s = "e\u{0301}";
        assert_eq!(egc_width(s), 1);
    }

    #[test]
    fn emoji_simple_width_two() {
        assert_eq!(egc_width("😀"), 2);
    }

    #[test]
    fn flag_sequence_width_two() {
        let flag = "\u{1F1FA}\u{1F1F8}";
        assert_eq!(egc_width(flag), 2);
    }

    #[test]
    fn zwj_family_width_two() {
        let family = "\u{1F468}\u{200D}\u{1F469}\u{200D}\u{1F467}";
        assert_eq!(egc_width(family), 2);
    }

    #[test]
    fn empty_is_zero() {
        assert_eq!(egc_width(""), 0);
    }
}
