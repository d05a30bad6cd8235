//! End-to-end scenarios exercising the screen buffer and diff together,
//! the way a render pass actually drives them: render two frames, diff
//! them, and check the emitted change list.

use core_render::diff::{diff, ScreenChange};
use core_render::screen::ScreenBuffer;

#[test]
fn diff_minimality_on_single_word_substitution() {
    let old = ScreenBuffer::render("$ ", "ls foo", 8, 80, 24);
    let new = ScreenBuffer::render("$ ", "ls bar", 8, 80, 24);
    let changes = diff(&old, &new);

    assert_eq!(
        changes,
        vec![
            ScreenChange::WriteText {
                row: 0,
                col: 6,
                text: "bar".to_string(),
            },
            ScreenChange::MoveCursor { row: 0, col: 8 },
        ]
    );
}

#[test]
fn wide_character_command_wraps_and_places_cursor_on_second_row() {
    let sb = ScreenBuffer::render("", "\u{3042}\u{3044}\u{3046}\u{3048}\u{304a}\u{304b}", 12, 10, 24);

    assert_eq!(sb.frame.line_clusters(0)[..5], ["\u{3042}", "\u{3044}", "\u{3046}", "\u{3048}", "\u{304a}"]);
    assert_eq!(sb.frame.line_clusters(1)[0], "\u{304b}");
    assert_eq!(sb.cursor.row, 1);
    assert_eq!(sb.cursor.col, 2);
}
