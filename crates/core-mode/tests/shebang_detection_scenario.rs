use core_mode::Mode;

#[test]
fn shebang_lines_resolve_to_the_expected_mode_or_fail_detection() {
    assert_eq!(Mode::from_shebang("#!/usr/bin/env bash"), Some(Mode::Bash));
    assert_eq!(Mode::from_shebang("#!/bin/dash -eu"), Some(Mode::Posix));
    assert_eq!(Mode::from_shebang("#!/usr/bin/lusush"), Some(Mode::Lusush));
    assert_eq!(Mode::from_shebang("#!/usr/bin/python3"), None);
}
