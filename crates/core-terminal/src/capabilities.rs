//! Terminal class detection and the capability matrix derived from it.
//!
//! Detection precedence: multiplexer (`tmux`), `screen`, kitty, iTerm2,
//! GNOME terminal, Alacritty, xterm/256-color, Linux console, otherwise
//! unknown. The matrix below is a static table (10 features per class)
//! consulted at startup and never re-probed mid-session.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalClass {
    Tmux,
    Screen,
    Kitty,
    ITerm2,
    Gnome,
    Alacritty,
    Xterm256,
    LinuxConsole,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    TrueColor,
    Colors256,
    Mouse,
    BracketedPaste,
    FocusEvents,
    Hyperlinks,
    ScrollRegion,
    AltScreen,
    Title,
    KittyKeyboardProtocol,
}

const FEATURES: [Feature; 10] = [
    Feature::TrueColor,
    Feature::Colors256,
    Feature::Mouse,
    Feature::BracketedPaste,
    Feature::FocusEvents,
    Feature::Hyperlinks,
    Feature::ScrollRegion,
    Feature::AltScreen,
    Feature::Title,
    Feature::KittyKeyboardProtocol,
];

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::TrueColor => "truecolor",
            Feature::Colors256 => "colors256",
            Feature::Mouse => "mouse",
            Feature::BracketedPaste => "bracketed_paste",
            Feature::FocusEvents => "focus_events",
            Feature::Hyperlinks => "hyperlinks",
            Feature::ScrollRegion => "scroll_region",
            Feature::AltScreen => "alt_screen",
            Feature::Title => "title",
            Feature::KittyKeyboardProtocol => "kitty_keyboard_protocol",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        FEATURES.iter().copied().find(|f| f.name() == name)
    }
}

fn env_contains(var: &str, needle: &str) -> bool {
    env::var(var)
        .map(|v| v.to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn env_set(var: &str) -> bool {
    env::var(var).map(|v| !v.is_empty()).unwrap_or(false)
}

impl TerminalClass {
    /// Detect the running terminal's class from environment variables,
    /// in the precedence order documented on this type.
    pub fn detect() -> Self {
        if env_set("TMUX") {
            return TerminalClass::Tmux;
        }
        if env_contains("TERM", "screen") {
            return TerminalClass::Screen;
        }
        if env_set("KITTY_WINDOW_ID") || env_contains("TERM", "kitty") {
            return TerminalClass::Kitty;
        }
        if env_contains("TERM_PROGRAM", "iterm") {
            return TerminalClass::ITerm2;
        }
        if env_contains("TERM_PROGRAM", "gnome")
            || env::var("COLORTERM").map(|v| v == "gnome-terminal").unwrap_or(false)
        {
            return TerminalClass::Gnome;
        }
        if env_contains("TERM_PROGRAM", "alacritty") || env_contains("TERM", "alacritty") {
            return TerminalClass::Alacritty;
        }
        if env_contains("TERM", "xterm") || env_contains("TERM", "256color") {
            return TerminalClass::Xterm256;
        }
        if env::var("TERM").map(|v| v == "linux").unwrap_or(false) {
            return TerminalClass::LinuxConsole;
        }
        TerminalClass::Unknown
    }

    fn supports_matrix(&self, feature: Feature) -> bool {
        use Feature::*;
        use TerminalClass::*;
        match (self, feature) {
            (Tmux, ScrollRegion | AltScreen | Title | Mouse | Colors256) => true,
            (Tmux, _) => false,

            (Screen, ScrollRegion | AltScreen | Title | Colors256) => true,
            (Screen, _) => false,

            (Kitty, _) => true,

            (ITerm2, TrueColor | Colors256 | Mouse | BracketedPaste | FocusEvents | Hyperlinks
            | ScrollRegion | AltScreen | Title) => true,
            (ITerm2, KittyKeyboardProtocol) => false,

            (Gnome, TrueColor | Colors256 | Mouse | BracketedPaste | FocusEvents | Hyperlinks
            | ScrollRegion | AltScreen | Title) => true,
            (Gnome, KittyKeyboardProtocol) => false,

            (Alacritty, TrueColor | Colors256 | Mouse | BracketedPaste | FocusEvents
            | ScrollRegion | AltScreen | Title) => true,
            (Alacritty, Hyperlinks | KittyKeyboardProtocol) => false,

            (Xterm256, Colors256 | Mouse | BracketedPaste | ScrollRegion | AltScreen | Title) => true,
            (Xterm256, TrueColor | FocusEvents | Hyperlinks | KittyKeyboardProtocol) => false,

            (LinuxConsole, ScrollRegion | AltScreen) => true,
            (LinuxConsole, _) => false,

            (Unknown, _) => false,
        }
    }
}

/// Capability matrix resolved for the detected (or explicitly chosen)
/// terminal class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub class: TerminalClass,
}

impl TerminalCapabilities {
    pub fn detect() -> Self {
        Self {
            class: TerminalClass::detect(),
        }
    }

    pub fn for_class(class: TerminalClass) -> Self {
        Self { class }
    }

    /// Resolve a feature by its canonical string name against this
    /// terminal class's row in the matrix. Unknown names return `false`.
    pub fn supports(&self, feature_name: &str) -> bool {
        Feature::from_name(feature_name)
            .map(|f| self.class.supports_matrix(f))
            .unwrap_or(false)
    }

    pub fn supports_feature(&self, feature: Feature) -> bool {
        self.class.supports_matrix(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kitty_supports_everything() {
        let caps = TerminalCapabilities::for_class(TerminalClass::Kitty);
        for f in FEATURES {
            assert!(caps.supports_feature(f), "{:?} should be supported", f);
        }
    }

    #[test]
    fn unknown_supports_nothing() {
        let caps = TerminalCapabilities::for_class(TerminalClass::Unknown);
        for f in FEATURES {
            assert!(!caps.supports_feature(f));
        }
    }

    #[test]
    fn supports_by_name_matches_supports_feature() {
        let caps = TerminalCapabilities::for_class(TerminalClass::Xterm256);
        assert_eq!(caps.supports("colors256"), caps.supports_feature(Feature::Colors256));
        assert!(!caps.supports("not_a_real_feature"));
    }

    #[test]
    fn xterm_lacks_truecolor_and_hyperlinks() {
        let caps = TerminalCapabilities::for_class(TerminalClass::Xterm256);
        assert!(!caps.supports_feature(Feature::TrueColor));
        assert!(!caps.supports_feature(Feature::Hyperlinks));
        assert!(caps.supports_feature(Feature::ScrollRegion));
    }

    #[test]
    fn feature_name_roundtrips() {
        for f in FEATURES {
            assert_eq!(Feature::from_name(f.name()), Some(f));
        }
    }
}
