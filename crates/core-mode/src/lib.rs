//! Shell mode and feature matrix: which POSIX/bash/zsh/lusush behaviors
//! are active, with per-feature overrides layered on top of a
//! compile-time constant matrix.

use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModeError {
    #[error("mode is locked in strict mode")]
    Strict,
    #[error("unknown mode name: {0}")]
    UnknownMode(String),
    #[error("unknown feature name: {0}")]
    UnknownFeature(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Posix,
    Bash,
    Zsh,
    Lusush,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Posix => "posix",
            Mode::Bash => "bash",
            Mode::Zsh => "zsh",
            Mode::Lusush => "lusush",
        }
    }

    /// Case-insensitive, alias-aware parse (`sh`/`dash`/`ash` are aliases
    /// for `posix`).
    pub fn from_name(name: &str) -> Option<Mode> {
        match name.to_lowercase().as_str() {
            "posix" | "sh" | "dash" | "ash" => Some(Mode::Posix),
            "bash" => Some(Mode::Bash),
            "zsh" => Some(Mode::Zsh),
            "lusush" => Some(Mode::Lusush),
            _ => None,
        }
    }

    /// Map an interpreter basename from a shebang line to a mode.
    /// Handles the `/usr/bin/env <interpreter>` wrapper form.
    pub fn from_shebang(line: &str) -> Option<Mode> {
        let rest = line.strip_prefix("#!")?.trim();
        let mut parts = rest.split_whitespace();
        let mut interpreter = parts.next()?;
        if interpreter.ends_with("env") {
            interpreter = parts.next()?;
        }
        let basename = interpreter.rsplit('/').next().unwrap_or(interpreter);
        Mode::from_name(basename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    IndexedArrays,
    AssociativeArrays,
    ZeroIndexedArrays,
    ArrayAppend,
    ArraySlicing,
    ArithmeticExpansion,
    FloatingPointArithmetic,
    ExtendedTest,
    RegexMatch,
    ExtendedPatternMatching,
    ProcessSubstitution,
    StderrRedirection,
    ExtendedParameterExpansion,
    ParameterTransformation,
    ExtendedGlobbing,
    Globstar,
    NullGlob,
    BraceExpansion,
    AnsiCQuoting,
    LocaleQuoting,
    ControlFlowSelect,
    ControlFlowUntil,
    ControlFlowCaseFallthrough,
    WordSplitDefault,
    AutoCd,
    PushdPopd,
    IncAppendHistory,
    HistVerify,
    NameReferences,
    AnonymousFunctions,
    GlobQualifiers,
    HookFunctions,
    ZshParameterFlags,
    PluginSystem,
    CheckJobs,
    Coprocesses,
    HereStrings,
    HereDocsIndented,
    CommandSubstitutionBacktick,
    CommandSubstitutionDollar,
    FunctionKeywordOptional,
    LocalKeyword,
    TypesetDeclarations,
    JobControl,
    RestrictedMode,
    ExtendedDebugTrap,
}

pub const ALL_FEATURES: &[Feature] = &[
    Feature::IndexedArrays,
    Feature::AssociativeArrays,
    Feature::ZeroIndexedArrays,
    Feature::ArrayAppend,
    Feature::ArraySlicing,
    Feature::ArithmeticExpansion,
    Feature::FloatingPointArithmetic,
    Feature::ExtendedTest,
    Feature::RegexMatch,
    Feature::ExtendedPatternMatching,
    Feature::ProcessSubstitution,
    Feature::StderrRedirection,
    Feature::ExtendedParameterExpansion,
    Feature::ParameterTransformation,
    Feature::ExtendedGlobbing,
    Feature::Globstar,
    Feature::NullGlob,
    Feature::BraceExpansion,
    Feature::AnsiCQuoting,
    Feature::LocaleQuoting,
    Feature::ControlFlowSelect,
    Feature::ControlFlowUntil,
    Feature::ControlFlowCaseFallthrough,
    Feature::WordSplitDefault,
    Feature::AutoCd,
    Feature::PushdPopd,
    Feature::IncAppendHistory,
    Feature::HistVerify,
    Feature::NameReferences,
    Feature::AnonymousFunctions,
    Feature::GlobQualifiers,
    Feature::HookFunctions,
    Feature::ZshParameterFlags,
    Feature::PluginSystem,
    Feature::CheckJobs,
    Feature::Coprocesses,
    Feature::HereStrings,
    Feature::HereDocsIndented,
    Feature::CommandSubstitutionBacktick,
    Feature::CommandSubstitutionDollar,
    Feature::FunctionKeywordOptional,
    Feature::LocalKeyword,
    Feature::TypesetDeclarations,
    Feature::JobControl,
    Feature::RestrictedMode,
    Feature::ExtendedDebugTrap,
];

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::IndexedArrays => "indexed_arrays",
            Feature::AssociativeArrays => "associative_arrays",
            Feature::ZeroIndexedArrays => "zero_indexed_arrays",
            Feature::ArrayAppend => "array_append",
            Feature::ArraySlicing => "array_slicing",
            Feature::ArithmeticExpansion => "arithmetic_expansion",
            Feature::FloatingPointArithmetic => "floating_point_arithmetic",
            Feature::ExtendedTest => "extended_test",
            Feature::RegexMatch => "regex_match",
            Feature::ExtendedPatternMatching => "extended_pattern_matching",
            Feature::ProcessSubstitution => "process_substitution",
            Feature::StderrRedirection => "stderr_redirection",
            Feature::ExtendedParameterExpansion => "extended_parameter_expansion",
            Feature::ParameterTransformation => "parameter_transformation",
            Feature::ExtendedGlobbing => "extended_globbing",
            Feature::Globstar => "globstar",
            Feature::NullGlob => "nullglob",
            Feature::BraceExpansion => "brace_expansion",
            Feature::AnsiCQuoting => "ansi_c_quoting",
            Feature::LocaleQuoting => "locale_quoting",
            Feature::ControlFlowSelect => "control_flow_select",
            Feature::ControlFlowUntil => "control_flow_until",
            Feature::ControlFlowCaseFallthrough => "control_flow_case_fallthrough",
            Feature::WordSplitDefault => "word_split_default",
            Feature::AutoCd => "auto_cd",
            Feature::PushdPopd => "pushd_popd",
            Feature::IncAppendHistory => "inc_append_history",
            Feature::HistVerify => "hist_verify",
            Feature::NameReferences => "name_references",
            Feature::AnonymousFunctions => "anonymous_functions",
            Feature::GlobQualifiers => "glob_qualifiers",
            Feature::HookFunctions => "hook_functions",
            Feature::ZshParameterFlags => "zsh_parameter_flags",
            Feature::PluginSystem => "plugin_system",
            Feature::CheckJobs => "checkjobs",
            Feature::Coprocesses => "coprocesses",
            Feature::HereStrings => "here_strings",
            Feature::HereDocsIndented => "here_docs_indented",
            Feature::CommandSubstitutionBacktick => "command_substitution_backtick",
            Feature::CommandSubstitutionDollar => "command_substitution_dollar",
            Feature::FunctionKeywordOptional => "function_keyword_optional",
            Feature::LocalKeyword => "local_keyword",
            Feature::TypesetDeclarations => "typeset_declarations",
            Feature::JobControl => "job_control",
            Feature::RestrictedMode => "restricted_mode",
            Feature::ExtendedDebugTrap => "extended_debug_trap",
        }
    }

    /// Common alias, if any (e.g. `arrays` for indexed arrays, `extglob`
    /// for extended pattern matching).
    fn alias(&self) -> Option<&'static str> {
        match self {
            Feature::IndexedArrays => Some("arrays"),
            Feature::ExtendedPatternMatching => Some("extglob"),
            _ => None,
        }
    }

    /// Case-insensitive parse against canonical name or alias.
    pub fn from_name(name: &str) -> Option<Feature> {
        let lower = name.to_lowercase();
        ALL_FEATURES
            .iter()
            .copied()
            .find(|f| f.name() == lower || f.alias() == Some(lower.as_str()))
    }
}

fn bash_matrix(feature: Feature) -> bool {
    use Feature::*;
    !matches!(
        feature,
        AssociativeArrays
            | ZeroIndexedArrays
            | ZshParameterFlags
            | GlobQualifiers
            | NameReferences
            | AnonymousFunctions
            | HookFunctions
            | PluginSystem
            | RestrictedMode
    )
}

fn zsh_matrix(feature: Feature) -> bool {
    use Feature::*;
    !matches!(feature, ZeroIndexedArrays | PluginSystem | RestrictedMode)
}

fn posix_matrix(feature: Feature) -> bool {
    use Feature::*;
    matches!(
        feature,
        ArithmeticExpansion
            | BraceExpansion
            | JobControl
            | HereDocsIndented
            | CommandSubstitutionBacktick
            | CommandSubstitutionDollar
            | HereStrings
    )
}

/// Lusush cherry-picks curated defaults on top of an otherwise bash-like
/// baseline.
fn lusush_matrix(feature: Feature) -> bool {
    use Feature::*;
    match feature {
        ZeroIndexedArrays | Globstar | NullGlob | IncAppendHistory | CheckJobs | PluginSystem => {
            true
        }
        WordSplitDefault => false,
        other => bash_matrix(other),
    }
}

fn matrix(mode: Mode, feature: Feature) -> bool {
    match mode {
        Mode::Posix => posix_matrix(feature),
        Mode::Bash => bash_matrix(feature),
        Mode::Zsh => zsh_matrix(feature),
        Mode::Lusush => lusush_matrix(feature),
    }
}

/// Mode registry: current mode, per-feature overrides, and a strict flag
/// that rejects `set()` once locked.
pub struct ModeRegistry {
    current: Mode,
    overrides: [Option<bool>; ModeRegistry::SLOT_COUNT],
    strict: bool,
}

impl ModeRegistry {
    const SLOT_COUNT: usize = 64;

    pub fn new(mode: Mode) -> Self {
        Self {
            current: mode,
            overrides: [None; Self::SLOT_COUNT],
            strict: false,
        }
    }

    fn slot(feature: Feature) -> usize {
        ALL_FEATURES
            .iter()
            .position(|f| *f == feature)
            .expect("feature listed in ALL_FEATURES")
    }

    pub fn get(&self) -> Mode {
        self.current
    }

    pub fn is(&self, mode: Mode) -> bool {
        self.current == mode
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn set(&mut self, mode: Mode) -> Result<(), ModeError> {
        if self.strict {
            return Err(ModeError::Strict);
        }
        self.current = mode;
        Ok(())
    }

    /// Override if set, otherwise the matrix's value for the current mode.
    pub fn allows(&self, feature: Feature) -> bool {
        self.overrides[Self::slot(feature)].unwrap_or_else(|| matrix(self.current, feature))
    }

    pub fn enable(&mut self, feature: Feature) {
        self.overrides[Self::slot(feature)] = Some(true);
    }

    pub fn disable(&mut self, feature: Feature) {
        self.overrides[Self::slot(feature)] = Some(false);
    }

    pub fn reset(&mut self, feature: Feature) {
        self.overrides[Self::slot(feature)] = None;
    }

    pub fn reset_all(&mut self) {
        self.overrides = [None; Self::SLOT_COUNT];
    }

    pub fn is_overridden(&self, feature: Feature) -> bool {
        self.overrides[Self::slot(feature)].is_some()
    }

    pub fn overridden_features(&self) -> HashSet<Feature> {
        ALL_FEATURES
            .iter()
            .copied()
            .filter(|f| self.is_overridden(*f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_roundtrip() {
        for m in [Mode::Posix, Mode::Bash, Mode::Zsh, Mode::Lusush] {
            assert_eq!(Mode::from_name(m.name()), Some(m));
        }
    }

    #[test]
    fn sh_is_alias_for_posix() {
        assert_eq!(Mode::from_name("sh"), Some(Mode::Posix));
        assert_eq!(Mode::from_name("SH"), Some(Mode::Posix));
    }

    #[test]
    fn feature_names_roundtrip() {
        for f in ALL_FEATURES {
            assert_eq!(Feature::from_name(f.name()), Some(*f));
        }
    }

    #[test]
    fn feature_alias_resolves() {
        assert_eq!(Feature::from_name("arrays"), Some(Feature::IndexedArrays));
        assert_eq!(
            Feature::from_name("extglob"),
            Some(Feature::ExtendedPatternMatching)
        );
    }

    #[test]
    fn lusush_curated_defaults() {
        let reg = ModeRegistry::new(Mode::Lusush);
        assert!(reg.allows(Feature::ZeroIndexedArrays));
        assert!(reg.allows(Feature::Globstar));
        assert!(reg.allows(Feature::NullGlob));
        assert!(!reg.allows(Feature::WordSplitDefault));
        assert!(reg.allows(Feature::IncAppendHistory));
        assert!(reg.allows(Feature::CheckJobs));
        assert!(reg.allows(Feature::PluginSystem));
    }

    #[test]
    fn override_takes_precedence_over_matrix() {
        let mut reg = ModeRegistry::new(Mode::Posix);
        assert!(!reg.allows(Feature::Globstar));
        reg.enable(Feature::Globstar);
        assert!(reg.allows(Feature::Globstar));
        assert!(reg.is_overridden(Feature::Globstar));
        reg.reset(Feature::Globstar);
        assert!(!reg.is_overridden(Feature::Globstar));
        assert!(!reg.allows(Feature::Globstar));
    }

    #[test]
    fn reset_all_clears_every_override() {
        let mut reg = ModeRegistry::new(Mode::Posix);
        reg.enable(Feature::Globstar);
        reg.disable(Feature::ArithmeticExpansion);
        reg.reset_all();
        assert!(reg.overridden_features().is_empty());
    }

    #[test]
    fn strict_mode_rejects_set() {
        let mut reg = ModeRegistry::new(Mode::Posix);
        reg.set_strict(true);
        assert!(reg.set(Mode::Bash).is_err());
        assert!(reg.is(Mode::Posix));
    }

    #[test]
    fn shebang_detects_interpreter_with_env_wrapper() {
        assert_eq!(Mode::from_shebang("#!/usr/bin/env bash"), Some(Mode::Bash));
        assert_eq!(Mode::from_shebang("#!/bin/sh"), Some(Mode::Posix));
        assert_eq!(Mode::from_shebang("#!/usr/bin/zsh"), Some(Mode::Zsh));
        assert_eq!(
            Mode::from_shebang("#!/usr/bin/env lusush"),
            Some(Mode::Lusush)
        );
        assert_eq!(Mode::from_shebang("#!/usr/bin/env python3"), None);
    }
}
