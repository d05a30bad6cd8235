use core_mode::{Feature, Mode, ModeRegistry};

#[test]
fn globstar_tracks_mode_switch_then_override_then_reset() {
    let mut reg = ModeRegistry::new(Mode::Lusush);
    assert!(reg.allows(Feature::Globstar));

    reg.set(Mode::Posix).unwrap();
    assert!(!reg.allows(Feature::Globstar));

    reg.enable(Feature::Globstar);
    assert!(reg.allows(Feature::Globstar));
    assert!(reg.is_overridden(Feature::Globstar));

    reg.reset(Feature::Globstar);
    assert!(!reg.allows(Feature::Globstar));
    assert!(!reg.is_overridden(Feature::Globstar));
}
