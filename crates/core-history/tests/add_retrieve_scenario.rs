use core_history::{HistoryConfig, HistoryCore};

#[test]
fn space_prefixed_command_is_silently_ignored_with_ignore_space_prefix() {
    let history = HistoryCore::new(HistoryConfig {
        ignore_space_prefix: true,
        ..HistoryConfig::default()
    });

    assert_eq!(history.add(" secret", 0).unwrap(), None);
    assert_eq!(history.count(), 0);

    assert_eq!(history.add("echo hi", 0).unwrap(), Some(1));
    assert_eq!(history.add("ls", 0).unwrap(), Some(2));

    assert_eq!(history.get_by_id(2).unwrap().command, "ls");
    assert_eq!(history.count(), 2);
}
