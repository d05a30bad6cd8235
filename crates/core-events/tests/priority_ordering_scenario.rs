use core_events::{Event, EventBus, EventDetail, EventKind, Priority};
use std::sync::{Arc, Mutex};

#[test]
fn publish_order_is_overridden_by_strict_priority_then_fifo() {
    let mut bus = EventBus::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = seen.clone();
    bus.subscribe(
        EventKind::Tick,
        1,
        Priority::Low,
        Box::new(move |e| {
            let label = match (e.priority, &e.detail) {
                (_, EventDetail::Text(label)) => label.clone(),
                _ => "?".to_string(),
            };
            seen_cb.lock().unwrap().push(label);
            Ok(())
        }),
    )
    .unwrap();

    bus.publish(Event::new(
        EventKind::Tick,
        EventDetail::Text("low-A".to_string()),
        Priority::Low,
    ))
    .unwrap();
    bus.publish(Event::new(
        EventKind::Tick,
        EventDetail::Text("critical-B".to_string()),
        Priority::Critical,
    ))
    .unwrap();
    bus.publish(Event::new(
        EventKind::Tick,
        EventDetail::Text("normal-C".to_string()),
        Priority::Normal,
    ))
    .unwrap();
    bus.publish(Event::new(
        EventKind::Tick,
        EventDetail::Text("critical-D".to_string()),
        Priority::Critical,
    ))
    .unwrap();

    let processed = bus.process_pending(4, 1000);
    assert_eq!(processed, 4);
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["critical-B", "critical-D", "normal-C", "low-A"]
    );
}
