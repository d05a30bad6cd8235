//! Typed, priority-ordered event bus driving the single-threaded,
//! cooperative input -> buffer -> render -> terminal path.
//!
//! `publish` enqueues into one of four priority queues (or dispatches
//! immediately when `no_queue` is set); `process_pending` drains them in
//! strict priority order, FIFO within a priority, bounded by an event count
//! and a wall-clock deadline so no single turn can stall the main loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

pub const DEFAULT_MAX_QUEUE_PER_PRIORITY: usize = 4096;
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 256;

pub static EVENTS_PUBLISHED: AtomicU64 = AtomicU64::new(0);
pub static EVENTS_DROPPED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("priority queue is full")]
    QueueFull,
    #[error("subscriber registry is at capacity")]
    MaxSubscribers,
    #[error("no matching subscriber")]
    SubscriberNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

/// Coarse event category used for subscription filtering. Specific payload
/// data travels in `EventDetail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BufferChanged,
    HistoryUpdated,
    ModeChanged,
    Resize,
    RenderRequested,
    ContinuationInvalidated,
    Tick,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum EventDetail {
    None,
    Resize { cols: u16, rows: u16 },
    Text(String),
    Error(String),
}

/// `target_layer == BROADCAST` delivers to every subscriber of the matching
/// kind; any other value restricts delivery to the subscriber whose id
/// matches.
pub type LayerId = u32;
pub const BROADCAST: LayerId = 0;

#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub detail: EventDetail,
    pub priority: Priority,
    pub target_layer: LayerId,
    /// If true, `publish` dispatches synchronously instead of queuing.
    pub no_queue: bool,
    pub seq: u64,
    pub timestamp: Instant,
}

impl Event {
    pub fn new(kind: EventKind, detail: EventDetail, priority: Priority) -> Self {
        Self {
            kind,
            detail,
            priority,
            target_layer: BROADCAST,
            no_queue: false,
            seq: 0,
            timestamp: Instant::now(),
        }
    }

    pub fn targeted(mut self, layer: LayerId) -> Self {
        self.target_layer = layer;
        self
    }

    pub fn no_queue(mut self) -> Self {
        self.no_queue = true;
        self
    }
}

type Callback = Box<dyn FnMut(&Event) -> Result<(), EventBusError> + Send>;

struct Subscription {
    subscriber_id: LayerId,
    kind: EventKind,
    min_priority: Priority,
    active: bool,
    callback: Callback,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventBusStats {
    pub published: u64,
    pub processed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub max_queue_seen: usize,
    pub total_processing_time: Duration,
}

/// Four strict-priority `VecDeque` queues plus a subscriber registry. Driven
/// from the main loop via `process_pending`; never spawns its own thread.
pub struct EventBus {
    queues: [VecDeque<Event>; 4],
    subscribers: Vec<Subscription>,
    max_queue_per_priority: usize,
    max_subscribers: usize,
    seq_counter: u64,
    stats: EventBusStats,
    last_error: Option<EventBusError>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_PER_PRIORITY, DEFAULT_MAX_SUBSCRIBERS)
    }
}

impl EventBus {
    pub fn new(max_queue_per_priority: usize, max_subscribers: usize) -> Self {
        Self {
            queues: [
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
                VecDeque::new(),
            ],
            subscribers: Vec::new(),
            max_queue_per_priority,
            max_subscribers,
            seq_counter: 0,
            stats: EventBusStats::default(),
            last_error: None,
        }
    }

    fn queue_index(priority: Priority) -> usize {
        priority as usize
    }

    /// Timestamp, sequence-stamp, and enqueue (or immediately dispatch when
    /// `no_queue`) the event.
    pub fn publish(&mut self, mut event: Event) -> Result<(), EventBusError> {
        event.seq = self.seq_counter;
        self.seq_counter += 1;
        event.timestamp = Instant::now();
        self.stats.published += 1;
        EVENTS_PUBLISHED.fetch_add(1, Ordering::Relaxed);

        if event.no_queue {
            self.dispatch(&event);
            return Ok(());
        }

        let idx = Self::queue_index(event.priority);
        if self.queues[idx].len() >= self.max_queue_per_priority {
            self.stats.dropped += 1;
            EVENTS_DROPPED.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(target: "lle.events", kind = ?event.kind, "priority queue full, dropping event");
            return Err(EventBusError::QueueFull);
        }
        self.queues[idx].push_back(event);
        let qlen = self.queues[idx].len();
        self.stats.max_queue_seen = self.stats.max_queue_seen.max(qlen);
        Ok(())
    }

    /// Drain queues in strict priority order (critical first), FIFO within a
    /// priority. Stops when no events remain, `max_events` is processed, or
    /// wall time exceeds `timeout_ms`. Returns the number of events
    /// processed.
    pub fn process_pending(&mut self, max_events: usize, timeout_ms: u64) -> usize {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut processed = 0usize;
        'outer: loop {
            if processed >= max_events || Instant::now() >= deadline {
                break;
            }
            let mut found = None;
            for idx in (0..4).rev() {
                if let Some(event) = self.queues[idx].pop_front() {
                    found = Some(event);
                    break;
                }
            }
            let Some(event) = found else {
                break 'outer;
            };
            let start = Instant::now();
            self.dispatch(&event);
            self.stats.total_processing_time += start.elapsed();
            self.stats.processed += 1;
            processed += 1;
        }
        processed
    }

    fn dispatch(&mut self, event: &Event) {
        for sub in &mut self.subscribers {
            if !sub.active || sub.kind != event.kind {
                continue;
            }
            if event.priority < sub.min_priority {
                continue;
            }
            if event.target_layer != BROADCAST && event.target_layer != sub.subscriber_id {
                continue;
            }
            if let Err(err) = (sub.callback)(event) {
                self.stats.failed += 1;
                tracing::warn!(target: "lle.events", %err, subscriber = sub.subscriber_id, "subscriber callback failed");
                self.last_error = Some(err);
            }
        }
    }

    /// Register a subscription. Duplicate `(subscriber_id, kind)` pairs are
    /// deduplicated (replace the existing registration).
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        subscriber_id: LayerId,
        min_priority: Priority,
        callback: Callback,
    ) -> Result<(), EventBusError> {
        if let Some(existing) = self
            .subscribers
            .iter_mut()
            .find(|s| s.subscriber_id == subscriber_id && s.kind == kind)
        {
            existing.min_priority = min_priority;
            existing.callback = callback;
            existing.active = true;
            return Ok(());
        }
        if self.subscribers.len() >= self.max_subscribers {
            return Err(EventBusError::MaxSubscribers);
        }
        self.subscribers.push(Subscription {
            subscriber_id,
            kind,
            min_priority,
            active: true,
            callback,
        });
        Ok(())
    }

    pub fn unsubscribe(&mut self, subscriber_id: LayerId, kind: EventKind) -> Result<(), EventBusError> {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|s| !(s.subscriber_id == subscriber_id && s.kind == kind));
        if self.subscribers.len() == before {
            return Err(EventBusError::SubscriberNotFound);
        }
        Ok(())
    }

    pub fn unsubscribe_all(&mut self, subscriber_id: LayerId) {
        self.subscribers.retain(|s| s.subscriber_id != subscriber_id);
    }

    pub fn stats(&self) -> EventBusStats {
        self.stats
    }

    pub fn last_error(&self) -> Option<&EventBusError> {
        self.last_error.as_ref()
    }

    pub fn pending_count(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn priority_order_strict() {
        let mut bus = EventBus::default();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let order_cb = order.clone();
        bus.subscribe(
            EventKind::Tick,
            1,
            Priority::Low,
            Box::new(move |e| {
                order_cb.lock().unwrap().push(e.priority);
                Ok(())
            }),
        )
        .unwrap();

        bus.publish(Event::new(EventKind::Tick, EventDetail::None, Priority::Low))
            .unwrap();
        bus.publish(Event::new(
            EventKind::Tick,
            EventDetail::None,
            Priority::Critical,
        ))
        .unwrap();
        bus.publish(Event::new(
            EventKind::Tick,
            EventDetail::None,
            Priority::Normal,
        ))
        .unwrap();

        let processed = bus.process_pending(10, 1000);
        assert_eq!(processed, 3);
        let seen = order.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![Priority::Critical, Priority::Normal, Priority::Low]
        );
    }

    #[test]
    fn max_events_budget_respected() {
        let mut bus = EventBus::default();
        bus.subscribe(EventKind::Tick, 1, Priority::Low, Box::new(|_| Ok(())))
            .unwrap();
        for _ in 0..5 {
            bus.publish(Event::new(EventKind::Tick, EventDetail::None, Priority::Normal))
                .unwrap();
        }
        let processed = bus.process_pending(2, 1000);
        assert_eq!(processed, 2);
        assert_eq!(bus.pending_count(), 3);
    }

    #[test]
    fn target_layer_filters_delivery() {
        let mut bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = count.clone();
        bus.subscribe(
            EventKind::Resize,
            42,
            Priority::Low,
            Box::new(move |_| {
                count_cb.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
        )
        .unwrap();

        bus.publish(
            Event::new(EventKind::Resize, EventDetail::None, Priority::Normal).targeted(7),
        )
        .unwrap();
        bus.process_pending(10, 1000);
        assert_eq!(count.load(Ordering::Relaxed), 0);

        bus.publish(
            Event::new(EventKind::Resize, EventDetail::None, Priority::Normal).targeted(42),
        )
        .unwrap();
        bus.process_pending(10, 1000);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn queue_full_drops_and_counts() {
        let mut bus = EventBus::new(1, 8);
        bus.publish(Event::new(EventKind::Tick, EventDetail::None, Priority::Low))
            .unwrap();
        let err = bus
            .publish(Event::new(EventKind::Tick, EventDetail::None, Priority::Low))
            .unwrap_err();
        assert!(matches!(err, EventBusError::QueueFull));
        assert_eq!(bus.stats().dropped, 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = count.clone();
        bus.subscribe(
            EventKind::Tick,
            1,
            Priority::Low,
            Box::new(move |_| {
                count_cb.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
        )
        .unwrap();
        bus.unsubscribe(1, EventKind::Tick).unwrap();
        bus.publish(Event::new(EventKind::Tick, EventDetail::None, Priority::Low))
            .unwrap();
        bus.process_pending(10, 1000);
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn no_queue_dispatches_immediately() {
        let mut bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count_cb = count.clone();
        bus.subscribe(
            EventKind::Shutdown,
            1,
            Priority::Low,
            Box::new(move |_| {
                count_cb.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }),
        )
        .unwrap();
        bus.publish(
            Event::new(EventKind::Shutdown, EventDetail::None, Priority::Critical).no_queue(),
        )
        .unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert_eq!(bus.pending_count(), 0);
    }
}
