use monitor_core::model::{BehaviorData, BehaviorType, EventEnvelope, MonitorData, Platform};
use monitor_sdk::queue::{EventQueue, QueueSignal};

fn ev(id: &str) -> MonitorData {
    MonitorData::Behavior(BehaviorData {
        envelope: EventEnvelope {
            id: id.to_string(),
            timestamp: 0,
            project_id: "p".to_string(),
            project_version: None,
            session_id: "s".to_string(),
            user_id: None,
            page_url: "/".to_string(),
            user_agent: "ua".to_string(),
            platform: Platform::Web,
            tags: None,
        },
        behavior_type: BehaviorType::Custom,
        event: "x".to_string(),
        target: None,
        xpath: None,
        data: None,
    })
}

fn ids(batch: &[MonitorData]) -> Vec<&str> {
    batch.iter().map(|m| m.id()).collect()
}

// S3 — Queue overflow (spec.md §8).
#[test]
fn s3_queue_overflow_evicts_oldest_and_signals_once() {
    let mut q = EventQueue::new(3);
    assert!(q.add(ev("e1")).is_none());
    assert!(q.add(ev("e2")).is_none());
    assert!(q.add(ev("e3")).is_none());
    let signal = q.add(ev("e4"));
    assert_eq!(signal, Some(QueueSignal::QueueFull));
    let remaining: Vec<&str> = q.iter().map(|m| m.id()).collect();
    assert_eq!(remaining, vec!["e2", "e3", "e4"]);
}

// property 3 — queue bound holds for every sequence of adds.
#[test]
fn prop_queue_never_exceeds_max_size() {
    let mut q = EventQueue::new(5);
    for i in 0..100 {
        q.add(ev(&format!("e{i}")));
        assert!(q.len() <= 5);
    }
}

// property 4 — batch FIFO.
#[test]
fn prop_batch_is_fifo() {
    let mut q = EventQueue::new(10);
    q.add(ev("a"));
    q.add(ev("b"));
    let batch = q.get_batch(2);
    assert_eq!(ids(&batch), vec!["a", "b"]);
}

// S4 / property 5 — retry preserves order.
#[test]
fn s4_retry_preserves_order() {
    let mut q = EventQueue::new(10);
    q.add(ev("a"));
    q.add(ev("b"));
    q.add(ev("c"));
    let batch = q.get_batch(3);
    assert_eq!(ids(&batch), vec!["a", "b", "c"]);

    q.on_send_error(batch);

    let retried = q.get_batch(3);
    assert_eq!(ids(&retried), vec!["a", "b", "c"]);
}

#[test]
fn on_send_error_truncates_newest_wins_on_overflow() {
    let mut q = EventQueue::new(2);
    q.add(ev("new1"));
    q.add(ev("new2"));
    // A failed batch of 3 older items gets unshifted back; the queue
    // must still respect max_size, keeping the newest-appended entries.
    q.on_send_error(vec![ev("old1"), ev("old2"), ev("old3")]);
    assert_eq!(q.len(), 2);
}

#[test]
fn flush_returns_and_clears_everything() {
    let mut q = EventQueue::new(5);
    q.add(ev("a"));
    q.add(ev("b"));
    let flushed = q.flush();
    assert_eq!(ids(&flushed), vec!["a", "b"]);
    assert!(q.is_empty());
}
