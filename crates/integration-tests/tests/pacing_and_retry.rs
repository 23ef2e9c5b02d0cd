//! Pacing and retry scenarios under paused tokio time

use std::sync::Arc;
use std::time::Duration;

use canopy_core::application::{shutdown_channel, DeliveryQueue, QuotaTracker, ShutdownSender};
use canopy_core::domain::{BatchingOptions, DeliveryError, LogicalRequest, NodeSpec};
use canopy_core::port::time_provider::SystemTimeProvider;
use canopy_core::port::transport::mocks::{MockBehavior, MockTransport};
use serde_json::json;

fn create(count: usize) -> LogicalRequest {
    LogicalRequest::CreateNodes {
        parent: None,
        nodes: (0..count)
            .map(|i| NodeSpec::new(json!({ "name": format!("spec-{}", i) })))
            .collect(),
    }
}

fn start_queue(
    options: BatchingOptions,
    transport: Arc<MockTransport>,
) -> (Arc<DeliveryQueue>, ShutdownSender) {
    let quota = Arc::new(QuotaTracker::new(options.workspace_node_ceiling));
    let queue = Arc::new(DeliveryQueue::new(
        options,
        quota,
        transport,
        Arc::new(SystemTimeProvider),
    ));
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker = Arc::clone(&queue);
    tokio::spawn(async move { worker.run(shutdown_rx).await });
    (queue, shutdown_tx)
}

/// Two creates enqueued back-to-back at 1 req/sec: the second dispatch
/// happens no sooner than one second after the first.
#[tokio::test(start_paused = true)]
async fn dispatches_are_spaced_to_the_allowed_rate() {
    let transport = Arc::new(MockTransport::new_success());
    let options = BatchingOptions {
        requests_per_second: 1,
        ..Default::default()
    };
    let (queue, shutdown) = start_queue(options, Arc::clone(&transport));

    let first = queue.enqueue(create(1)).unwrap();
    let second = queue.enqueue(create(1)).unwrap();
    assert!(first.wait().await.is_ok());
    assert!(second.wait().await.is_ok());

    let records = transport.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].at - records[0].at >= Duration::from_secs(1));
    shutdown.shutdown();
}

/// Every consecutive pair of dispatch attempts respects the interval,
/// retries included.
#[tokio::test(start_paused = true)]
async fn rate_ceiling_holds_across_retries() {
    let transport = Arc::new(MockTransport::new_success().with_script(vec![
        MockBehavior::FailTransient("connection reset".to_string()),
        MockBehavior::Succeed,
        MockBehavior::FailTransient("connection reset".to_string()),
        MockBehavior::Succeed,
    ]));
    let options = BatchingOptions {
        requests_per_second: 1,
        base_backoff: Duration::from_millis(100),
        ..Default::default()
    };
    let (queue, shutdown) = start_queue(options, Arc::clone(&transport));

    let first = queue.enqueue(create(1)).unwrap();
    let second = queue.enqueue(create(1)).unwrap();
    assert!(first.wait().await.is_ok());
    assert!(second.wait().await.is_ok());

    let records = transport.records();
    assert_eq!(records.len(), 4);
    for pair in records.windows(2) {
        assert!(
            pair[1].at - pair[0].at >= Duration::from_secs(1),
            "dispatch attempts closer than the allowed interval"
        );
    }
    shutdown.shutdown();
}

/// Transport fails twice then succeeds: the entry resolves successfully on
/// the third attempt, with backoff delays of ~1s then ~2s.
#[tokio::test(start_paused = true)]
async fn transient_failures_recover_with_exponential_backoff() {
    let transport = Arc::new(MockTransport::new_success().with_script(vec![
        MockBehavior::FailTransient("connection reset".to_string()),
        MockBehavior::FailTransient("connection reset".to_string()),
        MockBehavior::Succeed,
    ]));
    let options = BatchingOptions {
        max_retries: 2,
        base_backoff: Duration::from_secs(1),
        requests_per_second: 1,
        ..Default::default()
    };
    let (queue, shutdown) = start_queue(options, Arc::clone(&transport));

    let ticket = queue.enqueue(create(1)).unwrap();
    assert!(ticket.wait().await.is_ok());

    let records = transport.records();
    assert_eq!(records.len(), 3, "original attempt plus two retries");
    // First retry after ~1s of backoff, second after ~2s
    assert!(records[1].at - records[0].at >= Duration::from_secs(1));
    assert!(records[2].at - records[1].at >= Duration::from_secs(2));
    shutdown.shutdown();
}

/// Transport always fails transiently with a budget of one retry: the entry
/// resolves as exhausted after exactly two attempts.
#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_total_attempts() {
    let transport = Arc::new(MockTransport::new_transient_failure("connection reset"));
    let options = BatchingOptions {
        max_retries: 1,
        base_backoff: Duration::from_millis(100),
        ..Default::default()
    };
    let (queue, shutdown) = start_queue(options, Arc::clone(&transport));

    let ticket = queue.enqueue(create(1)).unwrap();
    let err = ticket.wait().await.unwrap_err();

    match err {
        DeliveryError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("expected retries exhausted, got {}", other),
    }
    assert_eq!(transport.call_count(), 2);
    assert_eq!(queue.quota().current(), 0);
    shutdown.shutdown();
}

/// A retrying entry keeps its place: a request that arrived later is not
/// dispatched until the older entry's retry resolves.
#[tokio::test(start_paused = true)]
async fn newer_arrivals_never_overtake_a_retrying_entry() {
    let transport = Arc::new(MockTransport::new_success().with_script(vec![
        MockBehavior::FailTransient("connection reset".to_string()),
        MockBehavior::Succeed,
        MockBehavior::Succeed,
    ]));
    let options = BatchingOptions {
        base_backoff: Duration::from_millis(100),
        ..Default::default()
    };
    let (queue, shutdown) = start_queue(options, Arc::clone(&transport));

    let older = queue.enqueue(create(2)).unwrap();
    let newer = queue.enqueue(create(1)).unwrap();

    assert!(older.wait().await.is_ok());
    assert!(newer.wait().await.is_ok());

    let sizes: Vec<usize> = transport.records().iter().map(|r| r.node_count).collect();
    // Older entry's failed attempt, its retry, then the newer arrival
    assert_eq!(sizes, vec![2, 2, 1]);
    shutdown.shutdown();
}
