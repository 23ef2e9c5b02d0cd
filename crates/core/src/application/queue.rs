// Delivery Queue - sequential worker orchestrating admission, pacing,
// splitting, retry and quota commit
//
// A single worker task processes the pending list; no two dispatches are
// ever in flight concurrently. That deliberately trades throughput for
// trivially-satisfied pacing and ordering invariants; the remote rate limit
// is the true bottleneck anyway. Known limitation: a retrying entry keeps
// its place at the front of the list, so entries behind a retry storm can
// wait unboundedly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::pacing::PacingGate;
use crate::application::quota::QuotaTracker;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::application::shutdown::ShutdownToken;
use crate::application::splitter::{self, ChunkOutcome, SplitAggregate};
use crate::domain::{
    AdmissionReason, BatchingOptions, DeliveryError, DeliveryResponse, LogicalRequest,
};
use crate::port::transport::{TransportError, TransportExecutor, TransportReply};
use crate::port::TimeProvider;

/// Terminal result delivered to a caller
pub type DeliveryResult = Result<DeliveryResponse, DeliveryError>;

/// Where an entry's outcome goes when it resolves
enum Resolver {
    /// Plain entry: complete the caller's ticket directly
    Direct(oneshot::Sender<DeliveryResult>),
    /// Chunk of a split create: report into the shared aggregate
    Split {
        aggregate: Arc<Mutex<SplitAggregate>>,
        index: usize,
    },
}

/// One logical request awaiting or undergoing dispatch
///
/// Owned exclusively by the queue from enqueue to resolution; the caller
/// holds only the ticket.
struct QueuedEntry {
    seq: u64,
    request: LogicalRequest,
    resolver: Resolver,
    enqueued_at: i64,
    attempts: u32,
}

/// Caller's handle on a pending logical request
#[derive(Debug)]
pub struct DeliveryTicket {
    seq: u64,
    rx: oneshot::Receiver<DeliveryResult>,
}

impl DeliveryTicket {
    /// Sequence id assigned at enqueue (used for ordering and diagnostics)
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Suspend until the queue resolves this request
    ///
    /// May take seconds to minutes if many requests, splits, and retries
    /// are ahead of it.
    pub async fn wait(self) -> DeliveryResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::QueueClosed),
        }
    }
}

/// Diagnostics snapshot (observability, not correctness)
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub dispatching: bool,
    pub quota_used: u64,
    pub last_dispatch_at: Option<i64>,
}

/// The delivery queue orchestrator
pub struct DeliveryQueue {
    options: BatchingOptions,
    quota: Arc<QuotaTracker>,
    transport: Arc<dyn TransportExecutor>,
    time: Arc<dyn TimeProvider>,
    pacing: PacingGate,
    retry: RetryPolicy,
    pending: Mutex<VecDeque<QueuedEntry>>,
    wakeup: Notify,
    next_seq: AtomicU64,
    dispatching: AtomicBool,
    last_dispatch_ms: AtomicI64,
}

impl DeliveryQueue {
    pub fn new(
        options: BatchingOptions,
        quota: Arc<QuotaTracker>,
        transport: Arc<dyn TransportExecutor>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        let pacing = PacingGate::new(options.dispatch_interval());
        let retry = RetryPolicy::new(options.max_retries, options.base_backoff);
        Self {
            options,
            quota,
            transport,
            time,
            pacing,
            retry,
            pending: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
            next_seq: AtomicU64::new(1),
            dispatching: AtomicBool::new(false),
            last_dispatch_ms: AtomicI64::new(0),
        }
    }

    /// Admit a logical request into the queue
    ///
    /// Admission is synchronous and side-effect-free: a rejected request
    /// never joins the pending list and never perturbs quota, and the
    /// caller learns immediately instead of waiting behind the queue.
    pub fn enqueue(&self, request: LogicalRequest) -> Result<DeliveryTicket, DeliveryError> {
        self.check_admission(&request)
            .map_err(DeliveryError::AdmissionRejected)?;

        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = QueuedEntry {
            seq,
            request,
            resolver: Resolver::Direct(tx),
            enqueued_at: self.time.now_millis(),
            attempts: 0,
        };

        {
            let mut pending = self.pending.lock().unwrap();
            pending.push_back(entry);
            debug!(seq = seq, pending = pending.len(), "Entry enqueued");
        }
        self.wakeup.notify_one();

        Ok(DeliveryTicket { seq, rx })
    }

    fn check_admission(&self, request: &LogicalRequest) -> Result<(), AdmissionReason> {
        match request {
            LogicalRequest::CreateNodes { parent, nodes } => {
                self.quota.admit(nodes.len() as u64)?;

                // The byte limit applies per remote call, so an
                // oversized-by-count create is judged chunk by chunk. A
                // chunk that still exceeds the limit is unsplittable:
                // individual node specs cannot be subdivided.
                let chunks = splitter::split(
                    parent.clone(),
                    nodes.clone(),
                    self.options.nodes_per_request_limit(),
                );
                for chunk in &chunks {
                    let size = chunk.payload_bytes();
                    if size > self.options.max_payload_bytes {
                        return Err(AdmissionReason::PayloadTooLarge {
                            size,
                            limit: self.options.max_payload_bytes,
                        });
                    }
                }
                Ok(())
            }
            LogicalRequest::SetName { .. } => {
                let size = request.payload_bytes();
                if size > self.options.max_payload_bytes {
                    return Err(AdmissionReason::PayloadTooLarge {
                        size,
                        limit: self.options.max_payload_bytes,
                    });
                }
                Ok(())
            }
        }
    }

    /// Worker loop: pop entries in order until shut down
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!("Delivery queue worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            let entry = self.pending.lock().unwrap().pop_front();
            match entry {
                Some(entry) => self.process(entry).await,
                None => {
                    tokio::select! {
                        _ = self.wakeup.notified() => {}
                        _ = shutdown.wait() => {
                            info!("Worker interrupted while idle");
                            break;
                        }
                    }
                }
            }
        }
        info!("Delivery queue worker stopped");
    }

    async fn process(&self, mut entry: QueuedEntry) {
        // Oversized create: fan out into compliant chunks sharing the
        // caller's future, then continue the loop.
        if entry.request.node_count() > self.options.nodes_per_request_limit() {
            self.fan_out(entry);
            return;
        }

        // Quota may have moved while this entry waited behind earlier
        // commits; re-check before spending a dispatch on it.
        if let LogicalRequest::CreateNodes { nodes, .. } = &entry.request {
            if let Err(reason) = self.quota.admit(nodes.len() as u64) {
                warn!(seq = entry.seq, reason = %reason, "Entry no longer fits the quota ceiling");
                self.resolve(
                    entry.resolver,
                    Err(DeliveryError::AdmissionRejected(reason)),
                );
                return;
            }
        }

        self.dispatching.store(true, Ordering::SeqCst);
        self.pacing.acquire().await;

        debug!(seq = entry.seq, attempt = entry.attempts + 1, "Dispatching entry");
        let reply = self.transport.execute(&entry.request).await;
        self.last_dispatch_ms
            .store(self.time.now_millis(), Ordering::SeqCst);
        self.dispatching.store(false, Ordering::SeqCst);

        match reply {
            Ok(reply) => {
                let result = self.success_result(&entry.request, reply);
                self.resolve(entry.resolver, result);
            }
            Err(err) if !err.is_retryable() => {
                warn!(seq = entry.seq, error = %err, "Permanent delivery failure");
                self.resolve(entry.resolver, Err(DeliveryError::Permanent(err)));
            }
            Err(err) => {
                entry.attempts += 1;
                match self.retry.assess(entry.attempts) {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            seq = entry.seq,
                            attempt = entry.attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Transient delivery failure, retrying"
                        );
                        sleep(delay).await;
                        // Front of the list: older entries are unaffected
                        // (already ahead or resolved), and newer arrivals
                        // never overtake a retrying entry.
                        self.pending.lock().unwrap().push_front(entry);
                    }
                    RetryDecision::Exhausted => {
                        error!(
                            seq = entry.seq,
                            attempts = entry.attempts,
                            error = %err,
                            "Delivery failed after retries"
                        );
                        self.resolve(
                            entry.resolver,
                            Err(DeliveryError::RetriesExhausted {
                                attempts: entry.attempts,
                                last: err,
                            }),
                        );
                    }
                }
            }
        }
    }

    fn success_result(&self, request: &LogicalRequest, reply: TransportReply) -> DeliveryResult {
        match (request, reply) {
            (_, TransportReply::Created { nodes }) => {
                // Commit what the remote confirmed, not what was requested.
                self.quota.commit(nodes.len() as u64);
                Ok(DeliveryResponse::Created { nodes })
            }
            (LogicalRequest::SetName { node, name }, TransportReply::Renamed) => {
                Ok(DeliveryResponse::Renamed {
                    node: node.clone(),
                    name: name.clone(),
                })
            }
            (LogicalRequest::CreateNodes { .. }, TransportReply::Renamed) => {
                warn!("Transport reply did not match request kind");
                Err(DeliveryError::Permanent(TransportError::Rejected(
                    "transport reply did not match request kind".to_string(),
                )))
            }
        }
    }

    fn resolve(&self, resolver: Resolver, result: DeliveryResult) {
        match resolver {
            Resolver::Direct(tx) => {
                // Caller may have dropped the ticket; that only discards
                // the result.
                let _ = tx.send(result);
            }
            Resolver::Split { aggregate, index } => {
                let outcome = match result {
                    Ok(DeliveryResponse::Created { nodes }) => ChunkOutcome::Created(nodes),
                    Ok(DeliveryResponse::Renamed { .. }) => {
                        ChunkOutcome::Failed(DeliveryError::Permanent(TransportError::Rejected(
                            "transport reply did not match create chunk".to_string(),
                        )))
                    }
                    Err(err) => ChunkOutcome::Failed(err),
                };
                aggregate.lock().unwrap().record(index, outcome);
            }
        }
    }

    /// Split an oversized create into sub-entries sharing the caller's future
    ///
    /// Sub-entries go to the front of the list in order, so chunks of an
    /// older request are never interleaved with requests that arrived later.
    fn fan_out(&self, entry: QueuedEntry) {
        let QueuedEntry {
            seq,
            request,
            resolver,
            enqueued_at,
            ..
        } = entry;

        let LogicalRequest::CreateNodes { parent, nodes } = request else {
            // Renames carry zero node specs and can never be oversized.
            return;
        };
        let Resolver::Direct(tx) = resolver else {
            // Chunks are compliant by construction and are never re-split.
            return;
        };

        let chunks = splitter::split(parent, nodes, self.options.nodes_per_request_limit());
        let sizes: Vec<usize> = chunks.iter().map(LogicalRequest::node_count).collect();
        info!(seq = seq, chunks = chunks.len(), "Fanning out oversized create");

        let aggregate = Arc::new(Mutex::new(SplitAggregate::new(sizes, tx)));

        let mut pending = self.pending.lock().unwrap();
        for (index, chunk) in chunks.into_iter().enumerate().rev() {
            let sub_seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            pending.push_front(QueuedEntry {
                seq: sub_seq,
                request: chunk,
                resolver: Resolver::Split {
                    aggregate: Arc::clone(&aggregate),
                    index,
                },
                enqueued_at,
                attempts: 0,
            });
        }
    }

    /// Diagnostics snapshot
    pub fn status(&self) -> QueueStatus {
        let last = self.last_dispatch_ms.load(Ordering::SeqCst);
        QueueStatus {
            pending: self.pending.lock().unwrap().len(),
            dispatching: self.dispatching.load(Ordering::SeqCst),
            quota_used: self.quota.current(),
            last_dispatch_at: (last != 0).then_some(last),
        }
    }

    pub fn options(&self) -> &BatchingOptions {
        &self.options
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodeSpec;
    use crate::port::time_provider::SystemTimeProvider;
    use crate::port::transport::mocks::{MockBehavior, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    fn specs(count: usize) -> Vec<NodeSpec> {
        (0..count)
            .map(|i| NodeSpec::new(json!({ "name": format!("spec-{}", i) })))
            .collect()
    }

    fn create(count: usize) -> LogicalRequest {
        LogicalRequest::CreateNodes {
            parent: None,
            nodes: specs(count),
        }
    }

    fn queue_with(
        options: BatchingOptions,
        transport: Arc<MockTransport>,
    ) -> Arc<DeliveryQueue> {
        let quota = Arc::new(QuotaTracker::new(options.workspace_node_ceiling));
        Arc::new(DeliveryQueue::new(
            options,
            quota,
            transport,
            Arc::new(SystemTimeProvider),
        ))
    }

    fn spawn_worker(queue: &Arc<DeliveryQueue>) -> crate::application::shutdown::ShutdownSender {
        let (shutdown_tx, shutdown_rx) = crate::application::shutdown::shutdown_channel();
        let worker = Arc::clone(queue);
        tokio::spawn(async move { worker.run(shutdown_rx).await });
        shutdown_tx
    }

    #[tokio::test]
    async fn quota_rejection_is_synchronous_and_creates_no_entry() {
        let options = BatchingOptions {
            workspace_node_ceiling: 10,
            ..Default::default()
        };
        let queue = queue_with(options, Arc::new(MockTransport::new_success()));
        queue.quota().seed(8);

        let err = queue.enqueue(create(5)).unwrap_err();
        assert!(err.is_admission_rejection());
        assert_eq!(queue.quota().current(), 8);
        assert_eq!(queue.status().pending, 0);
    }

    #[tokio::test]
    async fn oversized_rename_payload_is_rejected() {
        let options = BatchingOptions {
            max_payload_bytes: 100,
            ..Default::default()
        };
        let queue = queue_with(options, Arc::new(MockTransport::new_success()));

        let err = queue
            .enqueue(LogicalRequest::SetName {
                node: "abc".to_string(),
                name: "x".repeat(200),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::AdmissionRejected(AdmissionReason::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn unsplittable_chunk_payload_is_rejected_at_admission() {
        // Two specs fit the count limit per chunk, but one spec alone blows
        // the byte limit; no amount of splitting can help.
        let options = BatchingOptions {
            max_nodes_per_request: 1,
            max_payload_bytes: 100,
            ..Default::default()
        };
        let queue = queue_with(options, Arc::new(MockTransport::new_success()));

        let request = LogicalRequest::CreateNodes {
            parent: None,
            nodes: vec![
                NodeSpec::new(json!({ "name": "small" })),
                NodeSpec::new(json!({ "name": "y".repeat(300) })),
            ],
        };
        let err = queue.enqueue(request).unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::AdmissionRejected(AdmissionReason::PayloadTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn sequence_ids_increase_monotonically() {
        let queue = queue_with(BatchingOptions::default(), Arc::new(MockTransport::new_success()));
        let a = queue.enqueue(create(1)).unwrap();
        let b = queue.enqueue(create(1)).unwrap();
        assert!(b.seq() > a.seq());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_create_resolves_and_commits_quota() {
        let transport = Arc::new(MockTransport::new_success());
        let queue = queue_with(BatchingOptions::default(), Arc::clone(&transport));
        let shutdown = spawn_worker(&queue);

        let ticket = queue.enqueue(create(3)).unwrap();
        let result = ticket.wait().await.unwrap();

        match result {
            DeliveryResponse::Created { nodes } => assert_eq!(nodes.len(), 3),
            other => panic!("expected create response, got {:?}", other),
        }
        assert_eq!(queue.quota().current(), 3);
        shutdown.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn rename_resolves_without_touching_quota() {
        let transport = Arc::new(MockTransport::new_success());
        let queue = queue_with(BatchingOptions::default(), Arc::clone(&transport));
        let shutdown = spawn_worker(&queue);

        let ticket = queue
            .enqueue(LogicalRequest::SetName {
                node: "abc".to_string(),
                name: "renamed".to_string(),
            })
            .unwrap();
        let result = ticket.wait().await.unwrap();

        assert!(matches!(result, DeliveryResponse::Renamed { .. }));
        assert_eq!(queue.quota().current(), 0);
        shutdown.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let transport = Arc::new(MockTransport::new(MockBehavior::FailPermanent(
            "malformed".to_string(),
        )));
        let queue = queue_with(BatchingOptions::default(), Arc::clone(&transport));
        let shutdown = spawn_worker(&queue);

        let ticket = queue.enqueue(create(1)).unwrap();
        let err = ticket.wait().await.unwrap_err();

        assert!(matches!(err, DeliveryError::Permanent(_)));
        assert_eq!(transport.call_count(), 1);
        assert_eq!(queue.quota().current(), 0);
        shutdown.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_entry_does_not_stall_later_entries() {
        let transport = Arc::new(
            MockTransport::new_success().with_script(vec![MockBehavior::FailPermanent(
                "malformed".to_string(),
            )]),
        );
        let queue = queue_with(
            BatchingOptions {
                base_backoff: Duration::from_millis(10),
                ..Default::default()
            },
            Arc::clone(&transport),
        );
        let shutdown = spawn_worker(&queue);

        let doomed = queue.enqueue(create(1)).unwrap();
        let healthy = queue.enqueue(create(2)).unwrap();

        assert!(doomed.wait().await.is_err());
        assert!(healthy.wait().await.is_ok());
        assert_eq!(queue.quota().current(), 2);
        shutdown.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_nodes_per_request_delivers_one_node_per_call() {
        let transport = Arc::new(MockTransport::new_success());
        let queue = queue_with(
            BatchingOptions {
                max_nodes_per_request: 0,
                ..Default::default()
            },
            Arc::clone(&transport),
        );
        let shutdown = spawn_worker(&queue);

        let result = queue.enqueue(create(3)).unwrap().wait().await.unwrap();

        match result {
            DeliveryResponse::Created { nodes } => assert_eq!(nodes.len(), 3),
            other => panic!("expected create response, got {:?}", other),
        }
        assert_eq!(transport.call_count(), 3);
        shutdown.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn status_reports_last_dispatch_from_injected_clock() {
        let transport = Arc::new(MockTransport::new_success());
        let time = Arc::new(crate::port::time_provider::mocks::FixedTimeProvider::new(
            1_700_000_000_000,
        ));
        let quota = Arc::new(QuotaTracker::new(1000));
        let queue = Arc::new(DeliveryQueue::new(
            BatchingOptions::default(),
            quota,
            transport,
            time,
        ));
        assert_eq!(queue.status().last_dispatch_at, None);

        let shutdown = spawn_worker(&queue);
        queue.enqueue(create(1)).unwrap().wait().await.unwrap();

        assert_eq!(queue.status().last_dispatch_at, Some(1_700_000_000_000));
        shutdown.shutdown();
    }

    #[tokio::test]
    async fn dropping_the_queue_resolves_tickets_as_closed() {
        let queue = queue_with(BatchingOptions::default(), Arc::new(MockTransport::new_success()));
        // No worker running; the entry sits in the pending list.
        let ticket = queue.enqueue(create(1)).unwrap();
        drop(queue);

        let err = ticket.wait().await.unwrap_err();
        assert!(matches!(err, DeliveryError::QueueClosed));
    }
}
