// Pacing Gate - at most one dispatch permit per fixed interval

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Single shared gate that spaces dispatch attempts to the allowed rate
///
/// Tracks only the time of the last permit issuance. The delivery queue's
/// worker is sequential, so at most one `acquire` is outstanding at a time;
/// there is no waiter queue. Retries consume permits exactly like fresh
/// dispatches, so a storm of retries can never exceed the allowed rate.
pub struct PacingGate {
    interval: Duration,
    last_permit: Mutex<Option<Instant>>,
}

impl PacingGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_permit: Mutex::new(None),
        }
    }

    /// Suspend until at least one interval has elapsed since the previous
    /// successful acquire, then take the permit
    pub async fn acquire(&self) {
        let mut last = self.last_permit.lock().await;
        if let Some(previous) = *last {
            let due = previous + self.interval;
            trace!(due = ?due, "Pacing gate waiting");
            sleep_until(due).await;
        }
        *last = Some(Instant::now());
    }
}
