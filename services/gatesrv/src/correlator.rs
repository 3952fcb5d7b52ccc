//! Transaction correlation.
//!
//! Every in-flight driver command owns a slot in the pending table,
//! keyed by its wire transaction id. The driver response loop resolves
//! slots as replies arrive; a background sweeper fails slots whose
//! deadline has passed. A slot is consumed exactly once: whichever of
//! the two removes it first delivers the outcome, the loser finds the
//! table empty and walks away.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, warn};

use mbgate_wire::downstream::DriverRes;

use crate::error::{GateSrvError, Result};

struct PendingSlot {
    reply: oneshot::Sender<Result<DriverRes>>,
    deadline: Instant,
}

/// Table of in-flight driver commands awaiting their responses.
#[derive(Default)]
pub struct PendingTable {
    slots: DashMap<String, PendingSlot>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot for `tid` and hand back the receiver its outcome
    /// will arrive on.
    pub fn register(
        &self,
        tid: &str,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<Result<DriverRes>>> {
        match self.slots.entry(tid.to_string()) {
            Entry::Occupied(_) => Err(GateSrvError::DuplicateTransaction(tid.to_string())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(PendingSlot {
                    reply: tx,
                    deadline,
                });
                Ok(rx)
            }
        }
    }

    /// Deliver a driver response to its waiting slot. Responses with no
    /// matching slot (already timed out, or never issued) are logged
    /// and dropped.
    pub fn resolve(&self, res: DriverRes) {
        match self.slots.remove(&res.tid) {
            Some((tid, slot)) => {
                if slot.reply.send(Ok(res)).is_err() {
                    // waiter gave up; nothing left to notify
                    debug!(tid = %tid, "response arrived after waiter dropped");
                }
            }
            None => {
                warn!(tid = %res.tid, status = %res.status, "discarding response with no pending slot");
            }
        }
    }

    /// Drop a slot without delivering anything, releasing a claim whose
    /// command never made it onto the wire.
    pub fn discard(&self, tid: &str) {
        self.slots.remove(tid);
    }

    /// Fail every slot whose deadline is at or before `now`.
    ///
    /// The deadline is re-checked under the entry lock so a response
    /// racing in between snapshot and removal wins the slot.
    pub fn sweep(&self, now: Instant) {
        let expired: Vec<String> = self
            .slots
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for tid in expired {
            if let Some((tid, slot)) = self.slots.remove_if(&tid, |_, slot| slot.deadline <= now) {
                warn!(tid = %tid, "request timed out");
                let _ = slot.reply.send(Err(GateSrvError::Timeout(tid.clone())));
            }
        }
    }

    /// Number of in-flight slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Run the timeout sweep on a fixed tick until the handle is aborted.
pub fn spawn_sweeper(table: Arc<PendingTable>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        loop {
            ticker.tick().await;
            table.sweep(Instant::now());
        }
    })
}
