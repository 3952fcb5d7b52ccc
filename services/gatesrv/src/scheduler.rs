//! Recurring poll scheduler.
//!
//! Each registered task owns a timer loop on a fixed period. A firing
//! submits the task's one-shot read with a freshly minted transaction
//! id and publishes the outcome to every subscriber. Disabling a task
//! silences it without stopping its timer, so the phase is preserved
//! across disable/enable. In-flight firings run detached from the
//! timer loop and complete even if the task is deleted underneath
//! them.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info, warn};

use mbgate_wire::upstream::{OnceReadReq, OnceReadRes, PollData, PollTaskSpec};
use mbgate_wire::STATUS_OK;

use crate::error::{GateSrvError, Result};
use crate::translator::FunctionCode;

/// One-shot read submission, as the scheduler sees it.
#[async_trait]
pub trait ReadSubmitter: Send + Sync {
    async fn submit_read(&self, req: OnceReadReq) -> Result<OnceReadRes>;
}

struct PollEntry {
    spec: PollTaskSpec,
    enabled: Arc<AtomicBool>,
    timer: JoinHandle<()>,
}

impl Drop for PollEntry {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Registry of recurring poll tasks, keyed by unique task name.
pub struct PollRegistry {
    tasks: DashMap<String, PollEntry>,
    results: broadcast::Sender<PollData>,
    submitter: Arc<dyn ReadSubmitter>,
    tid_counter: AtomicI64,
}

impl PollRegistry {
    pub fn new(submitter: Arc<dyn ReadSubmitter>, result_capacity: usize) -> Arc<Self> {
        let (results, _) = broadcast::channel(result_capacity);
        Arc::new(Self {
            tasks: DashMap::new(),
            results,
            submitter,
            // seeded from the clock so scheduler tids never collide
            // with client-chosen ones across restarts
            tid_counter: AtomicI64::new(Utc::now().timestamp_micros()),
        })
    }

    /// Subscribe to the poll result stream.
    pub fn subscribe(&self) -> broadcast::Receiver<PollData> {
        self.results.subscribe()
    }

    fn next_tid(&self) -> i64 {
        self.tid_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a task and start its timer loop.
    pub fn create(self: &Arc<Self>, spec: PollTaskSpec) -> Result<()> {
        if spec.interval == 0 {
            return Err(GateSrvError::ConfigError(
                "poll interval must be positive".to_string(),
            ));
        }
        let fc = FunctionCode::from_wire(spec.fc)?;
        if !fc.is_read() {
            return Err(GateSrvError::InvalidFunctionCode(spec.fc));
        }
        if !fc.is_bit() {
            mbgate_wire::codec::validate_pair(spec.value_type, spec.order)?;
            if let Some(range) = &spec.range {
                range.validate()?;
            }
        }

        match self.tasks.entry(spec.name.clone()) {
            Entry::Occupied(_) => Err(GateSrvError::DuplicatePollName(spec.name)),
            Entry::Vacant(entry) => {
                let enabled = Arc::new(AtomicBool::new(spec.enabled));
                let timer = self.spawn_timer(spec.clone(), enabled.clone());
                info!(name = %spec.name, interval_ms = spec.interval, "poll task registered");
                entry.insert(PollEntry {
                    spec,
                    enabled,
                    timer,
                });
                Ok(())
            }
        }
    }

    fn spawn_timer(
        self: &Arc<Self>,
        spec: PollTaskSpec,
        enabled: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        // the timer holds only a weak handle; a registry whose owners
        // are gone must not be kept alive by its own timers
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            let period = Duration::from_millis(spec.interval);
            // first firing one full period after registration; the
            // timer keeps ticking while disabled so re-enabling never
            // shifts the phase
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if !enabled.load(Ordering::Relaxed) {
                    continue;
                }
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let spec = spec.clone();
                tokio::spawn(async move {
                    registry.fire(&spec).await;
                });
            }
        })
    }

    async fn fire(&self, spec: &PollTaskSpec) {
        let req = spec.to_read_request(self.next_tid());
        let data = match self.submitter.submit_read(req).await {
            Ok(res) => PollData {
                timestamp: Utc::now().timestamp_millis(),
                name: spec.name.clone(),
                status: STATUS_OK.to_string(),
                data: res.data,
            },
            Err(err) => {
                warn!(name = %spec.name, error = %err, "poll firing failed");
                PollData {
                    timestamp: Utc::now().timestamp_millis(),
                    name: spec.name.clone(),
                    status: err.to_string(),
                    data: None,
                }
            }
        };
        // no subscribers is not an error
        if self.results.send(data).is_err() {
            debug!(name = %spec.name, "poll result dropped, no subscribers");
        }
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .tasks
            .get(name)
            .ok_or_else(|| GateSrvError::PollNotFound(name.to_string()))?;
        entry.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Resume firing. Idempotent.
    pub fn enable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    /// Silence the task without stopping its timer. Idempotent.
    pub fn disable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    /// Remove a task and stop its timer. In-flight firings complete.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.tasks
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| GateSrvError::PollNotFound(name.to_string()))
    }

    /// Snapshot of every registered task with its current enabled
    /// state.
    pub fn list(&self) -> Vec<PollTaskSpec> {
        let mut specs: Vec<PollTaskSpec> = self
            .tasks
            .iter()
            .map(|entry| {
                let mut spec = entry.spec.clone();
                spec.enabled = entry.enabled.load(Ordering::Relaxed);
                spec
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
