//! Background polling until a model finishes loading.
//!
//! A [`LoadingMonitor`] spawns one task per `(server, model)` pair that
//! re-reads the server's model list on a fixed interval until the model
//! appears, a timeout passes, or the caller stops it. Each poll refreshes
//! the shared cache, so validations issued meanwhile see the newest list.
//!
//! Starting a monitor for a pair that is already being watched is a no-op.
//! Finished states stay visible through [`LoadingMonitor::status()`] for ten
//! minutes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::Result;
use crate::cache::ModelStatusCache;
use crate::notify::{Notifier, TracingNotifier, deliver};
use crate::source::{ModelSource, normalize_base_url};
use crate::types::{LoadingState, ValidationEvent};

/// Polling cadence and give-up time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between polls. Default: 2s.
    #[serde(rename = "interval_ms", with = "crate::types::duration_ms")]
    pub interval: Duration,
    /// Give up after this long. Default: 120s.
    #[serde(rename = "timeout_ms", with = "crate::types::duration_ms")]
    pub timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How long a finished monitor's state is retained.
const FINISHED_RETENTION: Duration = Duration::from_secs(600);

type MonitorKey = (String, String);
type States = Arc<Mutex<HashMap<MonitorKey, Tracked>>>;

#[derive(Debug, Clone, Copy)]
struct Tracked {
    state: LoadingState,
    since: Instant,
}

impl Tracked {
    fn now(state: LoadingState) -> Self {
        Self {
            state,
            since: Instant::now(),
        }
    }
}

/// Spawns and tracks loading monitors.
pub struct LoadingMonitor {
    cache: Arc<ModelStatusCache>,
    source: Arc<dyn ModelSource>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    states: States,
}

/// Handle to a running monitor.
///
/// Dropping the handle stops the monitor at its next poll boundary.
pub struct MonitorHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<LoadingState>,
}

impl MonitorHandle {
    /// Ask the monitor to stop. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }

    /// Wait for the monitor to reach a terminal state.
    ///
    /// Keeps the monitor running until then.
    pub async fn wait(mut self) -> LoadingState {
        let _keep_alive = self.stop.take();
        (&mut self.task).await.unwrap_or(LoadingState::Cancelled)
    }

    /// Stop the monitor and wait for it to wind down.
    pub async fn cancel(mut self) -> LoadingState {
        self.stop();
        (&mut self.task).await.unwrap_or(LoadingState::Cancelled)
    }
}

impl LoadingMonitor {
    pub fn new(cache: Arc<ModelStatusCache>, source: Arc<dyn ModelSource>) -> Self {
        Self {
            cache,
            source,
            notifier: Arc::new(TracingNotifier),
            config: MonitorConfig::default(),
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Latest state recorded for a pair, if it was ever monitored.
    pub fn status(&self, model_id: &str, base_url: &str) -> Option<LoadingState> {
        let base = normalize_base_url(base_url).ok()?;
        let mut states = lock(&self.states);
        prune(&mut states);
        states
            .get(&(base, model_id.to_string()))
            .map(|tracked| tracked.state)
    }

    /// Start watching for `model_id` to appear on `base_url`.
    ///
    /// Returns `Ok(None)` without spawning if the pair is already loading.
    pub async fn start(&self, model_id: &str, base_url: &str) -> Result<Option<MonitorHandle>> {
        let base = normalize_base_url(base_url)?;
        let key = (base.clone(), model_id.to_string());
        {
            let mut states = lock(&self.states);
            prune(&mut states);
            if states
                .get(&key)
                .is_some_and(|tracked| tracked.state == LoadingState::Loading)
            {
                debug!(model_id, base_url = %base, "monitor already running");
                return Ok(None);
            }
            states.insert(key.clone(), Tracked::now(LoadingState::Loading));
        }

        deliver(
            self.notifier.as_ref(),
            loading_event(&key, LoadingState::Loading, Duration::ZERO),
        )
        .await;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(poll_until_loaded(
            key,
            Arc::clone(&self.cache),
            Arc::clone(&self.source),
            Arc::clone(&self.notifier),
            self.config.clone(),
            Arc::clone(&self.states),
            stop_rx,
        ));

        Ok(Some(MonitorHandle {
            stop: Some(stop_tx),
            task,
        }))
    }
}

async fn poll_until_loaded(
    key: MonitorKey,
    cache: Arc<ModelStatusCache>,
    source: Arc<dyn ModelSource>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    states: States,
    mut stop: oneshot::Receiver<()>,
) -> LoadingState {
    let mut record = FinalState {
        states,
        key: key.clone(),
        state: LoadingState::Cancelled,
    };
    let (base, model_id) = (&key.0, &key.1);
    let started = Instant::now();
    let deadline = tokio::time::sleep(config.timeout);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = loop {
        tokio::select! {
            // a dropped sender also ends the monitor
            _ = &mut stop => break LoadingState::Cancelled,
            _ = &mut deadline => break LoadingState::TimedOut,
            _ = ticker.tick() => {
                match cache.revalidate(base, || source.fetch_model_ids(base)).await {
                    Ok(models) if models.iter().any(|m| m == model_id) => {
                        break LoadingState::Loaded;
                    }
                    Ok(models) => debug!(model_id, base_url = %base, loaded = models.len(), "model not loaded yet"),
                    Err(e) => debug!(model_id, base_url = %base, error = %e, "poll failed"),
                }
            }
        }
    };

    let elapsed = started.elapsed();
    info!(
        model_id,
        base_url = %base,
        state = ?state,
        elapsed_ms = elapsed.as_millis() as u64,
        "loading monitor finished"
    );
    record.state = state;
    drop(record);
    deliver(notifier.as_ref(), loading_event(&key, state, elapsed)).await;
    state
}

fn loading_event(key: &MonitorKey, state: LoadingState, elapsed: Duration) -> ValidationEvent {
    ValidationEvent::Loading {
        model_id: key.1.clone(),
        base_url: key.0.clone(),
        state,
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

/// Writes the monitor's final state on drop. A task that unwinds before
/// finishing is recorded as `Cancelled`, so the pair can be watched again.
struct FinalState {
    states: States,
    key: MonitorKey,
    state: LoadingState,
}

impl Drop for FinalState {
    fn drop(&mut self) {
        lock(&self.states).insert(self.key.clone(), Tracked::now(self.state));
    }
}

/// Forget finished monitors past the retention period.
fn prune(states: &mut HashMap<MonitorKey, Tracked>) {
    let now = Instant::now();
    states.retain(|_, tracked| {
        tracked.state == LoadingState::Loading
            || now.saturating_duration_since(tracked.since) < FINISHED_RETENTION
    });
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
