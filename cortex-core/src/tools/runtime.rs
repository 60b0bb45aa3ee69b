//! Bounded execution of handlers
//!
//! The executor wraps every handler call with:
//! - A wall-clock deadline enforced by a [`TimeoutStrategy`]
//! - Failure isolation (handler errors and panics become error results)
//! - Duration capture and telemetry
//!
//! Two strategies exist. [`DeadlineStrategy`] aborts the in-flight call in
//! the calling task through `tokio::time::timeout`; it needs a Tokio runtime
//! with a timer driver and falls back to the watchdog without one.
//! [`WatchdogStrategy`] arms a watchdog thread that
//! flags the call once the deadline passes. The watchdog cannot preempt the
//! handler, so a blocking handler is reported as timed out only after it
//! returns. Handlers meant for the watchdog must be short or cooperatively
//! interruptible.
//!
//! Both strategies release their watcher on every exit path: the deadline
//! timer is owned by the timeout future, and the watchdog is cancelled and
//! joined by a drop guard.

use super::handler::{Arguments, Handler, HandlerError};
use super::result::ExecutionResult;
use crate::events::{CortexEvent, EventSink};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Outcome of running a call under a deadline
#[derive(Debug)]
pub enum BoundedOutcome {
    /// The call returned before the deadline
    Completed(Result<Value, HandlerError>),
    /// The deadline passed
    TimedOut,
}

/// Strategy for enforcing a deadline around a handler call
#[async_trait]
pub trait TimeoutStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Drive `call` to completion or until `timeout` elapses
    async fn run_bounded<'a>(
        &self,
        call: BoxFuture<'a, Result<Value, HandlerError>>,
        timeout: Duration,
    ) -> BoundedOutcome;
}

/// Interrupt-style deadline: the call is dropped at its next suspension
/// point once the timer fires
#[derive(Debug, Clone, Default)]
pub struct DeadlineStrategy;

#[async_trait]
impl TimeoutStrategy for DeadlineStrategy {
    fn name(&self) -> &'static str {
        "deadline"
    }

    async fn run_bounded<'a>(
        &self,
        call: BoxFuture<'a, Result<Value, HandlerError>>,
        timeout: Duration,
    ) -> BoundedOutcome {
        if !timer_driver_available() {
            tracing::warn!("Tokio timers are disabled, using watchdog");
            return WatchdogStrategy.run_bounded(call, timeout).await;
        }
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => BoundedOutcome::Completed(result),
            Err(_) => BoundedOutcome::TimedOut,
        }
    }
}

/// Whether the current thread is inside a Tokio runtime whose timer driver
/// is enabled
///
/// Tokio has no query for this, and creating a timer on a runtime built
/// without `enable_time` panics, so the check polls a zero-length sleep once
/// under `catch_unwind`.
pub fn timer_driver_available() -> bool {
    if tokio::runtime::Handle::try_current().is_err() {
        return false;
    }
    std::panic::catch_unwind(|| {
        let _ = tokio::time::sleep(Duration::ZERO).now_or_never();
    })
    .is_ok()
}

/// Watchdog-thread fallback; flags a timeout after the fact
#[derive(Debug, Clone, Default)]
pub struct WatchdogStrategy;

#[async_trait]
impl TimeoutStrategy for WatchdogStrategy {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    async fn run_bounded<'a>(
        &self,
        call: BoxFuture<'a, Result<Value, HandlerError>>,
        timeout: Duration,
    ) -> BoundedOutcome {
        let watchdog = Watchdog::arm(timeout);
        let result = call.await;
        if watchdog.disarm() {
            BoundedOutcome::TimedOut
        } else {
            BoundedOutcome::Completed(result)
        }
    }
}

/// Transient watchdog thread
///
/// Dropping the sender wakes the thread immediately; the guard joins it so
/// no watchdog outlives the call it guards.
struct Watchdog {
    cancel: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
    armed_at: Instant,
    timeout: Duration,
}

impl Watchdog {
    fn arm(timeout: Duration) -> Self {
        let (cancel, wait) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let thread = std::thread::Builder::new()
            .name("cortex-watchdog".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = wait.recv_timeout(timeout) {
                    flag.store(true, Ordering::SeqCst);
                }
            })
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to spawn watchdog thread, using elapsed time");
            })
            .ok();

        Self {
            cancel: Some(cancel),
            thread,
            fired,
            armed_at: Instant::now(),
            timeout,
        }
    }

    /// Cancel the watchdog and report whether it fired
    fn disarm(mut self) -> bool {
        let had_thread = self.thread.is_some();
        self.release();
        if had_thread {
            self.fired.load(Ordering::SeqCst)
        } else {
            // without a thread the elapsed time is the only signal
            self.armed_at.elapsed() >= self.timeout
        }
    }

    fn release(&mut self) {
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.release();
    }
}

/// How the executor picks its strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    /// Deadline when a Tokio runtime with timers drives the call, watchdog
    /// otherwise
    #[default]
    Auto,
    /// Always use [`DeadlineStrategy`]
    Deadline,
    /// Always use [`WatchdogStrategy`]
    Watchdog,
}

impl TimeoutMode {
    /// Resolve to a concrete strategy for the current execution context
    pub fn strategy(self) -> Arc<dyn TimeoutStrategy> {
        match self {
            TimeoutMode::Deadline => Arc::new(DeadlineStrategy),
            TimeoutMode::Watchdog => Arc::new(WatchdogStrategy),
            TimeoutMode::Auto => {
                if timer_driver_available() {
                    Arc::new(DeadlineStrategy)
                } else {
                    Arc::new(WatchdogStrategy)
                }
            }
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Default deadline for a handler call
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Per-handler deadline overrides, keyed by tool or capability name
    #[serde(default, with = "duration_map")]
    pub timeouts: HashMap<String, Duration>,

    /// Strategy selection
    #[serde(default)]
    pub mode: TimeoutMode,
}

/// Human-readable durations (`"250ms"`) as map values
mod duration_map {
    use humantime_serde::Serde;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;
    use std::time::Duration;

    pub fn serialize<S>(map: &HashMap<String, Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(name, timeout)| (name, Serde::from(*timeout))))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, Serde<Duration>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(name, timeout)| (name, timeout.into_inner()))
            .collect())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            timeouts: HashMap::new(),
            mode: TimeoutMode::Auto,
        }
    }
}

impl ExecutorConfig {
    /// Set the default deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a handler-specific deadline
    pub fn with_handler_timeout(mut self, name: impl Into<String>, timeout: Duration) -> Self {
        self.timeouts.insert(name.into(), timeout);
        self
    }

    /// Force a strategy
    pub fn with_mode(mut self, mode: TimeoutMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Runs handlers under a deadline and converts every outcome to an
/// [`ExecutionResult`]
pub struct BoundedExecutor {
    config: ExecutorConfig,
    strategy: Option<Arc<dyn TimeoutStrategy>>,
    sink: Arc<dyn EventSink>,
}

impl BoundedExecutor {
    /// Create an executor with the given configuration
    pub fn new(config: ExecutorConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            strategy: None,
            sink,
        }
    }

    /// Use a fixed strategy instead of resolving one from the mode
    pub fn with_strategy(mut self, strategy: Arc<dyn TimeoutStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Deadline that applies to the named handler
    pub fn timeout_for(&self, name: &str) -> Duration {
        self.config
            .timeouts
            .get(name)
            .copied()
            .unwrap_or(self.config.default_timeout)
    }

    fn strategy(&self) -> Arc<dyn TimeoutStrategy> {
        match &self.strategy {
            Some(strategy) => Arc::clone(strategy),
            None => self.config.mode.strategy(),
        }
    }

    /// Execute `handler` with its configured deadline
    pub async fn execute_named(
        &self,
        name: &str,
        handler: &dyn Handler,
        action: &str,
        arguments: &Arguments,
    ) -> ExecutionResult {
        let timeout = self.timeout_for(name);
        self.execute(name, handler, action, arguments, timeout).await
    }

    /// Execute `handler.run(action, arguments)` under `timeout`
    ///
    /// Never fails: timeouts, handler errors and panics all resolve into an
    /// error result.
    pub async fn execute(
        &self,
        name: &str,
        handler: &dyn Handler,
        action: &str,
        arguments: &Arguments,
        timeout: Duration,
    ) -> ExecutionResult {
        let strategy = self.strategy();
        tracing::debug!(
            handler = %name,
            action = %action,
            strategy = strategy.name(),
            timeout_ms = timeout.as_millis() as u64,
            "Executing handler"
        );

        let call = AssertUnwindSafe(handler.run(action, arguments))
            .catch_unwind()
            .map(|caught| caught.unwrap_or_else(|panic| Err(panic_error(panic))))
            .boxed();

        let started = Instant::now();
        let outcome = strategy.run_bounded(call, timeout).await;
        let duration = started.elapsed();

        match outcome {
            BoundedOutcome::Completed(Ok(value)) => {
                self.sink.record(CortexEvent::ActionCompleted {
                    name: name.to_string(),
                    action: action.to_string(),
                    duration,
                });
                ExecutionResult::success(value, duration)
            }
            BoundedOutcome::Completed(Err(error)) => {
                self.sink.record(CortexEvent::ActionFailed {
                    name: name.to_string(),
                    action: action.to_string(),
                    error: error.message.clone(),
                });
                ExecutionResult::error(error.message, duration)
            }
            BoundedOutcome::TimedOut => {
                self.sink.record(CortexEvent::ActionTimedOut {
                    name: name.to_string(),
                    action: action.to_string(),
                    timeout,
                });
                ExecutionResult::timed_out(timeout, duration)
            }
        }
    }
}

fn panic_error(panic: Box<dyn std::any::Any + Send>) -> HandlerError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    };
    HandlerError::panicked(message)
}
