//! Background refresh of the displayed code
//!
//! The ticker owns at most one timer task. Starting it again cancels the
//! previous task before spawning the new one, so a restart never leaves two
//! timers publishing.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use presence_core::{Clock, CodeEngine, GeneratedCode, Secret};

/// When the ticker wakes up to recompute the code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Wake exactly at each step boundary
    #[default]
    StepAligned,
    /// Wake on a fixed interval, publishing only when the code changed
    Fixed(Duration),
}

/// Publishes the current code to a `watch` channel
pub struct RefreshTicker {
    engine: CodeEngine,
    clock: Arc<dyn Clock>,
    policy: RefreshPolicy,
    task: Option<JoinHandle<()>>,
}

impl RefreshTicker {
    pub fn new(engine: CodeEngine, clock: Arc<dyn Clock>, policy: RefreshPolicy) -> Self {
        Self {
            engine,
            clock,
            policy,
            task: None,
        }
    }

    pub fn engine(&self) -> &CodeEngine {
        &self.engine
    }

    /// Start publishing codes for `secret`, replacing any running timer
    ///
    /// The receiver starts out holding the code for the current step.
    pub fn start(&mut self, secret: Secret) -> watch::Receiver<GeneratedCode> {
        self.stop();

        let initial = self.engine.generate(&secret, self.clock.now_unix());
        let (tx, rx) = watch::channel(initial);

        let engine = self.engine.clone();
        let clock = Arc::clone(&self.clock);
        let task = match self.policy {
            RefreshPolicy::StepAligned => {
                tokio::spawn(run_step_aligned(engine, clock, secret, tx))
            }
            RefreshPolicy::Fixed(interval) => {
                tokio::spawn(run_fixed(engine, clock, secret, interval, tx))
            }
        };

        self.task = Some(task);
        rx
    }

    /// Cancel the running timer, if any
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Stopping code refresh task");
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replace the published code if the step moved on
fn publish(tx: &watch::Sender<GeneratedCode>, code: GeneratedCode) {
    tx.send_if_modified(|current| {
        if current.counter == code.counter {
            return false;
        }
        debug!(counter = code.counter, "Publishing refreshed code");
        *current = code;
        true
    });
}

async fn run_step_aligned(
    engine: CodeEngine,
    clock: Arc<dyn Clock>,
    secret: Secret,
    tx: watch::Sender<GeneratedCode>,
) {
    loop {
        // A wake-up that lands just short of the boundary publishes nothing
        // and sleeps again for the remainder
        let wait = engine.millis_until_next_step(clock.now_unix_millis());
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(wait)) => {}
            _ = tx.closed() => break,
        }
        publish(&tx, engine.generate(&secret, clock.now_unix()));
    }
}

async fn run_fixed(
    engine: CodeEngine,
    clock: Arc<dyn Clock>,
    secret: Secret,
    interval: Duration,
    tx: watch::Sender<GeneratedCode>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tx.closed() => break,
        }
        publish(&tx, engine.generate(&secret, clock.now_unix()));
    }
}
