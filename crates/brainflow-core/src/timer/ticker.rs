//! Recurring tick sources.
//!
//! A ticker only knows how to start and stop. Each start is armed with the
//! engine's current generation; the engine discards any tick whose
//! generation no longer matches, so a tick already queued when `pause` or
//! `stop` runs can never be applied.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{CoreError, Result};

/// One tick, stamped with the generation it was armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignal {
    pub generation: u64,
}

pub trait Ticker: Send {
    /// (Re)arm the ticker. Any previous schedule is cancelled first.
    fn start(&mut self, interval: Duration, generation: u64);

    /// Cancel the schedule. Idempotent.
    fn stop(&mut self);
}

/// Ticker backed by a tokio interval task that feeds an mpsc channel.
pub struct TokioTicker {
    runtime: Handle,
    tx: mpsc::UnboundedSender<TickSignal>,
    task: Option<JoinHandle<()>>,
}

impl TokioTicker {
    /// Must be called from within a tokio runtime.
    pub fn new(tx: mpsc::UnboundedSender<TickSignal>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CoreError::NoRuntime)?;
        Ok(Self {
            runtime,
            tx,
            task: None,
        })
    }

    /// Ticker plus the receiving end to hand to the tick driver.
    pub fn channel() -> Result<(Self, mpsc::UnboundedReceiver<TickSignal>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self::new(tx)?, rx))
    }
}

impl Ticker for TokioTicker {
    fn start(&mut self, interval: Duration, generation: u64) {
        self.stop();
        let tx = self.tx.clone();
        self.task = Some(self.runtime.spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if tx.send(TickSignal { generation }).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The arming recorded by a [`ManualTicker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerArm {
    pub interval: Duration,
    pub generation: u64,
}

#[derive(Debug, Default)]
struct ManualState {
    armed: Option<TickerArm>,
    starts: usize,
    stops: usize,
}

/// Ticker that never fires on its own. Clones share state, so a test can
/// keep one clone to inspect what the engine did with the other and to
/// produce signals for the current arming.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> Option<TickerArm> {
        self.lock().armed
    }

    pub fn is_armed(&self) -> bool {
        self.armed().is_some()
    }

    pub fn starts(&self) -> usize {
        self.lock().starts
    }

    pub fn stops(&self) -> usize {
        self.lock().stops
    }

    /// The signal the armed schedule would deliver next.
    pub fn signal(&self) -> Option<TickSignal> {
        self.armed().map(|arm| TickSignal {
            generation: arm.generation,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ticker for ManualTicker {
    fn start(&mut self, interval: Duration, generation: u64) {
        let mut state = self.lock();
        state.armed = Some(TickerArm {
            interval,
            generation,
        });
        state.starts += 1;
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.armed = None;
        state.stops += 1;
    }
}
