//! Fixed-period beat
//!
//! The timer task and the task executing ticks are separate and joined by a
//! one-slot queue. The timer never waits on tick execution: when the
//! previous tick is still running and another is already queued, the new tick
//! is skipped. Missed timer firings are skipped as well (fixed rate, no
//! catch-up burst).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// One firing of the beat
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    /// Zero-based sequence number
    pub seq: u64,
}

/// Work invoked on every tick
#[async_trait]
pub trait TickTask: Send + Sync + 'static {
    async fn on_tick(&self, tick: Tick);
}

/// Periodic scheduler, independent of any connection
#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    /// Scheduler firing every `period`. A zero period is rejected.
    pub fn new(period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::Config(
                "scheduler period must be greater than zero".to_string(),
            ));
        }
        Ok(Self { period })
    }

    /// Start firing `task`. The first tick fires immediately.
    pub fn start(self, task: Arc<dyn TickTask>) -> SchedulerHandle {
        let cancel_token = CancellationToken::new();
        let fired = Arc::new(AtomicU64::new(0));
        let (tick_tx, tick_rx) = mpsc::channel::<Tick>(1);

        let timer = tokio::spawn(run_timer(
            self.period,
            tick_tx,
            cancel_token.clone(),
            fired.clone(),
        ));
        let worker = tokio::spawn(run_worker(tick_rx, task, cancel_token.clone()));

        info!(period_ms = self.period.as_millis() as u64, "Scheduler started");

        SchedulerHandle {
            cancel_token,
            fired,
            timer,
            worker,
        }
    }
}

/// Control handle for a running scheduler
pub struct SchedulerHandle {
    cancel_token: CancellationToken,
    fired: Arc<AtomicU64>,
    timer: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Cancel future ticks. A tick already executing runs to completion.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Number of ticks the timer has handed to the worker
    pub fn ticks_fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stop and wait for the in-flight tick, if any, to finish
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.timer.await {
            warn!(error = %e, "Scheduler timer task failed");
        }
        if let Err(e) = self.worker.await {
            warn!(error = %e, "Scheduler worker task failed");
        }
        info!("Scheduler stopped");
    }
}

async fn run_timer(
    period: Duration,
    tick_tx: mpsc::Sender<Tick>,
    cancel_token: CancellationToken,
    fired: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {}
        }

        match tick_tx.try_send(Tick { seq }) {
            Ok(()) => {
                fired.fetch_add(1, Ordering::SeqCst);
            }
            Err(TrySendError::Full(_)) => {
                warn!(tick = seq, "Previous tick still running, skipping");
            }
            Err(TrySendError::Closed(_)) => break,
        }
        seq += 1;
    }

    debug!("Scheduler timer exited");
}

async fn run_worker(
    mut tick_rx: mpsc::Receiver<Tick>,
    task: Arc<dyn TickTask>,
    cancel_token: CancellationToken,
) {
    while let Some(tick) = tick_rx.recv().await {
        // Queued but not started: discard after stop
        if cancel_token.is_cancelled() {
            break;
        }
        task.on_tick(tick).await;
    }

    debug!("Scheduler worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        ticks: Mutex<Vec<u64>>,
        delay: Duration,
    }

    #[async_trait]
    impl TickTask for Recorder {
        async fn on_tick(&self, tick: Tick) {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.ticks.lock().push(tick.seq);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_on_period() {
        let recorder = Arc::new(Recorder::default());
        let handle = Scheduler::new(Duration::from_millis(500))
            .unwrap()
            .start(recorder.clone());

        // Ticks at 0, 500, 1000, 1500 ms
        tokio::time::sleep(Duration::from_millis(1600)).await;
        handle.shutdown().await;

        assert_eq!(*recorder.ticks.lock(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let recorder = Arc::new(Recorder::default());
        let handle = Scheduler::new(Duration::from_millis(100))
            .unwrap()
            .start(recorder.clone());

        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.stop();
        assert!(handle.is_stopped());
        let seen = recorder.ticks.lock().len();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(recorder.ticks.lock().len(), seen);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_task_does_not_delay_timer() {
        let recorder = Arc::new(Recorder {
            delay: Duration::from_millis(250),
            ..Default::default()
        });
        let handle = Scheduler::new(Duration::from_millis(100))
            .unwrap()
            .start(recorder.clone());

        tokio::time::sleep(Duration::from_millis(1050)).await;
        handle.shutdown().await;

        let ticks = recorder.ticks.lock().clone();
        // Ticks run one at a time, in order, with overrun ticks skipped
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        assert!(ticks.len() >= 3 && ticks.len() <= 6, "ticks: {:?}", ticks);
        // Timer kept firing at its own pace
        assert!(ticks.last().copied().unwrap_or(0) >= 6);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(matches!(
            Scheduler::new(Duration::ZERO),
            Err(Error::Config(_))
        ));
        assert!(Scheduler::new(Duration::from_millis(1)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_tick() {
        let recorder = Arc::new(Recorder {
            delay: Duration::from_millis(300),
            ..Default::default()
        });
        let handle = Scheduler::new(Duration::from_secs(10))
            .unwrap()
            .start(recorder.clone());

        // First tick is executing
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.shutdown().await;

        assert_eq!(*recorder.ticks.lock(), vec![0]);
    }
}
