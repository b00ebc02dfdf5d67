//! Periodic execution of pipeline jobs.
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use eyre::Result;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A unit of work run on every scheduler tick.
#[async_trait]
pub trait PeriodicTask: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> String;

    /// Run the job once.
    async fn run(&self) -> Result<()>;
}

/// Clears the in-flight flag when a run ends, even by panic.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a [`PeriodicTask`] immediately and then at a fixed interval.
///
/// At most one run of the task is active at any time: a tick that fires while
/// the previous run is still going is skipped, not queued. Failures are logged
/// and the schedule carries on.
#[derive(Debug)]
pub struct TaskScheduler {
    name: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TaskScheduler {
    /// Start scheduling `task` every `period`; a zero period is rejected.
    pub fn start(task: Arc<dyn PeriodicTask>, period: Duration) -> Result<Self> {
        let name = task.name();
        if period.is_zero() {
            eyre::bail!("{name} interval must be positive");
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::run_loop(task, period, cancel.clone()));
        info!(task = %name, period_secs = period.as_secs(), "Scheduled task");
        Ok(Self { name, cancel, handle })
    }

    async fn run_loop(task: Arc<dyn PeriodicTask>, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let running = Arc::new(AtomicBool::new(false));
        let mut current: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            if running.swap(true, Ordering::AcqRel) {
                debug!(task = %task.name(), "Previous run still in flight, skipping tick");
                continue;
            }

            let guard = InFlight(Arc::clone(&running));
            let task = Arc::clone(&task);
            current = Some(tokio::spawn(async move {
                let _guard = guard;
                if let Err(e) = task.run().await {
                    error!(task = %task.name(), err = ?e, "Task failed");
                }
            }));
        }

        if let Some(handle) = current {
            if !handle.is_finished() {
                debug!(task = %task.name(), "Waiting for in-flight run to finish");
            }
            if let Err(e) = handle.await {
                error!(task = %task.name(), err = %e, "Last run panicked");
            }
        }
    }

    /// Name of the scheduled task.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop the schedule and wait for an in-flight run to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            error!(task = %self.name, err = %e, "Scheduler loop panicked");
        }
        info!(task = %self.name, "Stopped task");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[derive(Debug, Default)]
    struct Counter {
        started: AtomicU64,
        finished: AtomicU64,
        active: AtomicU64,
        max_active: AtomicU64,
        work: Duration,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicTask for Counter {
        fn name(&self) -> String {
            "counter".to_owned()
        }

        async fn run(&self) -> Result<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                eyre::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_period() {
        let task = Arc::new(Counter::default());
        let scheduler =
            TaskScheduler::start(Arc::clone(&task) as _, Duration::from_secs(10)).unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;
        scheduler.stop().await;

        // ticks at 0, 10, 20 and 30 seconds
        assert_eq!(task.finished.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_skip_ticks_and_never_overlap() {
        let task = Arc::new(Counter { work: Duration::from_secs(25), ..Default::default() });
        let scheduler =
            TaskScheduler::start(Arc::clone(&task) as _, Duration::from_secs(10)).unwrap();

        // runs start at 0 and 30; ticks at 10, 20 and 40 are skipped
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(task.started.load(Ordering::SeqCst), 2);

        scheduler.stop().await;
        assert_eq!(task.finished.load(Ordering::SeqCst), 2);
        assert_eq!(task.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let task = Arc::new(Counter::default());
        let err = TaskScheduler::start(Arc::clone(&task) as _, Duration::ZERO).unwrap_err();

        assert!(err.to_string().contains("interval must be positive"));
        tokio::task::yield_now().await;
        assert_eq!(task.started.load(Ordering::SeqCst), 0);
    }

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl PeriodicTask for Panicking {
        fn name(&self) -> String {
            "panicking".to_owned()
        }

        async fn run(&self) -> Result<()> {
            panic!("run blew up");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_run_does_not_break_stop() {
        let scheduler =
            TaskScheduler::start(Arc::new(Panicking), Duration::from_secs(10)).unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_schedule() {
        let task = Arc::new(Counter { fail: true, ..Default::default() });
        let scheduler =
            TaskScheduler::start(Arc::clone(&task) as _, Duration::from_secs(10)).unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        scheduler.stop().await;

        assert_eq!(task.finished.load(Ordering::SeqCst), 3);
    }
}
