//! Periodic execution of maintenance tasks on a dedicated thread.
//!
//! A [`PeriodicTaskScheduler`] runs one task over and over. Before each run it
//! asks a next-run function when the task should fire, given the current time,
//! so fixed-rate and calendar-aligned policies are expressed the same way (see
//! [`fixed_rate`] and [`aligned_to`]).
//!
//! Only one execution is ever in flight. [`stop`](PeriodicTaskScheduler::stop)
//! never interrupts a running task. A run that is already scheduled fires
//! straight away instead of waiting for its time; no run is scheduled after
//! it. `stop` waits, up to a timeout, for that last run to finish.
//!
//! ```no_run
//! use jobflow::scheduler::{PeriodicTaskScheduler, fixed_rate};
//! use std::time::Duration;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut scheduler = PeriodicTaskScheduler::new(
//!     "persist-quantiles",
//!     || {
//!         // write the job's quantiles somewhere durable
//!         Ok(())
//!     },
//!     fixed_rate(Duration::from_secs(60)),
//! );
//! scheduler.start()?;
//! // ...
//! scheduler.stop(Duration::from_secs(5))?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::Span;

use crate::error::SchedulerError;

/// The unit of work a scheduler runs.
pub type Task = Box<dyn FnMut() -> anyhow::Result<()> + Send + 'static>;

/// Computes the next fire time from the current time.
pub type NextRunFn = Box<dyn Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static>;

/// Fire every `period`, measured from the end of the previous run.
pub fn fixed_rate(period: Duration) -> impl Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static {
    let delta = TimeDelta::from_std(period).unwrap_or(TimeDelta::MAX);
    move |now| now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Fire at the next whole multiple of `period` since the Unix epoch, e.g.
/// the top of every hour for a one hour period.
pub fn aligned_to(period: Duration) -> impl Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static {
    let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX).max(1);
    move |now| {
        let next = (now.timestamp_millis().div_euclid(period_ms) + 1).saturating_mul(period_ms);
        DateTime::from_timestamp_millis(next).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Default)]
struct State {
    running: bool,
    stopping: bool,
    runs: u64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    cond: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks the loop as stopped however the thread exits, including a panicking task.
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.lock().running = false;
        self.0.cond.notify_all();
    }
}

/// Runs a task repeatedly on one background thread.
pub struct PeriodicTaskScheduler {
    name: String,
    work: Option<(Task, NextRunFn)>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    span: Span,
}

impl PeriodicTaskScheduler {
    pub fn new<F, N>(name: impl Into<String>, task: F, next_run: N) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
        N: Fn(DateTime<Utc>) -> DateTime<Utc> + Send + 'static,
    {
        let name = name.into();
        let span = tracing::info_span!("scheduler", name = %name);
        Self {
            name,
            work: Some((Box::new(task), Box::new(next_run))),
            shared: Arc::default(),
            handle: None,
            span,
        }
    }

    /// Record log events under `span` instead of the scheduler's own span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the execution loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Completed task executions, including those that returned an error.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.shared.lock().runs
    }

    /// Spawn the execution loop.
    ///
    /// # Errors
    /// - [`SchedulerError::AlreadyStarted`] on a second call
    /// - [`SchedulerError::Spawn`] if the thread cannot be created
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        let Some((task, next_run)) = self.work.take() else {
            return Err(SchedulerError::AlreadyStarted(self.name.clone()));
        };
        {
            let mut state = self.shared.lock();
            state.running = true;
            state.stopping = false;
        }
        let shared = Arc::clone(&self.shared);
        let span = self.span.clone();
        let spawned = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || run_loop(&shared, task, &next_run, &span));
        match spawned {
            Ok(handle) => {
                tracing::debug!(parent: &self.span, "scheduler started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.lock().running = false;
                Err(SchedulerError::Spawn(err))
            }
        }
    }

    /// Fire the pending run now, cancel the ones after it and wait up to
    /// `timeout` for the loop to exit.
    ///
    /// On `Ok` no task is executing and none will be. A scheduler that was
    /// never started stops immediately.
    ///
    /// # Errors
    /// Returns [`SchedulerError::StopTimeout`] if a task was still running
    /// when `timeout` elapsed. The task is not interrupted; calling `stop`
    /// again waits for it.
    pub fn stop(&mut self, timeout: Duration) -> Result<(), SchedulerError> {
        let started = Instant::now();
        let state = {
            let mut state = self.shared.lock();
            state.stopping = true;
            self.shared.cond.notify_all();
            self.shared
                .cond
                .wait_timeout_while(state, timeout, |s| s.running)
                .unwrap_or_else(PoisonError::into_inner)
                .0
        };
        if state.running {
            tracing::warn!(parent: &self.span, ?timeout, "scheduler did not stop in time");
            return Err(SchedulerError::StopTimeout {
                name: self.name.clone(),
                timeout,
            });
        }
        drop(state);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!(parent: &self.span, "scheduled task panicked");
        }
        tracing::debug!(parent: &self.span, waited = ?started.elapsed(), "scheduler stopped");
        Ok(())
    }
}

impl Drop for PeriodicTaskScheduler {
    fn drop(&mut self) {
        self.shared.lock().stopping = true;
        self.shared.cond.notify_all();
    }
}

fn run_loop(shared: &Arc<Shared>, mut task: Task, next_run: &NextRunFn, span: &Span) {
    let _guard = ExitGuard(Arc::clone(shared));
    loop {
        let next = next_run(Utc::now());
        {
            // A stop fires the pending run early rather than cancelling it.
            let mut state = shared.lock();
            while !state.stopping {
                match (next - Utc::now()).to_std() {
                    Ok(wait) if !wait.is_zero() => {
                        state = shared
                            .cond
                            .wait_timeout(state, wait)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                    _ => break,
                }
            }
        }

        if let Err(err) = task() {
            tracing::warn!(parent: span, error = %err, "scheduled task failed");
        }
        let mut state = shared.lock();
        state.runs += 1;
        if state.stopping {
            return;
        }
    }
}
