//! Long-lived task control
//!
//! Tasks are plain futures handed to a platform [`TaskSpawner`]; on the
//! board each one is bound to an `#[embassy_executor::task]` on the executor
//! for its configured core. A [`TaskControl`] shared between the task and
//! its owner provides the only cancellation path:
//!
//! 1. `request_stop` sets a flag the task checks at the top of every
//!    iteration and wakes it out of its post-iteration sleep
//! 2. `join` waits, bounded, for the task to report that it exited
//! 3. only if the join times out is the task aborted, which drops its
//!    future at its current await point

use core::future::Future;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration, Timer};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::config::TaskConfig;
use crate::error::Error;

/// How long to wait for an aborted task to acknowledge
pub const ABORT_JOIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Platform hook that runs a task future to completion
pub trait TaskSpawner<T> {
    /// Hand `task` to an executor
    ///
    /// The platform places it according to `config` (priority, core
    /// affinity, stack size).
    fn spawn(&self, task: T, config: &TaskConfig) -> Result<(), SpawnError>;
}

impl<T, S: TaskSpawner<T> + ?Sized> TaskSpawner<T> for alloc::sync::Arc<S> {
    fn spawn(&self, task: T, config: &TaskConfig) -> Result<(), SpawnError> {
        TaskSpawner::<T>::spawn(&**self, task, config)
    }
}

/// Spawn failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpawnError {
    /// Task pool exhausted
    Busy,
}

impl From<SpawnError> for Error {
    fn from(err: SpawnError) -> Self {
        match err {
            SpawnError::Busy => Error::AllocationFailure,
        }
    }
}

/// Task lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TaskPhase {
    /// Never started
    Idle = 0,
    /// Spawned and not asked to stop
    Running = 1,
    /// Stop requested, not yet exited
    Stopping = 2,
    /// Task future finished or was aborted
    Exited = 3,
}

impl TaskPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => TaskPhase::Running,
            2 => TaskPhase::Stopping,
            3 => TaskPhase::Exited,
            _ => TaskPhase::Idle,
        }
    }

    /// Check if a task is live (running or winding down)
    pub fn is_live(&self) -> bool {
        matches!(self, TaskPhase::Running | TaskPhase::Stopping)
    }
}

/// Shared stop/join/abort control for one task
pub struct TaskControl {
    phase: AtomicU8,
    stop: AtomicBool,
    wake: Signal<CriticalSectionRawMutex, ()>,
    abort: Signal<CriticalSectionRawMutex, ()>,
    exited: Signal<CriticalSectionRawMutex, ()>,
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskControl {
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(TaskPhase::Idle as u8),
            stop: AtomicBool::new(false),
            wake: Signal::new(),
            abort: Signal::new(),
            exited: Signal::new(),
        }
    }

    /// Get the current phase
    pub fn phase(&self) -> TaskPhase {
        TaskPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Prepare for a new run, before the task is spawned
    ///
    /// Fails with `InvalidState` while a previous run is still live.
    pub fn arm(&self) -> Result<(), Error> {
        if self.phase().is_live() {
            return Err(Error::InvalidState);
        }
        self.stop.store(false, Ordering::Release);
        self.wake.reset();
        self.abort.reset();
        self.exited.reset();
        self.phase.store(TaskPhase::Running as u8, Ordering::Release);
        Ok(())
    }

    /// Undo `arm` after the spawn itself failed
    pub fn disarm(&self) {
        self.phase.store(TaskPhase::Idle as u8, Ordering::Release);
    }

    /// Check the cooperative stop flag
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Set the stop flag and wake the task if it is sleeping
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.phase.compare_exchange(
            TaskPhase::Running as u8,
            TaskPhase::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        self.wake.signal(());
    }

    /// Await `fut` unless a stop is requested first
    ///
    /// Returns `None` if the stop won.
    pub async fn interruptible<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.should_stop() {
            return None;
        }
        match select(fut, self.wake.wait()).await {
            Either::First(output) => Some(output),
            Either::Second(()) => None,
        }
    }

    /// Sleep for `duration`, returning early if a stop is requested
    pub async fn sleep(&self, duration: Duration) {
        let _ = self.interruptible(Timer::after(duration)).await;
    }

    /// Run the task body until it returns or the task is aborted
    ///
    /// Returns `None` if aborted. Either way the task's future has been
    /// dropped by the time the owner's join completes.
    pub async fn supervise<F: Future>(&self, body: F) -> Option<F::Output> {
        let outcome = select(body, self.abort.wait()).await;
        let output = match outcome {
            Either::First(output) => Some(output),
            Either::Second(()) => {
                warn!("Task aborted");
                None
            }
        };
        self.phase.store(TaskPhase::Exited as u8, Ordering::Release);
        self.exited.signal(());
        output
    }

    /// Wait for the task to exit, at most `timeout`
    pub async fn join(&self, timeout: Duration) -> Result<(), Error> {
        if !self.phase().is_live() {
            return Ok(());
        }
        with_timeout(timeout, self.exited.wait())
            .await
            .map_err(|_| Error::Timeout)
    }

    /// Stop the task: cooperative stop, bounded join, abort as last resort
    ///
    /// Never fails. No-op if the task is not live.
    pub async fn shutdown(&self, grace: Duration) {
        if !self.phase().is_live() {
            return;
        }

        self.request_stop();
        if self.join(grace).await.is_ok() {
            return;
        }

        warn!(
            "Task did not stop within {} ms, aborting",
            grace.as_millis()
        );
        self.abort.signal(());
        if self.join(ABORT_JOIN_TIMEOUT).await.is_err() {
            error!("Task did not acknowledge abort");
            // Not polled since abort; it exits on its next poll
            self.phase.store(TaskPhase::Exited as u8, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_futures::join::join;
    use embassy_time::Instant;
    use portable_atomic::AtomicU32;

    #[test]
    fn test_cooperative_stop_wakes_sleep() {
        let control = TaskControl::new();
        control.arm().unwrap();
        let iterations = AtomicU32::new(0);

        let body = async {
            while !control.should_stop() {
                iterations.fetch_add(1, Ordering::Relaxed);
                control.sleep(Duration::from_secs(10)).await;
            }
        };

        let owner = async {
            Timer::after_millis(20).await;
            let start = Instant::now();
            control.shutdown(Duration::from_millis(500)).await;
            start.elapsed()
        };

        let (output, elapsed) = block_on(join(control.supervise(body), owner));
        assert_eq!(output, Some(()));
        assert!(elapsed < Duration::from_millis(500));
        assert_eq!(iterations.load(Ordering::Relaxed), 1);
        assert_eq!(control.phase(), TaskPhase::Exited);
    }

    #[test]
    fn test_unresponsive_task_is_aborted() {
        let control = TaskControl::new();
        control.arm().unwrap();

        // Ignores the stop flag entirely
        let body = async {
            loop {
                Timer::after_millis(1).await;
            }
        };

        let owner = control.shutdown(Duration::from_millis(30));

        let (output, ()) = block_on(join(control.supervise(body), owner));
        assert_eq!(output, None::<()>);
        assert_eq!(control.phase(), TaskPhase::Exited);
    }

    #[test]
    fn test_shutdown_idle_is_noop() {
        let control = TaskControl::new();
        block_on(control.shutdown(Duration::from_millis(10)));
        assert_eq!(control.phase(), TaskPhase::Idle);
        assert!(!control.should_stop());
    }

    #[test]
    fn test_arm_refused_while_live() {
        let control = TaskControl::new();
        control.arm().unwrap();
        assert_eq!(control.arm(), Err(Error::InvalidState));
        control.disarm();
        assert_eq!(control.arm(), Ok(()));
    }

    #[test]
    fn test_rearm_after_exit_clears_stop() {
        let control = TaskControl::new();
        control.arm().unwrap();
        control.request_stop();
        assert_eq!(control.phase(), TaskPhase::Stopping);
        block_on(control.supervise(async {}));
        assert_eq!(control.phase(), TaskPhase::Exited);

        control.arm().unwrap();
        assert!(!control.should_stop());
        assert_eq!(control.phase(), TaskPhase::Running);
    }

    #[test]
    fn test_spawn_error_maps_to_allocation_failure() {
        assert_eq!(Error::from(SpawnError::Busy), Error::AllocationFailure);
    }
}
