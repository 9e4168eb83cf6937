//! Subsystem registry
//!
//! Table from [`SubsystemId`] to the [`Subsystem`] implementation that brings
//! it up and tears it down. Implementations are registered at construction,
//! so any id can be backed by a test double.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;

use tab5_hal::Driver;

use super::events::LifecycleEvent;
use super::state::{StateView, SubsystemId, SubsystemState};
use crate::error::Error;

/// Future returned by subsystem initializers and teardowns
pub type SubsystemFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>>;

/// Notification for a failed initialization
pub type ErrorHook = Box<dyn FnMut(SubsystemId, Error)>;

/// Initializer and teardown for one subsystem
pub trait Subsystem {
    /// Bring the subsystem up
    fn init(&mut self) -> SubsystemFuture<'_>;

    /// Tear the subsystem down
    ///
    /// Failures are logged by the registry; the subsystem is considered
    /// uninitialized afterwards either way.
    fn deinit(&mut self) -> SubsystemFuture<'_>;
}

/// Registry entry backed by a plain peripheral driver handle
///
/// Covers sensor, audio, power and connectivity, whose lifecycle is just
/// the driver's own init/deinit.
pub struct DriverSubsystem<P: ?Sized> {
    driver: Arc<P>,
}

impl<P: Driver + ?Sized> DriverSubsystem<P> {
    pub fn new(driver: Arc<P>) -> Self {
        Self { driver }
    }
}

impl<P: Driver + ?Sized> Subsystem for DriverSubsystem<P> {
    fn init(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move { self.driver.init().map_err(Error::from) })
    }

    fn deinit(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move { self.driver.deinit().map_err(Error::from) })
    }
}

/// Subsystem registry
///
/// Sole writer of subsystem state.
pub struct Registry {
    entries: [Option<Box<dyn Subsystem>>; SubsystemId::COUNT],
    states: StateView,
    error_hook: Option<ErrorHook>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create an empty registry with every subsystem Uninitialized
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| None),
            states: StateView::new(),
            error_hook: None,
        }
    }

    /// Install the implementation for `id`
    ///
    /// Replacing the implementation of a subsystem that is not
    /// Uninitialized is refused with `InvalidState`.
    pub fn register<S>(&mut self, id: SubsystemId, subsystem: S) -> Result<(), Error>
    where
        S: Subsystem + 'static,
    {
        if self.state(id).is_settled() {
            return Err(Error::InvalidState);
        }
        self.entries[id.index()] = Some(Box::new(subsystem));
        Ok(())
    }

    /// Set the hook invoked with the id and cause of every failed init
    pub fn set_error_hook<F>(&mut self, hook: F)
    where
        F: FnMut(SubsystemId, Error) + 'static,
    {
        self.error_hook = Some(Box::new(hook));
    }

    /// Get the current state of a subsystem
    pub fn state(&self, id: SubsystemId) -> SubsystemState {
        self.states.state(id)
    }

    /// Get a view of the state table for other tasks
    pub fn view(&self) -> StateView {
        self.states.clone()
    }

    /// Initialize a subsystem
    ///
    /// A subsystem that already ran its initializer (Ready or Error) is left
    /// as is and `Ok` is returned; only `deinit` makes it eligible again.
    pub async fn init(&mut self, id: SubsystemId) -> Result<(), Error> {
        let current = self.state(id);
        if current.is_settled() {
            warn!("{} subsystem already initialized ({})", id, current);
            return Ok(());
        }

        info!("Initializing {} subsystem", id);
        self.states.apply(id, LifecycleEvent::Begin);

        let result = match self.check_dependencies(id) {
            Ok(()) => match self.entries[id.index()].as_mut() {
                Some(subsystem) => subsystem.init().await,
                None => Err(Error::NotSupported),
            },
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.states.apply(id, LifecycleEvent::Succeeded);
                info!("{} subsystem ready", id);
                Ok(())
            }
            Err(err) => {
                self.states.apply(id, LifecycleEvent::Failed);
                error!("Failed to initialize {} subsystem: {}", id, err);
                if let Some(hook) = self.error_hook.as_mut() {
                    hook(id, err);
                }
                Err(err)
            }
        }
    }

    /// Deinitialize a subsystem
    ///
    /// No-op if Uninitialized. Teardown failures are logged and the state is
    /// reset regardless.
    pub async fn deinit(&mut self, id: SubsystemId) -> Result<(), Error> {
        if !self.state(id).is_settled() {
            return Ok(());
        }

        info!("Deinitializing {} subsystem", id);
        if let Some(subsystem) = self.entries[id.index()].as_mut() {
            if let Err(err) = subsystem.deinit().await {
                warn!("{} subsystem teardown failed: {}", id, err);
            }
        }

        self.states.apply(id, LifecycleEvent::Reset);
        Ok(())
    }

    /// Deinitialize every subsystem that is not Uninitialized, highest
    /// index first
    pub async fn deinit_all(&mut self) {
        for id in SubsystemId::ALL.iter().rev() {
            // deinit never fails
            let _ = self.deinit(*id).await;
        }
    }

    fn check_dependencies(&self, id: SubsystemId) -> Result<(), Error> {
        for dep in id.dependencies() {
            let state = self.state(*dep);
            if !state.is_ready() {
                warn!("{} requires {} (currently {})", id, dep, state);
                return Err(Error::InvalidState);
            }
        }
        Ok(())
    }
}
