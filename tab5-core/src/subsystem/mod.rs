//! Subsystem lifecycle
//!
//! Every hardware or software capability of the board has an independent
//! lifecycle tracked by the [`Registry`]. The registry is the only writer of
//! subsystem state; other tasks observe it through a [`StateView`].

pub mod events;
pub mod registry;
pub mod state;

pub use events::LifecycleEvent;
pub use registry::{DriverSubsystem, ErrorHook, Registry, Subsystem, SubsystemFuture};
pub use state::{StateView, SubsystemId, SubsystemState};
