//! Board-agnostic runtime core for the Tab5
//!
//! This crate contains the runtime logic that sits between the application
//! and the peripheral drivers:
//!
//! - Subsystem lifecycle tracking and ordered bring-up
//! - Render pipeline driving an immediate-mode UI engine onto the panel
//! - Engine clock tick source
//! - Cooperative task control (stop flag, bounded join, forced abort)
//! - Framework orchestration of boot, the application task and teardown
//! - Configuration type definitions
//!
//! Nothing here touches registers. Drivers come in through the
//! `tab5-hal` contracts, tasks are handed to a platform [`task::TaskSpawner`]
//! and frame memory comes from a [`graphics::RegionAllocator`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod config;
pub mod error;
pub mod framework;
pub mod graphics;
pub mod subsystem;
pub mod task;

#[cfg(test)]
mod testing;

pub use config::{FrameworkConfig, GraphicsConfig};
pub use error::Error;
pub use framework::{Application, BootReport, Framework};
pub use graphics::{Graphics, GraphicsHandle, PerformanceStats};
pub use subsystem::{Registry, StateView, Subsystem, SubsystemId, SubsystemState};
