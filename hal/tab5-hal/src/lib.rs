//! Tab5 Hardware Abstraction Layer
//!
//! This crate defines the handle-based contracts the runtime core consumes.
//! Board support crates implement them on top of the vendor drivers
//! (MIPI-DSI panel, GT911 touch controller, BMI270 IMU, ES8388 codec, PMIC).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  tab5-core (registry, render pipeline)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tab5-hal (this crate - contracts)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ panel / touch │       │ imu / audio / │
//! │    drivers    │       │ power drivers │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! Driver handles are shared between the subsystem registry (which owns
//! their init/deinit lifecycle) and the render pipeline (which starts, stops
//! and draws through them), so every method takes `&self`. Implementations
//! own whatever interior synchronization their hardware needs.
//!
//! # Traits
//!
//! - [`Driver`] - init/deinit lifecycle shared by every peripheral
//! - [`display::DisplayPanel`] - pixel output, acceleration, vsync, backlight
//! - [`touch::TouchPanel`] - multi-point touch sampling

#![no_std]
#![deny(unsafe_code)]

pub mod display;
pub mod error;
pub mod touch;

// Re-export key traits at crate root for convenience
pub use display::{DisplayPanel, Resolution};
pub use error::HalError;
pub use touch::{TouchPanel, TouchPoint, TouchPoints, MAX_TOUCH_POINTS};

/// Lifecycle shared by every peripheral driver handle
///
/// The subsystem registry calls `init` once when the subsystem is brought up
/// and `deinit` when it is torn down. Drivers with no hardware bring-up can
/// return `Ok(())` from both.
pub trait Driver {
    /// Bring the peripheral up
    fn init(&self) -> Result<(), HalError>;

    /// Release the peripheral
    fn deinit(&self) -> Result<(), HalError>;
}
