//! Subsystem identifiers and lifecycle states
//!
//! Transitions are a pure function of the current state and a
//! [`LifecycleEvent`]. The legal paths are:
//!
//! ```text
//! Uninitialized --Begin--> Initializing --Succeeded--> Ready
//!                               |
//!                               +-------Failed------> Error
//!
//! Ready / Error --Reset--> Uninitialized
//! ```

use alloc::sync::Arc;
use core::fmt;

use portable_atomic::{AtomicU8, Ordering};

use super::events::LifecycleEvent;
use crate::error::Error;

/// Named hardware or software capability with an independent lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SubsystemId {
    /// MIPI-DSI panel
    Display = 0,
    /// Capacitive touch controller
    Touch = 1,
    /// IMU
    Sensor = 2,
    /// Audio codec
    Audio = 3,
    /// PMIC and battery
    Power = 4,
    /// USB host/device
    UsbConnectivity = 5,
    /// Wi-Fi/BLE co-processor
    NetworkConnectivity = 6,
    /// UI engine integration
    Graphics = 7,
}

impl SubsystemId {
    /// Number of subsystems
    pub const COUNT: usize = 8;

    /// All subsystems in index order
    pub const ALL: [SubsystemId; Self::COUNT] = [
        SubsystemId::Display,
        SubsystemId::Touch,
        SubsystemId::Sensor,
        SubsystemId::Audio,
        SubsystemId::Power,
        SubsystemId::UsbConnectivity,
        SubsystemId::NetworkConnectivity,
        SubsystemId::Graphics,
    ];

    /// Index into per-subsystem tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            SubsystemId::Display => "display",
            SubsystemId::Touch => "touch",
            SubsystemId::Sensor => "sensor",
            SubsystemId::Audio => "audio",
            SubsystemId::Power => "power",
            SubsystemId::UsbConnectivity => "usb",
            SubsystemId::NetworkConnectivity => "network",
            SubsystemId::Graphics => "graphics",
        }
    }

    /// Subsystems that must be Ready before this one may initialize
    pub fn dependencies(self) -> &'static [SubsystemId] {
        match self {
            SubsystemId::Graphics => &[SubsystemId::Display, SubsystemId::Touch],
            _ => &[],
        }
    }
}

impl TryFrom<u8> for SubsystemId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        SubsystemId::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::NotSupported)
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of one subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SubsystemState {
    #[default]
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Error = 3,
}

impl SubsystemState {
    /// Check if the subsystem is usable
    pub fn is_ready(&self) -> bool {
        matches!(self, SubsystemState::Ready)
    }

    /// Check if the last initialization failed
    pub fn is_error(&self) -> bool {
        matches!(self, SubsystemState::Error)
    }

    /// Check if an initializer has already run (or is running)
    pub fn is_settled(&self) -> bool {
        !matches!(self, SubsystemState::Uninitialized)
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply to the current state leave it unchanged.
    pub fn transition(self, event: LifecycleEvent) -> Self {
        use LifecycleEvent::*;
        use SubsystemState::*;

        match (self, event) {
            (Uninitialized, Begin) => Initializing,
            (Initializing, Succeeded) => Ready,
            (Initializing, Failed) => Error,

            // Only explicit deinit leaves Ready or Error
            (Ready, Reset) | (Error, Reset) | (Initializing, Reset) => Uninitialized,

            (state, _) => state,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => SubsystemState::Initializing,
            2 => SubsystemState::Ready,
            3 => SubsystemState::Error,
            _ => SubsystemState::Uninitialized,
        }
    }
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubsystemState::Uninitialized => f.write_str("uninitialized"),
            SubsystemState::Initializing => f.write_str("initializing"),
            SubsystemState::Ready => f.write_str("ready"),
            SubsystemState::Error => f.write_str("error"),
        }
    }
}

/// Read-only, non-blocking view of the subsystem state table
///
/// Cheap to clone and safe to read from any task. Only the registry stores
/// into the table.
#[derive(Clone)]
pub struct StateView {
    table: Arc<[AtomicU8; SubsystemId::COUNT]>,
}

impl StateView {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(core::array::from_fn(|_| {
                AtomicU8::new(SubsystemState::Uninitialized as u8)
            })),
        }
    }

    /// Get the current state of a subsystem
    pub fn state(&self, id: SubsystemId) -> SubsystemState {
        SubsystemState::from_raw(self.table[id.index()].load(Ordering::Acquire))
    }

    pub(crate) fn apply(&self, id: SubsystemId, event: LifecycleEvent) -> SubsystemState {
        let next = self.state(id).transition(event);
        self.table[id.index()].store(next as u8, Ordering::Release);
        next
    }
}
