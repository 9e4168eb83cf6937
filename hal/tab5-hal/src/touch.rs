//! Touch panel contract

use heapless::Vec;

use crate::{Driver, HalError};

/// Maximum simultaneous touch points reported by the controller
pub const MAX_TOUCH_POINTS: usize = 10;

/// Bounded set of points returned by one sample
pub type TouchPoints = Vec<TouchPoint, MAX_TOUCH_POINTS>;

/// A single sampled touch point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
    /// X coordinate in panel pixels
    pub x: u16,
    /// Y coordinate in panel pixels
    pub y: u16,
    /// Contact pressure (0-255), 0 means no contact
    pub pressure: u8,
    /// Contact area size
    pub size: u8,
    /// Tracking id assigned by the controller
    pub id: u8,
    /// Controller marked this slot as populated
    pub valid: bool,
}

impl TouchPoint {
    /// Create a pressed point at the given coordinates
    pub const fn pressed(x: u16, y: u16, pressure: u8) -> Self {
        Self {
            x,
            y,
            pressure,
            size: 0,
            id: 0,
            valid: true,
        }
    }

    /// A point counts as a real contact only if the slot is populated
    /// and pressure is non-zero
    pub fn is_valid(&self) -> bool {
        self.valid && self.pressure > 0
    }
}

/// Touch panel handle
pub trait TouchPanel: Driver {
    /// Start sampling
    fn start(&self) -> Result<(), HalError>;

    /// Stop sampling
    fn stop(&self) -> Result<(), HalError>;

    /// Read the current contacts
    ///
    /// `points` is cleared and then filled with at most
    /// [`MAX_TOUCH_POINTS`] entries.
    fn read_points(&self, points: &mut TouchPoints) -> Result<(), HalError>;
}
