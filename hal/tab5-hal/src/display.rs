//! Display panel contract
//!
//! Pixel data is passed as raw bytes in the panel's native format
//! (RGB565 little-endian on the Tab5). Coordinates are in panel pixels.

use crate::{Driver, HalError};

/// Panel resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Resolution {
    pub width: u16,
    pub height: u16,
}

/// Display panel handle
///
/// All methods must be callable from the render task while the render lock
/// is held; implementations must not call back into the graphics engine.
pub trait DisplayPanel: Driver {
    /// Enable scan-out and the backlight
    fn start(&self) -> Result<(), HalError>;

    /// Disable scan-out
    fn stop(&self) -> Result<(), HalError>;

    /// Get the native panel resolution
    fn resolution(&self) -> Resolution;

    /// Copy a rectangle of pixels to the panel without acceleration
    ///
    /// - `x`, `y`: top-left corner on the panel
    /// - `width`, `height`: rectangle size
    /// - `pixels`: `width * height` pixels, row-major
    fn draw_bitmap(
        &self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Result<(), HalError>;

    /// Blend a rectangle of pixels onto the panel using the 2D accelerator
    ///
    /// `alpha` of 255 is an opaque copy.
    fn blend(
        &self,
        dst_x: u16,
        dst_y: u16,
        src: &[u8],
        width: u16,
        height: u16,
        alpha: u8,
    ) -> Result<(), HalError>;

    /// Block until the next vertical sync pulse, or `timeout_ms` elapses
    fn wait_vsync(&self, timeout_ms: u32) -> Result<(), HalError>;

    /// Set the backlight level (0-255)
    fn set_backlight(&self, level: u8) -> Result<(), HalError>;

    /// Get the current backlight level (0-255)
    fn backlight(&self) -> u8;
}
