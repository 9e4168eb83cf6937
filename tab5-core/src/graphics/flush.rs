//! Flush bridge
//!
//! Delivers rendered dirty rectangles to the display panel. Runs inside the
//! engine's pump, with the render lock held.

use alloc::sync::Arc;

use tab5_hal::{DisplayPanel, HalError};

use super::engine::{Area, FlushCompletion};

/// Upper bound on a vertical sync wait
pub const VSYNC_TIMEOUT_MS: u32 = 20;

/// Opaque blend
const OPAQUE: u8 = 255;

pub struct FlushBridge<D: ?Sized> {
    display: Arc<D>,
    accelerated: bool,
    vsync: bool,
    fallbacks: u32,
}

impl<D: DisplayPanel + ?Sized> FlushBridge<D> {
    pub fn new(display: Arc<D>, accelerated: bool, vsync: bool) -> Self {
        Self {
            display,
            accelerated,
            vsync,
            fallbacks: 0,
        }
    }

    /// Write `pixels` to `area` and signal completion
    ///
    /// With acceleration enabled a failed blend is retried once as a plain
    /// bitmap write. Completion is signalled whatever the outcome.
    pub fn flush(&mut self, area: &Area, pixels: &[u8], done: &mut FlushCompletion) {
        self.write(area, pixels);
        done.complete();
    }

    fn write(&mut self, area: &Area, pixels: &[u8]) {
        let width = area.width();
        let height = area.height();

        if self.accelerated {
            match self
                .display
                .blend(area.x1, area.y1, pixels, width, height, OPAQUE)
            {
                Ok(()) => return,
                Err(err) => {
                    warn!("Accelerated blend failed ({}), using software fallback", err);
                    self.fallbacks = self.fallbacks.wrapping_add(1);
                }
            }
        }

        if let Err(err) = self
            .display
            .draw_bitmap(area.x1, area.y1, width, height, pixels)
        {
            error!("Bitmap write failed: {}", err);
        }
    }

    /// Wait for vertical sync if enabled
    ///
    /// A missed pulse only delays the flush by [`VSYNC_TIMEOUT_MS`].
    pub fn wait_vsync(&mut self) {
        if !self.vsync {
            return;
        }
        match self.display.wait_vsync(VSYNC_TIMEOUT_MS) {
            Ok(()) | Err(HalError::Timeout) => {}
            Err(err) => debug!("Vsync wait failed: {}", err),
        }
    }

    pub fn set_accelerated(&mut self, enabled: bool) {
        self.accelerated = enabled;
    }

    /// Number of accelerated flushes that fell back to a bitmap write
    pub fn fallbacks(&self) -> u32 {
        self.fallbacks
    }
}
