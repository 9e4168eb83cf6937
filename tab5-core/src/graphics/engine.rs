//! Graphics engine facade
//!
//! The immediate-mode UI engine is consumed through [`GraphicsEngine`]. The
//! engine owns widget state and the dirty-region bookkeeping; this crate
//! owns the frame memory, the render lock and the drivers. During a pump
//! the engine renders into the lent [`FrameBuffers`] and calls back into
//! [`EngineDrivers`] to push dirty rectangles to the panel and to sample the
//! pointer.

use alloc::sync::Arc;

use portable_atomic::{AtomicU32, Ordering};

use super::buffer::FrameBuffers;
use crate::error::Error;

/// Inclusive rectangle in panel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Area {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl Area {
    pub const fn new(x1: u16, y1: u16, x2: u16, y2: u16) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u16 {
        self.x2 - self.x1 + 1
    }

    pub fn height(&self) -> u16 {
        self.y2 - self.y1 + 1
    }

    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }
}

/// Pointer sample reported to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PointerState {
    #[default]
    Released,
    Pressed { x: u16, y: u16 },
}

/// Display geometry handed to the engine at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayRegistration {
    /// Horizontal resolution
    pub hor_res: u16,
    /// Vertical resolution
    pub ver_res: u16,
    /// Pixels per frame buffer
    pub buffer_pixels: usize,
    /// One or two buffers
    pub buffer_count: usize,
    /// Engine should call `wait_vsync` before flushing
    pub vsync: bool,
}

/// Flush completion flag
///
/// Created by the engine per flush; the driver side must call
/// [`complete`](Self::complete) before returning, or the engine considers
/// the buffer still in flight.
#[derive(Debug, Default)]
pub struct FlushCompletion {
    done: bool,
}

impl FlushCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the flushed buffer as reusable
    pub fn complete(&mut self) {
        self.done = true;
    }

    pub fn is_complete(&self) -> bool {
        self.done
    }
}

/// Engine millisecond clock
///
/// Shared between the engine and the tick source. Advancing it is a single
/// atomic add, so it is safe to call without the render lock.
#[derive(Debug, Clone, Default)]
pub struct EngineClock {
    ms: Arc<AtomicU32>,
}

impl EngineClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance engine time, wrapping at `u32::MAX`
    pub fn advance(&self, ms: u32) {
        self.ms.fetch_add(ms, Ordering::Relaxed);
    }

    /// Current engine time in milliseconds
    pub fn now_ms(&self) -> u32 {
        self.ms.load(Ordering::Relaxed)
    }
}

/// Driver callbacks invoked synchronously from inside [`GraphicsEngine::pump`]
pub trait EngineDrivers {
    /// Write a dirty rectangle to the panel
    ///
    /// `pixels` holds `area.pixel_count()` pixels. `done` must be completed
    /// before returning.
    fn flush(&mut self, area: &Area, pixels: &[u8], done: &mut FlushCompletion);

    /// Block until vertical sync, bounded
    fn wait_vsync(&mut self);

    /// Sample the pointer
    fn read_pointer(&mut self) -> PointerState;
}

/// Immediate-mode UI engine
pub trait GraphicsEngine {
    /// Top-level drawable surface (a screen)
    type Canvas;

    /// Register the display with its buffer geometry
    fn register_display(&mut self, registration: DisplayRegistration) -> Result<(), Error>;

    /// Register the pointer input device
    fn register_input(&mut self) -> Result<(), Error>;

    /// Get the clock the tick source advances
    fn clock(&self) -> EngineClock;

    /// Run timers and animations, render and flush dirty regions
    ///
    /// Returns the number of milliseconds until the engine next needs to
    /// run.
    fn pump(&mut self, frame: &mut FrameBuffers, drivers: &mut dyn EngineDrivers) -> u32;

    /// Mark the whole active canvas dirty
    fn invalidate(&mut self);

    /// Create a new canvas
    fn create_canvas(&mut self) -> Option<Self::Canvas>;

    /// Make `canvas` the active one
    fn load_canvas(&mut self, canvas: &Self::Canvas);
}
