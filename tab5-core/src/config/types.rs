//! Configuration type definitions
//!
//! Defaults match the M5Stack Tab5 board: 1280x720 RGB565 panel, 32MB PSRAM,
//! dual-core ESP32-P4 with the UI pinned to core 1.

use core::fmt;

use crate::error::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Panel width in pixels
pub const DEFAULT_WIDTH: u16 = 1280;

/// Panel height in pixels
pub const DEFAULT_HEIGHT: u16 = 720;

/// RGB565
pub const DEFAULT_BYTES_PER_PIXEL: u8 = 2;

/// Lines per frame buffer (partial rendering)
pub const DEFAULT_BUFFER_LINES: u16 = 120;

/// Engine clock period
pub const DEFAULT_TICK_PERIOD_MS: u8 = 5;

/// Memory region a buffer is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryRegion {
    /// External PSRAM: large, slower, preferred for frame memory
    #[default]
    External,
    /// Internal DMA-capable SRAM: small, fast, fallback
    Internal,
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryRegion::External => f.write_str("external"),
            MemoryRegion::Internal => f.write_str("internal"),
        }
    }
}

/// Scheduling parameters for a long-lived task
///
/// Interpreted by the platform spawner: `core` selects the executor the task
/// is pinned to, `priority` the executor's interrupt priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TaskConfig {
    /// Task priority (higher runs first)
    pub priority: u8,
    /// CPU core affinity
    pub core: u8,
    /// Stack size in bytes
    pub stack_size: u32,
}

impl TaskConfig {
    /// Main application task: `setup()` then `run_once()` forever
    pub const APP: TaskConfig = TaskConfig {
        priority: 1,
        core: 1,
        stack_size: 8 * 1024,
    };

    /// Render task
    pub const RENDER: TaskConfig = TaskConfig {
        priority: 2,
        core: 1,
        stack_size: 8 * 1024,
    };
}

/// Which subsystems the framework brings up at boot
///
/// Power management is always initialized. Connectivity is brought up on
/// demand by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AutoInit {
    pub display: bool,
    pub touch: bool,
    pub sensor: bool,
    /// Audio is initialized on demand by default
    pub audio: bool,
    pub graphics: bool,
}

impl Default for AutoInit {
    fn default() -> Self {
        Self {
            display: true,
            touch: true,
            sensor: true,
            audio: false,
            graphics: true,
        }
    }
}

/// Graphics integration configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GraphicsConfig {
    /// Display width in pixels
    pub width: u16,
    /// Display height in pixels
    pub height: u16,
    /// Bytes per pixel of the native color format
    pub bytes_per_pixel: u8,
    /// Lines per frame buffer
    ///
    /// Trades memory for flush granularity; `height` gives full-frame
    /// buffers.
    pub buffer_lines: u16,
    /// Allocate a second buffer so rendering overlaps flushing
    pub double_buffer: bool,
    /// Use the 2D accelerator for flushes
    pub accelerated: bool,
    /// Gate flushes on vertical sync
    pub vsync: bool,
    /// Preferred region for frame buffers
    pub memory: MemoryRegion,
    /// Render task scheduling
    pub render_task: TaskConfig,
    /// Engine clock period (ms)
    pub tick_period_ms: u8,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            bytes_per_pixel: DEFAULT_BYTES_PER_PIXEL,
            buffer_lines: DEFAULT_BUFFER_LINES,
            double_buffer: true,
            accelerated: true,
            vsync: true,
            memory: MemoryRegion::External,
            render_task: TaskConfig::RENDER,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
        }
    }
}

impl GraphicsConfig {
    /// Bytes in one frame buffer
    pub fn buffer_bytes(&self) -> usize {
        self.width as usize * self.buffer_lines as usize * self.bytes_per_pixel as usize
    }

    /// Number of frame buffers to allocate
    pub fn buffer_count(&self) -> usize {
        if self.double_buffer {
            2
        } else {
            1
        }
    }

    /// Total frame memory requested by `begin()`
    pub fn total_buffer_bytes(&self) -> usize {
        self.buffer_bytes() * self.buffer_count()
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), Error> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidArgument);
        }
        if self.buffer_lines == 0 || self.buffer_lines > self.height {
            return Err(Error::InvalidArgument);
        }
        if !matches!(self.bytes_per_pixel, 2..=4) {
            return Err(Error::InvalidArgument);
        }
        if self.tick_period_ms == 0 {
            return Err(Error::InvalidArgument);
        }
        // Sizes must fit the 32-bit address space of the target
        if self.checked_total_bytes().is_none() {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    fn checked_total_bytes(&self) -> Option<u32> {
        u32::from(self.width)
            .checked_mul(u32::from(self.buffer_lines))?
            .checked_mul(u32::from(self.bytes_per_pixel))?
            .checked_mul(self.buffer_count() as u32)
    }
}

/// Framework boot configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameworkConfig {
    /// Subsystems brought up by `Framework::init`
    pub auto_init: AutoInit,
    /// Allow allocations from external PSRAM
    pub external_memory: bool,
    /// Main application task scheduling
    pub app_task: TaskConfig,
    /// Graphics integration settings
    pub graphics: GraphicsConfig,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            auto_init: AutoInit::default(),
            external_memory: true,
            app_task: TaskConfig::APP,
            graphics: GraphicsConfig::default(),
        }
    }
}

impl FrameworkConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), Error> {
        if self.app_task.stack_size == 0 {
            return Err(Error::InvalidArgument);
        }
        self.graphics.validate()
    }

    /// Graphics settings with the framework-wide memory policy applied
    ///
    /// External memory disabled at the framework level forces internal
    /// frame buffers.
    pub fn effective_graphics(&self) -> GraphicsConfig {
        let mut graphics = self.graphics;
        if !self.external_memory {
            graphics.memory = MemoryRegion::Internal;
        }
        graphics
    }
}
