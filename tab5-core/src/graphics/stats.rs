//! Render performance counters

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Averaging window
pub const STATS_WINDOW: Duration = Duration::from_secs(1);

/// Snapshot of render performance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PerformanceStats {
    /// Pump cycles completed in the last full window
    pub fps_avg: u16,
    /// Share of the last full window spent pumping, 0-100
    pub load_percent: u8,
    /// Frame memory held by the render context
    pub frame_buffer_bytes: usize,
    /// Accelerated flushes that fell back to a bitmap write
    pub flush_fallbacks: u32,
}

/// Rolling counters owned by the render task
pub struct PerfCounters {
    frames: u32,
    busy_us: u64,
    window_start: Instant,
    fps_avg: u16,
    load_percent: u8,
}

impl PerfCounters {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            busy_us: 0,
            window_start: now,
            fps_avg: 0,
            load_percent: 0,
        }
    }

    /// Record one pump cycle that ended at `now` and took `busy`
    ///
    /// Returns true when a window closed and the averages were updated.
    pub fn record(&mut self, now: Instant, busy: Duration) -> bool {
        self.frames = self.frames.saturating_add(1);
        self.busy_us = self.busy_us.saturating_add(busy.as_micros());

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < STATS_WINDOW {
            return false;
        }

        self.fps_avg = self.frames.min(u16::MAX as u32) as u16;
        let elapsed_us = elapsed.as_micros().max(1);
        self.load_percent = (self.busy_us.saturating_mul(100) / elapsed_us).min(100) as u8;

        self.frames = 0;
        self.busy_us = 0;
        self.window_start = now;
        true
    }

    pub fn fps_avg(&self) -> u16 {
        self.fps_avg
    }

    pub fn load_percent(&self) -> u8 {
        self.load_percent
    }
}

/// Latest published snapshot, readable without the render lock
pub struct StatsCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<PerformanceStats>>,
}

impl Default for StatsCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(PerformanceStats {
                fps_avg: 0,
                load_percent: 0,
                frame_buffer_bytes: 0,
                flush_fallbacks: 0,
            })),
        }
    }

    pub fn publish(&self, stats: PerformanceStats) {
        self.inner.lock(|cell| cell.set(stats));
    }

    pub fn get(&self) -> PerformanceStats {
        self.inner.lock(|cell| cell.get())
    }

    /// Update only the frame memory figure
    pub fn set_frame_buffer_bytes(&self, bytes: usize) {
        self.inner.lock(|cell| {
            let mut stats = cell.get();
            stats.frame_buffer_bytes = bytes;
            cell.set(stats);
        });
    }
}
