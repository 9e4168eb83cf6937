//! Render task
//!
//! The one loop that drives the engine:
//!
//! ```text
//! loop {
//!     lock ─► pump (flushes + input reads happen in here) ─► count ─► unlock
//!     sleep(engine hint, clamped)
//! }
//! ```
//!
//! The lock is held for the whole pump and released before sleeping, so the
//! application task can take it between frames.

use alloc::sync::Arc;

use embassy_time::{with_timeout, Duration, Instant};
use tab5_hal::{DisplayPanel, TouchPanel};

use super::buffer::FrameBuffers;
use super::engine::{Area, EngineDrivers, FlushCompletion, GraphicsEngine, PointerState};
use super::flush::FlushBridge;
use super::input::InputBridge;
use super::integration::RenderShared;
use super::stats::{PerfCounters, PerformanceStats};
use crate::error::Error;

/// Shortest sleep between pumps
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Longest sleep between pumps, bounds input latency when the engine
/// reports nothing pending
pub const MAX_DELAY: Duration = Duration::from_millis(500);

/// Sleep after failing to get the render lock
pub const FALLBACK_DELAY: Duration = Duration::from_millis(10);

/// Lock wait slice; the stop flag is rechecked between slices
pub const LOCK_SLICE: Duration = Duration::from_millis(500);

/// Flush and input bridges handed to the engine during a pump
pub struct Bridges<D: ?Sized, T: ?Sized> {
    pub flush: FlushBridge<D>,
    pub input: InputBridge<T>,
}

impl<D, T> EngineDrivers for Bridges<D, T>
where
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    fn flush(&mut self, area: &Area, pixels: &[u8], done: &mut FlushCompletion) {
        self.flush.flush(area, pixels, done);
    }

    fn wait_vsync(&mut self) {
        self.flush.wait_vsync();
    }

    fn read_pointer(&mut self) -> PointerState {
        self.input.read()
    }
}

/// Everything guarded by the render lock
pub struct RenderState<E, D: ?Sized, T: ?Sized> {
    pub(crate) engine: E,
    pub(crate) bridges: Bridges<D, T>,
    pub(crate) frame: Option<FrameBuffers>,
}

impl<E, D, T> RenderState<E, D, T>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    pub(crate) fn new(engine: E, bridges: Bridges<D, T>) -> Self {
        Self {
            engine,
            bridges,
            frame: None,
        }
    }

    /// One engine pump; returns the engine's delay hint in milliseconds
    pub fn pump(&mut self) -> Result<u32, Error> {
        let frame = self.frame.as_mut().ok_or(Error::InvalidState)?;
        Ok(self.engine.pump(frame, &mut self.bridges))
    }

    /// Frame memory currently held
    pub fn frame_bytes(&self) -> usize {
        self.frame.as_ref().map_or(0, FrameBuffers::total_bytes)
    }
}

/// Clamp an engine delay hint to the render loop bounds
pub fn clamp_delay(hint_ms: u32) -> Duration {
    Duration::from_millis(hint_ms as u64).clamp(MIN_DELAY, MAX_DELAY)
}

/// Render task
pub struct RenderTask<E, D: ?Sized, T: ?Sized> {
    shared: Arc<RenderShared<E, D, T>>,
}

impl<E, D, T> RenderTask<E, D, T>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    pub(crate) fn new(shared: Arc<RenderShared<E, D, T>>) -> Self {
        Self { shared }
    }

    /// Run until stopped
    pub async fn run(self) {
        let shared = &*self.shared;
        shared.render.supervise(render_loop(shared)).await;
    }
}

async fn render_loop<E, D, T>(shared: &RenderShared<E, D, T>)
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    info!("Render task started");
    let mut counters = PerfCounters::new(Instant::now());

    while !shared.render.should_stop() {
        let delay = match with_timeout(LOCK_SLICE, shared.state.lock()).await {
            Ok(mut state) => {
                let started = Instant::now();
                let result = state.pump();
                let now = Instant::now();

                if counters.record(now, now.saturating_duration_since(started)) {
                    shared.stats.publish(PerformanceStats {
                        fps_avg: counters.fps_avg(),
                        load_percent: counters.load_percent(),
                        frame_buffer_bytes: state.frame_bytes(),
                        flush_fallbacks: state.bridges.flush.fallbacks(),
                    });
                }
                drop(state);

                match result {
                    Ok(hint) => clamp_delay(hint),
                    Err(err) => {
                        warn!("Render pump skipped: {}", err);
                        FALLBACK_DELAY
                    }
                }
            }
            Err(_) => {
                debug!("Render lock busy, retrying");
                FALLBACK_DELAY
            }
        };

        shared.render.sleep(delay).await;
    }

    info!("Render task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_hint_clamped() {
        assert_eq!(clamp_delay(0), MIN_DELAY);
        assert_eq!(clamp_delay(16), Duration::from_millis(16));
        assert_eq!(clamp_delay(u32::MAX), MAX_DELAY);
    }
}
