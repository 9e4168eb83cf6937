//! Tick source for the engine clock
//!
//! Periodic task whose only job is advancing the engine clock by the
//! configured period. It never takes the render lock and never blocks, so a
//! long pump cannot delay engine time.

use alloc::sync::Arc;

use embassy_time::{Duration, Ticker};

use super::engine::EngineClock;
use crate::task::TaskControl;

/// Tick source task
pub struct TickTask {
    clock: EngineClock,
    period_ms: u32,
    control: Arc<TaskControl>,
}

impl TickTask {
    pub fn new(clock: EngineClock, period_ms: u32, control: Arc<TaskControl>) -> Self {
        Self {
            clock,
            period_ms,
            control,
        }
    }

    /// Advance the engine clock by one period
    pub fn on_tick(&self) {
        self.clock.advance(self.period_ms);
    }

    /// Run until stopped
    pub async fn run(self) {
        let control = self.control.clone();
        control.supervise(self.tick_loop()).await;
    }

    async fn tick_loop(&self) {
        debug!("Tick source started ({} ms)", self.period_ms);

        let mut ticker = Ticker::every(Duration::from_millis(self.period_ms as u64));
        while self.control.interruptible(ticker.next()).await.is_some() {
            self.on_tick();
        }

        debug!("Tick source stopped");
    }
}
