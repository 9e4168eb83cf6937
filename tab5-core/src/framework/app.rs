//! Application task
//!
//! Runs the user's `setup()` once, then `run_once()` until stopped,
//! yielding to other tasks between iterations.

use alloc::sync::Arc;
use core::future::Future;

use embassy_futures::yield_now;
use portable_atomic::{AtomicBool, Ordering};

use crate::task::TaskControl;

/// User entry points
pub trait Application {
    /// One-time setup, after the framework has initialized
    fn setup(&mut self) -> impl Future<Output = ()>;

    /// One iteration of the main loop
    fn run_once(&mut self) -> impl Future<Output = ()>;
}

/// Main application task
pub struct AppTask<A> {
    app: A,
    control: Arc<TaskControl>,
    setup_done: Arc<AtomicBool>,
}

impl<A: Application> AppTask<A> {
    pub(crate) fn new(app: A, control: Arc<TaskControl>, setup_done: Arc<AtomicBool>) -> Self {
        Self {
            app,
            control,
            setup_done,
        }
    }

    /// Run until stopped
    pub async fn run(mut self) {
        let control = self.control.clone();
        control.supervise(self.main_loop()).await;
    }

    async fn main_loop(&mut self) {
        info!("Starting user setup");
        self.app.setup().await;
        self.setup_done.store(true, Ordering::Release);
        info!("User setup complete, entering main loop");

        while !self.control.should_stop() {
            self.app.run_once().await;
            yield_now().await;
        }

        info!("Main loop stopped");
    }
}
