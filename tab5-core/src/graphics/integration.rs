//! Graphics integration
//!
//! Binds the engine to the display and touch panels: owns the frame
//! memory, the render lock, the tick source and the render task, and
//! sequences their startup and teardown.
//!
//! # Lifecycle
//!
//! ```text
//!         begin()            start()
//!  Idle ───────────► Begun ───────────► Started
//!   ▲                  ▲                   │
//!   │      end()       │      stop()       │
//!   └──────────────────┴───────────────────┘
//! ```
//!
//! Teardown is strict reverse order: render task, tick source, drivers,
//! frame buffers. The render lock itself goes away with the last handle.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{with_timeout, Duration};
use portable_atomic::{AtomicU8, Ordering};
use tab5_hal::{DisplayPanel, TouchPanel};

use super::buffer::{FrameBuffers, RegionAllocator};
use super::engine::{DisplayRegistration, EngineClock, GraphicsEngine};
use super::flush::FlushBridge;
use super::input::InputBridge;
use super::render::{Bridges, RenderState, RenderTask};
use super::stats::{PerformanceStats, StatsCell};
use super::tick::TickTask;
use crate::config::{FrameworkConfig, GraphicsConfig};
use crate::error::Error;
use crate::subsystem::{Subsystem, SubsystemFuture};
use crate::task::{TaskControl, TaskSpawner};

/// Bound on lock waits made on behalf of canvas and refresh calls
pub const API_LOCK_TIMEOUT_MS: u32 = 1000;

/// Grace period for the render task to notice a stop
///
/// Covers one lock wait slice plus a pump.
pub const RENDER_STOP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Grace period for the tick source to notice a stop
pub const TICK_STOP_TIMEOUT: Duration = Duration::from_millis(100);

/// Hook fired after a successful start
pub type ReadyHook = Box<dyn FnMut()>;

/// Graphics integration lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum GraphicsPhase {
    /// No frame memory
    Idle = 0,
    /// Buffers allocated and bridges registered
    Begun = 1,
    /// Drivers, tick source and render task running
    Started = 2,
}

impl GraphicsPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => GraphicsPhase::Begun,
            2 => GraphicsPhase::Started,
            _ => GraphicsPhase::Idle,
        }
    }
}

/// State shared by the integration, its handles and the render task
pub struct RenderShared<E, D: ?Sized, T: ?Sized> {
    pub(crate) state: Mutex<CriticalSectionRawMutex, RenderState<E, D, T>>,
    pub(crate) render: TaskControl,
    pub(crate) stats: StatsCell,
    phase: AtomicU8,
}

impl<E, D: ?Sized, T: ?Sized> RenderShared<E, D, T> {
    fn phase(&self) -> GraphicsPhase {
        GraphicsPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: GraphicsPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Graphics integration
pub struct Graphics<E, D: ?Sized, T: ?Sized> {
    shared: Arc<RenderShared<E, D, T>>,
    tick: Arc<TaskControl>,
    clock: EngineClock,
    display: Arc<D>,
    touch: Arc<T>,
    config: GraphicsConfig,
    ready_hook: Option<ReadyHook>,
}

impl<E, D, T> Graphics<E, D, T>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    /// Create the integration around an engine and the two panel handles
    pub fn new(
        engine: E,
        display: Arc<D>,
        touch: Arc<T>,
        config: GraphicsConfig,
    ) -> Result<Self, Error> {
        config.validate()?;

        let clock = engine.clock();
        let bridges = Bridges {
            flush: FlushBridge::new(display.clone(), config.accelerated, config.vsync),
            input: InputBridge::new(touch.clone()),
        };
        let shared = Arc::new(RenderShared {
            state: Mutex::new(RenderState::new(engine, bridges)),
            render: TaskControl::new(),
            stats: StatsCell::new(),
            phase: AtomicU8::new(GraphicsPhase::Idle as u8),
        });

        Ok(Self {
            shared,
            tick: Arc::new(TaskControl::new()),
            clock,
            display,
            touch,
            config,
            ready_hook: None,
        })
    }

    /// Create the integration with the framework's memory policy applied
    pub fn from_framework(
        engine: E,
        display: Arc<D>,
        touch: Arc<T>,
        framework: &FrameworkConfig,
    ) -> Result<Self, Error> {
        Self::new(engine, display, touch, framework.effective_graphics())
    }

    /// Allocate frame memory and register the display and input with the
    /// engine
    ///
    /// No-op if already begun. The configured size must match the panel's
    /// native resolution. On failure nothing stays allocated.
    pub async fn begin<A>(&mut self, allocator: &A) -> Result<(), Error>
    where
        A: RegionAllocator + ?Sized,
    {
        if self.phase() != GraphicsPhase::Idle {
            warn!("Graphics already initialized");
            return Ok(());
        }

        info!(
            "Initializing graphics: {}x{}, {} lines per buffer",
            self.config.width,
            self.config.height,
            self.config.buffer_lines
        );

        let native = self.display.resolution();
        if native.width != self.config.width || native.height != self.config.height {
            error!(
                "Configured {}x{} does not match the {}x{} panel",
                self.config.width,
                self.config.height,
                native.width,
                native.height
            );
            return Err(Error::InvalidArgument);
        }

        let frame = FrameBuffers::allocate(&self.config, allocator)?;
        let total = frame.total_bytes();

        let registration = DisplayRegistration {
            hor_res: self.config.width,
            ver_res: self.config.height,
            buffer_pixels: self.config.width as usize * self.config.buffer_lines as usize,
            buffer_count: frame.count(),
            vsync: self.config.vsync,
        };

        {
            let mut state = self.shared.state.lock().await;
            state.engine.register_display(registration)?;
            state.engine.register_input()?;
            state.frame = Some(frame);
        }

        self.shared.stats.set_frame_buffer_bytes(total);
        self.shared.set_phase(GraphicsPhase::Begun);
        info!("Graphics initialized ({} bytes of frame memory)", total);
        Ok(())
    }

    /// Start the drivers, the tick source and the render task
    ///
    /// The first failure aborts the sequence and is returned; whatever was
    /// already started is stopped again, so `start` can be retried at once.
    pub async fn start<S>(&mut self, spawner: &S) -> Result<(), Error>
    where
        S: TaskSpawner<RenderTask<E, D, T>> + TaskSpawner<TickTask>,
    {
        match self.phase() {
            GraphicsPhase::Idle => return Err(Error::InvalidState),
            GraphicsPhase::Started => {
                warn!("Graphics already started");
                return Ok(());
            }
            GraphicsPhase::Begun => {}
        }

        self.display.start()?;
        if let Err(err) = self.touch.start() {
            self.stop_display();
            return Err(err.into());
        }

        if let Err(err) = self.spawn_tasks(spawner) {
            // Tick source may already be running
            self.tick.shutdown(TICK_STOP_TIMEOUT).await;
            self.stop_drivers();
            return Err(err);
        }

        self.shared.set_phase(GraphicsPhase::Started);
        info!("Graphics started");

        if let Some(hook) = self.ready_hook.as_mut() {
            hook();
        }
        Ok(())
    }

    /// Spawn the tick source and the render task
    ///
    /// The tick source shares the render task's placement.
    fn spawn_tasks<S>(&self, spawner: &S) -> Result<(), Error>
    where
        S: TaskSpawner<RenderTask<E, D, T>> + TaskSpawner<TickTask>,
    {
        let placement = &self.config.render_task;
        self.tick.arm()?;
        let tick = TickTask::new(
            self.clock.clone(),
            self.config.tick_period_ms as u32,
            self.tick.clone(),
        );
        if let Err(err) = TaskSpawner::<TickTask>::spawn(spawner, tick, placement) {
            error!("Failed to start tick source");
            self.tick.disarm();
            return Err(err.into());
        }

        self.shared.render.arm()?;
        let render = RenderTask::new(self.shared.clone());
        if let Err(err) = TaskSpawner::<RenderTask<E, D, T>>::spawn(spawner, render, placement) {
            error!("Failed to spawn render task");
            self.shared.render.disarm();
            return Err(err.into());
        }
        Ok(())
    }

    /// Stop the render task, the tick source and the drivers
    ///
    /// Best-effort, never fails. No-op unless started.
    pub async fn stop(&mut self) {
        if self.phase() != GraphicsPhase::Started {
            return;
        }

        info!("Stopping graphics");
        self.shared.render.shutdown(RENDER_STOP_TIMEOUT).await;
        self.tick.shutdown(TICK_STOP_TIMEOUT).await;
        self.stop_drivers();

        self.shared.set_phase(GraphicsPhase::Begun);
    }

    /// Stop and release the frame memory
    pub async fn end(&mut self) {
        self.stop().await;
        if self.phase() != GraphicsPhase::Begun {
            return;
        }

        {
            let mut state = self.shared.state.lock().await;
            state.frame = None;
        }
        self.shared.stats.set_frame_buffer_bytes(0);
        self.shared.set_phase(GraphicsPhase::Idle);
        info!("Graphics deinitialized");
    }

    fn stop_drivers(&self) {
        if let Err(err) = self.touch.stop() {
            warn!("Touch stop failed: {}", err);
        }
        self.stop_display();
    }

    fn stop_display(&self) {
        if let Err(err) = self.display.stop() {
            warn!("Display stop failed: {}", err);
        }
    }

    /// Set the hook fired after every successful start
    pub fn on_ready<F>(&mut self, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.ready_hook = Some(Box::new(hook));
    }

    /// Get a handle for the application task
    pub fn handle(&self) -> GraphicsHandle<E, D, T> {
        GraphicsHandle {
            shared: self.shared.clone(),
            display: self.display.clone(),
        }
    }

    pub fn phase(&self) -> GraphicsPhase {
        self.shared.phase()
    }

    /// Check if the render pipeline is running
    pub fn is_ready(&self) -> bool {
        self.phase() == GraphicsPhase::Started
    }

    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Engine clock advanced by the tick source
    pub fn clock(&self) -> &EngineClock {
        &self.clock
    }
}

/// Exclusive access to the engine, held until dropped
pub struct RenderGuard<'a, E, D: ?Sized, T: ?Sized> {
    guard: MutexGuard<'a, CriticalSectionRawMutex, RenderState<E, D, T>>,
}

impl<E, D: ?Sized, T: ?Sized> RenderGuard<'_, E, D, T> {
    /// Release the render lock
    pub fn unlock(self) {}

    pub(crate) fn state_mut(&mut self) -> &mut RenderState<E, D, T> {
        &mut self.guard
    }
}

impl<E, D: ?Sized, T: ?Sized> Deref for RenderGuard<'_, E, D, T> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.guard.engine
    }
}

impl<E, D: ?Sized, T: ?Sized> DerefMut for RenderGuard<'_, E, D, T> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.guard.engine
    }
}

/// Application-side handle to the graphics integration
///
/// Every engine mutation from outside the render task must go through
/// [`lock`](Self::lock).
pub struct GraphicsHandle<E, D: ?Sized, T: ?Sized> {
    shared: Arc<RenderShared<E, D, T>>,
    display: Arc<D>,
}

impl<E, D: ?Sized, T: ?Sized> Clone for GraphicsHandle<E, D, T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            display: self.display.clone(),
        }
    }
}

impl<E, D, T> GraphicsHandle<E, D, T>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
{
    /// Take the render lock, waiting as long as needed
    pub async fn lock(&self) -> RenderGuard<'_, E, D, T> {
        RenderGuard {
            guard: self.shared.state.lock().await,
        }
    }

    /// Take the render lock, waiting at most `timeout_ms`
    pub async fn lock_timeout(&self, timeout_ms: u32) -> Result<RenderGuard<'_, E, D, T>, Error> {
        let guard = with_timeout(
            Duration::from_millis(timeout_ms as u64),
            self.shared.state.lock(),
        )
        .await
        .map_err(|_| Error::Timeout)?;
        Ok(RenderGuard { guard })
    }

    /// Take the render lock if it is free
    pub fn try_lock(&self) -> Option<RenderGuard<'_, E, D, T>> {
        self.shared
            .state
            .try_lock()
            .ok()
            .map(|guard| RenderGuard { guard })
    }

    /// Create a new canvas
    pub async fn create_canvas(&self) -> Result<E::Canvas, Error> {
        self.require_begun()?;
        let mut engine = self.lock_timeout(API_LOCK_TIMEOUT_MS).await?;
        engine.create_canvas().ok_or(Error::AllocationFailure)
    }

    /// Make `canvas` the active one
    pub async fn load_canvas(&self, canvas: &E::Canvas) -> Result<(), Error> {
        self.require_begun()?;
        let mut engine = self.lock_timeout(API_LOCK_TIMEOUT_MS).await?;
        engine.load_canvas(canvas);
        Ok(())
    }

    /// Force a full redraw of the active canvas
    pub async fn refresh(&self) -> Result<(), Error> {
        self.require_begun()?;
        let mut engine = self.lock_timeout(API_LOCK_TIMEOUT_MS).await?;
        engine.invalidate();
        Ok(())
    }

    /// Enable or disable accelerated flushes
    pub async fn set_acceleration(&self, enabled: bool) -> Result<(), Error> {
        let mut guard = self.lock_timeout(API_LOCK_TIMEOUT_MS).await?;
        guard.state_mut().bridges.flush.set_accelerated(enabled);
        info!("Accelerated flush {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Set the panel backlight (0-255)
    pub fn set_brightness(&self, level: u8) -> Result<(), Error> {
        self.require_begun()?;
        self.display.set_backlight(level)?;
        Ok(())
    }

    /// Get the panel backlight (0-255)
    pub fn brightness(&self) -> Result<u8, Error> {
        self.require_begun()?;
        Ok(self.display.backlight())
    }

    /// Get the latest performance snapshot
    pub fn performance_stats(&self) -> Result<PerformanceStats, Error> {
        self.require_begun()?;
        Ok(self.shared.stats.get())
    }

    /// Check if the render pipeline is running
    pub fn is_ready(&self) -> bool {
        self.shared.phase() == GraphicsPhase::Started
    }

    fn require_begun(&self) -> Result<(), Error> {
        match self.shared.phase() {
            GraphicsPhase::Idle => Err(Error::InvalidState),
            GraphicsPhase::Begun | GraphicsPhase::Started => Ok(()),
        }
    }
}

/// Registry entry for the graphics integration
///
/// Init is `begin` followed by `start`; deinit is `end`.
pub struct GraphicsSubsystem<E, D: ?Sized, T: ?Sized, A, S> {
    graphics: Graphics<E, D, T>,
    allocator: A,
    spawner: S,
}

impl<E, D, T, A, S> GraphicsSubsystem<E, D, T, A, S>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
    A: RegionAllocator,
    S: TaskSpawner<RenderTask<E, D, T>> + TaskSpawner<TickTask>,
{
    pub fn new(graphics: Graphics<E, D, T>, allocator: A, spawner: S) -> Self {
        Self {
            graphics,
            allocator,
            spawner,
        }
    }
}

impl<E, D, T, A, S> Subsystem for GraphicsSubsystem<E, D, T, A, S>
where
    E: GraphicsEngine,
    D: DisplayPanel + ?Sized,
    T: TouchPanel + ?Sized,
    A: RegionAllocator,
    S: TaskSpawner<RenderTask<E, D, T>> + TaskSpawner<TickTask>,
{
    fn init(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move {
            self.graphics.begin(&self.allocator).await?;
            if let Err(err) = self.graphics.start(&self.spawner).await {
                self.graphics.end().await;
                return Err(err);
            }
            Ok(())
        })
    }

    fn deinit(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move {
            self.graphics.end().await;
            Ok(())
        })
    }
}
