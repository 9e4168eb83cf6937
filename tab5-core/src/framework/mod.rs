//! Framework orchestrator
//!
//! Owns the boot configuration, the subsystem registry and the main
//! application task. Typical bring-up on the board:
//!
//! ```text
//! let mut framework = Framework::new(FrameworkConfig::default())?;
//! framework.register(SubsystemId::Display, DriverSubsystem::new(panel.clone()))?;
//! framework.register(SubsystemId::Touch, DriverSubsystem::new(touch.clone()))?;
//! let graphics = Graphics::from_framework(engine, panel, touch, framework.config())?;
//! framework.register(SubsystemId::Graphics, GraphicsSubsystem::new(graphics, heap, spawner))?;
//! let report = framework.init().await?;
//! framework.start(MyApp::new(ui_handle), &spawner)?;
//! ```

pub mod app;

use alloc::boxed::Box;
use alloc::sync::Arc;

use embassy_time::{Duration, Instant};
use heapless::Vec;
use portable_atomic::{AtomicBool, Ordering};

pub use app::{AppTask, Application};

use crate::config::{AutoInit, FrameworkConfig};
use crate::error::Error;
use crate::subsystem::{Registry, StateView, Subsystem, SubsystemId, SubsystemState};
use crate::task::{TaskControl, TaskPhase, TaskSpawner};

/// Subsystems brought up by `init`, in order
///
/// Graphics comes last because it composes the display and touch handles.
pub const BOOT_ORDER: [SubsystemId; 6] = [
    SubsystemId::Display,
    SubsystemId::Touch,
    SubsystemId::Sensor,
    SubsystemId::Audio,
    SubsystemId::Power,
    SubsystemId::Graphics,
];

/// Grace period for the application task to finish its current iteration
pub const APP_STOP_TIMEOUT: Duration = Duration::from_millis(1000);

/// Framework hook
pub type Hook = Box<dyn FnMut()>;

/// Get the runtime version string
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Check if `id` is brought up at boot under `auto`
///
/// Power is always initialized; connectivity only ever on demand.
pub fn boot_enabled(auto: &AutoInit, id: SubsystemId) -> bool {
    match id {
        SubsystemId::Display => auto.display,
        SubsystemId::Touch => auto.touch,
        SubsystemId::Sensor => auto.sensor,
        SubsystemId::Audio => auto.audio,
        SubsystemId::Power => true,
        SubsystemId::Graphics => auto.graphics,
        SubsystemId::UsbConnectivity | SubsystemId::NetworkConnectivity => false,
    }
}

/// Outcome of a boot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    attempted: Vec<SubsystemId, { SubsystemId::COUNT }>,
    failures: Vec<(SubsystemId, Error), { SubsystemId::COUNT }>,
}

impl BootReport {
    /// Subsystems `init` tried to bring up, in order
    pub fn attempted(&self) -> &[SubsystemId] {
        &self.attempted
    }

    /// Subsystems that failed, with the cause
    pub fn failures(&self) -> &[(SubsystemId, Error)] {
        &self.failures
    }

    /// Check if every attempted subsystem came up
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, id: SubsystemId, result: Result<(), Error>) {
        // Capacity is one slot per subsystem
        let _ = self.attempted.push(id);
        if let Err(err) = result {
            let _ = self.failures.push((id, err));
        }
    }
}

/// Framework orchestrator
pub struct Framework {
    config: FrameworkConfig,
    registry: Registry,
    app: Arc<TaskControl>,
    setup_done: Arc<AtomicBool>,
    initialized: bool,
    boot_time: Option<Instant>,
    init_hook: Option<Hook>,
    ready_hook: Option<Hook>,
}

impl Framework {
    /// Create a framework with nothing initialized
    pub fn new(config: FrameworkConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            config,
            registry: Registry::new(),
            app: Arc::new(TaskControl::new()),
            setup_done: Arc::new(AtomicBool::new(false)),
            initialized: false,
            boot_time: None,
            init_hook: None,
            ready_hook: None,
        })
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// Install the implementation for a subsystem
    pub fn register<S>(&mut self, id: SubsystemId, subsystem: S) -> Result<(), Error>
    where
        S: Subsystem + 'static,
    {
        self.registry.register(id, subsystem)
    }

    /// Hook fired once `init` has finished
    pub fn on_framework_init<F: FnMut() + 'static>(&mut self, hook: F) {
        self.init_hook = Some(Box::new(hook));
    }

    /// Hook fired once the application task is spawned
    pub fn on_framework_ready<F: FnMut() + 'static>(&mut self, hook: F) {
        self.ready_hook = Some(Box::new(hook));
    }

    /// Hook fired with the id and cause of every failed subsystem init
    pub fn on_subsystem_error<F>(&mut self, hook: F)
    where
        F: FnMut(SubsystemId, Error) + 'static,
    {
        self.registry.set_error_hook(hook);
    }

    /// Bring up the auto-init subsystems in boot order
    ///
    /// A failing subsystem does not stop the others; failures are returned
    /// in the report. Calling `init` again is a no-op.
    pub async fn init(&mut self) -> Result<BootReport, Error> {
        let mut report = BootReport::default();
        if self.initialized {
            warn!("Framework already initialized");
            return Ok(report);
        }

        info!("Initializing Tab5 runtime v{}", version());
        self.boot_time = Some(Instant::now());

        for id in BOOT_ORDER {
            if !boot_enabled(&self.config.auto_init, id) {
                continue;
            }
            let result = self.registry.init(id).await;
            report.record(id, result);
        }

        self.initialized = true;
        if let Some(hook) = self.init_hook.as_mut() {
            hook();
        }

        if report.is_clean() {
            info!("Framework initialization complete");
        } else {
            warn!(
                "Framework initialized with {} failed subsystem(s)",
                report.failures().len()
            );
        }
        Ok(report)
    }

    /// Spawn the application task
    ///
    /// `InvalidState` before `init`; no-op if the task is already running.
    pub fn start<A, S>(&mut self, app: A, spawner: &S) -> Result<(), Error>
    where
        A: Application,
        S: TaskSpawner<AppTask<A>>,
    {
        if !self.initialized {
            error!("Framework not initialized");
            return Err(Error::InvalidState);
        }
        if self.app.phase().is_live() {
            warn!("Framework already started");
            return Ok(());
        }

        self.app.arm()?;
        self.setup_done.store(false, Ordering::Release);
        let task = AppTask::new(app, self.app.clone(), self.setup_done.clone());
        if let Err(err) = spawner.spawn(task, &self.config.app_task) {
            error!("Failed to spawn application task");
            self.app.disarm();
            return Err(err.into());
        }

        if let Some(hook) = self.ready_hook.as_mut() {
            hook();
        }
        info!("Framework started");
        Ok(())
    }

    /// Stop the application task
    pub async fn stop(&mut self) {
        if !self.app.phase().is_live() {
            return;
        }
        self.app.shutdown(APP_STOP_TIMEOUT).await;
        info!("Framework stopped");
    }

    /// Stop and tear down every initialized subsystem, highest index first
    pub async fn deinit(&mut self) {
        self.stop().await;
        self.registry.deinit_all().await;

        self.initialized = false;
        self.boot_time = None;
        self.setup_done.store(false, Ordering::Release);
        info!("Framework deinitialized");
    }

    /// Initialize a subsystem on demand
    pub async fn init_subsystem(&mut self, id: SubsystemId) -> Result<(), Error> {
        self.registry.init(id).await
    }

    /// Tear a subsystem down on demand
    pub async fn deinit_subsystem(&mut self, id: SubsystemId) -> Result<(), Error> {
        self.registry.deinit(id).await
    }

    pub fn subsystem_state(&self, id: SubsystemId) -> SubsystemState {
        self.registry.state(id)
    }

    /// Get a view of subsystem states for other tasks
    pub fn state_view(&self) -> StateView {
        self.registry.view()
    }

    /// Initialized, user setup finished and the main loop running
    pub fn is_ready(&self) -> bool {
        self.initialized
            && self.setup_done.load(Ordering::Acquire)
            && self.app.phase() == TaskPhase::Running
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Time `init` ran
    pub fn boot_time(&self) -> Option<Instant> {
        self.boot_time
    }

    /// Time since `init`, zero before it
    pub fn uptime(&self) -> Duration {
        self.boot_time
            .map_or(Duration::from_ticks(0), |boot| boot.elapsed())
    }
}
