//! Test doubles shared by the unit tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::vec::Vec;

use tab5_hal::{
    DisplayPanel, Driver, HalError, Resolution, TouchPanel, TouchPoint, TouchPoints,
};

use crate::config::{MemoryRegion, TaskConfig};
use crate::error::Error;
use crate::graphics::{
    Area, DisplayRegistration, EngineClock, EngineDrivers, FlushCompletion, FrameBuffers,
    Graphics, GraphicsEngine, PointerState, RegionAllocator, RenderTask, TickTask,
};
use crate::subsystem::{Subsystem, SubsystemFuture, SubsystemId};
use crate::task::{SpawnError, TaskSpawner};

// ---------------------------------------------------------------------------
// Subsystems and plain drivers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SubsystemInner {
    init_calls: u32,
    deinit_calls: u32,
    init_error: Option<Error>,
    deinit_error: Option<Error>,
    init_log: Option<(Rc<RefCell<Vec<SubsystemId>>>, SubsystemId)>,
    deinit_log: Option<(Rc<RefCell<Vec<SubsystemId>>>, SubsystemId)>,
}

/// Scriptable registry entry; clones share state
#[derive(Clone, Default)]
pub struct FakeSubsystem {
    inner: Rc<RefCell<SubsystemInner>>,
}

impl FakeSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_init(&self, err: Error) {
        self.inner.borrow_mut().init_error = Some(err);
    }

    pub fn succeed_init(&self) {
        self.inner.borrow_mut().init_error = None;
    }

    pub fn fail_deinit(&self, err: Error) {
        self.inner.borrow_mut().deinit_error = Some(err);
    }

    pub fn record_init_into(&self, log: Rc<RefCell<Vec<SubsystemId>>>, id: SubsystemId) {
        self.inner.borrow_mut().init_log = Some((log, id));
    }

    pub fn record_deinit_into(&self, log: Rc<RefCell<Vec<SubsystemId>>>, id: SubsystemId) {
        self.inner.borrow_mut().deinit_log = Some((log, id));
    }

    pub fn init_calls(&self) -> u32 {
        self.inner.borrow().init_calls
    }

    pub fn deinit_calls(&self) -> u32 {
        self.inner.borrow().deinit_calls
    }
}

impl Subsystem for FakeSubsystem {
    fn init(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move {
            let mut inner = self.inner.borrow_mut();
            inner.init_calls += 1;
            if let Some((log, id)) = inner.init_log.as_ref() {
                log.borrow_mut().push(*id);
            }
            match inner.init_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn deinit(&mut self) -> SubsystemFuture<'_> {
        Box::pin(async move {
            let mut inner = self.inner.borrow_mut();
            inner.deinit_calls += 1;
            if let Some((log, id)) = inner.deinit_log.as_ref() {
                log.borrow_mut().push(*id);
            }
            match inner.deinit_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }
}

/// Peripheral driver with countable lifecycle calls
#[derive(Default)]
pub struct FakeDriver {
    init_calls: AtomicU32,
    deinit_calls: AtomicU32,
    init_error: Option<HalError>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(err: HalError) -> Self {
        Self {
            init_error: Some(err),
            ..Self::default()
        }
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn deinit_calls(&self) -> u32 {
        self.deinit_calls.load(Ordering::SeqCst)
    }
}

impl Driver for FakeDriver {
    fn init(&self) -> Result<(), HalError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        match self.init_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn deinit(&self) -> Result<(), HalError> {
        self.deinit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCall {
    Blend {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        alpha: u8,
    },
    Bitmap {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
}

#[derive(Default)]
struct DisplayInner {
    calls: Vec<DisplayCall>,
    fail_blend: bool,
    fail_bitmap: bool,
    fail_start: Option<HalError>,
    vsync_error: Option<HalError>,
    vsync_timeouts: Vec<u32>,
    lock_probes: Vec<bool>,
    backlight: u8,
    start_calls: u32,
    stop_calls: u32,
}

type Probe = Box<dyn Fn() -> bool + Send>;

/// Display panel that records every call
#[derive(Default)]
pub struct FakeDisplay {
    inner: Mutex<DisplayInner>,
    probe: Mutex<Option<Probe>>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut DisplayInner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn fail_blend(&self, fail: bool) {
        self.with(|d| d.fail_blend = fail);
    }

    pub fn fail_bitmap(&self, fail: bool) {
        self.with(|d| d.fail_bitmap = fail);
    }

    pub fn fail_start(&self, err: Option<HalError>) {
        self.with(|d| d.fail_start = err);
    }

    pub fn fail_vsync(&self, err: Option<HalError>) {
        self.with(|d| d.vsync_error = err);
    }

    /// Evaluate `probe` on every pixel write and keep the results
    pub fn set_probe(&self, probe: Option<Probe>) {
        *self.probe.lock().unwrap() = probe;
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.with(|d| d.calls.clone())
    }

    pub fn blend_count(&self) -> usize {
        self.with(|d| {
            d.calls
                .iter()
                .filter(|c| matches!(c, DisplayCall::Blend { .. }))
                .count()
        })
    }

    pub fn bitmap_count(&self) -> usize {
        self.with(|d| {
            d.calls
                .iter()
                .filter(|c| matches!(c, DisplayCall::Bitmap { .. }))
                .count()
        })
    }

    pub fn vsync_timeouts(&self) -> Vec<u32> {
        self.with(|d| d.vsync_timeouts.clone())
    }

    pub fn lock_probes(&self) -> Vec<bool> {
        self.with(|d| d.lock_probes.clone())
    }

    pub fn start_calls(&self) -> u32 {
        self.with(|d| d.start_calls)
    }

    pub fn stop_calls(&self) -> u32 {
        self.with(|d| d.stop_calls)
    }

    fn run_probe(&self) {
        let result = self.probe.lock().unwrap().as_ref().map(|probe| probe());
        if let Some(held) = result {
            self.with(|d| d.lock_probes.push(held));
        }
    }
}

impl Driver for FakeDisplay {
    fn init(&self) -> Result<(), HalError> {
        Ok(())
    }

    fn deinit(&self) -> Result<(), HalError> {
        Ok(())
    }
}

impl DisplayPanel for FakeDisplay {
    fn start(&self) -> Result<(), HalError> {
        self.with(|d| {
            d.start_calls += 1;
            match d.fail_start {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn stop(&self) -> Result<(), HalError> {
        self.with(|d| d.stop_calls += 1);
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        Resolution {
            width: 1280,
            height: 720,
        }
    }

    fn draw_bitmap(
        &self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        _pixels: &[u8],
    ) -> Result<(), HalError> {
        self.run_probe();
        self.with(|d| {
            d.calls.push(DisplayCall::Bitmap { x, y, width, height });
            if d.fail_bitmap {
                Err(HalError::Device(-1))
            } else {
                Ok(())
            }
        })
    }

    fn blend(
        &self,
        dst_x: u16,
        dst_y: u16,
        _src: &[u8],
        width: u16,
        height: u16,
        alpha: u8,
    ) -> Result<(), HalError> {
        self.run_probe();
        self.with(|d| {
            d.calls.push(DisplayCall::Blend {
                x: dst_x,
                y: dst_y,
                width,
                height,
                alpha,
            });
            if d.fail_blend {
                Err(HalError::Device(-2))
            } else {
                Ok(())
            }
        })
    }

    fn wait_vsync(&self, timeout_ms: u32) -> Result<(), HalError> {
        self.with(|d| {
            d.vsync_timeouts.push(timeout_ms);
            match d.vsync_error {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn set_backlight(&self, level: u8) -> Result<(), HalError> {
        self.with(|d| d.backlight = level);
        Ok(())
    }

    fn backlight(&self) -> u8 {
        self.with(|d| d.backlight)
    }
}

#[derive(Default)]
struct TouchInner {
    points: Vec<TouchPoint>,
    read_error: Option<HalError>,
    fail_start: Option<HalError>,
    start_calls: u32,
    stop_calls: u32,
}

/// Touch panel returning scripted points
#[derive(Default)]
pub struct FakeTouch {
    inner: Mutex<TouchInner>,
}

impl FakeTouch {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut TouchInner) -> R) -> R {
        f(&mut self.inner.lock().unwrap())
    }

    pub fn set_points(&self, points: &[TouchPoint]) {
        self.with(|t| t.points = points.to_vec());
    }

    pub fn fail_read(&self, err: Option<HalError>) {
        self.with(|t| t.read_error = err);
    }

    pub fn fail_start(&self, err: Option<HalError>) {
        self.with(|t| t.fail_start = err);
    }

    pub fn start_calls(&self) -> u32 {
        self.with(|t| t.start_calls)
    }

    pub fn stop_calls(&self) -> u32 {
        self.with(|t| t.stop_calls)
    }
}

impl Driver for FakeTouch {
    fn init(&self) -> Result<(), HalError> {
        Ok(())
    }

    fn deinit(&self) -> Result<(), HalError> {
        Ok(())
    }
}

impl TouchPanel for FakeTouch {
    fn start(&self) -> Result<(), HalError> {
        self.with(|t| {
            t.start_calls += 1;
            match t.fail_start {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    fn stop(&self) -> Result<(), HalError> {
        self.with(|t| t.stop_calls += 1);
        Ok(())
    }

    fn read_points(&self, points: &mut TouchPoints) -> Result<(), HalError> {
        self.with(|t| {
            if let Some(err) = t.read_error {
                return Err(err);
            }
            points.clear();
            for point in &t.points {
                if points.push(*point).is_err() {
                    break;
                }
            }
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Allocator with per-region byte budgets
pub struct FakeAllocator {
    external: Option<Cell<usize>>,
    internal: Cell<usize>,
    external_used: Cell<usize>,
    internal_used: Cell<usize>,
}

impl FakeAllocator {
    /// No PSRAM, unlimited internal memory
    pub fn new() -> Self {
        Self {
            external: None,
            internal: Cell::new(usize::MAX),
            external_used: Cell::new(0),
            internal_used: Cell::new(0),
        }
    }

    pub fn with_external(mut self, budget: usize) -> Self {
        self.external = Some(Cell::new(budget));
        self
    }

    pub fn with_internal_limit(self, budget: usize) -> Self {
        self.internal.set(budget);
        self
    }

    pub fn external_used(&self) -> usize {
        self.external_used.get()
    }

    pub fn internal_used(&self) -> usize {
        self.internal_used.get()
    }
}

impl RegionAllocator for FakeAllocator {
    fn has_region(&self, region: MemoryRegion) -> bool {
        match region {
            MemoryRegion::External => self.external.is_some(),
            MemoryRegion::Internal => true,
        }
    }

    fn allocate(&self, region: MemoryRegion, bytes: usize) -> Result<Box<[u8]>, Error> {
        let (budget, used) = match region {
            MemoryRegion::External => match self.external.as_ref() {
                Some(budget) => (budget, &self.external_used),
                None => return Err(Error::AllocationFailure),
            },
            MemoryRegion::Internal => (&self.internal, &self.internal_used),
        };
        if budget.get() < bytes {
            return Err(Error::AllocationFailure);
        }
        budget.set(budget.get() - bytes);
        used.set(used.get() + bytes);
        Ok(vec![0u8; bytes].into_boxed_slice())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine that flushes one band per pump and samples the pointer
pub struct FakeEngine {
    clock: EngineClock,
    pub registration: Option<DisplayRegistration>,
    pub input_registered: bool,
    pub pumps: u32,
    pub flushes: u32,
    pub incomplete_flushes: u32,
    pub last_pointer: PointerState,
    pub invalidations: u32,
    pub canvases_created: u32,
    pub active_canvas: Option<u32>,
    pub hint_ms: u32,
    pub pump_delay: Option<std::time::Duration>,
    pub fail_register: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            clock: EngineClock::new(),
            registration: None,
            input_registered: false,
            pumps: 0,
            flushes: 0,
            incomplete_flushes: 0,
            last_pointer: PointerState::Released,
            invalidations: 0,
            canvases_created: 0,
            active_canvas: None,
            hint_ms: 5,
            pump_delay: None,
            fail_register: false,
        }
    }
}

impl GraphicsEngine for FakeEngine {
    type Canvas = u32;

    fn register_display(&mut self, registration: DisplayRegistration) -> Result<(), Error> {
        if self.fail_register {
            return Err(Error::NotSupported);
        }
        self.registration = Some(registration);
        Ok(())
    }

    fn register_input(&mut self) -> Result<(), Error> {
        self.input_registered = true;
        Ok(())
    }

    fn clock(&self) -> EngineClock {
        self.clock.clone()
    }

    fn pump(&mut self, frame: &mut FrameBuffers, drivers: &mut dyn EngineDrivers) -> u32 {
        self.pumps += 1;
        if let Some(delay) = self.pump_delay {
            std::thread::sleep(delay);
        }

        if let Some(reg) = self.registration {
            if reg.vsync {
                drivers.wait_vsync();
            }
            let lines = (reg.buffer_pixels / reg.hor_res as usize) as u16;
            let area = Area::new(0, 0, reg.hor_res - 1, lines - 1);
            let index = self.pumps as usize % frame.count().max(1);
            if let Some(buffer) = frame.get(index) {
                let mut done = FlushCompletion::new();
                drivers.flush(&area, buffer.pixels(), &mut done);
                self.flushes += 1;
                if !done.is_complete() {
                    self.incomplete_flushes += 1;
                }
            }
        }

        self.last_pointer = drivers.read_pointer();
        self.hint_ms
    }

    fn invalidate(&mut self) {
        self.invalidations += 1;
    }

    fn create_canvas(&mut self) -> Option<u32> {
        self.canvases_created += 1;
        Some(self.canvases_created)
    }

    fn load_canvas(&mut self, canvas: &u32) {
        self.active_canvas = Some(*canvas);
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Spawner that parks one task for the test to run
pub struct Slot<T> {
    task: Mutex<Option<T>>,
    placement: Mutex<Option<TaskConfig>>,
    fail: AtomicBool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            task: Mutex::new(None),
            placement: Mutex::new(None),
            fail: AtomicBool::new(false),
        }
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn take(&self) -> Option<T> {
        self.task.lock().unwrap().take()
    }

    pub fn is_occupied(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Placement of the last successful spawn
    pub fn placement(&self) -> Option<TaskConfig> {
        *self.placement.lock().unwrap()
    }
}

impl<T> TaskSpawner<T> for Slot<T> {
    fn spawn(&self, task: T, config: &TaskConfig) -> Result<(), SpawnError> {
        let mut slot = self.task.lock().unwrap();
        if self.fail.load(Ordering::SeqCst) || slot.is_some() {
            return Err(SpawnError::Busy);
        }
        *slot = Some(task);
        *self.placement.lock().unwrap() = Some(*config);
        Ok(())
    }
}

pub type TestGraphics = Graphics<FakeEngine, FakeDisplay, FakeTouch>;
pub type TestRenderTask = RenderTask<FakeEngine, FakeDisplay, FakeTouch>;

/// Spawner for the render task and the tick source
#[derive(Default)]
pub struct FakeSpawner {
    pub render: Slot<TestRenderTask>,
    pub tick: Slot<TickTask>,
}

impl FakeSpawner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskSpawner<TestRenderTask> for FakeSpawner {
    fn spawn(&self, task: TestRenderTask, config: &TaskConfig) -> Result<(), SpawnError> {
        self.render.spawn(task, config)
    }
}

impl TaskSpawner<TickTask> for FakeSpawner {
    fn spawn(&self, task: TickTask, config: &TaskConfig) -> Result<(), SpawnError> {
        self.tick.spawn(task, config)
    }
}
