//! Render pipeline
//!
//! ```text
//!  application task ──lock──┐
//!                           ▼
//!  render task ──lock──► [ engine ] ──flush──► FlushBridge ──► DisplayPanel
//!                           │     └──read───► InputBridge ──► TouchPanel
//!  tick source ──advance──► clock (lock-free)
//! ```

pub mod buffer;
pub mod engine;
pub mod flush;
pub mod input;
pub mod integration;
pub mod render;
pub mod stats;
pub mod tick;

pub use buffer::{FrameBuffer, FrameBuffers, HeapAllocator, RegionAllocator};
pub use engine::{
    Area, DisplayRegistration, EngineClock, EngineDrivers, FlushCompletion, GraphicsEngine,
    PointerState,
};
pub use integration::{
    Graphics, GraphicsHandle, GraphicsPhase, GraphicsSubsystem, ReadyHook, RenderGuard,
};
pub use render::RenderTask;
pub use stats::PerformanceStats;
pub use tick::TickTask;

