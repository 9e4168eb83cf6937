//! Events that drive subsystem state transitions

/// Lifecycle events applied by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleEvent {
    /// Initializer is about to run
    Begin,
    /// Initializer returned success
    Succeeded,
    /// Initializer failed, or a dependency was not ready
    Failed,
    /// Explicit deinit
    Reset,
}
