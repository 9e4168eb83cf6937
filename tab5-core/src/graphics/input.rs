//! Input bridge
//!
//! Samples the touch panel on the engine's behalf. The engine's pointer
//! model is single-touch: the first valid contact wins.

use alloc::sync::Arc;

use tab5_hal::{TouchPanel, TouchPoint, TouchPoints};

use super::engine::PointerState;

pub struct InputBridge<T: ?Sized> {
    touch: Arc<T>,
    points: TouchPoints,
}

impl<T: TouchPanel + ?Sized> InputBridge<T> {
    pub fn new(touch: Arc<T>) -> Self {
        Self {
            touch,
            points: TouchPoints::new(),
        }
    }

    /// Sample the panel
    ///
    /// Driver errors read as released.
    pub fn read(&mut self) -> PointerState {
        self.points.clear();
        if let Err(err) = self.touch.read_points(&mut self.points) {
            trace!("Touch read failed: {}", err);
            return PointerState::Released;
        }
        first_contact(&self.points)
    }
}

/// Pointer state for the first valid point in `points`
pub fn first_contact(points: &[TouchPoint]) -> PointerState {
    points
        .iter()
        .find(|p| p.is_valid())
        .map_or(PointerState::Released, |p| PointerState::Pressed { x: p.x, y: p.y })
}
