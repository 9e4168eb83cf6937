//! Driver error codes

use core::fmt;

/// Errors reported by driver handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// Operation did not complete in time (bus, vsync)
    Timeout,
    /// Driver could not allocate memory or DMA descriptors
    NoMemory,
    /// Argument out of range for this device
    InvalidArgument,
    /// Driver not initialized or not started
    InvalidState,
    /// Operation not available on this hardware
    NotSupported,
    /// Vendor-specific failure code
    Device(i32),
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::Timeout => f.write_str("timeout"),
            HalError::NoMemory => f.write_str("out of memory"),
            HalError::InvalidArgument => f.write_str("invalid argument"),
            HalError::InvalidState => f.write_str("invalid state"),
            HalError::NotSupported => f.write_str("not supported"),
            HalError::Device(code) => write!(f, "device error {}", code),
        }
    }
}
