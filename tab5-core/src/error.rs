//! Runtime error taxonomy

use core::fmt;

use tab5_hal::HalError;

/// Errors surfaced by the registry, graphics integration and framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Frame buffer, task slot or bookkeeping allocation failed
    AllocationFailure,
    /// An external driver call returned a failure
    DriverFailure(HalError),
    /// Operation on a component that is not initialized, not started, or
    /// whose dependencies are not ready
    InvalidState,
    /// Configuration value out of range
    InvalidArgument,
    /// Bounded wait elapsed (render lock, vsync)
    Timeout,
    /// No implementation registered for this subsystem
    NotSupported,
}

impl From<HalError> for Error {
    fn from(err: HalError) -> Self {
        match err {
            HalError::NoMemory => Error::AllocationFailure,
            other => Error::DriverFailure(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailure => f.write_str("allocation failure"),
            Error::DriverFailure(err) => write!(f, "driver failure: {}", err),
            Error::InvalidState => f.write_str("invalid state"),
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::Timeout => f.write_str("timeout"),
            Error::NotSupported => f.write_str("not supported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_memory_maps_to_allocation_failure() {
        assert_eq!(Error::from(HalError::NoMemory), Error::AllocationFailure);
    }

    #[test]
    fn test_other_hal_errors_wrap_as_driver_failure() {
        assert_eq!(
            Error::from(HalError::Timeout),
            Error::DriverFailure(HalError::Timeout)
        );
        assert_eq!(
            Error::from(HalError::Device(-1)),
            Error::DriverFailure(HalError::Device(-1))
        );
    }
}
