//! Configuration types
//!
//! Boot-time configuration snapshot. Built once by the application (usually
//! from `Default` with a few overrides) and immutable afterwards.

pub mod types;

pub use types::*;
