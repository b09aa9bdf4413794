//! Utility modules for the tree synchronizer.

pub mod errors;
pub mod logger;
pub mod signal;

pub use errors::{Result, SyncError};
