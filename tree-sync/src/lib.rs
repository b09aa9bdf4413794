//! Tree Sync Library
//!
//! Keeps a local directory tree and a remote store tree consistent, in either
//! direction, with size/mtime change detection and optional pruning.

pub mod config;
pub mod fs;
pub mod remote;
pub mod sync;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use sync::{run_sync, Direction, SyncOptions, SyncReport};
pub use utils::errors::SyncError;
pub type Result<T> = std::result::Result<T, SyncError>;
