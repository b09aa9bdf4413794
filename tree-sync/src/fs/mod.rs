//! Local filesystem access for the reconciler.

pub mod local;
pub mod metadata;
pub mod xattr;

pub use local::{LocalFs, LocalStore};
pub use metadata::{LocalEntry, LocalKind, LocalStat};
pub use xattr::XattrError;
