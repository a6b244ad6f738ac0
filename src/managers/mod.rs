pub mod lifecycle;
pub mod posix;

pub use lifecycle::{LifecycleApi, LifecycleHookManager, LIFECYCLE_HOOK_MANAGER};
pub use posix::{PosixSignalManager, POSIX_SIGNAL_MANAGER};
