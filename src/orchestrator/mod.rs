mod graceful;
mod reporter;
mod shutdown;
mod startup;
mod state;
mod types;


pub use graceful::GracefulShutdown;
pub use reporter::ErrorReporter;
pub use types::{
    shutdown_fn, EpisodeReport, EpisodeState, ErrorHandler, ShutdownCallback, ShutdownFn,
    ShutdownHandle, ShutdownManager,
};
