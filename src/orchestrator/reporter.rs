use super::types::ErrorHandler;
use crate::error::{Result, ShutdownError};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Cloneable sink for operational errors. Every clone sees handler changes.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    handler: Arc<RwLock<Option<Arc<dyn ErrorHandler>>>>,
}

impl ErrorReporter {
    pub fn set_handler(&self, handler: Arc<dyn ErrorHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub fn report(&self, error: ShutdownError) {
        warn!("{}", error);
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler.on_error(&error);
        }
    }

    pub fn report_result(&self, result: Result<()>) {
        if let Err(e) = result {
            self.report(e);
        }
    }
}
