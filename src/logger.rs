use slog::{Discard, Logger};
use sloggers::{
    terminal::{Destination, TerminalLoggerBuilder},
    types::Severity,
    Build,
};
use std::sync::Arc;

use crate::errors::*;

#[derive(Debug, Clone)]
pub struct SyncLogger(pub Arc<Logger>);

impl std::ops::Deref for SyncLogger {
    type Target = Logger;

    fn deref(&self) -> &Logger {
        &*self.0
    }
}

impl SyncLogger {
    pub fn discard() -> Self {
        Self(Arc::new(Logger::root(Discard, o!())))
    }
}

impl Default for SyncLogger {
    fn default() -> Self {
        Self::discard()
    }
}

pub fn parse_severity(level: &str) -> ApiResult<Severity> {
    let result = match level.to_lowercase().as_str() {
        "trace" => Severity::Trace,
        "debug" => Severity::Debug,
        "info" => Severity::Info,
        "warning" | "warn" => Severity::Warning,
        "error" => Severity::Error,
        "critical" => Severity::Critical,
        _ => return invalid_data_ae!("unknown log level: {}", level),
    };
    Ok(result)
}

pub fn terminal_logger(level: Severity) -> ApiResult<SyncLogger> {
    let logger = TerminalLoggerBuilder::new()
        .level(level)
        .destination(Destination::Stderr)
        .build()
        .map_err(|e| invalid_data!("can't build logger: {}", e))?;
    Ok(SyncLogger(Arc::new(logger)))
}
