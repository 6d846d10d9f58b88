//! Logging and tracing helpers.
//!
//! The crate logs through the `log` facade. [`init_logger`] installs
//! `env_logger` as the backend, honouring `RUST_LOG` when no level is given.
//! [`DebugTracer`] records the steps of multi-stage operations such as
//! blinding so they can be inspected at trace level.

use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Trace => write!(f, "TRACE"),
        }
    }
}

/// Install `env_logger` as the process logger.
///
/// Returns false when a logger was already installed, which is not an error:
/// embedding applications and test harnesses commonly install their own.
pub fn init_logger(level: Option<LogLevel>) -> bool {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level {
        builder.filter_level(level.into());
    }
    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!(
            "logger initialized with level: {}",
            level.map(|l| l.to_string()).unwrap_or_else(|| "env".to_string())
        );
    }
    installed
}

/// Debug tracer for multi-step operations
pub struct DebugTracer {
    operation_name: String,
    start_time: Instant,
    steps: Vec<TraceStep>,
}

#[derive(Debug, Clone)]
struct TraceStep {
    name: String,
    duration_from_start: Duration,
    message: Option<String>,
}

impl DebugTracer {
    pub fn start(operation_name: &str) -> Self {
        log::trace!("Starting trace for operation: {}", operation_name);

        Self {
            operation_name: operation_name.to_string(),
            start_time: Instant::now(),
            steps: Vec::new(),
        }
    }

    pub fn step(&mut self, step_name: &str) {
        self.step_with_message(step_name, None);
    }

    pub fn step_with_message(&mut self, step_name: &str, message: Option<String>) {
        let duration_from_start = self.start_time.elapsed();

        log::trace!(
            "Trace step '{}' at +{:?}: {}",
            step_name,
            duration_from_start,
            message.as_deref().unwrap_or("")
        );

        self.steps.push(TraceStep {
            name: step_name.to_string(),
            duration_from_start,
            message,
        });
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Finish the trace and log the summary
    pub fn finish(self) {
        let total_duration = self.start_time.elapsed();

        log::debug!(
            "Trace completed for '{}' in {:?} with {} steps",
            self.operation_name,
            total_duration,
            self.steps.len()
        );

        if log::log_enabled!(log::Level::Trace) {
            for (i, step) in self.steps.iter().enumerate() {
                log::trace!(
                    "  Step {}: {} at +{:?}{}",
                    i + 1,
                    step.name,
                    step.duration_from_start,
                    step.message.as_ref().map(|m| format!(" - {}", m)).unwrap_or_default()
                );
            }
        }
    }
}
