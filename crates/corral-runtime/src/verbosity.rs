//! Secondary verbosity bridge.
//!
//! Some components (notably the streaming server embedded in the CRI
//! services) log through a klog-style numeric verbosity scale instead of
//! `tracing` levels.  This module keeps that scale in step with the host's
//! primary level:
//!
//! | primary level             | verbosity |
//! |---------------------------|-----------|
//! | trace                     | 5         |
//! | debug                     | 4         |
//! | info                      | 2         |
//! | warn, error, fatal, panic | 0         |
//!
//! The secondary logger always writes to stderr.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use thiserror::Error;
use tracing::debug;
use tracing::level_filters::LevelFilter;

use crate::config::LogLevel;

/// Highest verbosity the secondary logger accepts.
pub const MAX_VERBOSITY: u8 = 10;

/// The secondary logger rejected a setting.
#[derive(Debug, Clone, Error)]
#[error("failed to set secondary log flag {flag}={value}: {reason}")]
pub struct LogBridgeError {
    /// Flag being set.
    pub flag: &'static str,
    /// Value that was rejected.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl LogLevel {
    /// Verbosity the secondary logger runs at for this primary level.
    pub fn secondary_verbosity(&self) -> u8 {
        match self {
            Self::Trace => 5,
            Self::Debug => 4,
            Self::Info => 2,
            Self::Warn | Self::Error | Self::Fatal | Self::Panic => 0,
        }
    }

    /// The primary level the installed subscriber currently lets through.
    pub fn current() -> Self {
        Self::from_level_filter(LevelFilter::current())
    }

    /// Converts a `tracing` max-level filter.
    pub fn from_level_filter(filter: LevelFilter) -> Self {
        if filter == LevelFilter::TRACE {
            Self::Trace
        } else if filter == LevelFilter::DEBUG {
            Self::Debug
        } else if filter == LevelFilter::INFO {
            Self::Info
        } else if filter == LevelFilter::WARN {
            Self::Warn
        } else {
            Self::Error
        }
    }
}

/// A secondary logger whose verbosity can be adjusted.
pub trait VerbositySink: Send + Sync {
    /// Routes the secondary logger to stderr.
    fn set_to_stderr(&self, enabled: bool) -> Result<(), LogBridgeError>;

    /// Sets the numeric verbosity.
    fn set_verbosity(&self, verbosity: u8) -> Result<(), LogBridgeError>;
}

/// Process-wide verbosity state shared with klog-style components.
#[derive(Debug, Default)]
pub struct SharedVerbosity {
    to_stderr: AtomicBool,
    verbosity: AtomicU8,
}

impl SharedVerbosity {
    /// Creates a sink at verbosity 0, not routed to stderr.
    pub const fn new() -> Self {
        Self {
            to_stderr: AtomicBool::new(false),
            verbosity: AtomicU8::new(0),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<SharedVerbosity> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Current verbosity.
    pub fn verbosity(&self) -> u8 {
        self.verbosity.load(Ordering::Relaxed)
    }

    /// Whether the secondary logger writes to stderr.
    pub fn to_stderr(&self) -> bool {
        self.to_stderr.load(Ordering::Relaxed)
    }

    /// Returns `true` when messages at verbosity `v` should be emitted.
    pub fn enabled(&self, v: u8) -> bool {
        self.verbosity() >= v
    }
}

impl VerbositySink for SharedVerbosity {
    fn set_to_stderr(&self, enabled: bool) -> Result<(), LogBridgeError> {
        self.to_stderr.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn set_verbosity(&self, verbosity: u8) -> Result<(), LogBridgeError> {
        if verbosity > MAX_VERBOSITY {
            return Err(LogBridgeError {
                flag: "v",
                value: verbosity.to_string(),
                reason: format!("must be at most {MAX_VERBOSITY}"),
            });
        }
        self.verbosity.store(verbosity, Ordering::Relaxed);
        Ok(())
    }
}

/// Configures `sink` to log to stderr at the verbosity derived from `level`.
pub fn bridge_verbosity(sink: &dyn VerbositySink, level: LogLevel) -> Result<(), LogBridgeError> {
    sink.set_to_stderr(true)?;
    let verbosity = level.secondary_verbosity();
    sink.set_verbosity(verbosity)?;
    debug!(level = %level, verbosity, "Secondary log verbosity set");
    Ok(())
}
