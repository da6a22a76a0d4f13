//! Custom error types for the harness.
//!
//! This module defines the primary error type, `HarnessError`, used by every part of
//! the library. Using the `thiserror` crate, it provides a centralized and consistent
//! way to describe what can go wrong while driving a profile through the device.
//!
//! ## Error Hierarchy
//!
//! - **`Config`** / **`Configuration`**: loading failures from `figment` and semantic
//!   validation failures of an otherwise well-formed configuration.
//! - **`Io`**: file system and stream I/O.
//! - **`DeviceTimeout`** / **`DeviceClosed`**: the device console never produced the
//!   expected marker, either because the wait elapsed or the stream ended.
//! - **`EmptyResults`** / **`EntryFailed`**: the captured output was parsed, but it
//!   either held no result rows or one of the rows reported `FAIL`.
//! - **`ProfileTimeout`**: the whole-profile watchdog fired.
//!
//! A skipped profile (missing build directory) is not an error; see
//! [`crate::runner::ProfileOutcome::Skipped`].

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the harness error type.
pub type AppResult<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timed out after {timeout:?} waiting for '{pattern}'")]
    DeviceTimeout { pattern: String, timeout: Duration },

    #[error("Device output ended before '{pattern}' appeared")]
    DeviceClosed { pattern: String },

    #[error("Failed to open serial port {port}: {reason}")]
    SerialOpen { port: String, reason: String },

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    #[error("No test results found in output")]
    EmptyResults,

    #[error("{name} test failed")]
    EntryFailed { name: String },

    #[error("Profile '{profile}' did not finish within {timeout:?}")]
    ProfileTimeout { profile: String, timeout: Duration },
}

impl From<figment::Error> for HarnessError {
    fn from(err: figment::Error) -> Self {
        HarnessError::Config(Box::new(err))
    }
}

impl HarnessError {
    /// Returns true when the failure came from waiting on device output.
    pub fn is_device_wait(&self) -> bool {
        matches!(
            self,
            HarnessError::DeviceTimeout { .. }
                | HarnessError::DeviceClosed { .. }
                | HarnessError::ProfileTimeout { .. }
        )
    }
}
