// src/error.rs
//! Unified error handling for the acquisition core
//!
//! Errors are recovered at the boundary where they occur (reader thread,
//! connect action, recording file creation) and reflected as a state change
//! plus a console notice. Nothing here ever crosses the device/host link.

use crate::config::ConfigError;
use crate::hal::HalError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type AcqResult<T> = Result<T, AcqError>;

/// Unified error type for host-side operations
#[derive(Debug, Error)]
pub enum AcqError {
    /// Link open/read/write failures
    #[error("transport error: {0}")]
    Transport(#[from] HalError),

    /// Failure to create or write a recording sink
    #[error("storage error at {path}: {reason}")]
    Storage {
        /// File or directory involved
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// A control action was issued in a state that does not permit it
    #[error("action '{action}' not permitted while {state}")]
    InvalidState {
        /// Requested action
        action: &'static str,
        /// Human-readable current state
        state: String,
    },

    /// Plain I/O failure outside a recording sink
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcqError {
    /// Build a storage error from any displayable cause
    pub fn storage(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        AcqError::Storage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that mean the link is gone
    pub fn is_transport(&self) -> bool {
        matches!(self, AcqError::Transport(_))
    }
}
