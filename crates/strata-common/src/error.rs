//! Unified error types for the strata workspace.
//!
//! Every failure of a composition run is reported through [`StrataError`].
//! Graph and registry errors are detected before any template executes;
//! configuration errors may surface once concrete values are known.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::HandleKey;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StrataError {
    /// A unit with the same name is already registered.
    #[error("duplicate unit: \"{unit}\" is already registered")]
    DuplicateUnit {
        /// Name of the unit registered twice.
        unit: String,
    },

    /// The unit graph contains a cycle.
    #[error("cyclic dependency detected: {}", .cycle.join(" -> "))]
    CyclicDependency {
        /// Units along the cycle, first unit repeated at the end.
        cycle: Vec<String>,
    },

    /// A unit requires a handle that no registered unit produces.
    #[error("unsatisfied dependency: unit \"{consumer}\" requires \"{handle}\" which no registered unit produces")]
    UnsatisfiedDependency {
        /// Unit declaring the requirement.
        consumer: String,
        /// Handle nobody produces.
        handle: HandleKey,
    },

    /// A handle key was registered twice.
    #[error("handle collision: \"{key}\" is already registered")]
    HandleCollision {
        /// Key that already exists in the registry.
        key: HandleKey,
    },

    /// A handle key is not present in the registry.
    #[error("unknown handle: \"{key}\"")]
    UnknownHandle {
        /// Key that was looked up.
        key: HandleKey,
    },

    /// A unit template rejected its configuration.
    #[error("invalid configuration for unit \"{unit}\": {message}")]
    InvalidUnitConfiguration {
        /// Unit whose configuration is malformed.
        unit: String,
        /// Description of the problem.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A manifest could not be decoded.
    #[error("invalid manifest {path}: {message}")]
    Manifest {
        /// Manifest path.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl StrataError {
    /// Shorthand for [`StrataError::InvalidUnitConfiguration`].
    pub fn invalid(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUnitConfiguration {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StrataError>;
