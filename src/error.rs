// src/error.rs

//! Error types for bundle conversion

use crate::docker::DaemonError;
use crate::hooks::HookError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a conversion
///
/// Every variant is fatal: nothing is written once one of these is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// A daemon call (inspect, info) failed
    #[error("{operation} failed: {source}")]
    Fetch {
        operation: String,
        source: DaemonError,
    },

    /// A `--hook` declaration could not be compiled
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A substructure the translation depends on is missing from the snapshot
    #[error("container {container} has no {field} in its inspection data")]
    MissingField {
        container: String,
        field: &'static str,
    },

    /// No root filesystem path could be found for the container
    #[error("no root filesystem path could be resolved for container {0} (pass --rootfs)")]
    MissingRootfs(String),

    /// A `container:<id>` namespace mode names a peer we cannot join
    #[error("cannot join {kind} namespace of container {peer}: {reason}")]
    UnresolvedPeer {
        kind: &'static str,
        peer: String,
        reason: String,
    },

    /// A descriptor already exists and overwriting was not requested
    #[error("File {} exists. Remove it first or pass --force", .0.display())]
    FileExists(PathBuf),

    /// Filesystem error while writing the bundle
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Descriptor serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn fetch(operation: impl Into<String>, source: DaemonError) -> Self {
        Self::Fetch {
            operation: operation.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
