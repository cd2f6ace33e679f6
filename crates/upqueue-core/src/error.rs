//! Error types for upload sessions.
//!
//! Errors are categorized by how the session reacts to them. Nothing here is
//! allowed to halt a session: every variant is either absorbed as a no-op,
//! reduced to a per-file `error` state, or logged.
//!
//! # Error Categories
//!
//! - **Silent**: late callbacks for files that no longer exist, or actions
//!   requested from a state that does not allow them. Discarded.
//! - **Recoverable**: transport failures. The file moves to `error` and may
//!   be retried.
//! - **Operation-fatal**: duplicate ids and malformed descriptors abort the
//!   single operation that hit them, nothing else.

use crate::file::{FileAction, FileState};
use crate::id::{BatchId, FileId};
use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur in upload session operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UploadError {
    // ============ Registry Errors ============
    /// A file with this id is already registered
    #[error("Duplicate file id: {0}")]
    DuplicateId(FileId),

    /// No file with this id is registered
    #[error("File not found: {0}")]
    NotFound(FileId),

    // ============ State Machine Errors ============
    /// Action requested from a state that does not allow it
    #[error("Cannot {action} file {id} while {state}")]
    InvalidTransition {
        /// File the action targeted
        id: FileId,
        /// State the file was in
        state: FileState,
        /// Rejected action
        action: FileAction,
    },

    // ============ Transport Errors ============
    /// Transport add batch entry is missing required metadata
    #[error("Malformed file descriptor: {0}")]
    MalformedDescriptor(Cow<'static, str>),

    /// Transport batch id was already used by an earlier add
    #[error("Duplicate transport batch: {0}")]
    DuplicateBatch(BatchId),

    /// Transport refused or failed an upload
    #[error("Transport error: {0}")]
    Transport(String),

    // ============ Configuration Errors ============
    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),
}

impl UploadError {
    /// Returns true if the session discards this error without telling
    /// presentation about it
    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            UploadError::NotFound(_) | UploadError::InvalidTransition { .. }
        )
    }

    /// Returns true if the affected file can recover through a retry
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, UploadError::Transport(_))
    }

    /// Create a malformed descriptor error with static context (zero allocation)
    #[must_use]
    pub const fn malformed(context: &'static str) -> Self {
        UploadError::MalformedDescriptor(Cow::Borrowed(context))
    }

    /// Create an invalid configuration error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        UploadError::InvalidConfig(Cow::Borrowed(context))
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        UploadError::Transport(message.into())
    }
}

/// Result type for upload session operations
pub type Result<T> = std::result::Result<T, UploadError>;
