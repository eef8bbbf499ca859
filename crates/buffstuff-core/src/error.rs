//! Error types for buff registration, application and restoration.

use buffstuff_common::StoreError;
use thiserror::Error;

/// Errors produced by the buff registry and manager.
#[derive(Debug, Error)]
pub enum BuffError {
    /// Registration or apply attempted before `initialize()`
    #[error("Buff manager not initialized: call initialize() first")]
    NotInitialized,

    /// Registration attempted after the manager started running
    #[error("Buff registration window is closed")]
    RegistrationClosed,

    /// Kind identifier registered twice
    #[error("Buff kind already registered: {0}")]
    DuplicateKind(String),

    /// Kind identifier was never registered
    #[error("Unknown buff kind: {0}")]
    UnknownKind(String),

    /// Factory builds a buff whose kind differs from the registered one
    #[error("Buff factory for {registered} constructs kind {constructed}")]
    KindMismatch {
        /// Kind passed to `register`
        registered: String,
        /// Kind reported by the constructed instance
        constructed: String,
    },

    /// A buff could not encode or decode its payload
    #[error("Invalid payload for buff {kind}: {reason}")]
    Payload {
        /// Kind of the offending buff
        kind: String,
        /// What went wrong
        reason: String,
    },

    /// Save-store or snapshot errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BuffError {
    /// Builds a payload error for `kind`.
    pub fn payload(kind: impl Into<String>, reason: impl ToString) -> Self {
        Self::Payload {
            kind: kind.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for wiring mistakes that should abort host startup.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::RegistrationClosed
                | Self::DuplicateKind(_)
                | Self::KindMismatch { .. }
        )
    }
}

/// Result type alias for buff operations.
pub type BuffResult<T> = Result<T, BuffError>;
