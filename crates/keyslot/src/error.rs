//! Error types for the store.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors raised by the store, its dispatchers and the store registry.
///
/// Every error is raised synchronously by the call that caused it. Nothing is
/// retried and nothing is partially committed: a failing batch leaves every
/// slot exactly as it was before the batch started.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A slot id was read, dispatched to or given a reducer without ever
    /// being initialized.
    #[error("state slot not found: {slot_id}")]
    SlotNotFound { slot_id: String },

    /// The slot exists but has no reducer and implicit merge reducers are
    /// disabled.
    #[error("no reducer registered for state slot: {slot_id}")]
    MissingReducer { slot_id: String },

    /// The slot id cannot be used as an event topic.
    #[error("invalid state slot id {slot_id:?}: {reason}")]
    InvalidSlotId { slot_id: String, reason: &'static str },

    /// A reducer refused the action.
    #[error("reducer for state slot {slot_id} failed")]
    Reducer {
        slot_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A slot could not be decoded into the requested type.
    #[error("failed to decode state slot {slot_id}")]
    Decode {
        slot_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A store is already registered under this id.
    #[error("store already registered: {store_id}")]
    DuplicateStore { store_id: String },

    /// No store is registered under this id.
    #[error("store not found: {store_id}")]
    StoreNotFound { store_id: String },
}

/// Coarse classification of [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unknown slot or store id, or a duplicate store id.
    NotFound,
    /// The store was assembled in a way that cannot serve the call.
    Configuration,
    /// A reducer returned an error.
    Reducer,
    /// A typed read failed.
    Decode,
}

impl StoreError {
    pub(crate) fn slot_not_found(slot_id: impl Into<String>) -> Self {
        Self::SlotNotFound {
            slot_id: slot_id.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SlotNotFound { .. }
            | Self::DuplicateStore { .. }
            | Self::StoreNotFound { .. } => ErrorCategory::NotFound,
            Self::MissingReducer { .. } | Self::InvalidSlotId { .. } => {
                ErrorCategory::Configuration
            }
            Self::Reducer { .. } => ErrorCategory::Reducer,
            Self::Decode { .. } => ErrorCategory::Decode,
        }
    }

    /// True for unknown slot ids and unknown or duplicate store ids.
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}
