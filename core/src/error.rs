//! Error types shared by every store.

use serde_json::Value;
use std::any::Any;
use thiserror::Error;

/// Errors surfaced by a store.
///
/// Load and action failures are normalized into [`StoreError::Failed`]
/// whatever the loader or action returned, so the error slot of a store
/// always holds a displayable message plus an optional detail payload.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A loader or action failed
    #[error("{message}")]
    Failed {
        /// Human readable message
        message: String,
        /// Optional structured payload for display
        detail: Option<Value>,
    },

    /// The store was configured incorrectly
    ///
    /// Raised when a factory is built or a store is created, never while
    /// it is running.
    #[error("invalid store configuration: {0}")]
    Configuration(String),

    /// The store has been destroyed
    #[error("store `{0}` has been destroyed")]
    Destroyed(String),

    /// No action with this name was registered
    #[error("unknown action `{0}`")]
    UnknownAction(String),
}

impl StoreError {
    /// Create a failure with a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a detail payload. Only meaningful on [`StoreError::Failed`].
    #[must_use]
    pub fn with_detail(self, detail: Value) -> Self {
        match self {
            Self::Failed { message, .. } => Self::Failed {
                message,
                detail: Some(detail),
            },
            other => other,
        }
    }

    /// The display message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Failed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The detail payload, if any.
    #[must_use]
    pub const fn detail(&self) -> Option<&Value> {
        match self {
            Self::Failed { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }

    /// Normalize a panic payload caught from a loader or action.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "task panicked".to_string());
        Self::failed(message)
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(error: anyhow::Error) -> Self {
        // Keep errors that already went through normalization intact.
        match error.downcast::<Self>() {
            Ok(store_error) => store_error,
            Err(other) => Self::failed(other.to_string()),
        }
    }
}

impl From<&str> for StoreError {
    fn from(message: &str) -> Self {
        Self::failed(message)
    }
}

impl From<String> for StoreError {
    fn from(message: String) -> Self {
        Self::failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn anyhow_message_is_normalized() {
        let err = StoreError::from(anyhow::anyhow!("boom"));
        assert_eq!(err.message(), "boom");
        assert!(err.detail().is_none());
    }

    #[test]
    fn embedded_store_error_survives_round_trip_through_anyhow() {
        let original = StoreError::failed("rejected").with_detail(json!({ "code": 409 }));
        let err = StoreError::from(anyhow::Error::new(original.clone()));
        assert_eq!(err, original);
        assert_eq!(err.detail(), Some(&json!({ "code": 409 })));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("exploded");
        assert_eq!(StoreError::from_panic(payload.as_ref()).message(), "exploded");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(StoreError::from_panic(payload.as_ref()).message(), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(StoreError::from_panic(payload.as_ref()).message(), "task panicked");
    }

    #[test]
    fn configuration_error_message() {
        let err = StoreError::Configuration("ttl configured twice".into());
        assert_eq!(err.to_string(), "invalid store configuration: ttl configured twice");
    }
}
