//! Lifecycle status of a store or a tracked action.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status
///
/// ```text
/// Idle ──► Loading ──► Resolved
///             ▲  │         │
///             │  └──► Error│
///             └────────────┘
/// ```
///
/// There is no terminal state: a resolved or failed store can always
/// re-enter `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing has been loaded yet
    #[default]
    Idle,
    /// A load or action is in flight
    Loading,
    /// The last load or action completed successfully
    Resolved,
    /// The last load or action failed
    Error,
}

impl Status {
    /// Status as observed by readers.
    ///
    /// A populated error slot always reads as [`Status::Error`], whatever
    /// the raw status is.
    #[must_use]
    pub const fn derive(raw: Self, has_error: bool) -> Self {
        if has_error { Self::Error } else { raw }
    }

    /// Check if idle
    #[must_use]
    pub const fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if loading
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Check if resolved
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Check if failed
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Lowercase name, as used in logs and history records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Resolved => "resolved",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
