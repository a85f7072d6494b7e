//! # Signal Store Core
//!
//! Core types for the Signal Store runtime.
//!
//! This crate provides the building blocks a store is assembled from. It has
//! no notion of loading or scheduling; that lives in `signal-store-runtime`.
//!
//! ## Core Concepts
//!
//! - **Signal**: observable cell, notifies observers synchronously on write
//! - **Status**: `idle` / `loading` / `resolved` / `error` lifecycle
//! - **StoreError**: normalized load/action failure plus configuration errors
//! - **Freeze**: deep immutability for published snapshots, cycle-safe
//! - **Merge**: shallow top-level merge of a partial update into a snapshot
//! - **Environment**: injected clock, storage backend and navigation source
//! - **History**: process-wide, append-only log of tracked actions
//!
//! ## Example
//!
//! ```
//! use signal_store_core::{Signal, Status};
//!
//! let status = Signal::new(Status::Idle);
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//! let seen_clone = std::sync::Arc::clone(&seen);
//! let _subscription = status.subscribe(move |s| {
//!     if let Ok(mut seen) = seen_clone.lock() {
//!         seen.push(*s);
//!     }
//! });
//!
//! status.set(Status::Loading);
//! status.set(Status::Resolved);
//! ```

pub mod environment;
pub mod error;
pub mod freeze;
pub mod history;
pub mod navigation;
pub mod signal;
pub mod state;
pub mod status;
pub mod storage;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::StoreError;
pub use freeze::{Freeze, FreezeVisitor, FrozenError, Shared, deep_freeze};
pub use history::{HistoryEvent, HistoryRecorder};
pub use navigation::{NavigationEvent, NavigationHub, NavigationSource};
pub use signal::{Signal, Subscription};
pub use state::{Merge, StoreState};
pub use status::Status;
pub use storage::{MemoryStorage, StorageBackend};
