//! Deep immutability for published snapshots.
//!
//! Snapshots are handed to readers as `Arc<S>`, so plain data cannot be
//! mutated after publication. The only interior-mutable building block a
//! state may contain is [`Shared`], a node that can be linked into arbitrary
//! graphs (cycles included). Publishing a snapshot runs [`deep_freeze`] over
//! it; from then on every reachable `Shared` node rejects writes.
//!
//! # Example
//!
//! ```
//! use signal_store_core::freeze::{deep_freeze, Freeze, FreezeVisitor, Shared};
//!
//! #[derive(Debug, Default)]
//! struct Node {
//!     label: String,
//!     next: Option<Shared<Node>>,
//! }
//!
//! impl Freeze for Node {
//!     fn freeze_with(&self, visitor: &mut FreezeVisitor) {
//!         self.next.freeze_with(visitor);
//!     }
//! }
//!
//! let a = Shared::new(Node { label: "a".into(), next: None });
//! let b = Shared::new(Node { label: "b".into(), next: Some(a.clone()) });
//! a.update(|node| node.next = Some(b.clone())).unwrap();
//!
//! // The cycle a -> b -> a terminates and each node is frozen once.
//! assert_eq!(deep_freeze(&a), 2);
//! assert!(b.update(|node| node.label.push('!')).is_err());
//! ```

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Attempted to write to a frozen node.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot mutate a frozen node")]
pub struct FrozenError;

/// Graph walk state for [`deep_freeze`].
#[derive(Debug, Default)]
pub struct FreezeVisitor {
    visited: HashSet<usize>,
    frozen: usize,
}

impl FreezeVisitor {
    /// Create an empty visitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node identity as visited. Returns `false` if it was seen before.
    pub fn enter(&mut self, identity: usize) -> bool {
        self.visited.insert(identity)
    }

    /// Number of nodes frozen by this walk.
    #[must_use]
    pub const fn frozen(&self) -> usize {
        self.frozen
    }

    fn record_frozen(&mut self) {
        self.frozen += 1;
    }
}

/// Types whose reachable nodes can be frozen.
///
/// The default implementation does nothing, which is correct for any type
/// without [`Shared`] nodes inside: `impl Freeze for MyState {}`. Types that
/// embed `Shared` nodes forward to each such field.
pub trait Freeze {
    /// Freeze every node reachable from `self`.
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        let _ = visitor;
    }
}

/// Freeze every node reachable from `value`.
///
/// Terminates on cyclic graphs: a node already visited in this walk, or
/// frozen by an earlier one, is not descended into again. Returns the number
/// of nodes this call froze.
pub fn deep_freeze<T: Freeze + ?Sized>(value: &T) -> usize {
    let mut visitor = FreezeVisitor::new();
    value.freeze_with(&mut visitor);
    visitor.frozen()
}

struct SharedNode<T> {
    value: RwLock<T>,
    frozen: AtomicBool,
}

/// A shared, interior-mutable node.
///
/// Clones share the node. Writes succeed until the node is reached by
/// [`deep_freeze`]; afterwards [`Shared::update`] returns [`FrozenError`].
pub struct Shared<T> {
    node: Arc<SharedNode<T>>,
}

impl<T> Shared<T> {
    /// Create a new unfrozen node.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            node: Arc::new(SharedNode {
                value: RwLock::new(value),
                frozen: AtomicBool::new(false),
            }),
        }
    }

    /// Read the node's value.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.node.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    /// Mutate the node's value.
    ///
    /// # Errors
    ///
    /// Returns [`FrozenError`] if the node has been frozen; the value is
    /// left untouched.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<(), FrozenError> {
        if self.is_frozen() {
            return Err(FrozenError);
        }
        let mut value = self.node.value.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the lock: a freeze may have completed meanwhile.
        if self.is_frozen() {
            return Err(FrozenError);
        }
        f(&mut value);
        Ok(())
    }

    /// Whether this node rejects writes.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.node.frozen.load(Ordering::Acquire)
    }

    /// Whether both handles point at the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.node).cast::<()>() as usize
    }
}

impl<T: Clone> Shared<T> {
    /// Clone the node's value out.
    #[must_use]
    pub fn get(&self) -> T {
        self.read(T::clone)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// Not recursive: nodes may form cycles.
impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl<T: Freeze> Freeze for Shared<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        if !visitor.enter(self.identity()) || self.is_frozen() {
            return;
        }
        // Hold the write lock while flipping the flag so no writer slips in.
        {
            let _guard = self.node.value.write().unwrap_or_else(PoisonError::into_inner);
            self.node.frozen.store(true, Ordering::Release);
        }
        visitor.record_frozen();
        self.read(|value| value.freeze_with(visitor));
    }
}

macro_rules! impl_freeze_for_values {
    ($($ty:ty),* $(,)?) => {
        $(impl Freeze for $ty {})*
    };
}

impl_freeze_for_values!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &str, Value,
);

impl<T: Freeze + ?Sized> Freeze for Box<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        (**self).freeze_with(visitor);
    }
}

impl<T: Freeze + ?Sized> Freeze for Arc<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        (**self).freeze_with(visitor);
    }
}

impl<T: Freeze> Freeze for Option<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        if let Some(value) = self {
            value.freeze_with(visitor);
        }
    }
}

impl<T: Freeze> Freeze for [T] {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        for value in self {
            value.freeze_with(visitor);
        }
    }
}

impl<T: Freeze> Freeze for Vec<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        self.as_slice().freeze_with(visitor);
    }
}

impl<T: Freeze> Freeze for VecDeque<T> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        for value in self {
            value.freeze_with(visitor);
        }
    }
}

impl<K, V: Freeze, H> Freeze for HashMap<K, V, H> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        for value in self.values() {
            value.freeze_with(visitor);
        }
    }
}

impl<K, V: Freeze> Freeze for BTreeMap<K, V> {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        for value in self.values() {
            value.freeze_with(visitor);
        }
    }
}

impl<A: Freeze, B: Freeze> Freeze for (A, B) {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        self.0.freeze_with(visitor);
        self.1.freeze_with(visitor);
    }
}

impl<A: Freeze, B: Freeze, C: Freeze> Freeze for (A, B, C) {
    fn freeze_with(&self, visitor: &mut FreezeVisitor) {
        self.0.freeze_with(visitor);
        self.1.freeze_with(visitor);
        self.2.freeze_with(visitor);
    }
}
