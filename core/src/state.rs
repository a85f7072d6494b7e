//! Store state requirements and top-level merging.

use crate::freeze::Freeze;
use serde_json::Value;
use std::fmt::Debug;

/// Shallow, top-level merge of a partial update into a snapshot.
///
/// `merge` never mutates `self`; it builds the next snapshot. Fields present
/// in the patch replace the corresponding top-level fields wholesale, nested
/// values are not merged.
///
/// # Example
///
/// ```
/// use signal_store_core::state::Merge;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Profile { name: String, visits: u32 }
///
/// #[derive(Default)]
/// struct ProfilePatch { name: Option<String>, visits: Option<u32> }
///
/// impl Merge for Profile {
///     type Patch = ProfilePatch;
///
///     fn merge(&self, patch: ProfilePatch) -> Self {
///         Self {
///             name: patch.name.unwrap_or_else(|| self.name.clone()),
///             visits: patch.visits.unwrap_or(self.visits),
///         }
///     }
/// }
///
/// let before = Profile { name: "ada".into(), visits: 1 };
/// let after = before.merge(ProfilePatch { visits: Some(2), ..Default::default() });
/// assert_eq!(after, Profile { name: "ada".into(), visits: 2 });
/// assert_eq!(before.visits, 1);
/// ```
pub trait Merge: Sized {
    /// Partial update type produced by loaders and actions
    type Patch: Send + 'static;

    /// Build the next snapshot from `self` and `patch`.
    #[must_use]
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// Everything a type needs to be the state of a store.
pub trait StoreState: Merge + Freeze + Debug + Send + Sync + 'static {}

impl<T> StoreState for T where T: Merge + Freeze + Debug + Send + Sync + 'static {}

/// Dynamic JSON state.
///
/// Object patches are merged key by key into an object snapshot; any other
/// combination replaces the snapshot with the patch.
impl Merge for Value {
    type Patch = Self;

    fn merge(&self, patch: Self) -> Self {
        match (self, patch) {
            (Self::Object(current), Self::Object(patch)) => {
                let mut next = current.clone();
                for (key, value) in patch {
                    next.insert(key, value);
                }
                Self::Object(next)
            },
            (_, patch) => patch,
        }
    }
}
