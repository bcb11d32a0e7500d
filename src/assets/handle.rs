//! Reference-counted asset handles.
//!
//! A handle keeps its asset alive: the server may drop its own reference,
//! but the value is freed only after the last handle goes away. Snapshots
//! reference assets by id and the prepare stages resolve them to handles for
//! the duration of a tick, which is what guarantees every GPU resource
//! referenced by a dispatched command outlives the dispatch of that command.

use std::sync::Arc;

use super::ids::AssetId;

/// Typed, cheaply clonable reference to a loaded asset.
pub struct AssetHandle<T> {
    id: AssetId,
    value: Arc<T>,
}

impl<T> AssetHandle<T> {
    pub(crate) fn new(id: AssetId, value: Arc<T>) -> Self {
        Self { id, value }
    }

    #[must_use]
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Number of live references, counting the server's own.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.value)
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Arc::clone(&self.value),
        }
    }
}

impl<T> std::ops::Deref for AssetHandle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}
