use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

const LOCATOR_PREFIX: &str = "blob:readaloud/";

/// In-process registry of fetched audio bytes, addressed by opaque locator
/// strings. Whoever inserts a blob owns the locator and revokes it when the
/// owning session ends or is replaced, so repeated requests cannot
/// accumulate audio buffers.
#[derive(Debug, Clone, Default)]
pub struct BlobStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    blobs: Mutex<HashMap<u64, Bytes>>,
    next_id: AtomicU64,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bytes: Bytes) -> String {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.blobs().insert(id, bytes);
        tracing::debug!(id, "registered blob");
        format!("{LOCATOR_PREFIX}{id}")
    }

    pub fn get(&self, locator: &str) -> Option<Bytes> {
        let id = parse_id(locator)?;
        self.blobs().get(&id).cloned()
    }

    /// Releases a locator. Revoking an unknown or already-revoked locator
    /// is a no-op.
    pub fn revoke(&self, locator: &str) -> bool {
        let Some(id) = parse_id(locator) else {
            return false;
        };
        let removed = self.blobs().remove(&id).is_some();
        if removed {
            tracing::debug!(id, "revoked blob");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.blobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<u64, Bytes>> {
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn parse_id(locator: &str) -> Option<u64> {
    locator.strip_prefix(LOCATOR_PREFIX)?.parse().ok()
}
