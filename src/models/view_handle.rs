//! Weak handles to feed thumbnails, used to measure where a thumbnail sits on
//! screen right now.
//!
//! The thumbnail owns its handle (`Arc`); the registry keeps only a `Weak`, so
//! an unmounted thumbnail simply stops resolving instead of being kept alive.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::layout::ScreenRect;
use crate::models::media_entry::strip_uri_suffix;

/// Future returned by a measurement; `None` means the view is not laid out.
pub type MeasureFuture<'a> = Pin<Box<dyn Future<Output = Option<ScreenRect>> + Send + 'a>>;

/// Something that can report a thumbnail's current window rectangle.
///
/// Measurement round-trips through the platform layout pass, so it is async.
pub trait ViewHandle: Send + Sync {
    fn measure_in_window(&self) -> MeasureFuture<'_>;
}

/// Adapts a synchronous accessor into a [`ViewHandle`].
pub struct FnHandle<F>(pub F);

impl<F> ViewHandle for FnHandle<F>
where
    F: Fn() -> Option<ScreenRect> + Send + Sync,
{
    fn measure_in_window(&self) -> MeasureFuture<'_> {
        let rect = (self.0)();
        Box::pin(async move { rect })
    }
}

/// Key for a thumbnail inside a group; query strings and fragments in the
/// URI do not affect it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleKey(u64);

impl HandleKey {
    pub fn new(group_id: &str, uri: &str) -> Self {
        let uri = strip_uri_suffix(uri);
        let mut input = Vec::with_capacity(group_id.len() + uri.len() + 1);
        input.extend_from_slice(group_id.as_bytes());
        input.push(0);
        input.extend_from_slice(uri.as_bytes());
        Self(xxh3_64(&input))
    }
}

struct HandleSlot {
    group_id: String,
    handle: Weak<dyn ViewHandle>,
}

#[derive(Default)]
pub struct ViewHandleRegistry {
    handles: RwLock<HashMap<HandleKey, HandleSlot>>,
}

impl ViewHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a weak reference to `handle`, replacing any previous one.
    pub fn insert(&self, group_id: &str, uri: &str, handle: &Arc<dyn ViewHandle>) {
        let key = HandleKey::new(group_id, uri);
        self.handles.write().insert(
            key,
            HandleSlot {
                group_id: group_id.to_string(),
                handle: Arc::downgrade(handle),
            },
        );
        trace!(group_id, uri, "View handle registered");
    }

    pub fn remove(&self, group_id: &str, uri: &str) -> bool {
        self.handles
            .write()
            .remove(&HandleKey::new(group_id, uri))
            .is_some()
    }

    pub fn remove_group(&self, group_id: &str) -> usize {
        let mut handles = self.handles.write();
        let before = handles.len();
        handles.retain(|_, slot| slot.group_id != group_id);
        before - handles.len()
    }

    pub fn clear(&self) {
        self.handles.write().clear();
    }

    /// True when the handle exists and its owner is still alive.
    pub fn is_live(&self, group_id: &str, uri: &str) -> bool {
        self.upgrade(group_id, uri).is_some()
    }

    /// Measures the thumbnail for `(group_id, uri)`.
    ///
    /// Returns `None` when no handle is registered, its owner has dropped it,
    /// or the view reports no layout. The lock is not held across the await.
    pub async fn resolve(&self, group_id: &str, uri: &str) -> Option<ScreenRect> {
        let handle = self.upgrade(group_id, uri)?;
        let rect = handle.measure_in_window().await;
        trace!(group_id, uri, ?rect, "Measured view handle");
        rect.filter(|r| !r.is_empty())
    }

    fn upgrade(&self, group_id: &str, uri: &str) -> Option<Arc<dyn ViewHandle>> {
        let handles = self.handles.read();
        handles
            .get(&HandleKey::new(group_id, uri))
            .and_then(|slot| slot.handle.upgrade())
    }

    /// Drops slots whose owners are gone.
    pub fn prune(&self) -> usize {
        let mut handles = self.handles.write();
        let before = handles.len();
        handles.retain(|_, slot| slot.handle.strong_count() > 0);
        before - handles.len()
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(rect: ScreenRect) -> Arc<dyn ViewHandle> {
        Arc::new(FnHandle(move || Some(rect)))
    }

    #[test]
    fn test_key_ignores_query() {
        assert_eq!(
            HandleKey::new("g1", "hyper://a.jpg?token=1"),
            HandleKey::new("g1", "hyper://a.jpg")
        );
        assert_ne!(HandleKey::new("g1", "a.jpg"), HandleKey::new("g2", "a.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_live_handle() {
        let registry = ViewHandleRegistry::new();
        let rect = ScreenRect::new(10.0, 20.0, 50.0, 50.0);
        let owner = handle(rect);
        registry.insert("g1", "a.jpg", &owner);

        assert_eq!(registry.resolve("g1", "a.jpg").await, Some(rect));
        assert_eq!(registry.resolve("g1", "missing.jpg").await, None);
    }

    #[tokio::test]
    async fn test_dropped_owner_stops_resolving() {
        let registry = ViewHandleRegistry::new();
        let owner = handle(ScreenRect::new(0.0, 10.0, 20.0, 20.0));
        registry.insert("g1", "a.jpg", &owner);
        assert!(registry.is_live("g1", "a.jpg"));

        drop(owner);
        assert!(!registry.is_live("g1", "a.jpg"));
        assert_eq!(registry.resolve("g1", "a.jpg").await, None);
        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_empty_measurement_is_unavailable() {
        let registry = ViewHandleRegistry::new();
        let owner: Arc<dyn ViewHandle> = Arc::new(FnHandle(|| Some(ScreenRect::default())));
        registry.insert("g1", "a.jpg", &owner);
        assert_eq!(registry.resolve("g1", "a.jpg").await, None);
    }

    #[test]
    fn test_remove_group() {
        let registry = ViewHandleRegistry::new();
        let a = handle(ScreenRect::new(1.0, 1.0, 1.0, 1.0));
        registry.insert("g1", "a.jpg", &a);
        registry.insert("g1", "b.jpg", &a);
        registry.insert("g2", "a.jpg", &a);

        assert_eq!(registry.remove_group("g1"), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("g2", "a.jpg"));
    }
}
