//! Change notification hub.
//!
//! Subscribers are invoked synchronously, in subscription order, after the
//! cache mutation that produced the event has fully committed and its locks
//! are released. Callbacks may therefore call back into the manager.

use crate::entity::Entity;
use parking_lot::RwLock;
use quarry_proto::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// What happened to an entity (or to the whole cache).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAction {
    /// Explicitly attached or created through the manager.
    Attach,
    /// Attached because a query result introduced a new key.
    AttachOnQuery,
    /// Removed from the cache.
    Detach,
    /// A data property changed value.
    PropertyChange,
    /// The lifecycle state changed.
    StateChange,
    /// A query result merged into an already-cached entity.
    MergeOnQuery,
    /// Pending changes were rolled back.
    RejectChanges,
    /// Pending changes were marked as saved.
    AcceptChanges,
    /// The entire cache was cleared. The event carries no entity.
    Clear,
}

/// A cache-level change notification.
#[derive(Clone)]
pub struct EntityChanged {
    /// What happened.
    pub action: EntityAction,
    /// The affected entity; `None` only for [`EntityAction::Clear`].
    pub entity: Option<Arc<Entity>>,
}

/// A property-level change notification.
#[derive(Clone)]
pub struct PropertyChanged {
    pub entity: Arc<Entity>,
    pub property: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// One aggregated notification per relation-array mutation, however many
/// items that mutation touched.
#[derive(Clone)]
pub struct ArrayChanged {
    pub owner: Arc<Entity>,
    pub navigation: String,
    pub added: Vec<Arc<Entity>>,
    pub removed: Vec<Arc<Entity>>,
}

/// Handle returned by the subscribe methods; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type EntityCallback = Box<dyn Fn(&EntityChanged) + Send + Sync>;
type PropertyCallback = Box<dyn Fn(&PropertyChanged) + Send + Sync>;
type ArrayCallback = Box<dyn Fn(&ArrayChanged) + Send + Sync>;

/// Subscription registry plus the global suppression switch.
pub struct EventHub {
    next_id: AtomicU64,
    suppressed: AtomicBool,
    array_enabled: AtomicBool,
    entity_subs: RwLock<Vec<(u64, EntityCallback)>>,
    property_subs: RwLock<Vec<(u64, PropertyCallback)>>,
    array_subs: RwLock<Vec<(u64, ArrayCallback)>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            suppressed: AtomicBool::new(false),
            array_enabled: AtomicBool::new(true),
            entity_subs: RwLock::default(),
            property_subs: RwLock::default(),
            array_subs: RwLock::default(),
        }
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribe to cache-level changes.
    pub fn on_entity_changed(
        &self,
        callback: impl Fn(&EntityChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.entity_subs.write().push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    /// Subscribe to property-level changes.
    pub fn on_property_changed(
        &self,
        callback: impl Fn(&PropertyChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.property_subs.write().push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    /// Subscribe to relation-array changes.
    pub fn on_array_changed(
        &self,
        callback: impl Fn(&ArrayChanged) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id();
        self.array_subs.write().push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.entity_subs.write().retain(|(i, _)| *i != id.0);
        self.property_subs.write().retain(|(i, _)| *i != id.0);
        self.array_subs.write().retain(|(i, _)| *i != id.0);
    }

    /// Check whether publication is currently suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire)
    }

    /// Suppress all publication until the returned guard is dropped.
    /// Events raised while suppressed are discarded, not queued.
    pub fn suppress(self: &Arc<Self>) -> SuppressGuard {
        self.suppressed.store(true, Ordering::Release);
        SuppressGuard {
            hub: Arc::clone(self),
        }
    }

    /// Enable or disable array-change notifications. Disabling never alters
    /// the underlying collections, only the notifications about them.
    pub fn set_array_events_enabled(&self, enabled: bool) {
        self.array_enabled.store(enabled, Ordering::Release);
    }

    /// Check whether array-change notifications are enabled.
    pub fn array_events_enabled(&self) -> bool {
        self.array_enabled.load(Ordering::Acquire)
    }

    /// Disable array-change notifications until the returned guard is
    /// dropped; the prior setting is restored on drop.
    pub fn suppress_array_events(self: &Arc<Self>) -> ArraySuppressGuard {
        let previous = self.array_enabled.swap(false, Ordering::AcqRel);
        ArraySuppressGuard {
            hub: Arc::clone(self),
            previous,
        }
    }

    pub fn publish_entity(&self, event: &EntityChanged) {
        if self.is_suppressed() {
            return;
        }
        let subs = self.entity_subs.read();
        for (_, callback) in subs.iter() {
            callback(event);
        }
    }

    pub fn publish_property(&self, event: &PropertyChanged) {
        if self.is_suppressed() {
            return;
        }
        let subs = self.property_subs.read();
        for (_, callback) in subs.iter() {
            callback(event);
        }
    }

    pub fn publish_array(&self, event: &ArrayChanged) {
        if self.is_suppressed() || !self.array_events_enabled() {
            return;
        }
        let subs = self.array_subs.read();
        for (_, callback) in subs.iter() {
            callback(event);
        }
    }
}

/// Re-enables publication on drop.
pub struct SuppressGuard {
    hub: Arc<EventHub>,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.hub.suppressed.store(false, Ordering::Release);
    }
}

/// Restores the previous array-event setting on drop.
pub struct ArraySuppressGuard {
    hub: Arc<EventHub>,
    previous: bool,
}

impl Drop for ArraySuppressGuard {
    fn drop(&mut self) {
        self.hub.array_enabled.store(self.previous, Ordering::Release);
    }
}

/// An event captured while a cache lock was held, for publication after
/// the lock is released.
pub(crate) enum PendingEvent {
    Entity(EntityChanged),
    Property(PropertyChanged),
    Array(ArrayChanged),
}

impl EventHub {
    pub(crate) fn publish_all(&self, pending: Vec<PendingEvent>) {
        for event in pending {
            match event {
                PendingEvent::Entity(e) => self.publish_entity(&e),
                PendingEvent::Property(e) => self.publish_property(&e),
                PendingEvent::Array(e) => self.publish_array(&e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_publish_unsubscribe() {
        let hub = Arc::new(EventHub::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let id = hub.on_entity_changed(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });

        let event = EntityChanged {
            action: EntityAction::Clear,
            entity: None,
        };
        hub.publish_entity(&event);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        hub.unsubscribe(id);
        hub.publish_entity(&event);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suppression_discards() {
        let hub = Arc::new(EventHub::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        hub.on_entity_changed(move |_| {
            seen2.fetch_add(1, Ordering::SeqCst);
        });

        let event = EntityChanged {
            action: EntityAction::Clear,
            entity: None,
        };
        {
            let _guard = hub.suppress();
            hub.publish_entity(&event);
        }
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        hub.publish_entity(&event);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
