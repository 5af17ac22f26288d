//! Loaded collections for to-many navigations.

use crate::entity::Entity;
use crate::error::Error;
use crate::events::{ArrayChanged, PendingEvent};
use crate::manager::ManagerInner;
use crate::metadata::NavigationProperty;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// The materialized contents of one to-many navigation on one entity.
///
/// Starts empty and unloaded; expansion merges and explicit loads fill it
/// and flip the loaded flag. Each mutation raises a single aggregated
/// change event, no matter how many items it touched.
pub struct RelationArray {
    owner: Weak<Entity>,
    navigation: NavigationProperty,
    manager: Weak<ManagerInner>,
    items: RwLock<Vec<Arc<Entity>>>,
    loaded: AtomicBool,
}

impl RelationArray {
    pub(crate) fn new(
        owner: Weak<Entity>,
        navigation: NavigationProperty,
        manager: Weak<ManagerInner>,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner,
            navigation,
            manager,
            items: RwLock::new(Vec::new()),
            loaded: AtomicBool::new(false),
        })
    }

    /// The navigation this array materializes.
    pub fn navigation(&self) -> &NavigationProperty {
        &self.navigation
    }

    /// Whether the collection has been populated from the remote store.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::Release);
    }

    /// Clone the current contents.
    pub fn items(&self) -> Vec<Arc<Entity>> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    fn contains(&self, entity: &Arc<Entity>) -> bool {
        self.items.read().iter().any(|e| Arc::ptr_eq(e, entity))
    }

    /// Add a child to the collection.
    ///
    /// Sets the child's foreign key to the owner's key value, which runs the
    /// normal property-write pipeline (state transition, property events),
    /// then appends and raises one array-change event. Adding an item that
    /// is already present is a no-op.
    pub fn push(&self, child: &Arc<Entity>) -> Result<(), Error> {
        if self.contains(child) {
            return Ok(());
        }
        let owner = self.owner.upgrade().ok_or(Error::Detached)?;
        let manager = self.manager.upgrade().ok_or(Error::Detached)?;
        let owner_key = owner.key()?;
        let key_values = owner_key.values();
        let fk_value = key_values.first().cloned().ok_or_else(|| {
            Error::MissingKey(owner.entity_type().name.clone())
        })?;
        child.set(&self.navigation.foreign_key, fk_value)?;
        self.items.write().push(Arc::clone(child));
        manager.events.publish_array(&ArrayChanged {
            owner,
            navigation: self.navigation.name.clone(),
            added: vec![Arc::clone(child)],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Remove a child from the collection, nulling its foreign key.
    /// Returns whether the child was present.
    pub fn remove(&self, child: &Arc<Entity>) -> Result<bool, Error> {
        if !self.contains(child) {
            return Ok(false);
        }
        let owner = self.owner.upgrade().ok_or(Error::Detached)?;
        let manager = self.manager.upgrade().ok_or(Error::Detached)?;
        child.set(&self.navigation.foreign_key, quarry_proto::Value::Null)?;
        self.items.write().retain(|e| !Arc::ptr_eq(e, child));
        manager.events.publish_array(&ArrayChanged {
            owner,
            navigation: self.navigation.name.clone(),
            added: Vec::new(),
            removed: vec![Arc::clone(child)],
        });
        Ok(true)
    }

    /// Append merged items that are not already present and buffer one
    /// aggregated event for them. Called with the cache lock held; must not
    /// run the property-write pipeline.
    pub(crate) fn extend_merged(
        &self,
        incoming: &[Arc<Entity>],
        pending: &mut Vec<PendingEvent>,
    ) {
        let mut added = Vec::new();
        {
            let mut items = self.items.write();
            for child in incoming {
                if !items.iter().any(|e| Arc::ptr_eq(e, child)) {
                    items.push(Arc::clone(child));
                    added.push(Arc::clone(child));
                }
            }
        }
        if added.is_empty() {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            pending.push(PendingEvent::Array(ArrayChanged {
                owner,
                navigation: self.navigation.name.clone(),
                added,
                removed: Vec::new(),
            }));
        }
    }
}
