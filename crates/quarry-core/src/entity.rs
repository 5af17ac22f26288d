//! Tracked entity instances.
//!
//! An [`Entity`] is a property bag plus a tracking aspect. The aspect
//! records the lifecycle state, a weak link back to the owning manager, and
//! a lazily captured snapshot of pre-modification values.
//!
//! Lock order throughout the crate: the manager's cache lock is acquired
//! before any per-entity lock, never the other way around. Read accessors
//! clone and release; they never hand out guards.

use crate::error::Error;
use crate::events::{
    EntityAction, EntityChanged, PendingEvent, PropertyChanged,
};
use crate::key::EntityKey;
use crate::manager::ManagerInner;
use crate::metadata::{DataProperty, DataType, EntityType};
use crate::relation::RelationArray;
use crate::state::EntityState;
use parking_lot::RwLock;
use quarry_proto::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Tracking state attached to every entity.
#[derive(Debug)]
pub(crate) struct EntityAspect {
    pub(crate) state: EntityState,
    pub(crate) manager: Weak<ManagerInner>,
    /// Full pre-modification snapshot, captured once on the first write
    /// that leaves `Unchanged`.
    pub(crate) original_values: Option<BTreeMap<String, Value>>,
}

/// A cached entity instance.
///
/// Instances are always handled as `Arc<Entity>`; the identity map
/// guarantees at most one instance per key within a manager.
#[derive(Debug)]
pub struct Entity {
    entity_type: Arc<EntityType>,
    values: RwLock<BTreeMap<String, Value>>,
    pub(crate) aspect: RwLock<EntityAspect>,
}

impl Entity {
    /// Create a detached instance with property defaults applied.
    pub fn new(entity_type: Arc<EntityType>) -> Arc<Self> {
        let mut values = BTreeMap::new();
        for prop in &entity_type.data_properties {
            let v = prop.default.clone().unwrap_or(Value::Null);
            values.insert(prop.name.clone(), v);
        }
        Self::from_values(entity_type, values)
    }

    /// Create a detached instance from an explicit property map.
    pub fn from_values(entity_type: Arc<EntityType>, values: BTreeMap<String, Value>) -> Arc<Self> {
        Arc::new(Self {
            entity_type,
            values: RwLock::new(values),
            aspect: RwLock::new(EntityAspect {
                state: EntityState::Detached,
                manager: Weak::new(),
                original_values: None,
            }),
        })
    }

    /// The schema this instance conforms to.
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EntityState {
        self.aspect.read().state
    }

    /// Check if this instance is tracked by a manager.
    pub fn is_attached(&self) -> bool {
        self.state().is_attached()
    }

    /// Check if this instance carries unsaved changes.
    pub fn has_changes(&self) -> bool {
        self.state().has_changes()
    }

    /// Read one property. Returns `None` for names the type does not
    /// declare.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// Clone the full property map.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.read().clone()
    }

    /// The pre-modification value of one property. Falls back to the
    /// current value when no snapshot has been captured.
    pub fn original_value(&self, name: &str) -> Option<Value> {
        let aspect = self.aspect.read();
        if let Some(originals) = &aspect.original_values {
            return originals.get(name).cloned();
        }
        drop(aspect);
        self.get(name)
    }

    /// Clone the pre-modification snapshot, when one has been captured.
    pub fn original_values(&self) -> Option<BTreeMap<String, Value>> {
        self.aspect.read().original_values.clone()
    }

    /// Compute this instance's key from its current values.
    pub fn key(&self) -> Result<EntityKey, Error> {
        EntityKey::from_values(&self.entity_type, &self.values.read())
    }

    fn validated(&self, name: &str, value: Value) -> Result<(DataProperty, Value), Error> {
        let prop = self
            .entity_type
            .data_property(name)
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: self.entity_type.name.clone(),
                path: name.to_string(),
            })?
            .clone();
        if !prop.data_type.accepts(&value) {
            return Err(Error::InvalidValue {
                entity_type: self.entity_type.name.clone(),
                property: prop.name.clone(),
            });
        }
        // Canonicalize storage width so change detection and keys compare
        // values, not encodings.
        let value = match (prop.data_type, value) {
            (DataType::Int64, Value::Int32(i)) => Value::Int64(i64::from(i)),
            (DataType::Float64, Value::Float32(f)) => Value::Float64(f64::from(f)),
            (_, v) => v,
        };
        Ok((prop, value))
    }

    /// Bulk-overlay values during a merge. Bypasses the tracked write
    /// pipeline; callers hold the cache lock and buffer their own events.
    pub(crate) fn merge_values(&self, incoming: BTreeMap<String, Value>) {
        let mut values = self.values.write();
        for (name, value) in incoming {
            values.insert(name, value);
        }
    }

    /// Install tracking state when the cache adopts this instance.
    pub(crate) fn set_tracking(&self, state: EntityState, manager: Weak<ManagerInner>) {
        let mut aspect = self.aspect.write();
        aspect.state = state;
        aspect.manager = manager;
    }

    /// Write one property.
    ///
    /// On an attached instance this validates the value, rekeys the
    /// identity map when a key property changes, captures the original
    /// snapshot on the first write out of `Unchanged`, moves the state to
    /// `Modified`, and raises property and entity events. Writing a value
    /// equal to the current one is a no-op. On a detached instance the
    /// value is validated and stored without tracking.
    pub fn set(self: &Arc<Self>, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let (prop, value) = self.validated(name, value.into())?;
        let manager = self.aspect.read().manager.upgrade();
        match manager {
            None => {
                self.values.write().insert(prop.name, value);
                Ok(())
            }
            Some(inner) => self.set_attached(&inner, &prop, value),
        }
    }

    fn set_attached(
        self: &Arc<Self>,
        inner: &Arc<ManagerInner>,
        prop: &DataProperty,
        value: Value,
    ) -> Result<(), Error> {
        let mut pending = Vec::new();
        {
            let mut cache = inner.cache.write();
            let old = self
                .values
                .read()
                .get(&prop.name)
                .cloned()
                .unwrap_or(Value::Null);
            if old == value {
                return Ok(());
            }
            if prop.is_key {
                let old_key = self.key()?;
                let mut next = self.values.read().clone();
                next.insert(prop.name.clone(), value.clone());
                let new_key = EntityKey::from_values(&self.entity_type, &next)?;
                cache.rekey(&old_key, new_key.clone())?;
                // Relation arrays are addressed by key; move them along so
                // loaded collections survive the key change.
                let moved: Vec<_> = inner
                    .relation_arrays
                    .iter()
                    .filter(|entry| entry.key().0 == old_key)
                    .map(|entry| (entry.key().1.clone(), Arc::clone(entry.value())))
                    .collect();
                for (nav_name, array) in moved {
                    inner
                        .relation_arrays
                        .remove(&(old_key.clone(), nav_name.clone()));
                    inner
                        .relation_arrays
                        .insert((new_key.clone(), nav_name), array);
                }
            }
            {
                let mut aspect = self.aspect.write();
                if aspect.state == EntityState::Unchanged {
                    if aspect.original_values.is_none() {
                        aspect.original_values = Some(self.values.read().clone());
                    }
                    aspect.state = EntityState::Modified;
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::StateChange,
                        entity: Some(Arc::clone(self)),
                    }));
                }
            }
            self.values.write().insert(prop.name.clone(), value.clone());
            pending.push(PendingEvent::Property(PropertyChanged {
                entity: Arc::clone(self),
                property: prop.name.clone(),
                old_value: old,
                new_value: value,
            }));
            pending.push(PendingEvent::Entity(EntityChanged {
                action: EntityAction::PropertyChange,
                entity: Some(Arc::clone(self)),
            }));
        }
        inner.events.publish_all(pending);
        Ok(())
    }

    fn require_manager(&self) -> Result<Arc<ManagerInner>, Error> {
        self.aspect.read().manager.upgrade().ok_or(Error::Detached)
    }

    /// Schedule this instance for deletion.
    ///
    /// `Added` instances are simply detached (the remote store never saw
    /// them); `Unchanged` and `Modified` move to `Deleted`; `Deleted` is a
    /// no-op. Fails with [`Error::Detached`] on untracked instances.
    pub fn mark_deleted(self: &Arc<Self>) -> Result<(), Error> {
        let inner = self.require_manager()?;
        let mut pending = Vec::new();
        {
            let mut cache = inner.cache.write();
            let state = self.aspect.read().state;
            match state {
                EntityState::Added => {
                    detach_locked(&inner, &mut cache, self, &mut pending)?;
                }
                EntityState::Unchanged | EntityState::Modified => {
                    self.aspect.write().state = EntityState::Deleted;
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::StateChange,
                        entity: Some(Arc::clone(self)),
                    }));
                }
                EntityState::Deleted => {}
                EntityState::Detached => return Err(Error::Detached),
            }
        }
        inner.events.publish_all(pending);
        Ok(())
    }

    /// Roll back pending changes.
    ///
    /// `Modified` and `Deleted` restore the original snapshot and return to
    /// `Unchanged`; `Added` detaches; `Unchanged` is a no-op.
    pub fn reject_changes(self: &Arc<Self>) -> Result<(), Error> {
        let inner = self.require_manager()?;
        let mut pending = Vec::new();
        {
            let mut cache = inner.cache.write();
            let state = self.aspect.read().state;
            match state {
                EntityState::Added => {
                    detach_locked(&inner, &mut cache, self, &mut pending)?;
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::RejectChanges,
                        entity: Some(Arc::clone(self)),
                    }));
                }
                EntityState::Modified | EntityState::Deleted => {
                    let mut aspect = self.aspect.write();
                    if let Some(originals) = aspect.original_values.take() {
                        // A rejected key change must move the registration
                        // back as well.
                        let current_key = self.key()?;
                        let original_key =
                            EntityKey::from_values(&self.entity_type, &originals)?;
                        if current_key != original_key {
                            cache.rekey(&current_key, original_key)?;
                        }
                        *self.values.write() = originals;
                    }
                    aspect.state = EntityState::Unchanged;
                    drop(aspect);
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::RejectChanges,
                        entity: Some(Arc::clone(self)),
                    }));
                }
                EntityState::Unchanged => {}
                EntityState::Detached => return Err(Error::Detached),
            }
        }
        inner.events.publish_all(pending);
        Ok(())
    }

    /// Mark pending changes as saved.
    ///
    /// `Added` and `Modified` become `Unchanged` and the snapshot is
    /// discarded; `Deleted` detaches; `Unchanged` is a no-op.
    pub fn accept_changes(self: &Arc<Self>) -> Result<(), Error> {
        let inner = self.require_manager()?;
        let mut pending = Vec::new();
        {
            let mut cache = inner.cache.write();
            let state = self.aspect.read().state;
            match state {
                EntityState::Added | EntityState::Modified => {
                    let mut aspect = self.aspect.write();
                    aspect.original_values = None;
                    aspect.state = EntityState::Unchanged;
                    drop(aspect);
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::AcceptChanges,
                        entity: Some(Arc::clone(self)),
                    }));
                }
                EntityState::Deleted => {
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::AcceptChanges,
                        entity: Some(Arc::clone(self)),
                    }));
                    detach_locked(&inner, &mut cache, self, &mut pending)?;
                }
                EntityState::Unchanged => {}
                EntityState::Detached => return Err(Error::Detached),
            }
        }
        inner.events.publish_all(pending);
        Ok(())
    }

    /// Remove this instance from its manager. Values survive; tracking
    /// state and the original snapshot do not.
    pub fn detach(self: &Arc<Self>) -> Result<(), Error> {
        let inner = self.require_manager()?;
        let mut pending = Vec::new();
        {
            let mut cache = inner.cache.write();
            detach_locked(&inner, &mut cache, self, &mut pending)?;
        }
        inner.events.publish_all(pending);
        Ok(())
    }

    /// Resolve a to-one navigation against the cache.
    ///
    /// Returns `None` when the foreign key is null or the target is not
    /// cached (or is scheduled for deletion). Never goes remote.
    pub fn related_one(self: &Arc<Self>, navigation: &str) -> Result<Option<Arc<Entity>>, Error> {
        let nav = self
            .entity_type
            .navigation_property(navigation)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: self.entity_type.name.clone(),
                path: navigation.to_string(),
            })?;
        if nav.is_many() {
            return Err(Error::WrongCardinality {
                entity_type: self.entity_type.name.clone(),
                navigation: nav.name,
            });
        }
        let inner = self.require_manager()?;
        let fk = self.get(&nav.foreign_key).unwrap_or(Value::Null);
        if fk.is_null() {
            return Ok(None);
        }
        let target_key = EntityKey::new(nav.target.clone(), vec![fk])?;
        let resolved = inner.cache.read().resolve(&target_key);
        Ok(resolved.filter(|e| !e.state().is_deleted()))
    }

    /// The relation array for a to-many navigation.
    ///
    /// One array instance exists per (entity, navigation) pair; repeated
    /// calls return the same `Arc`.
    pub fn related_many(self: &Arc<Self>, navigation: &str) -> Result<Arc<RelationArray>, Error> {
        let nav = self
            .entity_type
            .navigation_property(navigation)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: self.entity_type.name.clone(),
                path: navigation.to_string(),
            })?;
        if !nav.is_many() {
            return Err(Error::WrongCardinality {
                entity_type: self.entity_type.name.clone(),
                navigation: nav.name,
            });
        }
        let inner = self.require_manager()?;
        let key = self.key()?;
        let entry = inner
            .relation_arrays
            .entry((key, nav.name.clone()))
            .or_insert_with(|| RelationArray::new(Arc::downgrade(self), nav, Arc::downgrade(&inner)));
        Ok(Arc::clone(entry.value()))
    }
}

/// Detach under an already-held cache write lock. Used by the deletion,
/// rejection, and clear paths as well as the public detach.
pub(crate) fn detach_locked(
    inner: &Arc<ManagerInner>,
    cache: &mut crate::identity::IdentityMap,
    entity: &Arc<Entity>,
    pending: &mut Vec<PendingEvent>,
) -> Result<(), Error> {
    let key = entity.key()?;
    cache.unregister(&key);
    inner.relation_arrays.retain(|k, _| k.0 != key);
    let mut aspect = entity.aspect.write();
    aspect.state = EntityState::Detached;
    aspect.manager = Weak::new();
    aspect.original_values = None;
    drop(aspect);
    pending.push(PendingEvent::Entity(EntityChanged {
        action: EntityAction::Detach,
        entity: Some(Arc::clone(entity)),
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::DataType;

    fn customer_type() -> Arc<EntityType> {
        Arc::new(
            EntityType::new("Customer", "Customers")
                .with_property(DataProperty::key("customerId", DataType::Int64))
                .with_property(DataProperty::new("companyName", DataType::String))
                .with_property(
                    DataProperty::optional("region", DataType::String).with_default("none"),
                ),
        )
    }

    #[test]
    fn test_new_applies_defaults() {
        let e = Entity::new(customer_type());
        assert_eq!(e.get("region"), Some(Value::String("none".into())));
        assert_eq!(e.get("companyName"), Some(Value::Null));
        assert_eq!(e.state(), EntityState::Detached);
    }

    #[test]
    fn test_detached_set_validates() {
        let e = Entity::new(customer_type());
        e.set("companyName", "Alfreds").unwrap();
        assert_eq!(e.get("companyName"), Some(Value::String("Alfreds".into())));

        assert!(matches!(
            e.set("companyName", Value::Int64(1)),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            e.set("nope", "x"),
            Err(Error::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_width_canonicalized_on_set() {
        let e = Entity::new(customer_type());
        e.set("customerId", Value::Int32(7)).unwrap();
        assert_eq!(e.get("customerId"), Some(Value::Int64(7)));
    }

    #[test]
    fn test_key_requires_key_values() {
        let e = Entity::new(customer_type());
        assert!(e.key().is_err());
        e.set("customerId", 7i64).unwrap();
        assert_eq!(e.key().unwrap().to_string(), "Customer:(7)");
    }

    #[test]
    fn test_detached_lifecycle_calls_fail() {
        let e = Entity::new(customer_type());
        assert!(matches!(e.mark_deleted(), Err(Error::Detached)));
        assert!(matches!(e.reject_changes(), Err(Error::Detached)));
        assert!(matches!(e.accept_changes(), Err(Error::Detached)));
        assert!(matches!(e.detach(), Err(Error::Detached)));
    }
}
