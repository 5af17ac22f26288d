//! Merging remote result sets into the cache.
//!
//! A whole result set merges under one cache write lock, so concurrent
//! readers see either none of it or all of it. Events are buffered by the
//! caller and published after the lock drops.

use super::options::MergeStrategy;
use super::ManagerInner;
use crate::entity::Entity;
use crate::error::Error;
use crate::events::{EntityAction, EntityChanged, PendingEvent};
use crate::identity::IdentityMap;
use crate::key::EntityKey;
use crate::metadata::{DataProperty, DataType, EntityType};
use crate::relation::RelationArray;
use crate::state::EntityState;
use quarry_proto::{RawEntity, RawExpansion, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Merge a result set, returning the cache instances for the root rows.
///
/// Rows whose cached counterpart is scheduled for deletion (and preserved
/// by the strategy) are merged per the strategy but excluded from the
/// returned set, so pending deletions stay invisible to queries. Every
/// instance the merge touched, expansion children included, is appended to
/// `retrieved` exactly once.
pub(crate) fn merge_result_set(
    inner: &Arc<ManagerInner>,
    cache: &mut IdentityMap,
    entity_type: &Arc<EntityType>,
    rows: &[RawEntity],
    strategy: MergeStrategy,
    pending: &mut Vec<PendingEvent>,
    retrieved: &mut Vec<Arc<Entity>>,
) -> Result<Vec<Arc<Entity>>, Error> {
    let mut merged = Vec::with_capacity(rows.len());
    for raw in rows {
        let entity = merge_one(inner, cache, entity_type, raw, strategy, pending, retrieved)?;
        if !entity.state().is_deleted() {
            merged.push(entity);
        }
    }
    let mut seen = std::collections::HashSet::with_capacity(retrieved.len());
    retrieved.retain(|e| seen.insert(Arc::as_ptr(e)));
    debug!(
        resource = %entity_type.name,
        rows = rows.len(),
        returned = merged.len(),
        "merged result set"
    );
    Ok(merged)
}

/// Merge one raw row (and its expansions, recursively) into the cache.
pub(crate) fn merge_one(
    inner: &Arc<ManagerInner>,
    cache: &mut IdentityMap,
    default_type: &Arc<EntityType>,
    raw: &RawEntity,
    strategy: MergeStrategy,
    pending: &mut Vec<PendingEvent>,
    retrieved: &mut Vec<Arc<Entity>>,
) -> Result<Arc<Entity>, Error> {
    let entity_type = match &raw.entity_type {
        Some(name) => inner.metadata.entity_type(name)?,
        None => Arc::clone(default_type),
    };

    // Only declared properties participate; widths are canonicalized so
    // the row's key hashes identically to locally produced keys.
    let mut incoming = BTreeMap::new();
    for prop in &entity_type.data_properties {
        if let Some(value) = raw.values.get(&prop.name) {
            incoming.insert(
                prop.name.clone(),
                canonicalize(&entity_type.name, prop, value.clone())?,
            );
        }
    }
    let key = EntityKey::from_values(&entity_type, &incoming)?;

    let entity = match cache.resolve(&key) {
        None => {
            let mut values = BTreeMap::new();
            for prop in &entity_type.data_properties {
                values.insert(prop.name.clone(), prop.default.clone().unwrap_or(Value::Null));
            }
            values.extend(incoming);
            let entity = Entity::from_values(Arc::clone(&entity_type), values);
            entity.set_tracking(EntityState::Unchanged, Arc::downgrade(inner));
            cache.register(key.clone(), Arc::clone(&entity))?;
            pending.push(PendingEvent::Entity(EntityChanged {
                action: EntityAction::AttachOnQuery,
                entity: Some(Arc::clone(&entity)),
            }));
            entity
        }
        Some(existing) => {
            let state = existing.state();
            let overwrite = match state {
                EntityState::Unchanged => true,
                _ => strategy == MergeStrategy::OverwriteChanges,
            };
            if overwrite {
                existing.merge_values(incoming);
                {
                    let mut aspect = existing.aspect.write();
                    aspect.original_values = None;
                    aspect.state = EntityState::Unchanged;
                }
                pending.push(PendingEvent::Entity(EntityChanged {
                    action: EntityAction::MergeOnQuery,
                    entity: Some(Arc::clone(&existing)),
                }));
                if state != EntityState::Unchanged {
                    // Covers refresh-resurrection of a pending delete too.
                    pending.push(PendingEvent::Entity(EntityChanged {
                        action: EntityAction::StateChange,
                        entity: Some(Arc::clone(&existing)),
                    }));
                }
            }
            existing
        }
    };

    retrieved.push(Arc::clone(&entity));

    for (name, expansion) in &raw.expansions {
        let nav = entity_type
            .navigation_property(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: entity_type.name.clone(),
                path: name.clone(),
            })?;
        let target_type = inner.metadata.entity_type(&nav.target)?;
        match expansion {
            RawExpansion::One(child) => {
                if nav.is_many() {
                    return Err(Error::WrongCardinality {
                        entity_type: entity_type.name.clone(),
                        navigation: nav.name,
                    });
                }
                if let Some(child) = child {
                    merge_one(inner, cache, &target_type, child, strategy, pending, retrieved)?;
                }
            }
            RawExpansion::Many(children) => {
                if !nav.is_many() {
                    return Err(Error::WrongCardinality {
                        entity_type: entity_type.name.clone(),
                        navigation: nav.name,
                    });
                }
                let mut members = Vec::with_capacity(children.len());
                for child in children {
                    let member =
                        merge_one(inner, cache, &target_type, child, strategy, pending, retrieved)?;
                    if !member.state().is_deleted() {
                        members.push(member);
                    }
                }
                let array = relation_array_for(inner, &entity, &key, &nav);
                array.extend_merged(&members, pending);
                array.mark_loaded();
            }
        }
    }

    Ok(entity)
}

fn relation_array_for(
    inner: &Arc<ManagerInner>,
    entity: &Arc<Entity>,
    key: &EntityKey,
    nav: &crate::metadata::NavigationProperty,
) -> Arc<RelationArray> {
    let entry = inner
        .relation_arrays
        .entry((key.clone(), nav.name.clone()))
        .or_insert_with(|| {
            RelationArray::new(Arc::downgrade(entity), nav.clone(), Arc::downgrade(inner))
        });
    Arc::clone(entry.value())
}

fn canonicalize(type_name: &str, prop: &DataProperty, value: Value) -> Result<Value, Error> {
    if !prop.data_type.accepts(&value) {
        return Err(Error::InvalidValue {
            entity_type: type_name.to_string(),
            property: prop.name.clone(),
        });
    }
    Ok(match (prop.data_type, value) {
        (DataType::Int64, Value::Int32(i)) => Value::Int64(i64::from(i)),
        (DataType::Float64, Value::Float32(f)) => Value::Float64(f64::from(f)),
        (_, v) => v,
    })
}
