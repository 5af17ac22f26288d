//! Pre-execution query validation against the metadata store.
//!
//! Every path a query mentions is checked before any evaluation or remote
//! dispatch, so a misspelled property fails the whole query instead of
//! silently matching nothing.

use crate::error::Error;
use crate::metadata::{DataType, EntityType, MetadataStore};
use quarry_proto::{EntityQuery, Operand, PathExpr, Predicate};
use std::sync::Arc;

/// Validate a query descriptor and return the entity type its resource
/// maps to.
pub(crate) fn validate_query(
    store: &MetadataStore,
    query: &EntityQuery,
) -> Result<Arc<EntityType>, Error> {
    let entity_type = store.entity_type_for_resource(&query.resource)?;
    if let Some(predicate) = &query.predicate {
        validate_predicate(store, &entity_type, predicate)?;
    }
    for spec in &query.order_by {
        validate_path_expr(store, &entity_type, &spec.path)?;
    }
    for path in &query.select {
        store.resolve_data_path(&entity_type, path)?;
    }
    for path in &query.expand {
        store.resolve_expand_path(&entity_type, path)?;
    }
    Ok(entity_type)
}

fn validate_predicate(
    store: &MetadataStore,
    entity_type: &EntityType,
    predicate: &Predicate,
) -> Result<(), Error> {
    match predicate {
        Predicate::Compare { left, right, .. } => {
            validate_parsed_path(store, entity_type, left)?;
            if let Operand::Path(p) = right {
                store.resolve_data_path(entity_type, p)?;
            }
            Ok(())
        }
        Predicate::And(list) | Predicate::Or(list) => {
            for p in list {
                validate_predicate(store, entity_type, p)?;
            }
            Ok(())
        }
        Predicate::Not(inner) => validate_predicate(store, entity_type, inner),
    }
}

fn validate_path_expr(
    store: &MetadataStore,
    entity_type: &EntityType,
    raw: &str,
) -> Result<(), Error> {
    let parsed = PathExpr::parse(raw)?;
    validate_parsed_path(store, entity_type, &parsed)
}

fn validate_parsed_path(
    store: &MetadataStore,
    entity_type: &EntityType,
    path: &PathExpr,
) -> Result<(), Error> {
    let prop = store.resolve_data_path(entity_type, path.path())?;
    if matches!(path, PathExpr::DatePart { .. }) && prop.data_type != DataType::Timestamp {
        return Err(Error::Proto(quarry_proto::Error::InvalidPredicate(format!(
            "date part requires a timestamp property, '{}' is not one",
            path.path()
        ))));
    }
    Ok(())
}
