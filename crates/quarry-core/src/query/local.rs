//! Query execution against the local cache.

use super::compare::LocalComparisonOptions;
use super::evaluate::matches;
use super::ordering::sort_entities;
use super::outcome::QueryRecord;
use super::paths::resolve_path;
use crate::entity::Entity;
use crate::identity::IdentityMap;
use crate::metadata::EntityType;
use quarry_proto::{EntityQuery, PathExpr, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Run a validated query against the identity map alone.
///
/// Entities scheduled for deletion are invisible here. Without an explicit
/// ordering, results come back in key order so repeated runs agree.
/// Returns the records plus the pre-paging match count when the query
/// requested an inline count.
pub(crate) fn execute_locally(
    cache: &IdentityMap,
    entity_type: &EntityType,
    query: &EntityQuery,
    opts: &LocalComparisonOptions,
) -> (Vec<QueryRecord>, Option<u64>) {
    let mut matched: Vec<Arc<Entity>> = cache
        .iter()
        .filter(|(key, _)| key.entity_type() == entity_type.name)
        .map(|(_, entity)| Arc::clone(entity))
        .filter(|entity| !entity.state().is_deleted())
        .filter(|entity| {
            query
                .predicate
                .as_ref()
                .map_or(true, |p| matches(cache, entity, p, opts))
        })
        .collect();

    let inline_count = query.inline_count.then(|| matched.len() as u64);

    matched.sort_by_cached_key(|entity| {
        entity.key().map(|k| k.to_string()).unwrap_or_default()
    });
    sort_entities(cache, &mut matched, &query.order_by, opts);

    let skip = query.skip.unwrap_or(0) as usize;
    let mut page: Vec<Arc<Entity>> = matched.into_iter().skip(skip).collect();
    if let Some(take) = query.take {
        page.truncate(take as usize);
    }

    let records = if query.select.is_empty() {
        page.into_iter().map(QueryRecord::Entity).collect()
    } else {
        page.into_iter()
            .map(|entity| {
                let mut row = BTreeMap::new();
                for path in &query.select {
                    let value = PathExpr::parse(path)
                        .ok()
                        .and_then(|p| resolve_path(cache, &entity, &p))
                        .unwrap_or(Value::Null);
                    row.insert(path.clone(), value);
                }
                QueryRecord::Projection(row)
            })
            .collect()
    };
    (records, inline_count)
}
