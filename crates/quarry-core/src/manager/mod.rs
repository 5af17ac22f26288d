//! The entity manager: identity map, query execution, and change tracking.

mod merge;
mod options;

pub use options::{FetchStrategy, MergeStrategy, QueryOptions};

use crate::entity::Entity;
use crate::error::Error;
use crate::events::{
    ArraySuppressGuard, EntityAction, EntityChanged, EventHub, PendingEvent, SuppressGuard,
};
use crate::executor::QueryExecutor;
use crate::identity::IdentityMap;
use crate::key::EntityKey;
use crate::metadata::{EntityType, MetadataStore};
use crate::query::local::execute_locally;
use crate::query::validate::validate_query;
use crate::query::{FetchResult, LocalComparisonOptions, QueryOutcome, QueryRecord};
use crate::relation::RelationArray;
use crate::state::EntityState;
use dashmap::DashMap;
use parking_lot::RwLock;
use quarry_proto::{EntityQuery, Predicate, Value};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Shared manager state. Entities and relation arrays hold `Weak` links
/// back to this; dropping the last manager handle detaches nothing but
/// renders tracked operations on surviving entities `Err(Detached)`.
pub(crate) struct ManagerInner {
    pub(crate) metadata: Arc<MetadataStore>,
    pub(crate) executor: Arc<dyn QueryExecutor>,
    pub(crate) default_options: RwLock<QueryOptions>,
    pub(crate) comparison: LocalComparisonOptions,
    pub(crate) cache: RwLock<IdentityMap>,
    pub(crate) relation_arrays: DashMap<(EntityKey, String), Arc<RelationArray>>,
    pub(crate) events: Arc<EventHub>,
}

/// Builder for an [`EntityManager`].
pub struct ManagerBuilder {
    metadata: Arc<MetadataStore>,
    executor: Arc<dyn QueryExecutor>,
    options: QueryOptions,
    comparison: LocalComparisonOptions,
}

impl ManagerBuilder {
    /// Default query options applied to queries that carry none.
    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    /// Local comparison semantics (case sensitivity).
    pub fn comparison(mut self, comparison: LocalComparisonOptions) -> Self {
        self.comparison = comparison;
        self
    }

    pub fn build(self) -> EntityManager {
        EntityManager {
            inner: Arc::new(ManagerInner {
                metadata: self.metadata,
                executor: self.executor,
                default_options: RwLock::new(self.options),
                comparison: self.comparison,
                cache: RwLock::new(IdentityMap::new()),
                relation_arrays: DashMap::new(),
                events: Arc::new(EventHub::new()),
            }),
        }
    }
}

/// A client-side cache of entities mirroring a remote store.
///
/// Cheap to clone; clones share the same cache. All mutation is serialized
/// through an internal cache lock and events are delivered after that lock
/// is released, so subscribers may re-enter the manager freely.
#[derive(Clone)]
pub struct EntityManager {
    inner: Arc<ManagerInner>,
}

impl EntityManager {
    /// Create a manager with default options.
    pub fn new(metadata: Arc<MetadataStore>, executor: Arc<dyn QueryExecutor>) -> Self {
        Self::builder(metadata, executor).build()
    }

    /// Start building a manager.
    pub fn builder(metadata: Arc<MetadataStore>, executor: Arc<dyn QueryExecutor>) -> ManagerBuilder {
        ManagerBuilder {
            metadata,
            executor,
            options: QueryOptions::default(),
            comparison: LocalComparisonOptions::default(),
        }
    }

    /// The metadata store this manager validates against.
    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.inner.metadata
    }

    /// The event hub for subscriptions.
    pub fn events(&self) -> &Arc<EventHub> {
        &self.inner.events
    }

    /// Suppress event publication until the guard drops.
    pub fn suppress_events(&self) -> SuppressGuard {
        self.inner.events.suppress()
    }

    /// Enable or disable relation-array change notifications. The arrays
    /// themselves keep mutating either way.
    pub fn set_array_events_enabled(&self, enabled: bool) {
        self.inner.events.set_array_events_enabled(enabled);
    }

    /// Disable relation-array change notifications until the guard drops.
    pub fn suppress_array_events(&self) -> ArraySuppressGuard {
        self.inner.events.suppress_array_events()
    }

    /// The default query options.
    pub fn default_options(&self) -> QueryOptions {
        *self.inner.default_options.read()
    }

    /// Replace the default query options.
    pub fn set_default_options(&self, options: QueryOptions) {
        *self.inner.default_options.write() = options;
    }

    /// Create an entity of the named type, apply the given values, and
    /// attach it in the `Added` state.
    pub fn create_entity<I, S>(&self, type_name: &str, values: I) -> Result<Arc<Entity>, Error>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: AsRef<str>,
    {
        let entity_type = self.inner.metadata.entity_type(type_name)?;
        let entity = Entity::new(entity_type);
        for (name, value) in values {
            entity.set(name.as_ref(), value)?;
        }
        self.attach_as(&entity, EntityState::Added)?;
        Ok(entity)
    }

    /// Attach a detached entity in the `Unchanged` state.
    pub fn attach_entity(&self, entity: &Arc<Entity>) -> Result<(), Error> {
        self.attach_as(entity, EntityState::Unchanged)
    }

    /// Attach a detached entity in an explicit attached state.
    pub fn attach_entity_as(&self, entity: &Arc<Entity>, state: EntityState) -> Result<(), Error> {
        if !state.is_attached() {
            return Err(Error::InvalidConfiguration(format!(
                "cannot attach an entity in the {state} state"
            )));
        }
        self.attach_as(entity, state)
    }

    /// Detach an entity from this manager. Returns whether it was attached
    /// here; an entity tracked elsewhere, or not at all, is left alone.
    pub fn detach_entity(&self, entity: &Arc<Entity>) -> bool {
        {
            let aspect = entity.aspect.read();
            match aspect.manager.upgrade() {
                Some(current) if Arc::ptr_eq(&current, &self.inner) => {}
                _ => return false,
            }
        }
        entity.detach().is_ok()
    }

    fn attach_as(&self, entity: &Arc<Entity>, state: EntityState) -> Result<(), Error> {
        {
            let aspect = entity.aspect.read();
            if let Some(current) = aspect.manager.upgrade() {
                if Arc::ptr_eq(&current, &self.inner) {
                    // Attaching to the same manager again is a no-op.
                    return Ok(());
                }
                return Err(Error::AlreadyAttached);
            }
        }
        let key = entity.key()?;
        let mut pending = Vec::new();
        {
            let mut cache = self.inner.cache.write();
            cache.register(key, Arc::clone(entity))?;
            entity.set_tracking(state, Arc::downgrade(&self.inner));
            pending.push(PendingEvent::Entity(EntityChanged {
                action: EntityAction::Attach,
                entity: Some(Arc::clone(entity)),
            }));
        }
        self.inner.events.publish_all(pending);
        Ok(())
    }

    /// Look up a cached entity by key, failing when the key is unknown.
    /// Entities scheduled for deletion are still returned; callers that
    /// care check the state.
    pub fn get_entity_by_key(&self, key: &EntityKey) -> Result<Arc<Entity>, Error> {
        self.find_entity_by_key(key)
            .ok_or_else(|| Error::KeyNotFound(key.clone()))
    }

    /// Look up a cached entity by key.
    pub fn find_entity_by_key(&self, key: &EntityKey) -> Option<Arc<Entity>> {
        self.inner.cache.read().resolve(key)
    }

    /// All cached entities, every state included.
    pub fn get_entities(&self) -> Vec<Arc<Entity>> {
        self.inner
            .cache
            .read()
            .iter()
            .map(|(_, e)| Arc::clone(e))
            .collect()
    }

    /// All cached entities of one type, every state included.
    pub fn get_entities_of_type(&self, type_name: &str) -> Vec<Arc<Entity>> {
        self.inner
            .cache
            .read()
            .iter()
            .filter(|(key, _)| key.entity_type() == type_name)
            .map(|(_, e)| Arc::clone(e))
            .collect()
    }

    /// All cached entities carrying unsaved changes.
    pub fn get_changes(&self) -> Vec<Arc<Entity>> {
        self.inner
            .cache
            .read()
            .iter()
            .filter(|(_, e)| e.has_changes())
            .map(|(_, e)| Arc::clone(e))
            .collect()
    }

    /// Whether any cached entity carries unsaved changes.
    pub fn has_changes(&self) -> bool {
        self.inner.cache.read().iter().any(|(_, e)| e.has_changes())
    }

    /// Roll back every pending change in the cache.
    pub fn reject_changes(&self) -> Result<(), Error> {
        for entity in self.get_changes() {
            entity.reject_changes()?;
        }
        Ok(())
    }

    /// Mark every pending change in the cache as saved.
    pub fn accept_changes(&self) -> Result<(), Error> {
        for entity in self.get_changes() {
            entity.accept_changes()?;
        }
        Ok(())
    }

    /// Detach everything. Survivors keep their values but lose tracking.
    /// One `Clear` event is raised for the whole operation; clearing an
    /// empty cache is a no-op.
    pub fn clear(&self) {
        let mut pending = Vec::new();
        {
            let mut cache = self.inner.cache.write();
            if cache.is_empty() {
                return;
            }
            debug!(entities = cache.len(), "clearing cache");
            for entity in cache.drain() {
                let mut aspect = entity.aspect.write();
                aspect.state = EntityState::Detached;
                aspect.manager = Weak::new();
                aspect.original_values = None;
            }
            self.inner.relation_arrays.clear();
            pending.push(PendingEvent::Entity(EntityChanged {
                action: EntityAction::Clear,
                entity: None,
            }));
        }
        self.inner.events.publish_all(pending);
    }

    /// Execute a query under the manager's default options.
    pub async fn execute_query(&self, query: &EntityQuery) -> Result<QueryOutcome, Error> {
        let options = self.default_options();
        self.execute_query_with(query, options).await
    }

    /// Execute a query under explicit options.
    pub async fn execute_query_with(
        &self,
        query: &EntityQuery,
        options: QueryOptions,
    ) -> Result<QueryOutcome, Error> {
        let entity_type = validate_query(&self.inner.metadata, query)?;
        match options.fetch_strategy {
            FetchStrategy::FromLocalCache => Ok(self.run_local(&entity_type, query)),
            FetchStrategy::FromServer => {
                self.run_remote(&entity_type, query, options.merge_strategy)
                    .await
            }
        }
    }

    /// Execute a query against the cache only, regardless of the default
    /// fetch strategy.
    pub fn execute_query_locally(&self, query: &EntityQuery) -> Result<QueryOutcome, Error> {
        let entity_type = validate_query(&self.inner.metadata, query)?;
        Ok(self.run_local(&entity_type, query))
    }

    fn run_local(&self, entity_type: &EntityType, query: &EntityQuery) -> QueryOutcome {
        let cache = self.inner.cache.read();
        let (records, inline_count) =
            execute_locally(&cache, entity_type, query, &self.inner.comparison);
        QueryOutcome {
            records,
            retrieved: Vec::new(),
            inline_count,
            from_cache: true,
        }
    }

    async fn run_remote(
        &self,
        entity_type: &Arc<EntityType>,
        query: &EntityQuery,
        strategy: MergeStrategy,
    ) -> Result<QueryOutcome, Error> {
        let result = self
            .inner
            .executor
            .execute(query)
            .await
            .map_err(Error::Remote)?;
        debug!(resource = %query.resource, rows = result.rows.len(), "remote query returned");

        // Projection results bypass the cache entirely.
        if !query.select.is_empty() {
            let records = result
                .rows
                .into_iter()
                .map(|row| QueryRecord::Projection(row.values))
                .collect();
            return Ok(QueryOutcome {
                records,
                retrieved: Vec::new(),
                inline_count: result.inline_count,
                from_cache: false,
            });
        }

        let mut pending = Vec::new();
        let mut retrieved = Vec::new();
        let merged = {
            let mut cache = self.inner.cache.write();
            merge::merge_result_set(
                &self.inner,
                &mut cache,
                entity_type,
                &result.rows,
                strategy,
                &mut pending,
                &mut retrieved,
            )?
        };
        self.inner.events.publish_all(pending);
        Ok(QueryOutcome {
            records: merged.into_iter().map(QueryRecord::Entity).collect(),
            retrieved,
            inline_count: result.inline_count,
            from_cache: false,
        })
    }

    /// Fetch a single entity by key.
    ///
    /// With `check_cache_first` set, a cached instance answers without a
    /// round trip — unless the default merge strategy is
    /// [`MergeStrategy::OverwriteChanges`], which always refreshes. A
    /// cached instance scheduled for deletion answers `entity: None` with
    /// `from_cache` set; the pending delete shadows the remote row.
    pub async fn fetch_entity_by_key(
        &self,
        type_name: &str,
        key_values: Vec<Value>,
        check_cache_first: bool,
    ) -> Result<FetchResult, Error> {
        let entity_type = self.inner.metadata.entity_type(type_name)?;
        let options = self.default_options();

        if check_cache_first && options.merge_strategy != MergeStrategy::OverwriteChanges {
            let key = EntityKey::new(entity_type.name.clone(), key_values.clone())?;
            if let Some(cached) = self.inner.cache.read().resolve(&key) {
                return Ok(FetchResult {
                    from_cache: true,
                    entity: (!cached.state().is_deleted()).then_some(cached),
                });
            }
        }

        let query = EntityQuery::from(entity_type.default_resource_name.clone())
            .where_clause(key_predicate(&entity_type, &key_values)?);
        let outcome = self
            .run_remote(&entity_type, &query, options.merge_strategy)
            .await?;
        Ok(FetchResult {
            entity: outcome.entities().into_iter().next(),
            from_cache: false,
        })
    }

    /// Load (or reload) a navigation property from the remote store.
    ///
    /// For a to-many navigation the loaded children are merged, appended to
    /// the relation array with a single aggregated event, and the array is
    /// marked loaded. For a to-one navigation the target is merged into the
    /// cache and resolvable through the owner afterwards.
    pub async fn load_navigation_property(
        &self,
        entity: &Arc<Entity>,
        navigation: &str,
    ) -> Result<QueryOutcome, Error> {
        if !entity.is_attached() {
            return Err(Error::Detached);
        }
        let owner_type = Arc::clone(entity.entity_type());
        let nav = owner_type
            .navigation_property(navigation)
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                entity_type: owner_type.name.clone(),
                path: navigation.to_string(),
            })?;
        let target_type = self.inner.metadata.entity_type(&nav.target)?;
        let owner_key = entity.key()?;
        let strategy = self.default_options().merge_strategy;

        let query = if nav.is_many() {
            // Children point back at the owner through the foreign key.
            let owner_key_value = owner_key
                .values()
                .into_iter()
                .next()
                .ok_or_else(|| Error::MissingKey(owner_type.name.clone()))?;
            EntityQuery::from(target_type.default_resource_name.clone()).where_clause(
                Predicate::new(&nav.foreign_key, quarry_proto::CompareOp::Eq, owner_key_value)?,
            )
        } else {
            let fk = entity.get(&nav.foreign_key).unwrap_or(Value::Null);
            if fk.is_null() {
                return Ok(QueryOutcome {
                    records: Vec::new(),
                    retrieved: Vec::new(),
                    inline_count: None,
                    from_cache: true,
                });
            }
            EntityQuery::from(target_type.default_resource_name.clone())
                .where_clause(key_predicate(&target_type, &[fk])?)
        };

        let result = self
            .inner
            .executor
            .execute(&query)
            .await
            .map_err(Error::Remote)?;

        let mut pending = Vec::new();
        let mut retrieved = Vec::new();
        let merged = {
            let mut cache = self.inner.cache.write();
            let merged = merge::merge_result_set(
                &self.inner,
                &mut cache,
                &target_type,
                &result.rows,
                strategy,
                &mut pending,
                &mut retrieved,
            )?;
            if nav.is_many() {
                let array = {
                    let entry = self
                        .inner
                        .relation_arrays
                        .entry((owner_key.clone(), nav.name.clone()))
                        .or_insert_with(|| {
                            RelationArray::new(
                                Arc::downgrade(entity),
                                nav.clone(),
                                Arc::downgrade(&self.inner),
                            )
                        });
                    Arc::clone(entry.value())
                };
                array.extend_merged(&merged, &mut pending);
                array.mark_loaded();
            }
            merged
        };
        self.inner.events.publish_all(pending);
        Ok(QueryOutcome {
            records: merged.into_iter().map(QueryRecord::Entity).collect(),
            retrieved,
            inline_count: None,
            from_cache: false,
        })
    }
}

/// Equality predicate over a type's key properties, in declaration order.
fn key_predicate(entity_type: &EntityType, key_values: &[Value]) -> Result<Predicate, Error> {
    let key_props = entity_type.key_properties();
    if key_props.len() != key_values.len() || key_props.is_empty() {
        return Err(Error::MissingKey(entity_type.name.clone()));
    }
    let mut parts = Vec::with_capacity(key_props.len());
    for (prop, value) in key_props.iter().zip(key_values) {
        parts.push(Some(Predicate::new(
            &prop.name,
            quarry_proto::CompareOp::Eq,
            value.clone(),
        )?));
    }
    Ok(Predicate::and_all(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{DataProperty, DataType};
    use futures::future::BoxFuture;
    use quarry_proto::RemoteQueryResult;

    struct NullExecutor;

    impl QueryExecutor for NullExecutor {
        fn execute<'a>(
            &'a self,
            _query: &'a EntityQuery,
        ) -> BoxFuture<'a, Result<RemoteQueryResult, String>> {
            Box::pin(futures::future::ready(Ok(RemoteQueryResult::default())))
        }
    }

    fn manager() -> EntityManager {
        let metadata = MetadataStore::new().with_entity_type(
            EntityType::new("Customer", "Customers")
                .with_property(DataProperty::key("customerId", DataType::Int64))
                .with_property(DataProperty::new("companyName", DataType::String)),
        );
        EntityManager::new(Arc::new(metadata), Arc::new(NullExecutor))
    }

    #[test]
    fn test_create_entity_is_added_and_cached() {
        let mgr = manager();
        let e = mgr
            .create_entity(
                "Customer",
                [
                    ("customerId", Value::Int64(1)),
                    ("companyName", Value::String("Alfreds".into())),
                ],
            )
            .unwrap();
        assert_eq!(e.state(), EntityState::Added);

        let key = e.key().unwrap();
        let cached = mgr.get_entity_by_key(&key).unwrap();
        assert!(Arc::ptr_eq(&cached, &e));
        assert!(mgr.has_changes());
    }

    #[test]
    fn test_duplicate_key_attach_rejected() {
        let mgr = manager();
        mgr.create_entity("Customer", [("customerId", Value::Int64(1))])
            .unwrap();

        let dup = Entity::new(mgr.metadata().entity_type("Customer").unwrap());
        dup.set("customerId", 1i64).unwrap();
        assert!(matches!(mgr.attach_entity(&dup), Err(Error::DuplicateKey(_))));
    }

    #[test]
    fn test_attach_to_second_manager_rejected() {
        let mgr1 = manager();
        let mgr2 = manager();
        let e = mgr1
            .create_entity("Customer", [("customerId", Value::Int64(1))])
            .unwrap();
        assert!(matches!(mgr2.attach_entity(&e), Err(Error::AlreadyAttached)));

        // Re-attaching to the same manager is a no-op.
        assert!(mgr1.attach_entity(&e).is_ok());
        assert_eq!(e.state(), EntityState::Added);
    }

    #[test]
    fn test_clear_detaches_everything() {
        let mgr = manager();
        let e = mgr
            .create_entity("Customer", [("customerId", Value::Int64(1))])
            .unwrap();
        mgr.clear();
        assert_eq!(e.state(), EntityState::Detached);
        assert!(mgr.get_entities().is_empty());
        // Values survive the detach.
        assert_eq!(e.get("customerId"), Some(Value::Int64(1)));
    }
}
