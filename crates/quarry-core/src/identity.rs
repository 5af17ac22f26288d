//! The identity map backing a manager's cache.

use crate::entity::Entity;
use crate::error::Error;
use crate::key::EntityKey;
use std::collections::HashMap;
use std::sync::Arc;

/// Key-to-instance registry. At most one live instance per [`EntityKey`];
/// repeated resolutions of the same key return the same `Arc`.
///
/// The map itself is not synchronized; the manager wraps it in a lock and
/// serializes all structural mutations through that lock.
#[derive(Debug, Default)]
pub struct IdentityMap {
    entries: HashMap<EntityKey, Arc<Entity>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the registered instance for a key.
    pub fn resolve(&self, key: &EntityKey) -> Option<Arc<Entity>> {
        self.entries.get(key).cloned()
    }

    /// Register an instance under a key. Fails with [`Error::DuplicateKey`]
    /// when a *different* instance already owns the key; re-registering the
    /// same instance is a no-op.
    pub fn register(&mut self, key: EntityKey, entity: Arc<Entity>) -> Result<(), Error> {
        match self.entries.get(&key) {
            Some(existing) if Arc::ptr_eq(existing, &entity) => Ok(()),
            Some(_) => Err(Error::DuplicateKey(key)),
            None => {
                self.entries.insert(key, entity);
                Ok(())
            }
        }
    }

    /// Remove a key's registration, returning the instance if present.
    pub fn unregister(&mut self, key: &EntityKey) -> Option<Arc<Entity>> {
        self.entries.remove(key)
    }

    /// Move an instance from one key to another. Fails with
    /// [`Error::InvalidKeyChange`] when the new key is owned by a different
    /// instance; the old registration is left intact on failure.
    pub fn rekey(&mut self, old: &EntityKey, new: EntityKey) -> Result<(), Error> {
        if old == &new {
            return Ok(());
        }
        if let Some(existing) = self.entries.get(&new) {
            let same = self
                .entries
                .get(old)
                .map(|e| Arc::ptr_eq(existing, e))
                .unwrap_or(false);
            if !same {
                return Err(Error::InvalidKeyChange(new));
            }
        }
        if let Some(entity) = self.entries.remove(old) {
            self.entries.insert(new, entity);
        }
        Ok(())
    }

    /// Iterate over all registered instances.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &Arc<Entity>)> {
        self.entries.iter()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every registration, returning the former contents.
    pub fn drain(&mut self) -> Vec<Arc<Entity>> {
        self.entries.drain().map(|(_, e)| e).collect()
    }
}
