//! Per-manager and per-query execution options.

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// Where a query's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FetchStrategy {
    /// Execute remotely and merge the result into the cache.
    #[default]
    FromServer,
    /// Evaluate against the cache only; never touches the network.
    FromLocalCache,
}

/// How incoming rows reconcile with already-cached entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeStrategy {
    /// Leave entities with pending changes untouched.
    #[default]
    PreserveChanges,
    /// Overwrite cached values and discard pending changes.
    OverwriteChanges,
}

/// The pair of strategies a query executes under.
///
/// Immutable value type: the `using_*` methods return an adjusted copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    pub fetch_strategy: FetchStrategy,
    pub merge_strategy: MergeStrategy,
}

impl QueryOptions {
    pub fn new(fetch_strategy: FetchStrategy, merge_strategy: MergeStrategy) -> Self {
        Self {
            fetch_strategy,
            merge_strategy,
        }
    }

    /// Copy with a different fetch strategy.
    pub fn using_fetch(self, fetch_strategy: FetchStrategy) -> Self {
        Self {
            fetch_strategy,
            ..self
        }
    }

    /// Copy with a different merge strategy.
    pub fn using_merge(self, merge_strategy: MergeStrategy) -> Self {
        Self {
            merge_strategy,
            ..self
        }
    }

    /// Build options from a JSON config object, starting from the defaults.
    ///
    /// Recognized keys are `"fetchStrategy"` (`"FromServer"` /
    /// `"FromLocalCache"`) and `"mergeStrategy"` (`"PreserveChanges"` /
    /// `"OverwriteChanges"`). Unknown keys and unknown strategy names fail
    /// with [`Error::InvalidConfiguration`] instead of being ignored.
    pub fn from_config(config: &serde_json::Value) -> Result<Self, Error> {
        Self::default().with_config(config)
    }

    /// Apply a JSON config object on top of this copy.
    pub fn with_config(mut self, config: &serde_json::Value) -> Result<Self, Error> {
        let object = config.as_object().ok_or_else(|| {
            Error::InvalidConfiguration("options config must be a JSON object".to_string())
        })?;
        for (key, value) in object {
            let name = value.as_str().ok_or_else(|| {
                Error::InvalidConfiguration(format!("option '{key}' must be a string"))
            })?;
            match key.as_str() {
                "fetchStrategy" => {
                    self.fetch_strategy = match name {
                        "FromServer" => FetchStrategy::FromServer,
                        "FromLocalCache" => FetchStrategy::FromLocalCache,
                        other => {
                            return Err(Error::InvalidConfiguration(format!(
                                "unknown fetch strategy '{other}'"
                            )));
                        }
                    };
                }
                "mergeStrategy" => {
                    self.merge_strategy = match name {
                        "PreserveChanges" => MergeStrategy::PreserveChanges,
                        "OverwriteChanges" => MergeStrategy::OverwriteChanges,
                        other => {
                            return Err(Error::InvalidConfiguration(format!(
                                "unknown merge strategy '{other}'"
                            )));
                        }
                    };
                }
                other => {
                    return Err(Error::InvalidConfiguration(format!(
                        "unknown option '{other}'"
                    )));
                }
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let opts = QueryOptions::default();
        assert_eq!(opts.fetch_strategy, FetchStrategy::FromServer);
        assert_eq!(opts.merge_strategy, MergeStrategy::PreserveChanges);
    }

    #[test]
    fn test_using_returns_adjusted_copy() {
        let base = QueryOptions::default();
        let local = base.using_fetch(FetchStrategy::FromLocalCache);
        assert_eq!(base.fetch_strategy, FetchStrategy::FromServer);
        assert_eq!(local.fetch_strategy, FetchStrategy::FromLocalCache);
        assert_eq!(local.merge_strategy, MergeStrategy::PreserveChanges);
    }

    #[test]
    fn test_from_config() {
        let opts = QueryOptions::from_config(&json!({
            "fetchStrategy": "FromLocalCache",
            "mergeStrategy": "OverwriteChanges",
        }))
        .unwrap();
        assert_eq!(opts.fetch_strategy, FetchStrategy::FromLocalCache);
        assert_eq!(opts.merge_strategy, MergeStrategy::OverwriteChanges);

        assert!(matches!(
            QueryOptions::from_config(&json!({"fetchStrategy": "FromMars"})),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QueryOptions::from_config(&json!({"unknownOption": "x"})),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QueryOptions::from_config(&json!("not an object")),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
