// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Queue name to provider resolution.

use std::collections::HashMap;
use std::sync::Arc;

use stowage_core::{ensure_not_empty, StowageError};
use tracing::debug;

use super::{PersistentJobQueueProvider, SqliteJobQueueProvider};

/// Maps queue names to providers, falling back to a default provider.
#[derive(Clone)]
pub struct QueueProviderRegistry {
    default: Arc<dyn PersistentJobQueueProvider>,
    by_queue: HashMap<String, Arc<dyn PersistentJobQueueProvider>>,
}

impl QueueProviderRegistry {
    pub fn new(default: Arc<dyn PersistentJobQueueProvider>) -> Self {
        Self {
            default,
            by_queue: HashMap::new(),
        }
    }

    /// Route `queues` to `provider`.
    ///
    /// Fails without registering anything if one of the queues already has a
    /// provider.
    pub fn add(
        &mut self,
        provider: Arc<dyn PersistentJobQueueProvider>,
        queues: &[&str],
    ) -> Result<(), StowageError> {
        for queue in queues {
            ensure_not_empty("queue", queue)?;
            if self.by_queue.contains_key(*queue) {
                return Err(StowageError::argument(
                    "queues",
                    format!("queue `{queue}` already has a provider"),
                ));
            }
        }

        for queue in queues {
            self.by_queue.insert((*queue).to_string(), Arc::clone(&provider));
        }
        debug!(queues = ?queues, "queue provider registered");
        Ok(())
    }

    /// The provider for `queue`, or the default one.
    pub fn resolve(&self, queue: &str) -> &Arc<dyn PersistentJobQueueProvider> {
        self.by_queue.get(queue).unwrap_or(&self.default)
    }

    /// The single provider serving all of `queues`.
    pub fn resolve_span(
        &self,
        queues: &[String],
    ) -> Result<&Arc<dyn PersistentJobQueueProvider>, StowageError> {
        let Some((first, rest)) = queues.split_first() else {
            return Err(StowageError::argument("queues", "at least one queue is required"));
        };

        let provider = self.resolve(first);
        if rest.iter().any(|queue| !Arc::ptr_eq(self.resolve(queue), provider)) {
            return Err(StowageError::ProviderConflict {
                queues: queues.join(", "),
            });
        }
        Ok(provider)
    }

    pub fn default_provider(&self) -> &Arc<dyn PersistentJobQueueProvider> {
        &self.default
    }

    /// Every distinct provider, the default one first.
    pub fn providers(&self) -> Vec<Arc<dyn PersistentJobQueueProvider>> {
        let mut providers = vec![Arc::clone(&self.default)];
        for provider in self.by_queue.values() {
            if !providers.iter().any(|known| Arc::ptr_eq(known, provider)) {
                providers.push(Arc::clone(provider));
            }
        }
        providers
    }
}

impl Default for QueueProviderRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SqliteJobQueueProvider))
    }
}

impl std::fmt::Debug for QueueProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut routed: Vec<&String> = self.by_queue.keys().collect();
        routed.sort();
        f.debug_struct("QueueProviderRegistry")
            .field("routed_queues", &routed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queues(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn unregistered_queue_resolves_to_default() {
        let registry = QueueProviderRegistry::default();
        assert!(Arc::ptr_eq(registry.resolve("anything"), registry.default_provider()));
    }

    #[test]
    fn registered_queue_resolves_to_its_provider() {
        let mut registry = QueueProviderRegistry::default();
        let custom: Arc<dyn PersistentJobQueueProvider> = Arc::new(SqliteJobQueueProvider);
        registry.add(Arc::clone(&custom), &["critical"]).unwrap();

        assert!(Arc::ptr_eq(registry.resolve("critical"), &custom));
        assert!(!Arc::ptr_eq(registry.resolve("default"), &custom));
    }

    #[test]
    fn duplicate_registration_is_rejected_atomically() {
        let mut registry = QueueProviderRegistry::default();
        registry.add(Arc::new(SqliteJobQueueProvider), &["a"]).unwrap();

        let second: Arc<dyn PersistentJobQueueProvider> = Arc::new(SqliteJobQueueProvider);
        let err = registry.add(Arc::clone(&second), &["b", "a"]).unwrap_err();
        assert!(matches!(err, StowageError::Argument { name: "queues", .. }));
        assert!(!Arc::ptr_eq(registry.resolve("b"), &second), "b must not be registered");
    }

    #[test]
    fn span_over_one_provider_resolves() {
        let mut registry = QueueProviderRegistry::default();
        let custom: Arc<dyn PersistentJobQueueProvider> = Arc::new(SqliteJobQueueProvider);
        registry.add(Arc::clone(&custom), &["a", "b"]).unwrap();

        let resolved = registry.resolve_span(&queues(&["a", "b"])).unwrap();
        assert!(Arc::ptr_eq(resolved, &custom));
    }

    #[test]
    fn span_over_two_providers_conflicts() {
        let mut registry = QueueProviderRegistry::default();
        registry.add(Arc::new(SqliteJobQueueProvider), &["critical"]).unwrap();

        let err = registry
            .resolve_span(&queues(&["critical", "default"]))
            .err()
            .unwrap();
        match err {
            StowageError::ProviderConflict { queues } => assert_eq!(queues, "critical, default"),
            other => panic!("expected ProviderConflict, got {other:?}"),
        }
    }

    #[test]
    fn empty_span_is_an_argument_error() {
        let registry = QueueProviderRegistry::default();
        assert!(matches!(
            registry.resolve_span(&[]),
            Err(StowageError::Argument { .. })
        ));
    }

    #[test]
    fn providers_are_listed_once() {
        let mut registry = QueueProviderRegistry::default();
        let custom: Arc<dyn PersistentJobQueueProvider> = Arc::new(SqliteJobQueueProvider);
        registry.add(Arc::clone(&custom), &["a", "b"]).unwrap();
        assert_eq!(registry.providers().len(), 2);
    }
}
