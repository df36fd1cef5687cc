//! Thread-safe provider registry.
//!
//! Owns the set of live providers, validates them on registration, answers
//! capability lookups, and keeps per-provider health. The entry map sits
//! behind a single reader/writer lock; providers are handed out as `Arc`s so
//! in-flight calls survive a concurrent [`Registry::deregister`].
//!
//! There is no process-wide registry. Construct one at startup, share it as
//! `Arc<Registry>`, and drop it at shutdown; several registries may coexist.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{OrchestratorError, Result};
use crate::health::{EvictionPolicy, HealthRecorder, HealthSnapshot, ProviderHealth};
use crate::provider::SharedProvider;
use crate::types::{OutcomeKind, ProviderDescriptor};

/// A registered provider with its health counters.
pub struct RegistryEntry {
    descriptor: ProviderDescriptor,
    provider: SharedProvider,
    health: ProviderHealth,
}

impl RegistryEntry {
    /// The descriptor captured at registration.
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// The live provider.
    pub fn provider(&self) -> &SharedProvider {
        &self.provider
    }

    /// Current health counters.
    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.descriptor.name)
            .field("version", &self.descriptor.version)
            .field("health", &self.health.snapshot())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    /// Entries in registration order.
    entries: Vec<Arc<RegistryEntry>>,
    /// Ordered default selection.
    default_set: Vec<String>,
}

impl Inner {
    fn find(&self, name: &str) -> Option<&Arc<RegistryEntry>> {
        self.entries.iter().find(|e| e.descriptor.name == name)
    }
}

/// Registry of live providers, keyed by descriptor name.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a provider under its descriptor name.
    ///
    /// The descriptor is validated, then the provider's own
    /// [`validate`](crate::Provider::validate) check runs (outside the lock).
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Validation`] if the name is taken, the
    /// descriptor is invalid, or the self-check fails. The registry is left
    /// unchanged on error.
    pub async fn register(&self, provider: SharedProvider) -> Result<()> {
        let descriptor = provider.descriptor().clone();
        descriptor.validate()?;

        if self.contains(&descriptor.name) {
            return Err(duplicate(&descriptor.name));
        }

        if !provider.validate().await {
            tracing::warn!(provider = %descriptor.name, "provider failed self-validation");
            return Err(OrchestratorError::Validation(format!(
                "provider '{}' failed self-validation",
                descriptor.name
            )));
        }

        let mut inner = self.write();
        // Another caller may have registered the name while we were validating.
        if inner.find(&descriptor.name).is_some() {
            return Err(duplicate(&descriptor.name));
        }
        tracing::debug!(
            provider = %descriptor.name,
            version = %descriptor.version,
            capabilities = ?descriptor.capabilities,
            "provider registered"
        );
        inner.entries.push(Arc::new(RegistryEntry {
            descriptor,
            provider,
            health: ProviderHealth::new(),
        }));
        Ok(())
    }

    /// Remove a provider. It is also dropped from the default set.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] if `name` is not registered.
    pub fn deregister(&self, name: &str) -> Result<()> {
        let mut inner = self.write();
        let Some(index) = inner.entries.iter().position(|e| e.descriptor.name == name) else {
            return Err(OrchestratorError::NotFound(name.to_owned()));
        };
        inner.entries.remove(index);
        inner.default_set.retain(|n| n != name);
        tracing::debug!(provider = %name, "provider deregistered");
        Ok(())
    }

    /// Look up a provider by name.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] if `name` is not registered.
    pub fn get(&self, name: &str) -> Result<SharedProvider> {
        self.read()
            .find(name)
            .map(|e| Arc::clone(&e.provider))
            .ok_or_else(|| OrchestratorError::NotFound(name.to_owned()))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.read().find(name).is_some()
    }

    /// Providers claiming `capability`, in registration order. May be empty.
    pub fn by_capability(&self, capability: &str) -> Vec<SharedProvider> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.descriptor.has_capability(capability))
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// Set the ordered default selection.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] naming the first unregistered
    /// provider; the previous default set is kept.
    pub fn set_default_set<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let mut inner = self.write();
        if let Some(missing) = names.iter().find(|n| inner.find(n.as_ref()).is_none()) {
            return Err(OrchestratorError::NotFound(missing.as_ref().to_owned()));
        }
        inner.default_set = names.iter().map(|n| n.as_ref().to_owned()).collect();
        Ok(())
    }

    /// Names in the default selection.
    pub fn default_set(&self) -> Vec<String> {
        self.read().default_set.clone()
    }

    /// Providers in the default selection, in default-set order.
    pub fn default_providers(&self) -> Vec<SharedProvider> {
        let inner = self.read();
        inner
            .default_set
            .iter()
            .filter_map(|name| inner.find(name).map(|e| Arc::clone(&e.provider)))
            .collect()
    }

    /// All providers in registration order.
    pub fn all(&self) -> Vec<SharedProvider> {
        self.read()
            .entries
            .iter()
            .map(|e| Arc::clone(&e.provider))
            .collect()
    }

    /// All entries in registration order, for administration.
    pub fn entries(&self) -> Vec<Arc<RegistryEntry>> {
        self.read().entries.clone()
    }

    /// Health counters for one provider.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] if `name` is not registered.
    pub fn health(&self, name: &str) -> Result<HealthSnapshot> {
        self.read()
            .find(name)
            .map(|e| e.health.snapshot())
            .ok_or_else(|| OrchestratorError::NotFound(name.to_owned()))
    }

    /// `(name, health)` for every provider, in registration order.
    pub fn health_report(&self) -> Vec<(String, HealthSnapshot)> {
        self.read()
            .entries
            .iter()
            .map(|e| (e.descriptor.name.clone(), e.health.snapshot()))
            .collect()
    }

    /// Deregister every provider the policy selects. Returns their names.
    pub fn apply_eviction_policy(&self, policy: &dyn EvictionPolicy) -> Vec<String> {
        let mut inner = self.write();
        let evicted: Vec<String> = inner
            .entries
            .iter()
            .filter(|e| policy.should_evict(&e.descriptor.name, &e.health.snapshot()))
            .map(|e| e.descriptor.name.clone())
            .collect();
        if evicted.is_empty() {
            return evicted;
        }
        inner
            .entries
            .retain(|e| !evicted.contains(&e.descriptor.name));
        inner.default_set.retain(|n| !evicted.contains(n));
        for name in &evicted {
            tracing::warn!(provider = %name, "provider evicted by health policy");
        }
        evicted
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }
}

impl HealthRecorder for Registry {
    fn record_outcome(&self, provider: &str, kind: OutcomeKind, latency: Duration) {
        // Outcomes for providers deregistered mid-run are dropped.
        if let Some(entry) = self.read().find(provider) {
            entry.health.record(kind, latency);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("Registry")
            .field("entries", &inner.entries)
            .field("default_set", &inner.default_set)
            .finish()
    }
}

fn duplicate(name: &str) -> OrchestratorError {
    OrchestratorError::Validation(format!("provider '{name}' is already registered"))
}
