use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::{AuthError, Provider};

/// Name-keyed set of the providers an application accepts.
///
/// Shared behind an `Arc` for the lifetime of the process; membership can be
/// changed at any time.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers each provider under its own name, replacing any provider
    /// already registered with that name.
    pub fn use_providers<I>(&self, providers: I)
    where
        I: IntoIterator<Item = Arc<dyn Provider>>,
    {
        let mut map = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for provider in providers {
            tracing::debug!(provider = provider.name(), "registering provider");
            map.insert(provider.name().to_string(), provider);
        }
    }

    pub fn register<P: Provider + 'static>(&self, provider: P) {
        self.use_providers([Arc::new(provider) as Arc<dyn Provider>]);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>, AuthError> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    pub fn providers(&self) -> HashMap<String, Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
