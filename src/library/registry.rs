//! Registry for managing literature libraries.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Library, LibraryError, ScopusLibrary};
use crate::config::Config;

bitflags::bitflags! {
    /// Capabilities that a library can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LibraryCapabilities: u32 {
        const PAGES = 1 << 0;
        const ABSTRACTS = 1 << 1;
    }
}

/// Registry of available libraries, keyed by id
#[derive(Debug, Clone, Default)]
pub struct LibraryRegistry {
    libraries: BTreeMap<String, Arc<dyn Library>>,
}

impl LibraryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in library configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, LibraryError> {
        let mut registry = Self::new();

        let mut scopus = ScopusLibrary::new(
            config.api_keys.scopus.clone().unwrap_or_default(),
            config.fetch.request_timeout(),
        )?;
        if let Some(pacing) = config
            .pacing_for(scopus.id())
            .map_err(|e| LibraryError::InvalidRequest(e.to_string()))?
        {
            scopus = scopus.with_pacing(pacing);
        }
        registry.register(Arc::new(scopus));

        Ok(registry)
    }

    /// Register a new library, replacing any library with the same id
    pub fn register(&mut self, library: Arc<dyn Library>) {
        self.libraries.insert(library.id().to_string(), library);
    }

    /// Get a library by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Library>> {
        self.libraries.get(id)
    }

    /// Get a library by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Library>, LibraryError> {
        self.get(id)
            .ok_or_else(|| LibraryError::NotFound(format!("Library '{}' not found", id)))
    }

    /// Get all registered libraries, ordered by id
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Library>> {
        self.libraries.values()
    }

    /// Get all library IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(|s| s.as_str())
    }

    /// Get libraries that support a specific capability
    pub fn with_capability(&self, capability: LibraryCapabilities) -> Vec<&Arc<dyn Library>> {
        self.all()
            .filter(|l| l.capabilities().contains(capability))
            .collect()
    }

    /// Check if a library exists
    pub fn has(&self, id: &str) -> bool {
        self.libraries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
