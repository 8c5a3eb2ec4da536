//! The set of loaded sources.
//!
//! Searches work on a snapshot of `Arc<Source>`s taken under the read lock,
//! so load/unload/reload (write lock, whole-source swap) never expose a
//! half-built source to a running search, and an unloaded source lives
//! until the last search holding it finishes.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ExecError, Result};
use crate::source::Source;

#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: RwLock<BTreeMap<String, Arc<Source>>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source`, suffixing its identifier (` (2)`, ` (3)`, ...) if
    /// the name is taken.
    pub fn insert(&self, mut source: Source) -> Arc<Source> {
        let mut map = self.sources.write();
        let base = source.identifier().to_string();
        let mut id = base.clone();
        let mut n = 2;
        while map.contains_key(&id) {
            id = format!("{base} ({n})");
            n += 1;
        }
        source.set_identifier(id.clone());
        let source = Arc::new(source);
        map.insert(id, Arc::clone(&source));
        source
    }

    /// Swap in `source` under an existing identifier.
    pub fn replace(&self, identifier: &str, mut source: Source) -> Result<Arc<Source>> {
        let mut map = self.sources.write();
        let slot = map
            .get_mut(identifier)
            .ok_or_else(|| ExecError::UnknownSource(identifier.to_string()))?;
        source.set_identifier(identifier.to_string());
        let source = Arc::new(source);
        *slot = Arc::clone(&source);
        Ok(source)
    }

    pub fn remove(&self, identifier: &str) -> Option<Arc<Source>> {
        self.sources.write().remove(identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<Source>> {
        self.sources.read().get(identifier).cloned()
    }

    /// Every loaded source, ordered by identifier.
    pub fn snapshot(&self) -> Vec<Arc<Source>> {
        self.sources.read().values().cloned().collect()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}
