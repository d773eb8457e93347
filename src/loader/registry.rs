//! Registration set: the classes the application has announced it uses.
//!
//! The registry is explicit per-generation state. On a generation swap the
//! coordinator rebuilds it by resolving the old names (plus any new ones)
//! through the new loader, then publishes loader and registry together.

use std::sync::Arc;

use dashmap::DashMap;

use crate::core::QualifiedName;
use crate::loader::LoadedClass;

#[derive(Default)]
pub struct Registry {
    entries: DashMap<QualifiedName, Arc<LoadedClass>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, class: Arc<LoadedClass>) {
        self.entries.insert(class.name().clone(), class);
    }

    pub fn get(&self, name: &QualifiedName) -> Option<Arc<LoadedClass>> {
        self.entries.get(name).map(|e| e.clone())
    }

    /// Registered names, sorted for deterministic rebuild order.
    pub fn names(&self) -> Vec<QualifiedName> {
        let mut names: Vec<_> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
