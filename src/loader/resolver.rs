//! Parent delegation for names outside the reloadable scope.

use std::sync::Arc;

use crate::core::QualifiedName;
use crate::loader::LoadedClass;

/// Resolves classes the reloading loader refuses to own: denied namespaces
/// and anything without a source under the watched roots.
pub trait ParentResolver: Send + Sync {
    fn resolve(&self, name: &QualifiedName) -> Option<Arc<LoadedClass>>;
}

/// Terminal resolver: knows nothing. The default when the embedding
/// application brings no class environment of its own.
pub struct NoParent;

impl ParentResolver for NoParent {
    fn resolve(&self, _name: &QualifiedName) -> Option<Arc<LoadedClass>> {
        None
    }
}

/// Fixed-map resolver standing in for a host environment in tests.
#[cfg(test)]
pub struct FixedResolver {
    classes: rustc_hash::FxHashMap<QualifiedName, Arc<LoadedClass>>,
}

#[cfg(test)]
impl FixedResolver {
    pub fn new(models: Vec<crate::model::ClassModel>) -> Self {
        let classes = models
            .into_iter()
            .map(|m| {
                let name = m.name.clone();
                (name.clone(), Arc::new(LoadedClass::new(name, 0, m)))
            })
            .collect();
        Self { classes }
    }
}

#[cfg(test)]
impl ParentResolver for FixedResolver {
    fn resolve(&self, name: &QualifiedName) -> Option<Arc<LoadedClass>> {
        self.classes.get(name).cloned()
    }
}
