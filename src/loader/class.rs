//! A defined class as the running application sees it.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::core::QualifiedName;
use crate::model::ClassModel;

/// One defined class. Identity (name, generation) is fixed at definition;
/// the model behind it can be swapped atomically, which is how in-place
/// redefinition replaces method bodies under live readers.
pub struct LoadedClass {
    name: QualifiedName,
    generation: u64,
    model: ArcSwap<ClassModel>,
}

impl LoadedClass {
    pub fn new(name: QualifiedName, generation: u64, model: ClassModel) -> Self {
        Self {
            name,
            generation,
            model: ArcSwap::from_pointee(model),
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current model snapshot. Readers keep whatever snapshot they loaded;
    /// a concurrent redefinition never tears a call mid-flight.
    pub fn model(&self) -> Arc<ClassModel> {
        self.model.load_full()
    }

    /// Replace the model in place. Reserved for the redefinition gateway,
    /// which has already proven shape compatibility.
    pub(crate) fn swap_model(&self, model: ClassModel) {
        self.model.store(Arc::new(model));
    }
}

impl std::fmt::Debug for LoadedClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedClass")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassKind, MethodModel, Op};

    #[test]
    fn test_swap_is_visible_to_new_readers() {
        let name = QualifiedName::new("com.example.Foo");
        let mut v1 = ClassModel::new(name.clone(), ClassKind::Class);
        v1.methods.push(MethodModel::new("tick", vec![]));

        let class = LoadedClass::new(name.clone(), 1, v1.clone());
        let held = class.model();

        let mut v2 = v1.clone();
        v2.methods[0].body = vec![Op::Call("refresh".into())];
        class.swap_model(v2.clone());

        // Old snapshot is stable, new loads see the swap.
        assert!(held.methods[0].body.is_empty());
        assert_eq!(class.model().methods[0].body, v2.methods[0].body);
        assert_eq!(class.generation(), 1);
    }
}
