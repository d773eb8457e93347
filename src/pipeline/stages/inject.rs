//! Lazy binding: `inject` fields become deferred providers resolved at
//! first use instead of at construction, which is what lets a newer
//! generation's implementation be picked up without rebuilding dependents.

use crate::core::QualifiedName;
use crate::model::TypeRef;
use crate::model::ClassModel;
use crate::pipeline::{Stage, StageContext, StageError, StageOutcome};

pub struct LazyBinding;

impl Stage for LazyBinding {
    fn name(&self) -> &'static str {
        "lazy-binding"
    }

    fn version(&self) -> u32 {
        1
    }

    fn apply(
        &self,
        model: &mut ClassModel,
        ctx: &StageContext<'_>,
    ) -> Result<StageOutcome, StageError> {
        let deny = &ctx.config.loader.deny_prefixes;
        let mut changed = false;
        for field in &mut model.fields {
            if !field.inject || field.ty.is_provider() {
                continue;
            }
            match &field.ty {
                TypeRef::Named(name) => {
                    // Injection targets must be reloadable; types delegated
                    // to the parent resolver never change under us.
                    if QualifiedName::new(name.clone()).starts_with_any(deny) {
                        return Err(StageError::new(format!(
                            "cannot inject `{}`: `{name}` is outside the reloadable scope",
                            field.name
                        )));
                    }
                }
                other => {
                    return Err(StageError::new(format!(
                        "cannot inject `{}`: expected a class type, found {other:?}",
                        field.name
                    )));
                }
            }
            field.ty = TypeRef::Provider(Box::new(field.ty.clone()));
            changed = true;
        }
        Ok(if changed {
            StageOutcome::Changed
        } else {
            StageOutcome::Unchanged
        })
    }
}
