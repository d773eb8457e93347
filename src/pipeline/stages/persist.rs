//! Entity shaping: construction, identity and store helpers for `entity`
//! classes.
//!
//! The stage owns the shape (a default `init` constructor, an `id` field and
//! its accessors); the bound [`EntityTransformer`] contributes the
//! store-specific helpers. Non-entity classes are skipped outright.

use crate::config::Config;
use crate::model::{ClassModel, FieldModel, MethodModel, Op, TypeRef};
use crate::pipeline::{EnhancementError, Stage, StageContext, StageError, StageOutcome};

/// Store-specific half of entity shaping. Implementations add whatever
/// helper methods their store needs and report whether they changed the
/// model.
pub trait EntityTransformer: Send + Sync {
    /// Store identifier matched against `persistence.store`.
    fn store(&self) -> &'static str;

    fn augment(&self, model: &mut ClassModel) -> bool;
}

/// Default in-memory store adapter.
pub struct MemStore;

impl EntityTransformer for MemStore {
    fn store(&self) -> &'static str {
        "memstore"
    }

    fn augment(&self, model: &mut ClassModel) -> bool {
        let mut changed = false;
        changed |= add_if_missing(model, "persist", vec![Op::Call("memstore.persist".into())]);
        changed |= add_if_missing(model, "find", vec![Op::Call("memstore.find".into())]);
        changed
    }
}

pub struct EntityShape {
    transformer: Box<dyn EntityTransformer>,
}

impl EntityShape {
    pub fn new(transformer: Box<dyn EntityTransformer>) -> Self {
        Self { transformer }
    }

    /// Bind the transformer named by `persistence.store`.
    pub fn from_config(config: &Config) -> Result<Self, EnhancementError> {
        match config.persistence.store.as_str() {
            "memstore" => Ok(Self::new(Box::new(MemStore))),
            other => Err(EnhancementError::UnknownStore(other.to_string())),
        }
    }
}

impl Stage for EntityShape {
    fn name(&self) -> &'static str {
        "entity-shape"
    }

    fn version(&self) -> u32 {
        1
    }

    fn apply(
        &self,
        model: &mut ClassModel,
        _ctx: &StageContext<'_>,
    ) -> Result<StageOutcome, StageError> {
        if !model.entity {
            return Ok(StageOutcome::Skipped);
        }

        let mut changed = false;
        changed |= add_if_missing(model, "init", Vec::new());
        if model.field("id").is_none() {
            model.fields.push(FieldModel {
                name: "id".into(),
                ty: TypeRef::Int,
                is_final: false,
                inject: false,
            });
            changed = true;
        }
        // Both accessors, so a later accessor-synthesis pass finds nothing
        // to add for the id field.
        changed |= add_if_missing(model, "getId", vec![Op::GetField("id".into())]);
        changed |= add_if_missing(model, "setId", vec![Op::SetField("id".into())]);
        changed |= self.transformer.augment(model);

        Ok(if changed {
            StageOutcome::Changed
        } else {
            StageOutcome::Unchanged
        })
    }
}

fn add_if_missing(model: &mut ClassModel, name: &str, body: Vec<Op>) -> bool {
    if model.has_method(name) {
        return false;
    }
    model.methods.push(MethodModel::synthetic(name, body));
    true
}
