//! Class enhancement pipeline.
//!
//! An ordered list of stages, each a pure model-to-model rewrite. Stage order
//! comes straight from the `[enhancer]` table in the config file; the ordered
//! `(name, version)` vector feeds the cache signature, so reordering or
//! bumping any stage invalidates every cached transformed entry at once.
//!
//! Stages must be idempotent: the pipeline skips any stage whose
//! `rekindle.<stage>` marker is already on the model, and the stages
//! themselves check structural evidence, so re-enhancing already-enhanced
//! bytes is a no-op even for models with stripped markers.

pub mod stages;

pub use stages::{
    AccessorSynthesis, EntityShape, EntityTransformer, FieldAccessRedirection, LazyBinding,
    MemStore,
};

use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::Config;
use crate::core::QualifiedName;
use crate::log;
use crate::model::{ClassCodec, ClassModel, CodecError};

// ============================================================================
// Stage contract
// ============================================================================

/// What one stage application did to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The model was mutated and must be re-encoded.
    Changed,
    /// The stage applied but found nothing to do (already enhanced, or
    /// nothing matched).
    Unchanged,
    /// The stage does not apply to this model at all.
    Skipped,
}

/// Failure inside one stage. Aborts the cycle; sibling classes already
/// transformed in the same batch are discarded with it.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StageError(String);

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Read-only context stages run under.
pub struct StageContext<'a> {
    pub config: &'a Config,
}

/// One enhancement stage.
///
/// `name` and `version` identify the stage in the pipeline version vector;
/// bump `version` whenever the rewrite's output changes shape.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn version(&self) -> u32;
    fn apply(&self, model: &mut ClassModel, ctx: &StageContext<'_>)
    -> Result<StageOutcome, StageError>;
}

/// Marker a stage leaves on models it has changed.
pub fn stage_marker(name: &str) -> String {
    format!("rekindle.{name}")
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error("stage `{stage}` failed on `{class}`: {cause}")]
    Stage {
        stage: String,
        class: QualifiedName,
        #[source]
        cause: StageError,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("unknown enhancer implementation `{0}`")]
    UnknownImplementation(String),

    #[error("unknown persistence store `{0}`")]
    UnknownStore(String),
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    codec: Arc<dyn ClassCodec>,
}

impl Pipeline {
    pub fn new(codec: Arc<dyn ClassCodec>) -> Self {
        Self {
            stages: Vec::new(),
            codec,
        }
    }

    /// Append a stage; call order is execution order.
    pub fn pipe(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Build the pipeline from the `[enhancer]` registrations, in table
    /// order.
    pub fn from_config(config: &Config, codec: Arc<dyn ClassCodec>) -> Result<Self, EnhancementError> {
        let mut pipeline = Self::new(codec);
        for (_, impl_id) in config.enhancer_registrations() {
            pipeline = pipeline.pipe(stages::stage_for(&impl_id, config)?);
        }
        Ok(pipeline)
    }

    /// Ordered `(stage name, version)` vector for signatures.
    pub fn version_vector(&self) -> Vec<(String, u32)> {
        self.stages
            .iter()
            .map(|s| (s.name().to_string(), s.version()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage over a model. Non-concrete types (interfaces, enums,
    /// annotations) are skipped silently. Returns whether anything changed.
    pub fn enhance(
        &self,
        model: &mut ClassModel,
        ctx: &StageContext<'_>,
    ) -> Result<bool, EnhancementError> {
        if !model.is_concrete_class() {
            return Ok(false);
        }
        let mut changed = false;
        for stage in &self.stages {
            let marker = stage_marker(stage.name());
            // A stamped stage already ran over this model under an earlier
            // enhancement; structural checks inside the stages cover models
            // whose markers were stripped.
            if model.has_marker(&marker) {
                continue;
            }
            let outcome = stage
                .apply(model, ctx)
                .map_err(|cause| EnhancementError::Stage {
                    stage: stage.name().to_string(),
                    class: model.name.clone(),
                    cause,
                })?;
            if outcome == StageOutcome::Changed {
                model.add_marker(marker);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Decode, enhance, re-encode. Returns None when nothing changed, so
    /// callers keep serving the original bytes without a copy.
    pub fn enhance_bytes(
        &self,
        bytes: &[u8],
        ctx: &StageContext<'_>,
    ) -> Result<Option<Vec<u8>>, EnhancementError> {
        if self.stages.is_empty() {
            return Ok(None);
        }
        let mut model = self.codec.decode(bytes)?;
        if self.enhance(&mut model, ctx)? {
            Ok(Some(self.codec.encode(&model)?))
        } else {
            Ok(None)
        }
    }

    /// Enhance a whole batch in parallel. Classes are independent, so
    /// sibling failures don't contaminate each other's output, but any
    /// failure aborts the batch: the first error is returned, the rest
    /// logged.
    pub fn enhance_all(
        &self,
        items: &[(QualifiedName, Vec<u8>)],
        ctx: &StageContext<'_>,
    ) -> Result<Vec<(QualifiedName, Option<Vec<u8>>)>, EnhancementError> {
        let outcomes: Vec<_> = items
            .par_iter()
            .map(|(name, bytes)| {
                self.enhance_bytes(bytes, ctx)
                    .map(|out| (name.clone(), out))
            })
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(entry) => results.push(entry),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => log!("enhance"; "{e}"),
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
