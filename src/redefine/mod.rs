//! In-place class redefinition.
//!
//! Redefinition replaces method bodies of already-defined classes without a
//! generation swap. It is strictly less powerful than a swap: any structural
//! change (fields, method set, superclass, kind) is rejected, and the
//! coordinator falls back to swapping the whole generation.
//!
//! Batches are atomic: every update is validated before any is applied, so
//! a failed batch leaves the running generation exactly as it was.

mod agent;

pub use agent::{AgentGateway, AgentHandle, AttachProvider, NoAttach};

use thiserror::Error;

use crate::core::QualifiedName;
use crate::debug;
use crate::loader::ReloadingClassLoader;
use crate::model::ClassModel;

#[derive(Debug, Error)]
pub enum RedefineError {
    /// The update cannot be expressed as an in-place redefinition. The
    /// coordinator treats this as a signal, not a failure: it swaps instead.
    #[error("class `{class}` cannot be redefined in place: {reason}")]
    Incompatible { class: QualifiedName, reason: String },

    /// No redefinition capability exists at all (no agent, or disabled).
    #[error("in-place redefinition is unavailable")]
    Unavailable,
}

/// Applies batches of redefinitions to the running generation.
pub trait RedefinitionGateway: Send + Sync {
    /// Whether redefinition can work at all. Checked once per cycle; an
    /// incapable gateway short-circuits straight to a swap.
    fn capable(&self) -> bool;

    fn redefine(
        &self,
        loader: &ReloadingClassLoader,
        updates: &[(QualifiedName, ClassModel)],
    ) -> Result<(), RedefineError>;
}

/// Gateway that swaps models behind the current generation's [`LoadedClass`]
/// handles. Compatibility is shape equality: same kind, superclass, fields
/// and method names, only bodies may differ.
pub struct InProcessGateway;

impl RedefinitionGateway for InProcessGateway {
    fn capable(&self) -> bool {
        true
    }

    fn redefine(
        &self,
        loader: &ReloadingClassLoader,
        updates: &[(QualifiedName, ClassModel)],
    ) -> Result<(), RedefineError> {
        // Validate everything first; nothing is applied on any failure.
        let mut validated = Vec::with_capacity(updates.len());
        for (name, model) in updates {
            let Some(class) = loader.defined(name) else {
                return Err(RedefineError::Incompatible {
                    class: name.clone(),
                    reason: "not defined in the running generation".into(),
                });
            };
            if class.model().shape() != model.shape() {
                return Err(RedefineError::Incompatible {
                    class: name.clone(),
                    reason: "structural change (fields, methods or supertype)".into(),
                });
            }
            validated.push((class, model.clone()));
        }

        for (class, model) in validated {
            debug!("redefine"; "swapped bodies of {}", class.name());
            class.swap_model(model);
        }
        Ok(())
    }
}

/// Gateway for forced swap-only operation (`--swap-only`).
pub struct SwapOnly;

impl RedefinitionGateway for SwapOnly {
    fn capable(&self) -> bool {
        false
    }

    fn redefine(
        &self,
        _loader: &ReloadingClassLoader,
        _updates: &[(QualifiedName, ClassModel)],
    ) -> Result<(), RedefineError> {
        Err(RedefineError::Unavailable)
    }
}
