//! Built-in enhancement stages.
//!
//! Registered in `rekindle.toml` by implementation id:
//!
//! | Implementation id          | Rewrite                                  |
//! |----------------------------|------------------------------------------|
//! | `accessor-synthesis`       | Reader/writer methods for plain fields   |
//! | `field-access-redirection` | Raw field ops become accessor calls      |
//! | `lazy-binding`             | `inject` fields become deferred providers|
//! | `entity-shape`             | Identity and store helpers for entities  |

mod accessors;
mod inject;
mod persist;
mod redirect;

pub use accessors::AccessorSynthesis;
pub use inject::LazyBinding;
pub use persist::{EntityShape, EntityTransformer, MemStore};
pub use redirect::FieldAccessRedirection;

use crate::config::Config;
use crate::pipeline::{EnhancementError, Stage};

/// Construct a stage from its implementation id.
pub fn stage_for(impl_id: &str, config: &Config) -> Result<Box<dyn Stage>, EnhancementError> {
    match impl_id {
        "accessor-synthesis" => Ok(Box::new(AccessorSynthesis)),
        "field-access-redirection" => Ok(Box::new(FieldAccessRedirection)),
        "lazy-binding" => Ok(Box::new(LazyBinding)),
        "entity-shape" => Ok(Box::new(EntityShape::from_config(config)?)),
        other => Err(EnhancementError::UnknownImplementation(other.to_string())),
    }
}
