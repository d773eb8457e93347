//! Core value types shared across the engine.

mod event;
mod name;

pub use event::{EventBus, ReloadEvent, ReloadKind};
pub use name::QualifiedName;
