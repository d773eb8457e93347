//! Source units and change sets.

mod changeset;
mod unit;

pub use changeset::ChangeSet;
pub use unit::SourceUnit;
