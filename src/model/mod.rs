//! In-memory class structure and its binary codec.
//!
//! Pipeline stages never touch raw bytes directly; they operate on
//! [`ClassModel`] values decoded through a pluggable [`ClassCodec`]. Any
//! real class-file or IR library substitutes behind that trait.

mod class;
mod codec;

pub use class::{ClassKind, ClassModel, ClassShape, FieldModel, MethodModel, Op, TypeRef};
pub use codec::{ClassCodec, CodecError, JsonCodec};
