//! Batch compilation behind a pluggable backend.
//!
//! The reload cycle hands the backend a whole changeset at once so it can
//! resolve cross-references within the batch; all-or-nothing, a failed batch
//! leaves the running application untouched.

mod diagnostics;
mod modelc;

pub use diagnostics::{Diagnostic, Severity};
pub use modelc::Modelc;

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::QualifiedName;
use crate::model::CodecError;
use crate::source::SourceUnit;

/// Batch compile failure. Diagnostics cover every failed unit in the batch.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{} error(s) in batch", .0.iter().filter(|d| d.severity == Severity::Error).count())]
    Diagnostics(Vec<Diagnostic>),

    #[error("failed to read source `{0}`")]
    Read(PathBuf, #[source] io::Error),

    #[error("failed to write compiled output `{0}`")]
    Write(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl CompileError {
    /// First error-severity diagnostic, if any.
    pub fn primary(&self) -> Option<&Diagnostic> {
        match self {
            CompileError::Diagnostics(diags) => {
                diags.iter().find(|d| d.severity == Severity::Error)
            }
            _ => None,
        }
    }
}

/// One compiled type. Inner types appear as their own entries alongside the
/// outer type that declared them.
#[derive(Debug)]
pub struct CompiledClass {
    pub name: QualifiedName,
    pub bytes: Vec<u8>,
    /// Output root the compiled file belongs under.
    pub output_root: PathBuf,
}

impl CompiledClass {
    pub fn compiled_file(&self, ext: &str) -> PathBuf {
        self.output_root.join(self.name.compiled_rel_path(ext))
    }
}

/// Result of compiling one changeset.
#[derive(Debug, Default)]
pub struct CompiledBatch {
    pub classes: Vec<CompiledClass>,
}

impl CompiledBatch {
    pub fn names(&self) -> Vec<&QualifiedName> {
        self.classes.iter().map(|c| &c.name).collect()
    }
}

/// A compiler for the project's source language. Implementations compile a
/// whole changeset in one call and report diagnostics for every failed unit
/// rather than stopping at the first.
pub trait CompilerBackend: Send + Sync {
    /// Engine identifier, names the disk-cache subtree.
    fn engine(&self) -> &'static str;

    fn compile(&self, units: &[SourceUnit]) -> Result<CompiledBatch, CompileError>;
}

/// Write every compiled class of a batch to its output root.
pub fn write_outputs(batch: &CompiledBatch, ext: &str) -> Result<(), CompileError> {
    for class in &batch.classes {
        let path = class.compiled_file(ext);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CompileError::Write(parent.to_path_buf(), e))?;
        }
        fs::write(&path, &class.bytes).map_err(|e| CompileError::Write(path.clone(), e))?;
    }
    Ok(())
}
