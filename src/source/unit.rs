//! A single compilation unit detected by the scanner.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::core::QualifiedName;

/// One changed source file, handed to the compiler as part of a batch.
///
/// Source text is read lazily: the scanner creates units cheaply and the
/// compiler pulls text only for the batch it actually processes. Units are
/// discarded once the compile result is consumed.
#[derive(Debug)]
pub struct SourceUnit {
    /// Qualified name of the outermost type declared by the file.
    pub name: QualifiedName,
    /// Absolute source file path.
    pub source_file: PathBuf,
    /// Output root the compiled bytes land under.
    pub output_dir: PathBuf,
    /// Lazily-read source text.
    text: OnceLock<String>,
}

impl SourceUnit {
    pub fn new(name: QualifiedName, source_file: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            name,
            source_file,
            output_dir,
            text: OnceLock::new(),
        }
    }

    /// Source text, read from disk on first access.
    pub fn source_text(&self) -> io::Result<&str> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let loaded = fs::read_to_string(&self.source_file)?;
        // A concurrent reader may have won; either value is the same file.
        Ok(self.text.get_or_init(|| loaded))
    }

    /// Inject source text directly (tests).
    #[cfg(test)]
    pub fn with_text(name: &str, text: &str) -> Self {
        let unit = Self::new(
            QualifiedName::new(name),
            PathBuf::from(format!("{name}.cls")),
            PathBuf::new(),
        );
        unit.text.set(text.to_string()).ok();
        unit
    }
}
