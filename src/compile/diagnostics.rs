//! Compiler diagnostics with positions and source-context rendering.

use std::fmt;
use std::path::PathBuf;

/// Diagnostic severity. Warnings never fail a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One compiler message, positioned in a source file (1-based line/col).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(file: PathBuf, line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file,
            line,
            col,
            message: message.into(),
        }
    }

    /// Render with the offending line and a caret under the column:
    ///
    /// ```text
    /// error: app/com/example/Foo.cls:3:11: expected `;`
    ///   3 | class Foo {
    ///     |           ^
    /// ```
    pub fn render(&self, source: &str) -> String {
        let mut out = self.to_string();
        if let Some(line) = source.lines().nth(self.line.saturating_sub(1)) {
            let gutter = format!("{:>4}", self.line);
            out.push_str(&format!("\n{gutter} | {line}"));
            out.push_str(&format!(
                "\n{:>4} | {}^",
                "",
                " ".repeat(self.col.saturating_sub(1))
            ));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{}:{}: {}",
            self.severity,
            self.file.display(),
            self.line,
            self.col,
            self.message
        )
    }
}
