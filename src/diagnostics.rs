//! Diagnostics collected during lenient decompilation.
//!
//! When a block fails to decompile outside of strict mode, the error is recorded here
//! instead of aborting the run. Sibling blocks still complete, and the renderer prints the
//! diagnostics of a function above its body so a partial function is never presented as
//! a complete one. Warnings mark input that decompiled but is unusual, such as a jump to
//! itself.
//!
//! The [`Diagnostics`] container uses `boxcar::Vec`, which appends through a shared
//! reference.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use scriptscope::diagnostics::Diagnostics;
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.error(0x15, 0x2b, "Validation - MOVSP at 0000002b: stack underflow");
//!
//! for entry in diagnostics.for_function(0x15) {
//!     println!("{entry}");
//! }
//! ```

use std::fmt;

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Something unusual that did not affect the output.
    Warning,

    /// A block could not be decompiled, the enclosing function is incomplete.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Warning => write!(f, "warning"),
            DiagnosticSeverity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic entry.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Entry offset of the function the issue belongs to.
    pub function: u32,

    /// Start offset of the block the issue occurred in.
    pub block: u32,

    /// Human-readable description of the issue.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    pub fn new(
        severity: DiagnosticSeverity,
        function: u32,
        block: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            function,
            block,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: block {:08x}: {}",
            self.severity, self.block, self.message
        )
    }
}

/// Append-only container for diagnostic entries.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, function: u32, block: u32, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            function,
            block,
            message,
        ));
    }

    /// Adds an error diagnostic.
    pub fn error(&self, function: u32, block: u32, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            function,
            block,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Iterates over all diagnostics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Iterates over the diagnostics of the function starting at `function`.
    pub fn for_function(&self, function: u32) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |d| d.function == function)
    }
}
