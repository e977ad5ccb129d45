//! Configuration for the decompilation pipeline.
//!
//! This module provides configuration types for the three pipeline stages: the stack
//! decompiler, the data-flow optimizer and the source writer. [`Config`] bundles them for
//! [`crate::decompile`].

/// Configuration for the stack decompiler.
#[derive(Debug, Clone)]
pub struct DecompilerConfig {
    /// Propagate the first block failure instead of recording it (default: false).
    ///
    /// In lenient mode a failing block is logged, recorded as a diagnostic on the tree and
    /// left incomplete while the remaining blocks still decompile.
    pub strict: bool,

    /// Maximum subroutine nesting while following calls (default: 256).
    pub max_call_depth: usize,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_call_depth: 256,
        }
    }
}

impl DecompilerConfig {
    /// Strict mode: every block failure aborts the decompilation.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Lenient mode: block failures become diagnostics.
    #[must_use]
    pub fn lenient() -> Self {
        Self::default()
    }
}

/// Configuration for the data-flow optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Run the optimizer at all (default: true).
    pub enabled: bool,

    /// Fold global initializers into constants and drop `__globals` (default: true).
    pub fold_globals: bool,

    /// Turn write-only arguments into return values (default: true).
    pub recover_return_values: bool,

    /// Inline write-once/read-once temporaries (default: true).
    pub inline_temporaries: bool,

    /// Maximum number of rewrites applied to a single block (default: 10000).
    ///
    /// Every rewrite shrinks the block or its operands, so the limit only guards against
    /// malformed trees.
    pub max_iterations: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fold_globals: true,
            recover_return_values: true,
            inline_temporaries: true,
            max_iterations: 10_000,
        }
    }
}

impl OptimizerConfig {
    /// Configuration that leaves the tree untouched.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Configuration for the source writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Spaces per nesting level (default: 4).
    pub indent_width: usize,

    /// Emit recorded diagnostics as comments above each function (default: true).
    pub emit_diagnostics: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indent_width: 4,
            emit_diagnostics: true,
        }
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Decompiler settings
    pub decompiler: DecompilerConfig,
    /// Optimizer settings
    pub optimizer: OptimizerConfig,
    /// Writer settings
    pub writer: WriterConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.decompiler.strict);
        assert!(config.optimizer.enabled);
        assert_eq!(config.writer.indent_width, 4);
    }

    #[test]
    fn test_presets() {
        assert!(DecompilerConfig::strict().strict);
        assert!(!DecompilerConfig::lenient().strict);
        assert!(!OptimizerConfig::disabled().enabled);
        assert!(OptimizerConfig::disabled().fold_globals);
    }
}
