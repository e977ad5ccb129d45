//! Data-flow optimizer for decompiled expression trees.
//!
//! The raw output of the [`crate::decompiler`] names every stack word, so even trivial
//! scripts come out as long runs of single-use temporaries. The optimizer turns that into
//! readable source in two passes sharing one [`OptimizationContext`]:
//!
//! - **Analyze** ([`analyze`]) records every read and write of every parameter together
//!   with the operand position it occurs in.
//! - **Compact** removes the synthetic entry functions, folds global initializers into
//!   constants, recovers return values from write-only arguments, and rewrites blocks
//!   until no rule applies: declarations merge into initializers, temporaries inline into
//!   their single consumer and dead stores disappear.
//!
//! Optimizing an already optimized tree leaves it unchanged.
//!
//! # Examples
//!
//! ```rust,ignore
//! use scriptscope::prelude::*;
//!
//! let mut tree = Decompiler::new(&program, &routines, DecompilerConfig::default()).decompile()?;
//! let optimizer = DataFlowOptimizer::new(&routines, OptimizerConfig::default());
//! optimizer.optimize(&mut tree)?;
//! ```

mod analyze;
mod compact;
mod context;
mod eval;

pub use analyze::analyze;
pub use context::{OptimizationContext, ReadEvent, WriteEvent};
pub use eval::evaluate;

use tracing::debug;

use crate::{bytecode::Routines, config::OptimizerConfig, tree::ExpressionTree, Result};

/// A transformation of a decompiled expression tree.
pub trait ExpressionTreeOptimizer {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Optimizes `tree` in place.
    ///
    /// Returns `true` if the tree changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree is inconsistent.
    fn optimize(&self, tree: &mut ExpressionTree) -> Result<bool>;

    /// Get a description of what this optimizer does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}

/// Optimizer that leaves the tree as decompiled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

impl ExpressionTreeOptimizer for NoopOptimizer {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn optimize(&self, _tree: &mut ExpressionTree) -> Result<bool> {
        Ok(false)
    }

    fn description(&self) -> &'static str {
        "Keeps the raw decompiler output"
    }
}

/// The analyze and compact pipeline.
pub struct DataFlowOptimizer<'a> {
    routines: &'a dyn Routines,
    config: OptimizerConfig,
}

impl<'a> DataFlowOptimizer<'a> {
    /// Creates an optimizer resolving action pointer arguments through `routines`.
    #[must_use]
    pub fn new(routines: &'a dyn Routines, config: OptimizerConfig) -> Self {
        Self { routines, config }
    }
}

impl ExpressionTreeOptimizer for DataFlowOptimizer<'_> {
    fn name(&self) -> &'static str {
        "data-flow"
    }

    fn optimize(&self, tree: &mut ExpressionTree) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }

        let changed = compact::Compactor::new(tree, self.routines, &self.config).run();
        debug!(
            changed,
            functions = tree.function_count(),
            globals = tree.globals().len(),
            "optimized expression tree"
        );
        Ok(changed)
    }

    fn description(&self) -> &'static str {
        "Folds globals, recovers return values and inlines single-use temporaries"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::RoutineTable, tree::Function};

    fn minimal_tree() -> ExpressionTree {
        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        let ret = tree.new_return(13, None);
        tree.push_statement(root, ret);
        tree.add_function(Function::new(13, root));
        tree
    }

    #[test]
    fn test_disabled_optimizer_is_a_noop() {
        let routines = RoutineTable::new();
        let mut tree = minimal_tree();
        let optimizer = DataFlowOptimizer::new(&routines, OptimizerConfig::disabled());
        assert!(!optimizer.optimize(&mut tree).unwrap());
        assert!(!NoopOptimizer.optimize(&mut tree).unwrap());

        let root = tree.functions().next().unwrap().block;
        assert_eq!(tree.block(root).unwrap().expressions.len(), 1);
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let routines = RoutineTable::new();
        let mut tree = minimal_tree();
        let optimizer = DataFlowOptimizer::new(&routines, OptimizerConfig::default());

        assert!(optimizer.optimize(&mut tree).unwrap());
        assert!(!optimizer.optimize(&mut tree).unwrap());
        assert_eq!(optimizer.name(), "data-flow");
    }
}
