//! # scriptscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the scriptscope library. Import this module to get quick access to everything
//! needed to decompile, optimize and render a script.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all scriptscope operations
pub use crate::Error;

/// The result type used throughout scriptscope
pub use crate::Result;

/// One-call decompile, optimize and render pipeline
pub use crate::decompile;

// ================================================================================================
// Configuration
// ================================================================================================

/// Pipeline and per-stage configuration
pub use crate::config::{Config, DecompilerConfig, OptimizerConfig, WriterConfig};

// ================================================================================================
// Bytecode
// ================================================================================================

/// Instructions and programs
pub use crate::bytecode::{Instruction, InstructionKind, Program};

/// Value types and constant payloads
pub use crate::bytecode::{Variable, VariableType};

/// Engine routine registry
pub use crate::bytecode::{Routine, RoutineArgument, RoutineTable, Routines};

// ================================================================================================
// Decompilation
// ================================================================================================

/// Stack decompiler
pub use crate::decompiler::Decompiler;

/// Names assigned to the synthetic and entry functions
pub use crate::decompiler::{CONDITIONAL_FUNCTION, GLOBALS_FUNCTION, MAIN_FUNCTION, START_FUNCTION};

/// Diagnostics of blocks that failed to decompile
pub use crate::diagnostics::{Diagnostic, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Expression Tree
// ================================================================================================

/// Arena and handles
pub use crate::tree::{ExprId, ExpressionTree, FunctionId};

/// Expression nodes
pub use crate::tree::{Expression, ExpressionKind, OperandRole, ParameterLocality};

/// Functions and globals
pub use crate::tree::{Function, FunctionArgument, GlobalVariable};

// ================================================================================================
// Optimization and Rendering
// ================================================================================================

/// Optimizer trait and implementations
pub use crate::optimizer::{DataFlowOptimizer, ExpressionTreeOptimizer, NoopOptimizer};

/// Data-flow facts
pub use crate::optimizer::OptimizationContext;

/// Source writer
pub use crate::writer::SourceWriter;
