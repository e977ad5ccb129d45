// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # scriptscope
//!
//! A decompiler for compiled NWScript (NCS) stack bytecode. `scriptscope` turns the
//! instruction stream of a compiled script back into readable, NWScript-like source.
//!
//! ## Pipeline
//!
//! Decompilation runs in three stages, each usable on its own:
//!
//! 1. **Decompile** ([`decompiler::Decompiler`]) symbolically executes every function
//!    over an abstract operand stack and produces an [`tree::ExpressionTree`]: an arena of
//!    blocks, assignments, calls, conditionals and gotos in which every stack word is a
//!    named parameter.
//! 2. **Optimize** ([`optimizer::DataFlowOptimizer`]) analyzes reads and writes of every
//!    parameter and compacts the tree: global initializers fold into constants, write-only
//!    arguments become return values and single-use temporaries inline into their consumer.
//! 3. **Render** ([`writer::SourceWriter`]) prints the tree as indented source.
//!
//! The engine routine table (names and signatures of everything `ACTION` can call) is
//! supplied by the caller through the [`bytecode::Routines`] trait.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scriptscope::prelude::*;
//!
//! let routines = RoutineTable::new()
//!     .with(1, Routine::new("PrintInteger", VariableType::Void, [VariableType::Int]));
//!
//! let mut program = Program::new("hello");
//! program.add(Instruction::jsr(8));
//! program.add(Instruction::new(InstructionKind::RETN));
//! program.add(Instruction::consti(42));
//! program.add(Instruction::action(1, 1));
//! program.add(Instruction::new(InstructionKind::RETN));
//!
//! let source = scriptscope::decompile(&program, &routines, &Config::default())?;
//! println!("{source}");
//! # Ok::<(), scriptscope::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. By default the decompiler is lenient: a
//! block that fails to decompile is recorded as a diagnostic on the tree and rendered as
//! a comment, while [`config::DecompilerConfig::strict`] aborts on the first failure.

#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use scriptscope::prelude::*;
///
/// let program = Program::new("empty");
/// let tree = Decompiler::new(&program, &RoutineTable::new(), DecompilerConfig::default())
///     .decompile()?;
/// # Ok::<(), scriptscope::Error>(())
/// ```
pub mod prelude;

/// Bytecode model: instructions, programs, value types and the routine registry.
pub mod bytecode;

/// Configuration of the decompiler, optimizer and writer.
pub mod config;

/// Stack-to-expression decompilation of programs.
pub mod decompiler;

/// Diagnostics recorded for blocks that could not be decompiled.
pub mod diagnostics;

/// Data-flow analysis and compaction of expression trees.
pub mod optimizer;

/// Arena-backed expression tree produced by the decompiler.
pub mod tree;

/// Source rendering of expression trees.
pub mod writer;

/// `scriptscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `scriptscope` Error type
///
/// The main error type for all operations in this crate.
///
/// # Examples
///
/// ```rust,no_run
/// use scriptscope::prelude::*;
///
/// let program = Program::new("broken");
/// match scriptscope::decompile(&program, &RoutineTable::new(), &Config::default()) {
///     Ok(source) => println!("{source}"),
///     Err(Error::UnknownRoutine(id)) => println!("routine {id} is not registered"),
///     Err(e) => println!("Error: {e}"),
/// }
/// ```
pub use error::Error;

use crate::{
    bytecode::{Program, Routines},
    config::Config,
    decompiler::Decompiler,
    optimizer::{DataFlowOptimizer, ExpressionTreeOptimizer},
    writer::SourceWriter,
};

/// Decompiles, optimizes and renders `program` in one call.
///
/// The optimizer stage is skipped when `config.optimizer.enabled` is `false`.
///
/// # Errors
///
/// Returns the first error of any stage, see [`Decompiler::decompile`] and
/// [`SourceWriter::render`].
pub fn decompile(program: &Program, routines: &dyn Routines, config: &Config) -> Result<String> {
    let mut tree = Decompiler::new(program, routines, config.decompiler.clone()).decompile()?;
    DataFlowOptimizer::new(routines, config.optimizer.clone()).optimize(&mut tree)?;
    SourceWriter::new(&tree, routines, config.writer.clone()).render()
}
