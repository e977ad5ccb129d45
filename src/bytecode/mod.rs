//! In-memory model of compiled script bytecode.
//!
//! This module defines what the decompiler consumes: decoded [`Instruction`]s collected in
//! a [`Program`], the script [`VariableType`]s and constant payloads, and the
//! [`Routines`] registry describing engine routine signatures. Reading and writing the
//! binary container format is left to the surrounding tooling.
//!
//! # Key Components
//!
//! - [`InstructionKind`] - Every instruction of the dialect with its wire code
//! - [`Instruction`] - A decoded instruction with offsets and operands
//! - [`Program`] - Offset-indexed instruction stream
//! - [`Routines`] / [`RoutineTable`] - Engine routine signatures by id

mod instruction;
mod program;
mod routines;
mod variable;

pub use instruction::{Instruction, InstructionKind};
pub use program::Program;
pub use routines::{Routine, RoutineArgument, RoutineTable, Routines};
pub use variable::{Variable, VariableType};
