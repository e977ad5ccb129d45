use thiserror::Error;

use crate::bytecode::InstructionKind;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into three groups. Unsupported bytecode and validation failures abort the
/// decompilation of the function they occur in, while not-implemented errors are raised by
/// the optimizer's constant folding and only cost the affected global its static value.
///
/// # Error Categories
///
/// ## Unsupported Bytecode
/// - [`Error::UnknownOpcode`] - Wire code that maps to no known instruction
/// - [`Error::UnsupportedInstruction`] - Instruction kind the current operation cannot handle
/// - [`Error::UnsupportedStackOffset`] - Non-negative relative stack offset
///
/// ## Validation
/// - [`Error::Validation`] - Stack underflow, out-of-bounds stack index, missing label, ...
/// - [`Error::InvalidOffset`] - No instruction starts at the requested offset
/// - [`Error::UnknownRoutine`] - Action refers to a routine missing from the registry
///
/// ## Analysis
/// - [`Error::NotImplemented`] - Constant folding of an unsupported expression
/// - [`Error::RecursionLimit`] - Subroutine nesting exceeded the configured depth
/// - [`Error::Block`] - A block failed while decompiling in strict mode
///
/// # Examples
///
/// ```rust,ignore
/// use scriptscope::{Error, Decompiler, DecompilerConfig};
///
/// match Decompiler::new(&program, &routines, DecompilerConfig::strict()).decompile() {
///     Ok(tree) => println!("{} functions", tree.function_count()),
///     Err(Error::Block { function, block, source }) => {
///         eprintln!("fun_{function:08x}: block {block:08x} failed: {source}");
///     }
///     Err(e) => eprintln!("decompilation failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Unsupported bytecode
    /// A 16-bit instruction code does not correspond to any known instruction.
    ///
    /// Raised when converting raw wire codes into an [`InstructionKind`].
    #[error("Unknown instruction code 0x{0:04x}")]
    UnknownOpcode(u16),

    /// An instruction kind was encountered where it cannot be handled.
    ///
    /// # Fields
    ///
    /// * `offset` - Offset of the offending instruction
    /// * `kind` - Kind of the offending instruction
    #[error("Unsupported instruction {kind} at {offset:08x}")]
    UnsupportedInstruction {
        /// Offset of the offending instruction
        offset: u32,
        /// Kind of the offending instruction
        kind: InstructionKind,
    },

    /// A stack addressing instruction used a non-negative relative stack offset.
    ///
    /// Only offsets pointing below the top of the stack are meaningful, positive or zero
    /// offsets are rejected rather than guessed at.
    #[error("Unsupported stack offset {stack_offset} for {kind} at {offset:08x}")]
    UnsupportedStackOffset {
        /// Offset of the offending instruction
        offset: u32,
        /// Kind of the offending instruction
        kind: InstructionKind,
        /// The rejected relative stack offset
        stack_offset: i32,
    },

    // Validation
    /// The instruction stream is inconsistent with the simulated machine state.
    ///
    /// # Fields
    ///
    /// * `offset` - Offset of the instruction being decompiled
    /// * `kind` - Kind of the instruction being decompiled
    /// * `message` - Detailed description of the inconsistency
    #[error("Validation - {kind} at {offset:08x}: {message}")]
    Validation {
        /// Offset of the instruction being decompiled
        offset: u32,
        /// Kind of the instruction being decompiled
        kind: InstructionKind,
        /// The message to be printed for the Validation error
        message: String,
    },

    /// No instruction starts at the given offset.
    ///
    /// Happens when control flow lands in the middle of an instruction or past the end
    /// of the program.
    #[error("No instruction at offset {0:08x}")]
    InvalidOffset(u32),

    /// An action instruction references a routine the registry does not know.
    #[error("Unknown routine {0}")]
    UnknownRoutine(u16),

    // Analysis
    /// Constant folding met an expression it cannot evaluate.
    #[error("Not implemented - {0}")]
    NotImplemented(String),

    /// Subroutine nesting exceeded the configured maximum call depth.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A block failed to decompile while running in strict mode.
    ///
    /// Wraps the underlying error together with the entry offset of the function and
    /// the start offset of the block it occurred in.
    #[error("Error decompiling block at {block:08x} of function at {function:08x}: {source}")]
    Block {
        /// Entry offset of the function being decompiled
        function: u32,
        /// Start offset of the failing block
        block: u32,
        /// The underlying failure
        source: Box<Error>,
    },

    /// Writing rendered source into the output sink failed.
    #[error("{0}")]
    Fmt(#[from] std::fmt::Error),
}
