//! Decompiled functions and globals.

use std::fmt;

use crate::{
    bytecode::{Variable, VariableType},
    tree::ExprId,
};

/// A strongly-typed handle to a [`Function`] in an [`crate::tree::ExpressionTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(pub(crate) usize);

impl FunctionId {
    /// Creates a handle from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        FunctionId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({})", self.0)
    }
}

/// A formal argument of a decompiled function.
///
/// Arguments are caller-owned stack slots the function accesses. The stack offset is
/// relative to the stack size when the function is entered, so the matching call site
/// finds the actual argument at `stack.len() + stack_offset / 4`.
#[derive(Debug, Clone)]
pub struct FunctionArgument {
    /// Parameter standing for the argument inside the function body
    pub param: ExprId,
    /// Argument type
    pub variable_type: VariableType,
    /// Caller-relative stack offset in bytes, always negative
    pub stack_offset: i32,
    /// `true` if the function writes the caller's slot
    pub pointer: bool,
}

impl FunctionArgument {
    /// Zero-based argument number derived from the stack offset.
    #[must_use]
    pub fn number(&self) -> usize {
        (self.stack_offset.unsigned_abs() / 4).saturating_sub(1) as usize
    }
}

/// A decompiled subroutine.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name, empty if unnamed
    pub name: String,
    /// Entry offset
    pub start: u32,
    /// Highest instruction offset visited while decompiling
    pub end: u32,
    /// Formal arguments, closest to the caller's stack top first
    pub arguments: Vec<FunctionArgument>,
    /// Result type
    pub return_type: VariableType,
    /// Root block
    pub block: ExprId,
}

impl Function {
    /// Creates an unnamed void function.
    #[must_use]
    pub fn new(start: u32, block: ExprId) -> Self {
        Self {
            name: String::new(),
            start,
            end: start,
            arguments: Vec::new(),
            return_type: VariableType::Void,
            block,
        }
    }

    /// Returns `true` if `offset` lies within the decompiled range.
    #[must_use]
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Name to render, falls back to `fun_<start>` for unnamed functions.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("fun_{:08x}", self.start)
        } else {
            self.name.clone()
        }
    }
}

/// A global variable with its statically known initial value.
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    /// Global parameter
    pub param: ExprId,
    /// Constant the initializer folds to, `None` if unknown
    pub value: Option<Variable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let mut function = Function::new(21, ExprId::new(0));
        function.end = 40;
        assert!(function.contains(21));
        assert!(function.contains(40));
        assert!(!function.contains(41));
        assert!(!function.contains(13));
    }

    #[test]
    fn test_display_name() {
        let mut function = Function::new(0x2a, ExprId::new(0));
        assert_eq!(function.display_name(), "fun_0000002a");
        function.name = "main".into();
        assert_eq!(function.display_name(), "main");
    }

    #[test]
    fn test_argument_number() {
        let arg = |stack_offset| FunctionArgument {
            param: ExprId::new(0),
            variable_type: VariableType::Int,
            stack_offset,
            pointer: false,
        };
        assert_eq!(arg(-4).number(), 0);
        assert_eq!(arg(-12).number(), 2);
        assert_eq!(arg(i32::MIN).number(), 536_870_911);
    }
}
