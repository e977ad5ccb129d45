//! Simulated machine state carried through decompilation.
//!
//! The [`DecompilationContext`] mirrors the VM's operand stack at the level of named
//! values: every stack word is a [`StackFrame`] holding the parameter standing for it and
//! the function that allocated it. Contexts are cloned whenever control flow splits, so
//! each scheduled block continues from its own snapshot.

use std::collections::BTreeMap;

use crate::{
    bytecode::Instruction,
    tree::{ExprId, FunctionId},
    Result,
};

/// Parameters synthesized for caller-owned stack slots, keyed by caller-relative offset.
///
/// Iterating in reverse yields the slots closest to the caller's stack top first, which is
/// the order formal arguments are listed in.
pub type OuterParams = BTreeMap<i32, ExprId>;

/// One word of the simulated operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// Parameter holding the value of this word
    pub param: ExprId,
    /// Function that pushed the word
    pub allocated_by: FunctionId,
}

/// One entry of the simulated call stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// Function being executed
    pub function: FunctionId,
    /// Operand stack size when the function was entered
    pub stack_size_on_enter: usize,
}

/// Snapshot of the simulated machine at some point of a function.
#[derive(Debug, Clone, Default)]
pub struct DecompilationContext {
    /// Operand stack, bottom first
    pub stack: Vec<StackFrame>,
    /// Call stack, outermost first
    pub call_stack: Vec<CallFrame>,
    /// Number of stack words promoted to globals
    pub num_globals: usize,
    /// Global count before the last promotion
    pub prev_num_globals: usize,
    /// Block captured by the last STORE_STATE
    pub saved_action: Option<ExprId>,
}

impl DecompilationContext {
    /// Creates a context entering `function` with an empty stack.
    #[must_use]
    pub fn entering(function: FunctionId) -> Self {
        Self {
            call_stack: vec![CallFrame {
                function,
                stack_size_on_enter: 0,
            }],
            ..Self::default()
        }
    }

    /// Snapshot of this context for a call into `function`.
    #[must_use]
    pub fn enter(&self, function: FunctionId) -> Self {
        let mut ctx = self.clone();
        ctx.call_stack.push(CallFrame {
            function,
            stack_size_on_enter: self.stack.len(),
        });
        ctx
    }

    /// The innermost call frame.
    ///
    /// Contexts are always created through [`DecompilationContext::entering`], so the call
    /// stack is never empty while decompiling.
    #[must_use]
    pub fn top_call(&self) -> CallFrame {
        self.call_stack.last().copied().unwrap_or(CallFrame {
            function: FunctionId::new(0),
            stack_size_on_enter: 0,
        })
    }

    /// Function currently being executed.
    #[must_use]
    pub fn current_function(&self) -> FunctionId {
        self.top_call().function
    }

    /// Pushes `param` as allocated by the current function.
    pub fn push(&mut self, param: ExprId) {
        let allocated_by = self.current_function();
        self.stack.push(StackFrame {
            param,
            allocated_by,
        });
    }

    /// Pops the top word.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] on stack underflow.
    pub fn pop(&mut self, ins: &Instruction) -> Result<StackFrame> {
        self.stack
            .pop()
            .ok_or_else(|| validation_error!(ins, "operand stack underflow"))
    }

    /// Pops the top `count` words, returned bottom first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if fewer than `count` words are on the stack.
    pub fn pop_many(&mut self, ins: &Instruction, count: usize) -> Result<Vec<StackFrame>> {
        if count > self.stack.len() {
            return Err(validation_error!(
                ins,
                "cannot pop {} words from a stack of {}",
                count,
                self.stack.len()
            ));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    /// Word at absolute `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if `index` is past the top of the stack.
    pub fn frame(&self, ins: &Instruction, index: usize) -> Result<StackFrame> {
        self.stack.get(index).copied().ok_or_else(|| {
            validation_error!(
                ins,
                "stack index {} out of bounds, stack size {}",
                index,
                self.stack.len()
            )
        })
    }

    /// Absolute stack index `stack_offset` bytes below `base` words.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the index would be negative.
    pub fn relative_index(&self, ins: &Instruction, base: usize, stack_offset: i32) -> Result<usize> {
        let index = base as i64 + i64::from(stack_offset / 4);
        usize::try_from(index).map_err(|_| {
            validation_error!(ins, "stack index {} out of bounds", index)
        })
    }

    /// Returns `true` if `frame` belongs to a caller and must be accessed through an
    /// outer parameter.
    #[must_use]
    pub fn is_outer(&self, frame: &StackFrame, is_global: bool) -> bool {
        frame.allocated_by != self.current_function() && !is_global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bytecode::InstructionKind, Error};

    fn movsp() -> Instruction {
        Instruction::movsp(-4)
    }

    #[test]
    fn test_push_pop() {
        let mut ctx = DecompilationContext::entering(FunctionId::new(0));
        ctx.push(ExprId::new(1));
        ctx.push(ExprId::new(2));

        let top = ctx.pop(&movsp()).unwrap();
        assert_eq!(top.param, ExprId::new(2));
        assert_eq!(top.allocated_by, FunctionId::new(0));
        assert_eq!(ctx.stack.len(), 1);
    }

    #[test]
    fn test_underflow() {
        let mut ctx = DecompilationContext::entering(FunctionId::new(0));
        let err = ctx.pop(&movsp()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation {
                kind: InstructionKind::MOVSP,
                ..
            }
        ));
        assert!(ctx.pop_many(&movsp(), 1).is_err());
    }

    #[test]
    fn test_pop_many_keeps_order() {
        let mut ctx = DecompilationContext::entering(FunctionId::new(0));
        for i in 0..4 {
            ctx.push(ExprId::new(i));
        }
        let popped = ctx.pop_many(&movsp(), 3).unwrap();
        let params: Vec<_> = popped.iter().map(|f| f.param.index()).collect();
        assert_eq!(params, vec![1, 2, 3]);
    }

    #[test]
    fn test_enter_records_stack_size() {
        let mut ctx = DecompilationContext::entering(FunctionId::new(0));
        ctx.push(ExprId::new(7));

        let inner = ctx.enter(FunctionId::new(1));
        assert_eq!(inner.current_function(), FunctionId::new(1));
        assert_eq!(inner.top_call().stack_size_on_enter, 1);

        let frame = inner.frame(&movsp(), 0).unwrap();
        assert!(inner.is_outer(&frame, false));
        assert!(!inner.is_outer(&frame, true));
        assert!(!ctx.is_outer(&frame, false));
    }

    #[test]
    fn test_relative_index() {
        let ctx = DecompilationContext::entering(FunctionId::new(0));
        assert_eq!(ctx.relative_index(&movsp(), 3, -8).unwrap(), 1);
        assert!(ctx.relative_index(&movsp(), 1, -8).is_err());
    }
}
