//! Stack copy, move and destruct handlers.
//!
//! Stack words are addressed relative to the stack pointer (the `SP` forms) or to the
//! base of the global frame (the `BP` forms). A word pushed by a caller is never touched
//! directly. The callee goes through an argument parameter keyed by the word's position
//! relative to the callee's entry stack size, which becomes a formal argument once the
//! callee is complete.

use crate::{
    bytecode::{Instruction, InstructionKind, VariableType},
    decompiler::{DecompilationContext, Decompiler, FunctionState, StackFrame},
    tree::{ExprId, ParameterExpression, ParameterFlags, ParameterLocality},
    Result,
};

impl Decompiler<'_> {
    /// Absolute stack index addressed by a relative instruction.
    fn addressed_index(&self, ins: &Instruction, ctx: &DecompilationContext) -> Result<usize> {
        let stack_offset = negative_stack_offset!(ins)?;
        let base = match ins.kind {
            InstructionKind::CPDOWNBP
            | InstructionKind::CPTOPBP
            | InstructionKind::INCIBP
            | InstructionKind::DECIBP => ctx.num_globals,
            _ => ctx.stack.len(),
        };
        ctx.relative_index(ins, base, stack_offset)
    }

    fn is_global(&self, frame: &StackFrame) -> bool {
        self.tree
            .parameter(frame.param)
            .is_some_and(|p| p.locality == ParameterLocality::Global)
    }

    /// Parameter to access the word at `index` through.
    ///
    /// Words owned by the current function are used as they are. Caller-owned words map to
    /// the function's argument parameter for that slot, created on first access.
    pub(super) fn access(
        &mut self,
        ins: &Instruction,
        ctx: &DecompilationContext,
        state: &mut FunctionState<'_>,
        index: usize,
        flags: ParameterFlags,
    ) -> Result<ExprId> {
        let frame = ctx.frame(ins, index)?;
        if !ctx.is_outer(&frame, self.is_global(&frame)) {
            return Ok(frame.param);
        }

        let entered = ctx.top_call().stack_size_on_enter;
        let relative = (index as i64 - entered as i64) * 4;
        let stack_offset = i32::try_from(relative)
            .ok()
            .filter(|&offset| offset < 0)
            .ok_or_else(|| {
                validation_error!(
                    ins,
                    "word {} is outer but not below the entry stack size {}",
                    index,
                    entered
                )
            })?;

        if let Some(&param) = state.outer.get(&stack_offset) {
            if let Some(param) = self.tree.parameter_mut(param) {
                param.flags |= flags;
            }
            return Ok(param);
        }

        let variable_type = self
            .tree
            .parameter(frame.param)
            .map_or(VariableType::Void, |p| p.variable_type);
        let mut param = ParameterExpression::new(ins.offset, variable_type, ParameterLocality::Argument);
        param.stack_offset = Some(stack_offset);
        param.flags = flags;

        let param = self.tree.add(param);
        state.outer.insert(stack_offset, param);
        Ok(param)
    }

    pub(super) fn copy_down(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let start = self.addressed_index(ins, ctx)?;
        let count = usize::from(ins.size) / 4;
        if count > ctx.stack.len() {
            return Err(validation_error!(
                ins,
                "cannot copy {} words from a stack of {}",
                count,
                ctx.stack.len()
            ));
        }

        for i in 0..count {
            let right = ctx.frame(ins, ctx.stack.len() - 1 - i)?.param;
            let left = self.access(ins, ctx, state, start + count - 1 - i, ParameterFlags::OUTER_MODIFIED)?;

            let variable_type = self
                .tree
                .parameter(right)
                .map(|p| p.variable_type);
            if let (Some(variable_type), Some(param)) = (variable_type, self.tree.parameter_mut(left)) {
                param.variable_type = variable_type;
            }

            let assign = self.tree.new_assign(ins.offset, left, right, false);
            self.tree.push_statement(block, assign);
        }
        Ok(())
    }

    pub(super) fn copy_top(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let start = self.addressed_index(ins, ctx)?;
        let count = usize::from(ins.size) / 4;

        for i in 0..count {
            let source = self.access(ins, ctx, state, start + i, ParameterFlags::OUTER_READ)?;
            let variable_type = self
                .tree
                .parameter(source)
                .map_or(VariableType::Void, |p| p.variable_type);

            let mut copy = ParameterExpression::new(ins.offset, variable_type, ParameterLocality::Local);
            if count > 1 {
                copy.suffix = Some(i.to_string());
            }
            let copy = self.tree.add(copy);
            let assign = self.tree.new_assign(ins.offset, copy, source, true);
            self.tree.push_statement(block, assign);
            ctx.push(copy);
        }
        Ok(())
    }

    pub(super) fn move_stack_pointer(&mut self, ins: &Instruction, ctx: &mut DecompilationContext) -> Result<()> {
        let stack_offset = negative_stack_offset!(ins)?;
        let count = (stack_offset.unsigned_abs() / 4) as usize;
        ctx.pop_many(ins, count)?;
        Ok(())
    }

    pub(super) fn destruct(&mut self, ins: &Instruction, ctx: &mut DecompilationContext) -> Result<()> {
        if ins.stack_offset < 0 {
            return Err(crate::Error::UnsupportedStackOffset {
                offset: ins.offset,
                kind: ins.kind,
                stack_offset: ins.stack_offset,
            });
        }

        let size = usize::from(ins.size) / 4;
        let keep_offset = ins.stack_offset as usize / 4;
        let keep_count = usize::from(ins.size_no_destroy) / 4;
        if keep_offset + keep_count > size {
            return Err(validation_error!(
                ins,
                "kept words {}..{} exceed the destructed region of {}",
                keep_offset,
                keep_offset + keep_count,
                size
            ));
        }

        let region = ctx.pop_many(ins, size)?;
        ctx.stack
            .extend_from_slice(&region[keep_offset..keep_offset + keep_count]);
        Ok(())
    }

    pub(super) fn step_in_place(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let kind = super::unary_operation(ins)?;
        let index = self.addressed_index(ins, ctx)?;
        let target = self.access(
            ins,
            ctx,
            state,
            index,
            ParameterFlags::OUTER_READ | ParameterFlags::OUTER_MODIFIED,
        )?;

        let step = self.tree.new_unary(ins.offset, kind, target);
        self.tree.push_statement(block, step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bytecode::{Instruction, InstructionKind, Program, RoutineTable, VariableType},
        config::DecompilerConfig,
        decompiler::Decompiler,
        tree::{ExpressionKind, ParameterLocality},
        Error,
    };

    fn program(instructions: Vec<Instruction>) -> Program {
        instructions.into_iter().collect()
    }

    #[test]
    fn test_copy_top_declares_copies_in_order() {
        let program = program(vec![
            Instruction::consti(1),
            Instruction::constf(2.0),
            Instruction::cptopsp(-8, 8),
            Instruction::new(InstructionKind::RETN),
        ]);
        let routines = RoutineTable::new();
        let tree = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap();

        let start = tree.function_ids()[0];
        let block = tree.block(tree[start].block).unwrap();
        assert_eq!(block.expressions.len(), 5);

        let copy = |statement| {
            let assign = tree.binary(statement).unwrap();
            tree.parameter(assign.left).unwrap().clone()
        };
        let first = copy(block.expressions[2]);
        let second = copy(block.expressions[3]);
        assert_eq!(first.variable_type, VariableType::Int);
        assert_eq!(first.suffix.as_deref(), Some("0"));
        assert_eq!(second.variable_type, VariableType::Float);
        assert_eq!(second.suffix.as_deref(), Some("1"));
    }

    #[test]
    fn test_copy_down_assigns_without_declaring() {
        let program = program(vec![
            Instruction::new(InstructionKind::RSADDI),
            Instruction::consti(5),
            Instruction::cpdownsp(-8, 4),
            Instruction::movsp(-4),
            Instruction::new(InstructionKind::RETN),
        ]);
        let routines = RoutineTable::new();
        let tree = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap();

        let start = tree.function_ids()[0];
        let block = tree.block(tree[start].block).unwrap();
        let assign = tree.binary(block.expressions[2]).unwrap();
        assert_eq!(assign.kind, ExpressionKind::Assign);
        assert!(!assign.declare_left);
        assert_eq!(assign.left, block.expressions[0]);
    }

    #[test]
    fn test_non_negative_offset_is_rejected() {
        let program = program(vec![
            Instruction::consti(1),
            Instruction::cptopsp(4, 4),
            Instruction::new(InstructionKind::RETN),
        ]);
        let routines = RoutineTable::new();
        let err = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap_err();
        let Error::Block { source, .. } = err else {
            panic!("expected a block error, got {err:?}");
        };
        assert!(matches!(
            *source,
            Error::UnsupportedStackOffset { stack_offset: 4, .. }
        ));
    }

    #[test]
    fn test_move_stack_pointer_by_minimum_offset() {
        let program = program(vec![
            Instruction::consti(1),
            Instruction::movsp(i32::MIN),
            Instruction::new(InstructionKind::RETN),
        ]);
        let routines = RoutineTable::new();
        let err = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap_err();
        let Error::Block { source, .. } = err else {
            panic!("expected a block error, got {err:?}");
        };
        assert!(matches!(
            *source,
            Error::Validation {
                kind: InstructionKind::MOVSP,
                ..
            }
        ));
    }

    #[test]
    fn test_destruct_keeps_selected_words() {
        let program = program(vec![
            Instruction::consti(1),
            Instruction::consti(2),
            Instruction::consti(3),
            Instruction::destruct(12, 4, 4),
            Instruction::cptopsp(-4, 4),
            Instruction::new(InstructionKind::RETN),
        ]);
        let routines = RoutineTable::new();
        let tree = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap();

        let start = tree.function_ids()[0];
        let block = tree.block(tree[start].block).unwrap();
        let copied = tree.binary(block.expressions[3]).unwrap().right;
        let kept = tree.binary(block.expressions[1]).unwrap().left;
        assert_eq!(copied, kept);
    }

    #[test]
    fn test_callee_accesses_become_arguments() {
        let mut program = Program::new("callee");
        program.add(Instruction::new(InstructionKind::RSADDI));
        program.add(Instruction::jsr(8));
        program.add(Instruction::new(InstructionKind::RETN));
        program.add(Instruction::step(InstructionKind::INCISP, -4));
        program.add(Instruction::new(InstructionKind::RETN));

        let routines = RoutineTable::new();
        let tree = Decompiler::new(&program, &routines, DecompilerConfig::strict())
            .decompile()
            .unwrap();

        let callee = tree.function_ids()[1];
        let arguments = &tree[callee].arguments;
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].stack_offset, -4);
        assert!(arguments[0].pointer);
        assert_eq!(
            tree.parameter(arguments[0].param).unwrap().locality,
            ParameterLocality::Argument
        );
    }
}
