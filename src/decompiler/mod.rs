//! Stack and control-flow decompiler.
//!
//! Turns a [`Program`] into an [`ExpressionTree`] with one [`Function`] per subroutine entry
//! point. Every instruction is simulated against a [`DecompilationContext`]: values pushed
//! on the operand stack become named parameters, arithmetic becomes declaring assignments,
//! and jumps become labels, gotos and conditionals.
//!
//! # Architecture
//!
//! Blocks are expanded from an explicit work list of `(block, context)` pairs instead of
//! recursing over the control-flow graph, so arbitrarily tangled jump graphs cannot
//! exhaust the native stack. A block is identified by its start offset together with the
//! stack depth it is entered with. The same offset reached with a different depth is
//! decompiled again, since the names on the stack differ.
//!
//! Subroutine calls recurse once per call-graph level: the callee is decompiled with a
//! fresh snapshot of the caller's context and its own [`OuterParams`] map, which collects
//! every caller-owned slot the callee touches. Those slots become the callee's formal
//! arguments. Nesting is bounded by [`DecompilerConfig::max_call_depth`].
//!
//! Backward jump targets are collected before anything is decompiled, so every goto finds
//! its label regardless of decompilation order.
//!
//! # Failure Handling
//!
//! Unsupported instructions, non-negative stack offsets and stack inconsistencies abort the
//! block they occur in. In strict mode the error is returned as [`Error::Block`]. Otherwise
//! it is logged, recorded in [`ExpressionTree::diagnostics`] and the remaining blocks
//! continue.
//!
//! # Examples
//!
//! ```rust,ignore
//! use scriptscope::prelude::*;
//!
//! let tree = Decompiler::new(&program, &routines, DecompilerConfig::strict()).decompile()?;
//! let main = tree.function_by_name("main").unwrap();
//! println!("main has {} arguments", tree[main].arguments.len());
//! ```

mod context;
mod opcodes;
mod stack;
mod vector;

pub use context::{CallFrame, DecompilationContext, OuterParams, StackFrame};
pub use opcodes::{binary_operation, reserved_type, unary_operation, BinaryOperation, OperandShape};

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, trace, warn};

use crate::{
    bytecode::{Instruction, InstructionKind, Program, Routines, Variable, VariableType},
    config::DecompilerConfig,
    tree::{
        ExprId, ExpressionKind, ExpressionTree, Function, FunctionArgument, FunctionId,
        GlobalVariable, ParameterFlags, ParameterLocality,
    },
    Error, Result,
};

/// Name of the synthetic entry function.
pub const START_FUNCTION: &str = "__start";
/// Name of the function initializing globals.
pub const GLOBALS_FUNCTION: &str = "__globals";
/// Name of the script's main function.
pub const MAIN_FUNCTION: &str = "main";
/// Name of a main function that returns a value.
pub const CONDITIONAL_FUNCTION: &str = "StartingConditional";

/// Where decompilation continues after an instruction.
enum Flow {
    /// Continue the current block at the given offset
    Continue(u32),
    /// The current block is complete
    Stop,
}

/// Per-function decompilation state.
struct FunctionState<'o> {
    start: u32,
    outer: &'o mut OuterParams,
    work: Vec<(ExprId, DecompilationContext)>,
    blocks: FxHashMap<(u32, usize), ExprId>,
    done: FxHashSet<(u32, usize)>,
    max_offset: u32,
    depth: usize,
}

impl FunctionState<'_> {
    /// Returns the block starting at `offset` for the stack depth of `ctx`, scheduling a
    /// new one if none exists yet.
    fn schedule(&mut self, tree: &mut ExpressionTree, offset: u32, ctx: &DecompilationContext) -> ExprId {
        let key = (offset, ctx.stack.len());
        if let Some(&block) = self.blocks.get(&key) {
            return block;
        }

        trace!(offset, depth = ctx.stack.len(), "scheduling block");
        let block = tree.new_block(offset);
        self.blocks.insert(key, block);
        self.work.push((block, ctx.clone()));
        block
    }
}

/// Decompiler from a [`Program`] to an [`ExpressionTree`].
pub struct Decompiler<'a> {
    program: &'a Program,
    routines: &'a dyn Routines,
    config: DecompilerConfig,
    tree: ExpressionTree,
    labels: FxHashMap<u32, ExprId>,
    functions: FxHashMap<u32, FunctionId>,
}

impl<'a> Decompiler<'a> {
    /// Creates a decompiler for `program`, resolving actions through `routines`.
    #[must_use]
    pub fn new(program: &'a Program, routines: &'a dyn Routines, config: DecompilerConfig) -> Self {
        Self {
            program,
            routines,
            config,
            tree: ExpressionTree::new(),
            labels: FxHashMap::default(),
            functions: FxHashMap::default(),
        }
    }

    /// Decompiles the whole program, starting at its entry point.
    ///
    /// # Errors
    ///
    /// In strict mode, returns the first block failure wrapped in [`Error::Block`]. A
    /// subroutine nesting deeper than the configured limit yields [`Error::RecursionLimit`].
    pub fn decompile(mut self) -> Result<ExpressionTree> {
        self.scan_labels();

        let entry = self.program.entry_offset();
        let root = self.tree.new_block(entry);
        let mut start = Function::new(entry, root);
        start.name = START_FUNCTION.to_string();
        let start = self.tree.add_function(start);
        self.functions.insert(entry, start);

        let mut outer = OuterParams::new();
        self.decompile_function(start, DecompilationContext::entering(start), &mut outer, 0)?;

        self.collect_globals();
        self.name_functions();

        debug!(
            program = self.program.name(),
            functions = self.tree.function_count(),
            globals = self.tree.globals().len(),
            "decompiled program"
        );
        Ok(self.tree)
    }

    /// Creates a label for every backward jump target.
    ///
    /// A jump to itself counts as backward, so it becomes a goto instead of being
    /// followed inline forever.
    fn scan_labels(&mut self) {
        for ins in self.program {
            if !matches!(
                ins.kind,
                InstructionKind::JMP | InstructionKind::JZ | InstructionKind::JNZ
            ) || ins.jump_offset > 0
            {
                continue;
            }

            let target = ins.jump_target();
            if !self.labels.contains_key(&target) {
                let label = self.tree.new_label(target);
                self.labels.insert(target, label);
            }
        }
    }

    fn label_at(&self, ins: &Instruction, target: u32) -> Result<ExprId> {
        self.labels
            .get(&target)
            .copied()
            .ok_or_else(|| validation_error!(ins, "no label for jump target {:08x}", target))
    }

    fn decompile_function(
        &mut self,
        function: FunctionId,
        ctx: DecompilationContext,
        outer: &mut OuterParams,
        depth: usize,
    ) -> Result<()> {
        if depth > self.config.max_call_depth {
            return Err(Error::RecursionLimit(self.config.max_call_depth));
        }

        let start = self.tree[function].start;
        let root = self.tree[function].block;
        debug!(function = start, depth, "decompiling function");

        let mut state = FunctionState {
            start,
            outer,
            work: vec![(root, ctx.clone())],
            blocks: FxHashMap::default(),
            done: FxHashSet::default(),
            max_offset: start,
            depth,
        };
        state.blocks.insert((start, ctx.stack.len()), root);

        while let Some((block, ctx)) = state.work.pop() {
            let offset = self.tree[block].offset();
            if !state.done.insert((offset, ctx.stack.len())) {
                continue;
            }

            if let Err(err) = self.decompile_block(block, ctx, &mut state) {
                if matches!(err, Error::RecursionLimit(_) | Error::Block { .. }) {
                    return Err(err);
                }
                if self.config.strict {
                    return Err(Error::Block {
                        function: start,
                        block: offset,
                        source: Box::new(err),
                    });
                }
                error!(function = start, "Error decompiling block at {offset:08x}: {err}");
                self.tree.diagnostics().error(start, offset, err.to_string());
            }
        }

        self.tree[function].end = state.max_offset;
        Ok(())
    }

    fn decompile_block(
        &mut self,
        block: ExprId,
        mut ctx: DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let program = self.program;
        let mut offset = self.tree[block].offset();

        while offset < program.length() {
            let ins = program
                .instruction_at(offset)
                .ok_or(Error::InvalidOffset(offset))?;
            state.max_offset = state.max_offset.max(offset);

            if let Some(&label) = self.labels.get(&offset) {
                self.tree.push_statement(block, label);
            }

            match self.step(ins, block, &mut ctx, state)? {
                Flow::Continue(next) => offset = next,
                Flow::Stop => break,
            }
        }
        Ok(())
    }

    fn step(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<Flow> {
        use InstructionKind as K;

        match ins.kind {
            K::NOP | K::NOP2 => {}
            K::RETN => {
                let ret = self.tree.new_return(ins.offset, None);
                self.tree.push_statement(block, ret);
                return Ok(Flow::Stop);
            }
            K::JMP => {
                let target = ins.jump_target();
                if ins.jump_offset > 0 {
                    return Ok(Flow::Continue(target));
                }
                if ins.jump_offset == 0 {
                    warn!(offset = ins.offset, "jump targets itself");
                    let block_offset = self.tree[block].offset();
                    self.tree.diagnostics().warning(
                        state.start,
                        block_offset,
                        format!("jump at {:08x} targets itself", ins.offset),
                    );
                }
                let label = self.label_at(ins, target)?;
                let goto = self.tree.new_goto(ins.offset, label);
                self.tree.push_statement(block, goto);
                return Ok(Flow::Stop);
            }
            K::JSR => self.call(ins, block, ctx, state)?,
            K::JZ | K::JNZ => self.branch(ins, block, ctx, state)?,
            K::RSADDI
            | K::RSADDF
            | K::RSADDS
            | K::RSADDO
            | K::RSADDEFF
            | K::RSADDEVT
            | K::RSADDLOC
            | K::RSADDTAL => {
                let variable_type = reserved_type(ins)?;
                let param =
                    self.tree
                        .new_parameter(ins.offset, variable_type, ParameterLocality::Local);
                self.tree.push_statement(block, param);
                ctx.push(param);
            }
            K::CONSTI | K::CONSTF | K::CONSTS | K::CONSTO => {
                let value = ins
                    .value
                    .clone()
                    .ok_or_else(|| validation_error!(ins, "missing constant operand"))?;
                let variable_type = value.variable_type();
                let constant = self.tree.new_constant(ins.offset, value);
                self.declare(ins, block, ctx, variable_type, constant);
            }
            K::ACTION => self.action(ins, block, ctx)?,
            K::CPDOWNSP | K::CPDOWNBP => self.copy_down(ins, block, ctx, state)?,
            K::CPTOPSP | K::CPTOPBP => self.copy_top(ins, block, ctx, state)?,
            K::MOVSP => self.move_stack_pointer(ins, ctx)?,
            K::DESTRUCT => self.destruct(ins, ctx)?,
            K::INCISP | K::DECISP | K::INCIBP | K::DECIBP => self.step_in_place(ins, block, ctx, state)?,
            K::NEGI | K::NEGF | K::COMPI | K::NOTI => {
                let kind = unary_operation(ins)?;
                let operand = ctx.pop(ins)?.param;
                let variable_type = self.param_type(operand);
                let unary = self.tree.new_unary(ins.offset, kind, operand);
                self.declare(ins, block, ctx, variable_type, unary);
            }
            K::EQUALTT | K::NEQUALTT => self.compare_structures(ins, block, ctx)?,
            K::STORE_STATE => {
                let program = self.program;
                let jump = program
                    .instruction_at(ins.next_offset)
                    .filter(|next| next.kind == K::JMP)
                    .ok_or_else(|| validation_error!(ins, "saved state is not followed by a jump"))?;
                let action = state.schedule(&mut self.tree, jump.next_offset, ctx);
                ctx.saved_action = Some(action);
            }
            K::SAVEBP => {
                ctx.prev_num_globals = ctx.num_globals;
                ctx.num_globals = ctx.stack.len();
                for frame in &ctx.stack {
                    if let Some(param) = self.tree.parameter_mut(frame.param) {
                        param.locality = ParameterLocality::Global;
                    }
                }
            }
            K::RESTOREBP => {
                ctx.num_globals = ctx.prev_num_globals;
            }
            _ => self.binary(ins, block, ctx)?,
        }

        Ok(Flow::Continue(ins.next_offset))
    }

    /// Declares a new local initialized with `value` and pushes it.
    fn declare(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        variable_type: VariableType,
        value: ExprId,
    ) -> ExprId {
        let param = self
            .tree
            .new_parameter(ins.offset, variable_type, ParameterLocality::Local);
        let assign = self.tree.new_assign(ins.offset, param, value, true);
        self.tree.push_statement(block, assign);
        ctx.push(param);
        param
    }

    fn param_type(&self, param: ExprId) -> VariableType {
        self.tree
            .parameter(param)
            .map_or(VariableType::Void, |p| p.variable_type)
    }

    fn call(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let target = ins.jump_target();
        let callee = match self.functions.get(&target) {
            Some(&callee) => callee,
            None => {
                let root = self.tree.new_block(target);
                let callee = self.tree.add_function(Function::new(target, root));
                self.functions.insert(target, callee);

                let mut outer = OuterParams::new();
                self.decompile_function(callee, ctx.enter(callee), &mut outer, state.depth + 1)?;

                let arguments = outer
                    .iter()
                    .rev()
                    .map(|(&stack_offset, &param)| {
                        let (variable_type, pointer) = self
                            .tree
                            .parameter(param)
                            .map_or((VariableType::Void, false), |p| {
                                (p.variable_type, p.is_outer_modified())
                            });
                        FunctionArgument {
                            param,
                            variable_type,
                            stack_offset,
                            pointer,
                        }
                    })
                    .collect();
                self.tree[callee].arguments = arguments;
                callee
            }
        };

        let slots: Vec<(i32, bool)> = self.tree[callee]
            .arguments
            .iter()
            .map(|arg| (arg.stack_offset, arg.pointer))
            .collect();
        let mut arguments = Vec::with_capacity(slots.len());
        for (stack_offset, pointer) in slots {
            let index = ctx.relative_index(ins, ctx.stack.len(), stack_offset)?;
            let flags = if pointer {
                ParameterFlags::OUTER_MODIFIED
            } else {
                ParameterFlags::OUTER_READ
            };
            arguments.push(self.access(ins, ctx, state, index, flags)?);
        }

        let call = self.tree.new_call(ins.offset, callee, arguments);
        self.tree.push_statement(block, call);
        Ok(())
    }

    fn branch(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        state: &mut FunctionState<'_>,
    ) -> Result<()> {
        let operand = ctx.pop(ins)?.param;
        let zero = self.tree.new_constant(ins.offset, Variable::Int(0));
        let kind = if ins.kind == InstructionKind::JZ {
            ExpressionKind::Equal
        } else {
            ExpressionKind::NotEqual
        };
        let test = self.tree.new_binary(ins.offset, kind, operand, zero);

        let target = ins.jump_target();
        let if_true = if ins.jump_offset <= 0 {
            let label = self.label_at(ins, target)?;
            let jump = self.tree.new_block(ins.offset);
            let goto = self.tree.new_goto(ins.offset, label);
            self.tree.push_statement(jump, goto);
            jump
        } else {
            state.schedule(&mut self.tree, target, ctx)
        };

        let conditional = self.tree.new_conditional(ins.offset, test, if_true);
        self.tree.push_statement(block, conditional);
        Ok(())
    }

    fn action(&mut self, ins: &Instruction, block: ExprId, ctx: &mut DecompilationContext) -> Result<()> {
        let routines = self.routines;
        let routine = routines
            .get(ins.routine)
            .ok_or(Error::UnknownRoutine(ins.routine))?;

        let mut arguments = Vec::with_capacity(usize::from(ins.argument_count));
        for index in 0..usize::from(ins.argument_count) {
            let argument_type = routine.argument_type(index).ok_or_else(|| {
                validation_error!(ins, "{} has no argument {}", routine.name, index)
            })?;
            let argument = match argument_type {
                VariableType::Vector => self.pop_vector(ins, ctx)?,
                VariableType::Action => ctx.saved_action.ok_or_else(|| {
                    validation_error!(ins, "no saved action for argument {} of {}", index, routine.name)
                })?,
                _ => ctx.pop(ins)?.param,
            };
            arguments.push(argument);
        }

        let action = self.tree.new_action(ins.offset, ins.routine, arguments);
        match routine.return_type {
            VariableType::Void => self.tree.push_statement(block, action),
            VariableType::Vector => {
                let result = self.tree.new_parameter(
                    ins.offset,
                    VariableType::Vector,
                    ParameterLocality::Local,
                );
                let assign = self.tree.new_assign(ins.offset, result, action, true);
                self.tree.push_statement(block, assign);
                self.decompose_vector(ins, block, ctx, result);
            }
            return_type => {
                self.declare(ins, block, ctx, return_type, action);
            }
        }
        Ok(())
    }

    fn binary(&mut self, ins: &Instruction, block: ExprId, ctx: &mut DecompilationContext) -> Result<()> {
        let operation = binary_operation(ins)?;
        let (left, right) = match operation.shape {
            OperandShape::Scalar => {
                let right = ctx.pop(ins)?.param;
                let left = ctx.pop(ins)?.param;
                (left, right)
            }
            OperandShape::VectorVector => {
                let right = self.pop_vector(ins, ctx)?;
                let left = self.pop_vector(ins, ctx)?;
                (left, right)
            }
            OperandShape::FloatVector => {
                let right = self.pop_vector(ins, ctx)?;
                let left = ctx.pop(ins)?.param;
                (left, right)
            }
            OperandShape::VectorFloat => {
                let right = ctx.pop(ins)?.param;
                let left = self.pop_vector(ins, ctx)?;
                (left, right)
            }
        };

        let value = self.tree.new_binary(ins.offset, operation.kind, left, right);
        if operation.result == VariableType::Vector {
            let result = self
                .tree
                .new_parameter(ins.offset, VariableType::Vector, ParameterLocality::Local);
            let assign = self.tree.new_assign(ins.offset, result, value, true);
            self.tree.push_statement(block, assign);
            self.decompose_vector(ins, block, ctx, result);
        } else {
            self.declare(ins, block, ctx, operation.result, value);
        }
        Ok(())
    }

    fn compare_structures(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
    ) -> Result<()> {
        let count = usize::from(ins.size) / 4;
        if count == 0 {
            return Err(validation_error!(ins, "cannot compare empty structures"));
        }
        let right = ctx.pop_many(ins, count)?;
        let left = ctx.pop_many(ins, count)?;

        let (compare, join) = if ins.kind == InstructionKind::EQUALTT {
            (ExpressionKind::Equal, ExpressionKind::LogicalAnd)
        } else {
            (ExpressionKind::NotEqual, ExpressionKind::LogicalOr)
        };

        let result = self
            .tree
            .new_parameter(ins.offset, VariableType::Int, ParameterLocality::Local);
        for (index, (l, r)) in left.iter().zip(&right).enumerate() {
            let word = self.tree.new_binary(ins.offset, compare, l.param, r.param);
            let assign = if index == 0 {
                self.tree.new_assign(ins.offset, result, word, true)
            } else {
                let joined = self.tree.new_binary(ins.offset, join, result, word);
                self.tree.new_assign(ins.offset, result, joined, false)
            };
            self.tree.push_statement(block, assign);
        }
        ctx.push(result);
        Ok(())
    }

    /// Collects every global-locality parameter in allocation order.
    fn collect_globals(&mut self) {
        let globals: Vec<GlobalVariable> = (0..self.tree.expression_count())
            .map(ExprId::new)
            .filter(|&id| {
                self.tree
                    .parameter(id)
                    .is_some_and(|p| p.locality == ParameterLocality::Global)
            })
            .map(|param| GlobalVariable { param, value: None })
            .collect();
        *self.tree.globals_mut() = globals;
    }

    /// Names `__globals` and `main` from their position after `__start`.
    fn name_functions(&mut self) {
        let ids = self.tree.function_ids().to_vec();
        let mut main_index = 1;

        if !self.tree.globals().is_empty() {
            if let Some(&globals) = ids.get(1) {
                self.tree[globals].name = GLOBALS_FUNCTION.to_string();
                let root = self.tree[globals].block;
                let declarations: Vec<ExprId> = self
                    .tree
                    .block(root)
                    .map(|b| b.expressions.clone())
                    .unwrap_or_default();
                let kept: Vec<ExprId> = declarations
                    .into_iter()
                    .filter(|&id| {
                        !self
                            .tree
                            .parameter(id)
                            .is_some_and(|p| p.locality == ParameterLocality::Global)
                    })
                    .collect();
                if let Some(block) = self.tree.block_mut(root) {
                    block.expressions = kept;
                }
                main_index = 2;
            }
        }

        if let Some(&main) = ids.get(main_index) {
            let function = &mut self.tree[main];
            function.name = if function.return_type == VariableType::Void {
                MAIN_FUNCTION.to_string()
            } else {
                CONDITIONAL_FUNCTION.to_string()
            };
        }
    }
}
