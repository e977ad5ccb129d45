//! Tree compaction.
//!
//! Compaction runs in fixed phases, each relying on the previous ones:
//!
//! 1. drop `__start`
//! 2. fold global initializers, drop unread globals and `__globals`
//! 3. recover return values from write-only arguments
//! 4. apply the per-block rewrite rules until no rule fires
//!
//! Phases 3 and 4 repeat together until neither changes the tree, since removing reads
//! during compaction can expose another write-only argument. A final sweep strips the
//! redundant trailing `return` of every void function.
//!
//! The per-block rules, in priority order:
//!
//! - merge a bare declaration into its single initializing assignment, delete unused
//!   declarations
//! - collapse a deferred action block of one call and a bare return into the call
//! - rewrite a call with a recovered destination into an assignment
//! - inline a write-once, read-once temporary into its consumer
//! - collapse `vector(v.x, v.y, v.z)` back into `v`
//! - delete assignments to locals that are never read, keeping calls and operations
//! - delete labels no goto targets
//!
//! After every rewrite the [`OptimizationContext`] is rebuilt, so each rule decides on
//! current read and write counts.

use tracing::{debug, trace, warn};

use crate::{
    bytecode::{Routines, VariableType},
    config::OptimizerConfig,
    decompiler::{CONDITIONAL_FUNCTION, GLOBALS_FUNCTION, MAIN_FUNCTION, START_FUNCTION},
    optimizer::{analyze, evaluate, OptimizationContext, ReadEvent},
    tree::{ExprId, Expression, ExpressionKind, ExpressionTree, OperandRole, ParameterLocality},
};

/// Applies all compaction phases to one tree.
pub(crate) struct Compactor<'a> {
    tree: &'a mut ExpressionTree,
    routines: &'a dyn Routines,
    config: &'a OptimizerConfig,
    ctx: OptimizationContext,
}

impl<'a> Compactor<'a> {
    pub(crate) fn new(
        tree: &'a mut ExpressionTree,
        routines: &'a dyn Routines,
        config: &'a OptimizerConfig,
    ) -> Self {
        Self {
            tree,
            routines,
            config,
            ctx: OptimizationContext::new(),
        }
    }

    /// Runs every phase, returns `true` if the tree changed.
    pub(crate) fn run(mut self) -> bool {
        let mut changed = self.drop_start();
        self.refresh();

        if self.config.fold_globals {
            changed |= self.fold_globals();
        }

        loop {
            let mut round = false;
            if self.config.recover_return_values {
                round |= self.recover_return_values();
            }
            round |= self.compact_blocks();
            if !round {
                break;
            }
            changed = true;
        }

        changed | self.strip_trailing_returns()
    }

    fn refresh(&mut self) {
        analyze(self.tree, self.routines, &mut self.ctx);
    }

    // ============================================================================================
    // Whole-tree phases
    // ============================================================================================

    fn drop_start(&mut self) -> bool {
        match self.tree.function_by_name(START_FUNCTION) {
            Some(start) => {
                debug!("dropping {START_FUNCTION}");
                self.tree.remove_function(start);
                true
            }
            None => false,
        }
    }

    fn fold_globals(&mut self) -> bool {
        let mut changed = false;
        let mut kept = Vec::new();

        for mut global in self.tree.globals().to_vec() {
            if global.value.is_none() && self.ctx.writes(global.param).len() == 1 {
                match evaluate(self.tree, &self.ctx, global.param) {
                    Ok(value) => {
                        trace!(global = %global.param, %value, "folded global initializer");
                        global.value = Some(value);
                        changed = true;
                    }
                    Err(err) => debug!(global = %global.param, "global left unfolded: {err}"),
                }
            }

            if self.ctx.reads(global.param).is_empty() {
                trace!(global = %global.param, "dropping unread global");
                changed = true;
                continue;
            }
            kept.push(global);
        }
        *self.tree.globals_mut() = kept;

        if let Some(globals) = self.tree.function_by_name(GLOBALS_FUNCTION) {
            debug!("dropping {GLOBALS_FUNCTION}");
            self.tree.remove_function(globals);
            changed = true;
        }

        if changed {
            self.refresh();
        }
        changed
    }

    /// Turns the first write-only argument of each void function into its return value.
    fn recover_return_values(&mut self) -> bool {
        let mut changed = false;

        for function in self.tree.function_ids().to_vec() {
            if self.tree[function].return_type != VariableType::Void {
                continue;
            }
            let Some(index) = self.tree[function].arguments.iter().position(|arg| {
                !self.ctx.writes(arg.param).is_empty() && self.ctx.reads(arg.param).is_empty()
            }) else {
                continue;
            };

            let argument = self.tree[function].arguments.remove(index);
            if let Some(param) = self.tree.parameter_mut(argument.param) {
                param.locality = ParameterLocality::ReturnValue;
            }
            let root = self.tree[function].block;
            if let Some(block) = self.tree.block_mut(root) {
                block.expressions.insert(0, argument.param);
            }

            for ret in self.ctx.returns_of(function).to_vec() {
                if let Some(ret) = self.tree[ret].as_return_mut() {
                    ret.value = Some(argument.param);
                }
            }

            for call in self.ctx.calls_to(function).to_vec() {
                let Some(expression) = self.tree[call].as_call_mut() else {
                    continue;
                };
                if index >= expression.arguments.len() {
                    continue;
                }
                let removed = expression.arguments.remove(index);
                if self.tree.is_parameter(removed) {
                    self.ctx.set_call_destination(call, removed);
                }
            }

            let function = &mut self.tree[function];
            function.return_type = argument.variable_type;
            if function.name == MAIN_FUNCTION {
                function.name = CONDITIONAL_FUNCTION.to_string();
            }
            debug!(
                function = %function.display_name(),
                return_type = %function.return_type,
                "recovered return value"
            );

            self.refresh();
            changed = true;
        }
        changed
    }

    fn strip_trailing_returns(&mut self) -> bool {
        let mut changed = false;
        for function in self.tree.function_ids().to_vec() {
            if self.tree[function].return_type != VariableType::Void {
                continue;
            }
            let root = self.tree[function].block;
            let Some(&last) = self.tree.block(root).and_then(|b| b.expressions.last()) else {
                continue;
            };
            if self.tree[last].as_return().is_some_and(|r| r.value.is_none()) {
                if let Some(block) = self.tree.block_mut(root) {
                    block.expressions.pop();
                }
                changed = true;
            }
        }
        changed
    }

    // ============================================================================================
    // Per-block rules
    // ============================================================================================

    fn compact_blocks(&mut self) -> bool {
        let blocks: Vec<ExprId> = self
            .tree
            .function_ids()
            .iter()
            .flat_map(|&function| self.ctx.blocks_of(function).iter().copied())
            .collect();
        for block in blocks.into_iter().rev() {
            self.ctx.push_block(block);
        }

        let mut changed = false;
        while let Some(block) = self.ctx.pop_block() {
            let mut rewrites = 0;
            while self.ctx.is_live(block) && self.compact_step(block) {
                changed = true;
                rewrites += 1;
                self.refresh();
                if rewrites >= self.config.max_iterations {
                    warn!(block = %block, rewrites, "block compaction did not converge");
                    break;
                }
            }
        }
        changed
    }

    fn compact_step(&mut self, block: ExprId) -> bool {
        let inline = self.config.inline_temporaries;
        self.merge_declarations(block)
            || self.collapse_action_blocks(block)
            || self.rewrite_call_destinations(block)
            || (inline && self.inline_temporaries(block))
            || (inline && self.collapse_vectors(block))
            || self.remove_dead_assignments(block)
            || self.remove_unused_labels(block)
    }

    fn merge_declarations(&mut self, block: ExprId) -> bool {
        let statements = self.statements(block);

        for (index, &statement) in statements.iter().enumerate() {
            let Some(locality) = self.tree.parameter(statement).map(|p| p.locality) else {
                continue;
            };
            let reads = self.ctx.reads(statement);
            let writes = self.ctx.writes(statement);

            if locality == ParameterLocality::Local && reads.is_empty() && writes.is_empty() {
                trace!(param = %statement, "removing unused declaration");
                self.remove_statement(block, index);
                return true;
            }

            if !matches!(locality, ParameterLocality::Local | ParameterLocality::ReturnValue) {
                continue;
            }
            let [write] = writes else {
                continue;
            };
            if write.value.is_none() {
                continue;
            }
            let Some(write_index) = statements.iter().position(|&s| s == write.expression) else {
                continue;
            };
            if write_index <= index {
                continue;
            }
            let reads_follow = reads.iter().all(|read| {
                self.statement_containing(block, read.expression, true)
                    .is_some_and(|at| at > write_index)
            });
            if !reads_follow {
                continue;
            }

            let assign = write.expression;
            if let Some(assign) = self.tree.binary_mut(assign) {
                assign.declare_left = true;
            }
            trace!(param = %statement, "merged declaration with its initializer");
            self.remove_statement(block, index);
            return true;
        }
        false
    }

    fn collapse_action_blocks(&mut self, block: ExprId) -> bool {
        for statement in self.statements(block) {
            for id in self.subtree(statement, false) {
                let Some(action) = self.tree[id].as_action() else {
                    continue;
                };
                let collapsible = action.arguments.iter().enumerate().find_map(|(i, &arg)| {
                    self.single_call_block(arg).map(|call| (i, call))
                });
                if let Some((index, call)) = collapsible {
                    if let Some(slot) = self.tree[id].operand_mut(OperandRole::ActionArgument(index)) {
                        *slot = call;
                    }
                    trace!(action = %id, "collapsed deferred action block");
                    return true;
                }
            }
        }
        false
    }

    /// The call or action of a block holding exactly that and a bare return.
    fn single_call_block(&self, block: ExprId) -> Option<ExprId> {
        let statements = &self.tree.block(block)?.expressions;
        let [call, ret] = statements.as_slice() else {
            return None;
        };
        let is_call = matches!(
            self.tree.kind(*call),
            Some(ExpressionKind::Call | ExpressionKind::Action)
        );
        let is_bare_return = self.tree[*ret].as_return().is_some_and(|r| r.value.is_none());
        (is_call && is_bare_return).then_some(*call)
    }

    fn rewrite_call_destinations(&mut self, block: ExprId) -> bool {
        for (index, statement) in self.statements(block).into_iter().enumerate() {
            if self.tree.kind(statement) != Some(ExpressionKind::Call) {
                continue;
            }
            let Some(destination) = self.ctx.take_call_destination(statement) else {
                continue;
            };

            let offset = self.tree[statement].offset();
            let assign = self.tree.new_assign(offset, destination, statement, false);
            self.replace_statement(block, index, assign);
            trace!(call = %statement, destination = %destination, "assigned call result");
            return true;
        }
        false
    }

    fn inline_temporaries(&mut self, block: ExprId) -> bool {
        let statements = self.statements(block);

        for (index, &statement) in statements.iter().enumerate() {
            if !self.tree[statement].is_declaring_assign() {
                continue;
            }
            let Some((param, value)) = self.tree.binary(statement).map(|b| (b.left, b.right)) else {
                continue;
            };
            if self.tree.parameter(param).map(|p| p.locality) != Some(ParameterLocality::Local) {
                continue;
            }
            let ([write], [read]) = (self.ctx.writes(param), self.ctx.reads(param)) else {
                continue;
            };
            if write.expression != statement || !self.is_inline_target(*read) {
                continue;
            }
            let read = *read;
            let Some(consumer) = self.statement_containing(block, read.expression, false) else {
                continue;
            };
            if consumer <= index || !self.can_move(block, value, index + 1, consumer) {
                continue;
            }

            if let Some(slot) = self.tree[read.expression].operand_mut(read.role) {
                *slot = value;
            }
            self.remove_statement(block, index);
            trace!(param = %param, consumer = %read.expression, "inlined temporary");
            return true;
        }
        false
    }

    fn is_inline_target(&self, read: ReadEvent) -> bool {
        match read.role {
            OperandRole::ActionArgument(_)
            | OperandRole::CallArgument(_)
            | OperandRole::VectorComponent(_) => true,
            OperandRole::Operand => self
                .tree
                .kind(read.expression)
                .is_some_and(|kind| kind.is_unary() && !kind.is_step()),
            OperandRole::Left => self
                .tree
                .kind(read.expression)
                .is_some_and(|kind| kind.is_binary() && kind != ExpressionKind::Assign),
            OperandRole::Right => self
                .tree
                .kind(read.expression)
                .is_some_and(ExpressionKind::is_binary),
            OperandRole::ReturnValue
            | OperandRole::Test
            | OperandRole::Branch
            | OperandRole::VectorSource => false,
        }
    }

    /// Returns `true` if `value` can move from before statement `from` to statement `to`.
    ///
    /// Nothing in between may write a parameter `value` reads, and a value with side
    /// effects may not cross another side effect. No label may lie in between either, as
    /// a jump to it would run the consumer again without the definition.
    fn can_move(&self, block: ExprId, value: ExprId, from: usize, to: usize) -> bool {
        let statements = self.statements(block);
        let value_nodes = self.subtree(value, true);
        let effectful = value_nodes.iter().any(|&id| self.has_side_effect(id));

        let between: Vec<ExprId> = statements[from..to]
            .iter()
            .flat_map(|&s| self.subtree(s, true))
            .collect();

        if between
            .iter()
            .any(|&id| self.tree.kind(id) == Some(ExpressionKind::Label))
        {
            return false;
        }

        if effectful && between.iter().any(|&id| self.has_side_effect(id)) {
            return false;
        }

        value_nodes
            .iter()
            .filter(|&&id| self.tree.is_parameter(id))
            .all(|&param| {
                self.ctx
                    .writes(param)
                    .iter()
                    .all(|write| !between.contains(&write.expression))
            })
    }

    fn has_side_effect(&self, id: ExprId) -> bool {
        self.tree.kind(id).is_some_and(|kind| {
            matches!(kind, ExpressionKind::Action | ExpressionKind::Call) || kind.is_step()
        })
    }

    fn collapse_vectors(&mut self, block: ExprId) -> bool {
        for statement in self.statements(block) {
            for id in self.subtree(statement, false) {
                let operands = self.tree[id].operands();
                for (role, operand) in operands {
                    let Some(source) = self.collapsible_vector(operand) else {
                        continue;
                    };
                    if let Some(slot) = self.tree[id].operand_mut(role) {
                        *slot = source;
                    }
                    trace!(vector = %operand, source = %source, "collapsed vector composition");
                    return true;
                }
            }
        }
        false
    }

    /// The vector `id` recomposes, if it is `vector(v.x, v.y, v.z)` of a single `v`.
    fn collapsible_vector(&self, id: ExprId) -> Option<ExprId> {
        let vector = self.tree[id].as_vector()?;
        let mut source = None;
        for (expected, &component) in (0u8..).zip(vector.components.iter()) {
            let index = self.tree[component].as_vector_index()?;
            if index.index != expected || source.is_some_and(|s| s != index.vector) {
                return None;
            }
            source = Some(index.vector);
        }
        source
    }

    fn remove_dead_assignments(&mut self, block: ExprId) -> bool {
        for (index, statement) in self.statements(block).into_iter().enumerate() {
            let Some(assign) = self.tree.binary(statement) else {
                continue;
            };
            if assign.kind != ExpressionKind::Assign {
                continue;
            }
            let (param, value) = (assign.left, assign.right);
            if self.tree.parameter(param).map(|p| p.locality) != Some(ParameterLocality::Local)
                || !self.ctx.reads(param).is_empty()
            {
                continue;
            }

            let keep = self.tree.kind(value).is_some_and(|kind| {
                matches!(kind, ExpressionKind::Action | ExpressionKind::Call)
                    || kind.is_unary()
                    || kind.is_binary()
            });
            if keep {
                self.replace_statement(block, index, value);
            } else {
                self.remove_statement(block, index);
            }
            trace!(param = %param, kept = keep, "removed dead assignment");
            return true;
        }
        false
    }

    fn remove_unused_labels(&mut self, block: ExprId) -> bool {
        for (index, statement) in self.statements(block).into_iter().enumerate() {
            if self.tree.kind(statement) == Some(ExpressionKind::Label)
                && self.ctx.gotos(statement).is_empty()
            {
                self.remove_statement(block, index);
                trace!(label = %statement, "removed unused label");
                return true;
            }
        }
        false
    }

    // ============================================================================================
    // Helpers
    // ============================================================================================

    fn statements(&self, block: ExprId) -> Vec<ExprId> {
        self.tree
            .block(block)
            .map(|b| b.expressions.clone())
            .unwrap_or_default()
    }

    fn remove_statement(&mut self, block: ExprId, index: usize) {
        if let Some(block) = self.tree.block_mut(block) {
            block.expressions.remove(index);
        }
    }

    fn replace_statement(&mut self, block: ExprId, index: usize, statement: ExprId) {
        if let Some(slot) = self
            .tree
            .block_mut(block)
            .and_then(|b| b.expressions.get_mut(index))
        {
            *slot = statement;
        }
    }

    /// All expressions reachable from `root` through operands, `root` included.
    ///
    /// Nested blocks are entered only if `descend` is set.
    fn subtree(&self, root: ExprId, descend: bool) -> Vec<ExprId> {
        let mut nodes = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            nodes.push(id);
            match &self.tree[id] {
                Expression::Block(block) if descend => pending.extend(block.expressions.iter().rev()),
                Expression::Block(_) => {}
                expression => {
                    pending.extend(expression.operands().into_iter().rev().map(|(_, operand)| operand));
                }
            }
        }
        nodes
    }

    /// Index of the statement of `block` whose subtree contains `target`.
    fn statement_containing(&self, block: ExprId, target: ExprId, descend: bool) -> Option<usize> {
        self.statements(block)
            .into_iter()
            .position(|statement| self.subtree(statement, descend).contains(&target))
    }
}
