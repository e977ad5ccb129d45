//! Read/write event collection.
//!
//! Walks every output function of a tree with explicit stacks, one for pending blocks and
//! one for pending expressions, and records into an [`OptimizationContext`] which
//! expression reads or writes each parameter and in which operand position.
//!
//! Classification of a parameter operand:
//!
//! - left side of an assignment: write of the right side
//! - operand of an increment or decrement: read and write
//! - argument of a call or action in a pointer position: read and write
//! - anything else: read
//!
//! A parameter appearing as a statement of its own is a declaration and records nothing.

use rustc_hash::FxHashSet;

use crate::{
    bytecode::Routines,
    optimizer::OptimizationContext,
    tree::{ExprId, Expression, ExpressionKind, ExpressionTree, FunctionId, OperandRole},
};

/// Rebuilds all events of `ctx` from `tree`.
pub fn analyze(tree: &ExpressionTree, routines: &dyn Routines, ctx: &mut OptimizationContext) {
    ctx.clear_events();

    let mut visited = FxHashSet::default();
    for &function in tree.function_ids() {
        let mut blocks = vec![(tree[function].block, false)];

        while let Some((block, deferred)) = blocks.pop() {
            if !visited.insert(block) {
                continue;
            }
            ctx.record_block(function, block);

            let Some(statements) = tree.block(block) else {
                continue;
            };
            for &statement in &statements.expressions {
                let mut pending = vec![statement];

                while let Some(id) = pending.pop() {
                    let expression = &tree[id];
                    record_expression(ctx, function, id, expression, deferred);

                    let mut children = Vec::new();
                    for (role, operand) in expression.operands() {
                        match tree.kind(operand) {
                            Some(ExpressionKind::Block) => {
                                let action_block = matches!(role, OperandRole::ActionArgument(_));
                                blocks.push((operand, deferred || action_block));
                            }
                            Some(ExpressionKind::Parameter) => {
                                record_parameter(tree, routines, ctx, id, role, operand);
                            }
                            _ => children.push(operand),
                        }
                    }
                    pending.extend(children.into_iter().rev());
                }
            }
        }
    }
}

fn record_expression(
    ctx: &mut OptimizationContext,
    function: FunctionId,
    id: ExprId,
    expression: &Expression,
    deferred: bool,
) {
    match expression {
        Expression::Return(_) if !deferred => ctx.record_return(function, id),
        Expression::Call(call) => ctx.record_call(call.function, id),
        Expression::Goto(goto) => ctx.record_goto(goto.label, id),
        _ => {}
    }
}

fn record_parameter(
    tree: &ExpressionTree,
    routines: &dyn Routines,
    ctx: &mut OptimizationContext,
    id: ExprId,
    role: OperandRole,
    param: ExprId,
) {
    match (&tree[id], role) {
        (Expression::Binary(assign), OperandRole::Left) if assign.kind == ExpressionKind::Assign => {
            ctx.record_write(param, id, Some(assign.right));
        }
        (Expression::Unary(step), OperandRole::Operand) if step.kind.is_step() => {
            ctx.record_read(param, id, role);
            ctx.record_write(param, id, None);
        }
        (Expression::Call(call), OperandRole::CallArgument(index)) => {
            ctx.record_read(param, id, role);
            let pointer = tree
                .function(call.function)
                .and_then(|f| f.arguments.get(index))
                .is_some_and(|arg| arg.pointer);
            if pointer {
                ctx.record_write(param, id, None);
            }
        }
        (Expression::Action(action), OperandRole::ActionArgument(index)) => {
            ctx.record_read(param, id, role);
            let pointer = routines
                .get(action.routine)
                .and_then(|r| r.arguments.get(index))
                .is_some_and(|arg| arg.pointer);
            if pointer {
                ctx.record_write(param, id, None);
            }
        }
        _ => ctx.record_read(param, id, role),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{Routine, RoutineArgument, RoutineTable, Variable, VariableType},
        tree::{Function, ParameterLocality},
    };

    #[test]
    fn test_assign_and_step_classification() {
        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        let function = tree.add_function(Function::new(13, root));

        let param = tree.new_parameter(13, VariableType::Int, ParameterLocality::Local);
        let one = tree.new_constant(13, Variable::Int(1));
        let assign = tree.new_assign(13, param, one, true);
        let step = tree.new_unary(19, ExpressionKind::Increment, param);
        let ret = tree.new_return(21, None);
        for statement in [assign, step, ret] {
            tree.push_statement(root, statement);
        }

        let mut ctx = OptimizationContext::new();
        analyze(&tree, &RoutineTable::new(), &mut ctx);

        assert_eq!(ctx.writes(param).len(), 2);
        assert_eq!(ctx.writes(param)[0].value, Some(one));
        assert_eq!(ctx.writes(param)[1].value, None);
        assert_eq!(ctx.reads(param).len(), 1);
        assert_eq!(ctx.reads(param)[0].expression, step);
        assert_eq!(ctx.returns_of(function), &[ret]);
        assert_eq!(ctx.blocks_of(function), &[root]);
    }

    #[test]
    fn test_pointer_arguments_are_writes() {
        let routines = RoutineTable::new().with(
            3,
            Routine {
                name: "GetValue".into(),
                return_type: VariableType::Void,
                arguments: vec![
                    RoutineArgument::value(VariableType::Int),
                    RoutineArgument::pointer(VariableType::Int),
                ],
            },
        );

        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        let function = tree.add_function(Function::new(13, root));
        let input = tree.new_parameter(13, VariableType::Int, ParameterLocality::Local);
        let output = tree.new_parameter(13, VariableType::Int, ParameterLocality::Local);
        let action = tree.new_action(15, 3, vec![input, output]);
        tree.push_statement(root, action);

        let mut ctx = OptimizationContext::new();
        analyze(&tree, &routines, &mut ctx);

        assert_eq!(ctx.reads(input).len(), 1);
        assert!(ctx.writes(input).is_empty());
        assert_eq!(ctx.reads(output)[0].role, OperandRole::ActionArgument(1));
        assert_eq!(ctx.writes(output).len(), 1);
        assert!(ctx.returns_of(function).is_empty());
    }

    #[test]
    fn test_deferred_returns_are_not_function_returns() {
        let routines = RoutineTable::new().with(
            7,
            Routine::new("DelayCommand", VariableType::Void, [VariableType::Action]),
        );

        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        let function = tree.add_function(Function::new(13, root));

        let deferred = tree.new_block(40);
        let inner = tree.new_return(42, None);
        tree.push_statement(deferred, inner);
        let action = tree.new_action(20, 7, vec![deferred]);
        let outer = tree.new_return(30, None);
        tree.push_statement(root, action);
        tree.push_statement(root, outer);

        let mut ctx = OptimizationContext::new();
        analyze(&tree, &routines, &mut ctx);

        assert_eq!(ctx.returns_of(function), &[outer]);
        assert_eq!(ctx.blocks_of(function), &[root, deferred]);
    }
}
