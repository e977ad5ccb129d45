//! Constant evaluation of global initializers.

use rustc_hash::FxHashSet;

use crate::{
    bytecode::Variable,
    optimizer::OptimizationContext,
    tree::{ExprId, Expression, ExpressionKind, ExpressionTree},
    Error, Result,
};

/// Evaluates `expression` to a constant.
///
/// Literals evaluate to themselves, a parameter evaluates to the value of its single
/// write and a negation negates its evaluated operand.
///
/// # Errors
///
/// Returns [`Error::NotImplemented`] for any other expression, for parameters without
/// exactly one plain write and for cyclic parameter chains.
pub fn evaluate(tree: &ExpressionTree, ctx: &OptimizationContext, expression: ExprId) -> Result<Variable> {
    let mut seen = FxHashSet::default();
    evaluate_inner(tree, ctx, expression, &mut seen)
}

fn evaluate_inner(
    tree: &ExpressionTree,
    ctx: &OptimizationContext,
    expression: ExprId,
    seen: &mut FxHashSet<ExprId>,
) -> Result<Variable> {
    match &tree[expression] {
        Expression::Constant(constant) => Ok(constant.value.clone()),
        Expression::Parameter(_) => {
            if !seen.insert(expression) {
                return Err(Error::NotImplemented(format!(
                    "cyclic initializer through {expression}"
                )));
            }
            match ctx.writes(expression) {
                [write] => match write.value {
                    Some(value) => evaluate_inner(tree, ctx, value, seen),
                    None => Err(Error::NotImplemented(format!(
                        "{expression} is written by {:?}",
                        tree[write.expression].kind()
                    ))),
                },
                writes => Err(Error::NotImplemented(format!(
                    "{expression} has {} writes",
                    writes.len()
                ))),
            }
        }
        Expression::Unary(unary) if unary.kind == ExpressionKind::Negate => {
            let value = evaluate_inner(tree, ctx, unary.operand, seen)?;
            value
                .negate()
                .ok_or_else(|| Error::NotImplemented(format!("negating {value}")))
        }
        other => Err(Error::NotImplemented(format!(
            "evaluating {:?}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{RoutineTable, VariableType},
        optimizer::analyze,
        tree::{Function, ParameterLocality},
    };

    #[test]
    fn test_follows_parameter_chain_and_negation() {
        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        tree.add_function(Function::new(13, root));

        let five = tree.new_constant(13, Variable::Int(5));
        let temp = tree.new_parameter(13, VariableType::Int, ParameterLocality::Local);
        let init = tree.new_assign(13, temp, five, true);
        let negated = tree.new_unary(19, ExpressionKind::Negate, temp);
        let global = tree.new_parameter(13, VariableType::Int, ParameterLocality::Global);
        let store = tree.new_assign(19, global, negated, false);
        tree.push_statement(root, init);
        tree.push_statement(root, store);

        let mut ctx = OptimizationContext::new();
        analyze(&tree, &RoutineTable::new(), &mut ctx);

        assert_eq!(evaluate(&tree, &ctx, global).unwrap(), Variable::Int(-5));
    }

    #[test]
    fn test_unsupported_expressions() {
        let mut tree = ExpressionTree::new();
        let root = tree.new_block(13);
        tree.add_function(Function::new(13, root));

        let a = tree.new_constant(13, Variable::Int(2));
        let b = tree.new_constant(13, Variable::Int(3));
        let sum = tree.new_binary(13, ExpressionKind::Add, a, b);
        let unwritten = tree.new_parameter(13, VariableType::Int, ParameterLocality::Global);

        let ctx = OptimizationContext::new();
        assert!(matches!(
            evaluate(&tree, &ctx, sum),
            Err(Error::NotImplemented(_))
        ));
        assert!(matches!(
            evaluate(&tree, &ctx, unwritten),
            Err(Error::NotImplemented(_))
        ));
    }
}
