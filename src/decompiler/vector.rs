//! Vector composition and decomposition.
//!
//! A vector occupies three float words on the stack, `x` deepest. Consumers that take a
//! vector operand compose it from the three words, producers of a vector result split it
//! back into three float locals so later stack accesses see one parameter per word.

use crate::{
    bytecode::{Instruction, VariableType},
    decompiler::{DecompilationContext, Decompiler},
    tree::{ExprId, ParameterExpression, ParameterLocality},
    Result,
};

const COMPONENTS: [&str; 3] = ["x", "y", "z"];

impl Decompiler<'_> {
    /// Pops three float words and composes them into a vector expression.
    pub(super) fn pop_vector(&mut self, ins: &Instruction, ctx: &mut DecompilationContext) -> Result<ExprId> {
        let words = ctx.pop_many(ins, 3)?;
        let components = [words[0].param, words[1].param, words[2].param];

        for (name, component) in COMPONENTS.iter().zip(components) {
            let variable_type = self
                .tree
                .parameter(component)
                .map(|p| p.variable_type);
            if variable_type != Some(VariableType::Float) {
                return Err(validation_error!(
                    ins,
                    "vector component {} is {:?}, expected a float",
                    name,
                    variable_type
                ));
            }
        }

        Ok(self.tree.new_vector(ins.offset, components))
    }

    /// Splits `vector` into three declared float locals and pushes them.
    pub(super) fn decompose_vector(
        &mut self,
        ins: &Instruction,
        block: ExprId,
        ctx: &mut DecompilationContext,
        vector: ExprId,
    ) {
        for (index, name) in (0u8..).zip(COMPONENTS) {
            let mut component =
                ParameterExpression::new(ins.offset, VariableType::Float, ParameterLocality::Local);
            component.suffix = Some(name.to_string());
            let component = self.tree.add(component);

            let value = self.tree.new_vector_index(ins.offset, vector, index);
            let assign = self.tree.new_assign(ins.offset, component, value, true);
            self.tree.push_statement(block, assign);
            ctx.push(component);
        }
    }
}
