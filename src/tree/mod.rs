//! The expression tree: arena, functions and globals.
//!
//! [`ExpressionTree`] owns every expression created while decompiling a program. Nodes are
//! addressed by [`ExprId`] handles and never move or get reused, so handles stay valid for
//! the lifetime of the tree no matter how the optimizer rewires the graph. Functions live
//! in a second arena addressed by [`FunctionId`], with a separate ordered list of the
//! functions that are still part of the output.
//!
//! # Key Components
//!
//! - [`ExpressionTree`] - Owner of all nodes, functions, globals and diagnostics
//! - [`Expression`] - Tagged node type, see [`ExpressionKind`]
//! - [`Function`] / [`FunctionArgument`] - Decompiled subroutines
//! - [`GlobalVariable`] - Global slot with its folded initializer
//!
//! # Examples
//!
//! ```rust,ignore
//! use scriptscope::prelude::*;
//!
//! let tree = Decompiler::new(&program, &routines, DecompilerConfig::default()).decompile()?;
//! for function in tree.functions() {
//!     let block = tree.block(function.block).unwrap();
//!     println!("{}: {} statements", function.display_name(), block.expressions.len());
//! }
//! ```

mod expression;
mod function;

pub use expression::{
    ActionExpression, BinaryExpression, BlockExpression, CallExpression, ConditionalExpression,
    ConstantExpression, ExprId, Expression, ExpressionKind, GotoExpression, LabelExpression,
    OperandRole, ParameterExpression, ParameterFlags, ParameterLocality, ReturnExpression,
    UnaryExpression, VectorExpression, VectorIndexExpression,
};
pub use function::{Function, FunctionArgument, FunctionId, GlobalVariable};

use std::ops::{Index, IndexMut};

use crate::{
    bytecode::{Variable, VariableType},
    diagnostics::Diagnostics,
};

/// Arena owning all expressions, functions and globals of one decompiled program.
#[derive(Debug, Default)]
pub struct ExpressionTree {
    expressions: Vec<Expression>,
    functions: Vec<Function>,
    order: Vec<FunctionId>,
    globals: Vec<GlobalVariable>,
    diagnostics: Diagnostics,
}

impl ExpressionTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================================================
    // Expressions
    // ============================================================================================

    /// Moves `expression` into the arena and returns its handle.
    pub fn add(&mut self, expression: impl Into<Expression>) -> ExprId {
        let id = ExprId::new(self.expressions.len());
        self.expressions.push(expression.into());
        id
    }

    /// Number of expressions ever allocated.
    #[must_use]
    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    /// Returns the expression for `id`, if it belongs to this tree.
    #[must_use]
    pub fn get(&self, id: ExprId) -> Option<&Expression> {
        self.expressions.get(id.index())
    }

    /// Mutable variant of [`ExpressionTree::get`].
    pub fn get_mut(&mut self, id: ExprId) -> Option<&mut Expression> {
        self.expressions.get_mut(id.index())
    }

    /// Returns the block for `id`, if it is one.
    #[must_use]
    pub fn block(&self, id: ExprId) -> Option<&BlockExpression> {
        self.get(id).and_then(Expression::as_block)
    }

    /// Mutable variant of [`ExpressionTree::block`].
    pub fn block_mut(&mut self, id: ExprId) -> Option<&mut BlockExpression> {
        self.get_mut(id).and_then(Expression::as_block_mut)
    }

    /// Returns the parameter for `id`, if it is one.
    #[must_use]
    pub fn parameter(&self, id: ExprId) -> Option<&ParameterExpression> {
        self.get(id).and_then(Expression::as_parameter)
    }

    /// Mutable variant of [`ExpressionTree::parameter`].
    pub fn parameter_mut(&mut self, id: ExprId) -> Option<&mut ParameterExpression> {
        self.get_mut(id).and_then(Expression::as_parameter_mut)
    }

    /// Returns the binary expression for `id`, if it is one.
    #[must_use]
    pub fn binary(&self, id: ExprId) -> Option<&BinaryExpression> {
        self.get(id).and_then(Expression::as_binary)
    }

    /// Mutable variant of [`ExpressionTree::binary`].
    pub fn binary_mut(&mut self, id: ExprId) -> Option<&mut BinaryExpression> {
        self.get_mut(id).and_then(Expression::as_binary_mut)
    }

    /// Returns `true` if `id` is a parameter.
    #[must_use]
    pub fn is_parameter(&self, id: ExprId) -> bool {
        self.parameter(id).is_some()
    }

    /// Kind of the expression for `id`.
    #[must_use]
    pub fn kind(&self, id: ExprId) -> Option<ExpressionKind> {
        self.get(id).map(Expression::kind)
    }

    /// Returns `true` if `offset` lies between the first and last statement of `block`.
    #[must_use]
    pub fn block_contains(&self, block: ExprId, offset: u32) -> bool {
        let Some(block) = self.block(block) else {
            return false;
        };
        let (Some(&first), Some(&last)) = (block.expressions.first(), block.expressions.last())
        else {
            return false;
        };
        self[first].offset() <= offset && offset <= self[last].offset()
    }

    /// Appends `statement` to `block`.
    pub fn push_statement(&mut self, block: ExprId, statement: ExprId) {
        if let Some(block) = self.block_mut(block) {
            block.expressions.push(statement);
        }
    }

    // ============================================================================================
    // Construction helpers
    // ============================================================================================

    /// Allocates an empty block.
    pub fn new_block(&mut self, offset: u32) -> ExprId {
        self.add(BlockExpression {
            offset,
            expressions: Vec::new(),
        })
    }

    /// Allocates a constant.
    pub fn new_constant(&mut self, offset: u32, value: Variable) -> ExprId {
        self.add(ConstantExpression { offset, value })
    }

    /// Allocates a parameter.
    pub fn new_parameter(
        &mut self,
        offset: u32,
        variable_type: VariableType,
        locality: ParameterLocality,
    ) -> ExprId {
        self.add(ParameterExpression::new(offset, variable_type, locality))
    }

    /// Allocates a label.
    pub fn new_label(&mut self, offset: u32) -> ExprId {
        self.add(LabelExpression { offset })
    }

    /// Allocates a goto.
    pub fn new_goto(&mut self, offset: u32, label: ExprId) -> ExprId {
        self.add(GotoExpression { offset, label })
    }

    /// Allocates a return.
    pub fn new_return(&mut self, offset: u32, value: Option<ExprId>) -> ExprId {
        self.add(ReturnExpression { offset, value })
    }

    /// Allocates a conditional.
    pub fn new_conditional(&mut self, offset: u32, test: ExprId, if_true: ExprId) -> ExprId {
        self.add(ConditionalExpression {
            offset,
            test,
            if_true,
        })
    }

    /// Allocates an action call.
    pub fn new_action(&mut self, offset: u32, routine: u16, arguments: Vec<ExprId>) -> ExprId {
        self.add(ActionExpression {
            offset,
            routine,
            arguments,
        })
    }

    /// Allocates a function call.
    pub fn new_call(&mut self, offset: u32, function: FunctionId, arguments: Vec<ExprId>) -> ExprId {
        self.add(CallExpression {
            offset,
            function,
            arguments,
        })
    }

    /// Allocates a vector composition.
    pub fn new_vector(&mut self, offset: u32, components: [ExprId; 3]) -> ExprId {
        self.add(VectorExpression { offset, components })
    }

    /// Allocates a vector component read.
    pub fn new_vector_index(&mut self, offset: u32, vector: ExprId, index: u8) -> ExprId {
        self.add(VectorIndexExpression {
            offset,
            vector,
            index,
        })
    }

    /// Allocates a unary expression, `kind` must be unary.
    pub fn new_unary(&mut self, offset: u32, kind: ExpressionKind, operand: ExprId) -> ExprId {
        debug_assert!(kind.is_unary(), "{kind:?} is not a unary kind");
        self.add(UnaryExpression {
            offset,
            kind,
            operand,
        })
    }

    /// Allocates a binary expression, `kind` must be binary.
    pub fn new_binary(
        &mut self,
        offset: u32,
        kind: ExpressionKind,
        left: ExprId,
        right: ExprId,
    ) -> ExprId {
        debug_assert!(kind.is_binary(), "{kind:?} is not a binary kind");
        self.add(BinaryExpression {
            offset,
            kind,
            left,
            right,
            declare_left: false,
        })
    }

    /// Allocates an assignment of `right` to the parameter `left`.
    pub fn new_assign(&mut self, offset: u32, left: ExprId, right: ExprId, declare: bool) -> ExprId {
        self.add(BinaryExpression {
            offset,
            kind: ExpressionKind::Assign,
            left,
            right,
            declare_left: declare,
        })
    }

    // ============================================================================================
    // Functions
    // ============================================================================================

    /// Adds a function to the arena and the output list, keeping the list in entry order.
    pub fn add_function(&mut self, function: Function) -> FunctionId {
        let id = FunctionId::new(self.functions.len());
        let start = function.start;
        self.functions.push(function);

        let position = self
            .order
            .partition_point(|&other| self.functions[other.index()].start < start);
        self.order.insert(position, id);
        id
    }

    /// Returns the function for `id`.
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Mutable variant of [`ExpressionTree::function`].
    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.index())
    }

    /// Handles of the functions still part of the output, in entry order.
    #[must_use]
    pub fn function_ids(&self) -> &[FunctionId] {
        &self.order
    }

    /// Functions still part of the output, in entry order.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.order.iter().map(|id| &self.functions[id.index()])
    }

    /// Number of functions still part of the output.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.order.len()
    }

    /// Returns the output function called `name`.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.order
            .iter()
            .copied()
            .find(|id| self.functions[id.index()].name == name)
    }

    /// Removes a function from the output. Its nodes stay in the arena.
    pub fn remove_function(&mut self, id: FunctionId) {
        self.order.retain(|&other| other != id);
    }

    // ============================================================================================
    // Globals and diagnostics
    // ============================================================================================

    /// Global variables in stack order.
    #[must_use]
    pub fn globals(&self) -> &[GlobalVariable] {
        &self.globals
    }

    /// Mutable access to the global variables.
    pub fn globals_mut(&mut self) -> &mut Vec<GlobalVariable> {
        &mut self.globals
    }

    /// Diagnostics recorded for blocks that failed to decompile.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}

impl Index<ExprId> for ExpressionTree {
    type Output = Expression;

    fn index(&self, id: ExprId) -> &Self::Output {
        &self.expressions[id.index()]
    }
}

impl IndexMut<ExprId> for ExpressionTree {
    fn index_mut(&mut self, id: ExprId) -> &mut Self::Output {
        &mut self.expressions[id.index()]
    }
}

impl Index<FunctionId> for ExpressionTree {
    type Output = Function;

    fn index(&self, id: FunctionId) -> &Self::Output {
        &self.functions[id.index()]
    }
}

impl IndexMut<FunctionId> for ExpressionTree {
    fn index_mut(&mut self, id: FunctionId) -> &mut Self::Output {
        &mut self.functions[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_handles() {
        let mut tree = ExpressionTree::new();
        let block = tree.new_block(13);
        let constant = tree.new_constant(13, Variable::Int(1));
        let param = tree.new_parameter(13, VariableType::Int, ParameterLocality::Local);
        let assign = tree.new_assign(13, param, constant, true);
        tree.push_statement(block, assign);

        assert_eq!(tree.expression_count(), 4);
        assert_eq!(tree.kind(assign), Some(ExpressionKind::Assign));
        assert!(tree[assign].is_declaring_assign());
        assert!(tree.is_parameter(param));
        assert_eq!(tree.block(block).map(|b| b.expressions.clone()), Some(vec![assign]));
    }

    #[test]
    fn test_block_contains() {
        let mut tree = ExpressionTree::new();
        let block = tree.new_block(13);
        assert!(!tree.block_contains(block, 13));

        let first = tree.new_return(15, None);
        let last = tree.new_return(25, None);
        tree.push_statement(block, first);
        tree.push_statement(block, last);

        assert!(tree.block_contains(block, 15));
        assert!(tree.block_contains(block, 20));
        assert!(tree.block_contains(block, 25));
        assert!(!tree.block_contains(block, 26));
    }

    #[test]
    fn test_function_order_follows_entry_offset() {
        let mut tree = ExpressionTree::new();
        let b0 = tree.new_block(13);
        let b1 = tree.new_block(40);
        let b2 = tree.new_block(21);

        let start = tree.add_function(Function::new(13, b0));
        let late = tree.add_function(Function::new(40, b1));
        let early = tree.add_function(Function::new(21, b2));

        assert_eq!(tree.function_ids(), &[start, early, late]);

        tree[early].name = "main".into();
        assert_eq!(tree.function_by_name("main"), Some(early));

        tree.remove_function(start);
        assert_eq!(tree.function_count(), 2);
        assert_eq!(tree.functions().next().map(|f| f.start), Some(21));
    }
}
