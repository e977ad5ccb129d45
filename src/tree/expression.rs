//! Expression nodes.
//!
//! Every node lives in the [`crate::tree::ExpressionTree`] arena and is referenced through
//! an [`ExprId`]. Nodes refer to each other only by id, so rewriting a node never
//! invalidates references held elsewhere.
//!
//! Every node records the byte offset of the instruction that produced it. Offsets keep
//! block children ordered and answer block membership queries.

use std::fmt;

use bitflags::bitflags;

use crate::{
    bytecode::{Variable, VariableType},
    tree::FunctionId,
};

/// A strongly-typed handle to an expression in an [`crate::tree::ExpressionTree`].
///
/// Handles are assigned sequentially as expressions are allocated and are never reused
/// within a tree, which makes them usable as stable keys for analysis maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub(crate) usize);

impl ExprId {
    /// Creates a handle from a raw arena index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        ExprId(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Kind of an expression, including the operator of unary and binary expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    /// Ordered statement list
    Block,
    /// Literal value
    Constant,
    /// Local, argument, global or return value slot
    Parameter,
    /// Jump target
    Label,
    /// Jump to a label
    Goto,
    /// Function exit
    Return,
    /// Single-armed if
    Conditional,
    /// Engine routine call
    Action,
    /// Decompiled function call
    Call,
    /// Vector composed from three floats
    Vector,
    /// Component of a vector
    VectorIndex,
    /// `-x`
    Negate,
    /// `!x`
    Not,
    /// `~x`
    OnesComplement,
    /// `x++`
    Increment,
    /// `x--`
    Decrement,
    /// `x = y`
    Assign,
    /// `x + y`
    Add,
    /// `x - y`
    Subtract,
    /// `x * y`
    Multiply,
    /// `x / y`
    Divide,
    /// `x % y`
    Modulo,
    /// `x && y`
    LogicalAnd,
    /// `x || y`
    LogicalOr,
    /// `x | y`
    BitwiseOr,
    /// `x ^ y`
    BitwiseExclusiveOr,
    /// `x & y`
    BitwiseAnd,
    /// `x << y`
    LeftShift,
    /// `x >> y`
    RightShift,
    /// `x >>> y`
    RightShiftUnsigned,
    /// `x == y`
    Equal,
    /// `x != y`
    NotEqual,
    /// `x >= y`
    GreaterThanOrEqual,
    /// `x > y`
    GreaterThan,
    /// `x < y`
    LessThan,
    /// `x <= y`
    LessThanOrEqual,
}

impl ExpressionKind {
    /// Returns `true` for kinds represented by a [`UnaryExpression`].
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(
            self,
            ExpressionKind::Negate
                | ExpressionKind::Not
                | ExpressionKind::OnesComplement
                | ExpressionKind::Increment
                | ExpressionKind::Decrement
        )
    }

    /// Returns `true` for kinds represented by a [`BinaryExpression`].
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            ExpressionKind::Assign
                | ExpressionKind::Add
                | ExpressionKind::Subtract
                | ExpressionKind::Multiply
                | ExpressionKind::Divide
                | ExpressionKind::Modulo
                | ExpressionKind::LogicalAnd
                | ExpressionKind::LogicalOr
                | ExpressionKind::BitwiseOr
                | ExpressionKind::BitwiseExclusiveOr
                | ExpressionKind::BitwiseAnd
                | ExpressionKind::LeftShift
                | ExpressionKind::RightShift
                | ExpressionKind::RightShiftUnsigned
                | ExpressionKind::Equal
                | ExpressionKind::NotEqual
                | ExpressionKind::GreaterThanOrEqual
                | ExpressionKind::GreaterThan
                | ExpressionKind::LessThan
                | ExpressionKind::LessThanOrEqual
        )
    }

    /// Returns `true` for unary kinds that write their operand back.
    #[must_use]
    pub const fn is_step(self) -> bool {
        matches!(self, ExpressionKind::Increment | ExpressionKind::Decrement)
    }
}

/// Position an operand occupies inside the expression that consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandRole {
    /// Argument of an action, by index
    ActionArgument(usize),
    /// Argument of a call, by index
    CallArgument(usize),
    /// Operand of a unary expression
    Operand,
    /// Left side of a binary expression
    Left,
    /// Right side of a binary expression
    Right,
    /// Value of a return
    ReturnValue,
    /// Test of a conditional
    Test,
    /// Taken branch of a conditional
    Branch,
    /// Component of a vector, by index
    VectorComponent(usize),
    /// Vector a component is read from
    VectorSource,
}

/// Storage class of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterLocality {
    /// Function-local temporary or variable
    #[default]
    Local,
    /// Caller-owned slot accessed by a callee
    Argument,
    /// Slot promoted to global storage
    Global,
    /// Argument recovered as the function result
    ReturnValue,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Cross-boundary access flags of an argument parameter
    pub struct ParameterFlags: u8 {
        /// The callee reads the caller's slot
        const OUTER_READ = 0x01;
        /// The callee writes the caller's slot
        const OUTER_MODIFIED = 0x02;
    }
}

/// Ordered statement list.
#[derive(Debug, Clone, Default)]
pub struct BlockExpression {
    /// Offset of the first instruction of the block
    pub offset: u32,
    /// Statements in program order
    pub expressions: Vec<ExprId>,
}

/// Literal value.
#[derive(Debug, Clone)]
pub struct ConstantExpression {
    /// Offset of the producing instruction
    pub offset: u32,
    /// The literal
    pub value: Variable,
}

/// A named storage slot synthesized from a stack frame.
#[derive(Debug, Clone)]
pub struct ParameterExpression {
    /// Offset of the instruction that allocated the slot
    pub offset: u32,
    /// Declared type
    pub variable_type: VariableType,
    /// Storage class
    pub locality: ParameterLocality,
    /// Disambiguating name suffix, e.g. the component of a decomposed vector
    pub suffix: Option<String>,
    /// Caller-relative stack offset of an argument parameter
    pub stack_offset: Option<i32>,
    /// Cross-boundary access flags
    pub flags: ParameterFlags,
}

impl ParameterExpression {
    /// Creates a parameter with no suffix and no outer access.
    #[must_use]
    pub fn new(offset: u32, variable_type: VariableType, locality: ParameterLocality) -> Self {
        Self {
            offset,
            variable_type,
            locality,
            suffix: None,
            stack_offset: None,
            flags: ParameterFlags::empty(),
        }
    }

    /// Returns `true` if a callee writes this slot on behalf of its caller.
    #[must_use]
    pub fn is_outer_modified(&self) -> bool {
        self.flags.contains(ParameterFlags::OUTER_MODIFIED)
    }
}

/// Jump target.
#[derive(Debug, Clone)]
pub struct LabelExpression {
    /// Offset of the instruction the label precedes
    pub offset: u32,
}

/// Unconditional jump to a label.
#[derive(Debug, Clone)]
pub struct GotoExpression {
    /// Offset of the jump instruction
    pub offset: u32,
    /// Target label
    pub label: ExprId,
}

/// Function exit, optionally with a value.
#[derive(Debug, Clone)]
pub struct ReturnExpression {
    /// Offset of the return instruction
    pub offset: u32,
    /// Returned value
    pub value: Option<ExprId>,
}

/// Single-armed conditional, fallthrough continues in the enclosing block.
#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    /// Offset of the conditional jump
    pub offset: u32,
    /// Test expression
    pub test: ExprId,
    /// Block executed when the test holds
    pub if_true: ExprId,
}

/// Engine routine call.
#[derive(Debug, Clone)]
pub struct ActionExpression {
    /// Offset of the ACTION instruction
    pub offset: u32,
    /// Routine id
    pub routine: u16,
    /// Arguments in call order, deferred actions are passed as blocks
    pub arguments: Vec<ExprId>,
}

/// Call of a decompiled function.
#[derive(Debug, Clone)]
pub struct CallExpression {
    /// Offset of the JSR instruction
    pub offset: u32,
    /// Called function
    pub function: FunctionId,
    /// Arguments matching the callee's argument list
    pub arguments: Vec<ExprId>,
}

/// Vector composed from three float expressions.
#[derive(Debug, Clone)]
pub struct VectorExpression {
    /// Offset of the consuming instruction
    pub offset: u32,
    /// `x`, `y` and `z`
    pub components: [ExprId; 3],
}

/// Single component of a vector.
#[derive(Debug, Clone)]
pub struct VectorIndexExpression {
    /// Offset of the producing instruction
    pub offset: u32,
    /// Vector read from
    pub vector: ExprId,
    /// Component index, 0 to 2
    pub index: u8,
}

/// Unary operation.
#[derive(Debug, Clone)]
pub struct UnaryExpression {
    /// Offset of the producing instruction
    pub offset: u32,
    /// Operator, one of the kinds for which [`ExpressionKind::is_unary`] holds
    pub kind: ExpressionKind,
    /// Operand
    pub operand: ExprId,
}

/// Binary operation, including assignment.
#[derive(Debug, Clone)]
pub struct BinaryExpression {
    /// Offset of the producing instruction
    pub offset: u32,
    /// Operator, one of the kinds for which [`ExpressionKind::is_binary`] holds
    pub kind: ExpressionKind,
    /// Left operand, the destination parameter of an assignment
    pub left: ExprId,
    /// Right operand
    pub right: ExprId,
    /// For assignments, `true` if this assignment also declares its destination
    pub declare_left: bool,
}

/// A node of the expression tree.
#[derive(Debug, Clone)]
pub enum Expression {
    /// See [`BlockExpression`]
    Block(BlockExpression),
    /// See [`ConstantExpression`]
    Constant(ConstantExpression),
    /// See [`ParameterExpression`]
    Parameter(ParameterExpression),
    /// See [`LabelExpression`]
    Label(LabelExpression),
    /// See [`GotoExpression`]
    Goto(GotoExpression),
    /// See [`ReturnExpression`]
    Return(ReturnExpression),
    /// See [`ConditionalExpression`]
    Conditional(ConditionalExpression),
    /// See [`ActionExpression`]
    Action(ActionExpression),
    /// See [`CallExpression`]
    Call(CallExpression),
    /// See [`VectorExpression`]
    Vector(VectorExpression),
    /// See [`VectorIndexExpression`]
    VectorIndex(VectorIndexExpression),
    /// See [`UnaryExpression`]
    Unary(UnaryExpression),
    /// See [`BinaryExpression`]
    Binary(BinaryExpression),
}

macro_rules! expression_accessors {
    ($($variant:ident, $ty:ty, $as_ref:ident, $as_mut:ident);* $(;)?) => {
        impl Expression {
        $(
            #[doc = concat!("Returns the [`", stringify!($ty), "`] if this is one.")]
            #[must_use]
            pub fn $as_ref(&self) -> Option<&$ty> {
                match self {
                    Expression::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            #[doc = concat!("Returns the mutable [`", stringify!($ty), "`] if this is one.")]
            pub fn $as_mut(&mut self) -> Option<&mut $ty> {
                match self {
                    Expression::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        )*
        }

        $(
            impl From<$ty> for Expression {
                fn from(inner: $ty) -> Self {
                    Expression::$variant(inner)
                }
            }
        )*
    };
}

expression_accessors! {
    Block, BlockExpression, as_block, as_block_mut;
    Constant, ConstantExpression, as_constant, as_constant_mut;
    Parameter, ParameterExpression, as_parameter, as_parameter_mut;
    Label, LabelExpression, as_label, as_label_mut;
    Goto, GotoExpression, as_goto, as_goto_mut;
    Return, ReturnExpression, as_return, as_return_mut;
    Conditional, ConditionalExpression, as_conditional, as_conditional_mut;
    Action, ActionExpression, as_action, as_action_mut;
    Call, CallExpression, as_call, as_call_mut;
    Vector, VectorExpression, as_vector, as_vector_mut;
    VectorIndex, VectorIndexExpression, as_vector_index, as_vector_index_mut;
    Unary, UnaryExpression, as_unary, as_unary_mut;
    Binary, BinaryExpression, as_binary, as_binary_mut;
}

impl Expression {
    /// Offset of the instruction that produced this expression.
    #[must_use]
    pub fn offset(&self) -> u32 {
        match self {
            Expression::Block(e) => e.offset,
            Expression::Constant(e) => e.offset,
            Expression::Parameter(e) => e.offset,
            Expression::Label(e) => e.offset,
            Expression::Goto(e) => e.offset,
            Expression::Return(e) => e.offset,
            Expression::Conditional(e) => e.offset,
            Expression::Action(e) => e.offset,
            Expression::Call(e) => e.offset,
            Expression::Vector(e) => e.offset,
            Expression::VectorIndex(e) => e.offset,
            Expression::Unary(e) => e.offset,
            Expression::Binary(e) => e.offset,
        }
    }

    /// Kind of this expression.
    #[must_use]
    pub fn kind(&self) -> ExpressionKind {
        match self {
            Expression::Block(_) => ExpressionKind::Block,
            Expression::Constant(_) => ExpressionKind::Constant,
            Expression::Parameter(_) => ExpressionKind::Parameter,
            Expression::Label(_) => ExpressionKind::Label,
            Expression::Goto(_) => ExpressionKind::Goto,
            Expression::Return(_) => ExpressionKind::Return,
            Expression::Conditional(_) => ExpressionKind::Conditional,
            Expression::Action(_) => ExpressionKind::Action,
            Expression::Call(_) => ExpressionKind::Call,
            Expression::Vector(_) => ExpressionKind::Vector,
            Expression::VectorIndex(_) => ExpressionKind::VectorIndex,
            Expression::Unary(e) => e.kind,
            Expression::Binary(e) => e.kind,
        }
    }

    /// Returns `true` for an assignment that declares its destination.
    #[must_use]
    pub fn is_declaring_assign(&self) -> bool {
        matches!(self, Expression::Binary(b) if b.kind == ExpressionKind::Assign && b.declare_left)
    }

    /// Direct operands of this expression with the role each one plays.
    ///
    /// Block statements are not operands. The assignment destination is reported as
    /// [`OperandRole::Left`] like any other binary left side.
    #[must_use]
    pub fn operands(&self) -> Vec<(OperandRole, ExprId)> {
        match self {
            Expression::Block(_)
            | Expression::Constant(_)
            | Expression::Parameter(_)
            | Expression::Label(_)
            | Expression::Goto(_) => Vec::new(),
            Expression::Return(e) => e
                .value
                .map(|value| vec![(OperandRole::ReturnValue, value)])
                .unwrap_or_default(),
            Expression::Conditional(e) => vec![
                (OperandRole::Test, e.test),
                (OperandRole::Branch, e.if_true),
            ],
            Expression::Action(e) => e
                .arguments
                .iter()
                .enumerate()
                .map(|(i, &arg)| (OperandRole::ActionArgument(i), arg))
                .collect(),
            Expression::Call(e) => e
                .arguments
                .iter()
                .enumerate()
                .map(|(i, &arg)| (OperandRole::CallArgument(i), arg))
                .collect(),
            Expression::Vector(e) => e
                .components
                .iter()
                .enumerate()
                .map(|(i, &c)| (OperandRole::VectorComponent(i), c))
                .collect(),
            Expression::VectorIndex(e) => vec![(OperandRole::VectorSource, e.vector)],
            Expression::Unary(e) => vec![(OperandRole::Operand, e.operand)],
            Expression::Binary(e) => {
                vec![(OperandRole::Left, e.left), (OperandRole::Right, e.right)]
            }
        }
    }

    /// Mutable access to the operand occupying `role`.
    pub fn operand_mut(&mut self, role: OperandRole) -> Option<&mut ExprId> {
        match (self, role) {
            (Expression::Return(e), OperandRole::ReturnValue) => e.value.as_mut(),
            (Expression::Conditional(e), OperandRole::Test) => Some(&mut e.test),
            (Expression::Conditional(e), OperandRole::Branch) => Some(&mut e.if_true),
            (Expression::Action(e), OperandRole::ActionArgument(i)) => e.arguments.get_mut(i),
            (Expression::Call(e), OperandRole::CallArgument(i)) => e.arguments.get_mut(i),
            (Expression::Vector(e), OperandRole::VectorComponent(i)) => e.components.get_mut(i),
            (Expression::VectorIndex(e), OperandRole::VectorSource) => Some(&mut e.vector),
            (Expression::Unary(e), OperandRole::Operand) => Some(&mut e.operand),
            (Expression::Binary(e), OperandRole::Left) => Some(&mut e.left),
            (Expression::Binary(e), OperandRole::Right) => Some(&mut e.right),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(ExpressionKind::Negate.is_unary());
        assert!(ExpressionKind::Decrement.is_unary());
        assert!(!ExpressionKind::Assign.is_unary());
        assert!(ExpressionKind::Assign.is_binary());
        assert!(ExpressionKind::RightShiftUnsigned.is_binary());
        assert!(!ExpressionKind::Call.is_binary());
        assert!(ExpressionKind::Increment.is_step());
        assert!(!ExpressionKind::Not.is_step());
    }

    #[test]
    fn test_operands_and_roles() {
        let mut call = Expression::Call(CallExpression {
            offset: 0,
            function: FunctionId::new(0),
            arguments: vec![ExprId::new(4), ExprId::new(5)],
        });

        assert_eq!(
            call.operands(),
            vec![
                (OperandRole::CallArgument(0), ExprId::new(4)),
                (OperandRole::CallArgument(1), ExprId::new(5)),
            ]
        );

        *call.operand_mut(OperandRole::CallArgument(1)).unwrap() = ExprId::new(9);
        assert_eq!(call.as_call().unwrap().arguments[1], ExprId::new(9));
        assert!(call.operand_mut(OperandRole::Left).is_none());
        assert!(call.operand_mut(OperandRole::CallArgument(2)).is_none());
    }

    #[test]
    fn test_declaring_assign() {
        let assign = Expression::from(BinaryExpression {
            offset: 0,
            kind: ExpressionKind::Assign,
            left: ExprId::new(0),
            right: ExprId::new(1),
            declare_left: true,
        });
        assert!(assign.is_declaring_assign());
        assert_eq!(assign.kind(), ExpressionKind::Assign);
    }
}
