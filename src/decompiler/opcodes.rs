//! Instruction kind to expression mappings.
//!
//! The type suffix of an arithmetic or comparison mnemonic fixes both the operator and the
//! result type. These tables are the only place that knowledge lives, and they reject
//! every kind they were not asked about instead of guessing.

use crate::{
    bytecode::{Instruction, InstructionKind, VariableType},
    tree::ExpressionKind,
    Result,
};

/// How the operands of a binary instruction are laid out on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandShape {
    /// One word each
    Scalar,
    /// Three words each
    VectorVector,
    /// A float below a vector
    FloatVector,
    /// A vector below a float
    VectorFloat,
}

/// Decoded meaning of a binary instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOperation {
    /// Operator
    pub kind: ExpressionKind,
    /// Type of the result
    pub result: VariableType,
    /// Operand layout
    pub shape: OperandShape,
}

impl BinaryOperation {
    const fn scalar(kind: ExpressionKind, result: VariableType) -> Self {
        Self {
            kind,
            result,
            shape: OperandShape::Scalar,
        }
    }

    const fn vector(kind: ExpressionKind, shape: OperandShape) -> Self {
        Self {
            kind,
            result: VariableType::Vector,
            shape,
        }
    }
}

/// Operator and result type of a binary instruction.
///
/// Structure comparisons (EQUALTT, NEQUALTT) are not covered, they expand into one
/// comparison per word.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedInstruction`] for any non-binary kind.
pub fn binary_operation(ins: &Instruction) -> Result<BinaryOperation> {
    use ExpressionKind as E;
    use InstructionKind as K;
    use VariableType::{Float, Int, String};

    let operation = match ins.kind {
        K::LOGANDII => BinaryOperation::scalar(E::LogicalAnd, Int),
        K::LOGORII => BinaryOperation::scalar(E::LogicalOr, Int),
        K::INCORII => BinaryOperation::scalar(E::BitwiseOr, Int),
        K::EXCORII => BinaryOperation::scalar(E::BitwiseExclusiveOr, Int),
        K::BOOLANDII => BinaryOperation::scalar(E::BitwiseAnd, Int),

        K::EQUALII
        | K::EQUALFF
        | K::EQUALSS
        | K::EQUALOO
        | K::EQUALEFFEFF
        | K::EQUALEVTEVT
        | K::EQUALLOCLOC
        | K::EQUALTALTAL => BinaryOperation::scalar(E::Equal, Int),
        K::NEQUALII
        | K::NEQUALFF
        | K::NEQUALSS
        | K::NEQUALOO
        | K::NEQUALEFFEFF
        | K::NEQUALEVTEVT
        | K::NEQUALLOCLOC
        | K::NEQUALTALTAL => BinaryOperation::scalar(E::NotEqual, Int),
        K::GEQII | K::GEQFF => BinaryOperation::scalar(E::GreaterThanOrEqual, Int),
        K::GTII | K::GTFF => BinaryOperation::scalar(E::GreaterThan, Int),
        K::LTII | K::LTFF => BinaryOperation::scalar(E::LessThan, Int),
        K::LEQII | K::LEQFF => BinaryOperation::scalar(E::LessThanOrEqual, Int),

        K::SHLEFTII => BinaryOperation::scalar(E::LeftShift, Int),
        K::SHRIGHTII => BinaryOperation::scalar(E::RightShift, Int),
        K::USHRIGHTII => BinaryOperation::scalar(E::RightShiftUnsigned, Int),

        K::ADDII => BinaryOperation::scalar(E::Add, Int),
        K::ADDIF | K::ADDFI | K::ADDFF => BinaryOperation::scalar(E::Add, Float),
        K::ADDSS => BinaryOperation::scalar(E::Add, String),
        K::ADDVV => BinaryOperation::vector(E::Add, OperandShape::VectorVector),
        K::SUBII => BinaryOperation::scalar(E::Subtract, Int),
        K::SUBIF | K::SUBFI | K::SUBFF => BinaryOperation::scalar(E::Subtract, Float),
        K::SUBVV => BinaryOperation::vector(E::Subtract, OperandShape::VectorVector),
        K::MULII => BinaryOperation::scalar(E::Multiply, Int),
        K::MULIF | K::MULFI | K::MULFF => BinaryOperation::scalar(E::Multiply, Float),
        K::MULVF => BinaryOperation::vector(E::Multiply, OperandShape::VectorFloat),
        K::MULFV => BinaryOperation::vector(E::Multiply, OperandShape::FloatVector),
        K::DIVII => BinaryOperation::scalar(E::Divide, Int),
        K::DIVIF | K::DIVFI | K::DIVFF => BinaryOperation::scalar(E::Divide, Float),
        K::DIVVF => BinaryOperation::vector(E::Divide, OperandShape::VectorFloat),
        K::DIVFV => BinaryOperation::vector(E::Divide, OperandShape::FloatVector),
        K::MODII => BinaryOperation::scalar(E::Modulo, Int),

        _ => return Err(unsupported_error!(ins)),
    };
    Ok(operation)
}

/// Operator of a unary instruction.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedInstruction`] for any non-unary kind.
pub fn unary_operation(ins: &Instruction) -> Result<ExpressionKind> {
    match ins.kind {
        InstructionKind::NEGI | InstructionKind::NEGF => Ok(ExpressionKind::Negate),
        InstructionKind::COMPI => Ok(ExpressionKind::OnesComplement),
        InstructionKind::NOTI => Ok(ExpressionKind::Not),
        InstructionKind::INCISP | InstructionKind::INCIBP => Ok(ExpressionKind::Increment),
        InstructionKind::DECISP | InstructionKind::DECIBP => Ok(ExpressionKind::Decrement),
        _ => Err(unsupported_error!(ins)),
    }
}

/// Type of the slot reserved by an RSADD instruction.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedInstruction`] for any non-RSADD kind.
pub fn reserved_type(ins: &Instruction) -> Result<VariableType> {
    match ins.kind {
        InstructionKind::RSADDI => Ok(VariableType::Int),
        InstructionKind::RSADDF => Ok(VariableType::Float),
        InstructionKind::RSADDS => Ok(VariableType::String),
        InstructionKind::RSADDO => Ok(VariableType::Object),
        InstructionKind::RSADDEFF => Ok(VariableType::Effect),
        InstructionKind::RSADDEVT => Ok(VariableType::Event),
        InstructionKind::RSADDLOC => Ok(VariableType::Location),
        InstructionKind::RSADDTAL => Ok(VariableType::Talent),
        _ => Err(unsupported_error!(ins)),
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::Error;

    #[test]
    fn test_result_types_follow_suffix() {
        let op = |kind| binary_operation(&Instruction::new(kind)).unwrap();

        assert_eq!(op(InstructionKind::ADDII).result, VariableType::Int);
        assert_eq!(op(InstructionKind::ADDIF).result, VariableType::Float);
        assert_eq!(op(InstructionKind::DIVFI).result, VariableType::Float);
        assert_eq!(op(InstructionKind::ADDSS).result, VariableType::String);
        assert_eq!(op(InstructionKind::LTFF).result, VariableType::Int);
        assert_eq!(op(InstructionKind::MULFV).shape, OperandShape::FloatVector);
        assert_eq!(op(InstructionKind::DIVVF).shape, OperandShape::VectorFloat);
        assert_eq!(op(InstructionKind::SUBVV).kind, ExpressionKind::Subtract);
        assert_eq!(
            op(InstructionKind::USHRIGHTII).kind,
            ExpressionKind::RightShiftUnsigned
        );
    }

    #[test]
    fn test_unknown_kinds_are_rejected() {
        let err = binary_operation(&Instruction::new(InstructionKind::EQUALTT)).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedInstruction {
                kind: InstructionKind::EQUALTT,
                ..
            }
        ));
        assert!(unary_operation(&Instruction::new(InstructionKind::ADDII)).is_err());
        assert!(reserved_type(&Instruction::new(InstructionKind::CONSTI)).is_err());
    }

    #[test]
    fn test_every_binary_kind_yields_a_binary_expression() {
        for kind in InstructionKind::iter() {
            if let Ok(op) = binary_operation(&Instruction::new(kind)) {
                assert!(op.kind.is_binary(), "{kind} mapped to {:?}", op.kind);
            }
            if let Ok(op) = unary_operation(&Instruction::new(kind)) {
                assert!(op.is_unary(), "{kind} mapped to {op:?}");
            }
        }
    }
}
