//! Script value types and constant payloads.
//!
//! [`VariableType`] names every type a stack slot, routine argument or function result
//! can have. Its `Display` form is the script keyword used when rendering declarations.
//! [`Variable`] carries the literal payload of constant-load instructions.

use std::fmt;

use strum::{Display, EnumIter};

/// Type of a script value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum VariableType {
    /// No value, only valid as a return type
    #[default]
    Void,
    /// 32-bit signed integer
    Int,
    /// 32-bit float
    Float,
    /// Character string
    String,
    /// Engine object handle
    Object,
    /// Three floats, occupies three stack words
    Vector,
    /// Engine effect handle
    Effect,
    /// Engine event handle
    Event,
    /// Engine location handle
    Location,
    /// Engine talent handle
    Talent,
    /// Deferred action, only valid as a routine argument
    Action,
}

impl VariableType {
    /// Number of stack words a value of this type occupies.
    #[must_use]
    pub const fn word_count(self) -> usize {
        match self {
            VariableType::Void | VariableType::Action => 0,
            VariableType::Vector => 3,
            _ => 1,
        }
    }
}

/// Literal payload of a constant expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Integer literal
    Int(i32),
    /// Float literal
    Float(f32),
    /// String literal
    String(String),
    /// Object id literal
    Object(u32),
}

impl Variable {
    /// Object id the engine resolves to the caller.
    pub const OBJECT_SELF: u32 = 0;
    /// Object id of the invalid object.
    pub const OBJECT_INVALID: u32 = 1;

    /// Returns the script type of this literal.
    #[must_use]
    pub fn variable_type(&self) -> VariableType {
        match self {
            Variable::Int(_) => VariableType::Int,
            Variable::Float(_) => VariableType::Float,
            Variable::String(_) => VariableType::String,
            Variable::Object(_) => VariableType::Object,
        }
    }

    /// Arithmetic negation, `None` for types that have none.
    #[must_use]
    pub fn negate(&self) -> Option<Variable> {
        match self {
            Variable::Int(value) => Some(Variable::Int(value.wrapping_neg())),
            Variable::Float(value) => Some(Variable::Float(-value)),
            Variable::String(_) | Variable::Object(_) => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Int(value) => write!(f, "{value}"),
            Variable::Float(value) => write!(f, "{value:.6}"),
            Variable::String(value) => write!(f, "{value:?}"),
            Variable::Object(Variable::OBJECT_SELF) => write!(f, "OBJECT_SELF"),
            Variable::Object(Variable::OBJECT_INVALID) => write!(f, "OBJECT_INVALID"),
            Variable::Object(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keywords() {
        assert_eq!(VariableType::Int.to_string(), "int");
        assert_eq!(VariableType::Vector.to_string(), "vector");
        assert_eq!(VariableType::Void.to_string(), "void");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(VariableType::Vector.word_count(), 3);
        assert_eq!(VariableType::Float.word_count(), 1);
        assert_eq!(VariableType::Action.word_count(), 0);
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Variable::Int(-3).to_string(), "-3");
        assert_eq!(Variable::Float(1.5).to_string(), "1.500000");
        assert_eq!(Variable::String("a\"b".into()).to_string(), "\"a\\\"b\"");
        assert_eq!(Variable::Object(0).to_string(), "OBJECT_SELF");
        assert_eq!(Variable::Object(1).to_string(), "OBJECT_INVALID");
        assert_eq!(Variable::Object(7).to_string(), "7");
    }

    #[test]
    fn test_negate() {
        assert_eq!(Variable::Int(4).negate(), Some(Variable::Int(-4)));
        assert_eq!(Variable::Float(2.0).negate(), Some(Variable::Float(-2.0)));
        assert_eq!(Variable::Object(3).negate(), None);
    }
}
