//! Engine routine signatures.
//!
//! ACTION instructions call engine routines by numeric id. The decompiler needs each
//! routine's argument types to know how many stack words to pop, and its return type to
//! know whether a result is pushed. Argument pointer flags mark arguments the routine
//! writes through.

use rustc_hash::FxHashMap;

use crate::bytecode::VariableType;

/// One routine argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutineArgument {
    /// Argument type
    pub variable_type: VariableType,
    /// `true` if the routine writes back through this argument
    pub pointer: bool,
}

impl RoutineArgument {
    /// A by-value argument.
    #[must_use]
    pub const fn value(variable_type: VariableType) -> Self {
        Self {
            variable_type,
            pointer: false,
        }
    }

    /// A write-through argument.
    #[must_use]
    pub const fn pointer(variable_type: VariableType) -> Self {
        Self {
            variable_type,
            pointer: true,
        }
    }
}

/// Signature of an engine routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    /// Name the routine is rendered with
    pub name: String,
    /// Result type, [`VariableType::Void`] if none
    pub return_type: VariableType,
    /// Arguments in call order
    pub arguments: Vec<RoutineArgument>,
}

impl Routine {
    /// Creates a routine signature from by-value argument types.
    pub fn new(
        name: impl Into<String>,
        return_type: VariableType,
        arguments: impl IntoIterator<Item = VariableType>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            arguments: arguments.into_iter().map(RoutineArgument::value).collect(),
        }
    }

    /// Type of the argument at `index`.
    #[must_use]
    pub fn argument_type(&self, index: usize) -> Option<VariableType> {
        self.arguments.get(index).map(|arg| arg.variable_type)
    }
}

/// Lookup of routine signatures by id.
pub trait Routines {
    /// Returns the routine with the given id.
    fn get(&self, id: u16) -> Option<&Routine>;
}

/// A [`Routines`] registry backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct RoutineTable {
    routines: FxHashMap<u16, Routine>,
}

impl RoutineTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `routine` under `id`, replacing any previous entry.
    pub fn insert(&mut self, id: u16, routine: Routine) {
        self.routines.insert(id, routine);
    }

    /// Builder-style [`RoutineTable::insert`].
    #[must_use]
    pub fn with(mut self, id: u16, routine: Routine) -> Self {
        self.insert(id, routine);
        self
    }

    /// Number of registered routines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routines.len()
    }

    /// Returns `true` if no routine is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }
}

impl Routines for RoutineTable {
    fn get(&self, id: u16) -> Option<&Routine> {
        self.routines.get(&id)
    }
}
