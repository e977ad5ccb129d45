//! The linear instruction stream of a compiled script.

use rustc_hash::FxHashMap;

use crate::bytecode::Instruction;

/// A compiled script: its instructions in offset order plus an offset index.
///
/// Code starts right after the fixed-size file header, so the first instruction of every
/// program lives at [`Program::HEADER_SIZE`], which is also the entry point.
///
/// # Examples
///
/// ```rust,ignore
/// use scriptscope::prelude::*;
///
/// let mut program = Program::new("nop");
/// program.add(Instruction::jsr(8));
/// program.add(Instruction::new(InstructionKind::RETN));
/// program.add(Instruction::new(InstructionKind::RETN));
/// assert_eq!(program.length(), 23);
/// ```
#[derive(Debug, Clone)]
pub struct Program {
    name: String,
    instructions: Vec<Instruction>,
    by_offset: FxHashMap<u32, usize>,
    length: u32,
}

impl Program {
    /// Size of the file header preceding the code section.
    pub const HEADER_SIZE: u32 = 13;

    /// Creates an empty program.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: Vec::new(),
            by_offset: FxHashMap::default(),
            length: Self::HEADER_SIZE,
        }
    }

    /// Appends an instruction, assigning its offset and next offset.
    ///
    /// Returns the offset the instruction was placed at.
    pub fn add(&mut self, mut instruction: Instruction) -> u32 {
        let offset = self.length;
        instruction.offset = offset;
        instruction.next_offset = offset + instruction.encoded_len();

        self.length = instruction.next_offset;
        self.by_offset.insert(offset, self.instructions.len());
        self.instructions.push(instruction);
        offset
    }

    /// Script name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset of the first instruction, where execution starts.
    #[must_use]
    pub fn entry_offset(&self) -> u32 {
        Self::HEADER_SIZE
    }

    /// Total length in bytes, header included.
    #[must_use]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Instruction starting exactly at `offset`, if any.
    #[must_use]
    pub fn instruction_at(&self, offset: u32) -> Option<&Instruction> {
        self.by_offset
            .get(&offset)
            .map(|&index| &self.instructions[index])
    }

    /// All instructions in offset order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Iterates the instructions in offset order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Returns `true` if the program has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Instruction> for Program {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        let mut program = Program::new("");
        for instruction in iter {
            program.add(instruction);
        }
        program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::InstructionKind;

    #[test]
    fn test_offsets_follow_header() {
        let mut program = Program::new("test");
        assert_eq!(program.add(Instruction::jsr(8)), 13);
        assert_eq!(program.add(Instruction::new(InstructionKind::RETN)), 19);
        assert_eq!(program.add(Instruction::new(InstructionKind::RETN)), 21);
        assert_eq!(program.length(), 23);
        assert_eq!(program.entry_offset(), 13);
    }

    #[test]
    fn test_instruction_at() {
        let program: Program = [
            Instruction::consti(1),
            Instruction::new(InstructionKind::RETN),
        ]
        .into_iter()
        .collect();

        let ret = program.instruction_at(19).map(|ins| ins.kind);
        assert_eq!(ret, Some(InstructionKind::RETN));
        assert_eq!(program.instruction_at(19).map(|ins| ins.next_offset), Some(21));
        assert!(program.instruction_at(14).is_none());
        assert_eq!(program.iter().count(), 2);
    }
}
