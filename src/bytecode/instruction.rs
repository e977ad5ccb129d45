//! Instruction kinds and decoded instructions.
//!
//! Every [`InstructionKind`] is identified on the wire by a 16-bit code combining the
//! opcode byte with a type qualifier byte (`opcode | qualifier << 8`). The mnemonic names
//! follow the established NWScript assembler spelling, where the trailing letters encode
//! the operand types (`ADDIF` adds an int and a float, `RSADDO` reserves an object slot).
//!
//! [`Instruction`] is the decoded form the decompiler consumes: kind, absolute offset and
//! the operand fields relevant to that kind. Named constructors build instructions for
//! each operand shape, offsets are assigned when the instruction is added to a
//! [`crate::bytecode::Program`].

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

use crate::{bytecode::Variable, Error};

/// Every instruction of the NWScript bytecode dialect, valued by its 16-bit wire code.
#[allow(missing_docs, non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[repr(u16)]
pub enum InstructionKind {
    NOP = 0x0c00,
    CPDOWNSP = 0x0101,
    RSADDI = 0x0302,
    RSADDF = 0x0402,
    RSADDS = 0x0502,
    RSADDO = 0x0602,
    RSADDEFF = 0x1002,
    RSADDEVT = 0x1102,
    RSADDLOC = 0x1202,
    RSADDTAL = 0x1302,
    CPTOPSP = 0x0103,
    CONSTI = 0x0304,
    CONSTF = 0x0404,
    CONSTS = 0x0504,
    CONSTO = 0x0604,
    ACTION = 0x0005,
    LOGANDII = 0x2006,
    LOGORII = 0x2007,
    INCORII = 0x2008,
    EXCORII = 0x2009,
    BOOLANDII = 0x200a,
    EQUALII = 0x200b,
    EQUALFF = 0x210b,
    EQUALSS = 0x230b,
    EQUALOO = 0x220b,
    EQUALTT = 0x240b,
    EQUALEFFEFF = 0x300b,
    EQUALEVTEVT = 0x310b,
    EQUALLOCLOC = 0x320b,
    EQUALTALTAL = 0x330b,
    NEQUALII = 0x200c,
    NEQUALFF = 0x210c,
    NEQUALSS = 0x230c,
    NEQUALOO = 0x220c,
    NEQUALTT = 0x240c,
    NEQUALEFFEFF = 0x300c,
    NEQUALEVTEVT = 0x310c,
    NEQUALLOCLOC = 0x320c,
    NEQUALTALTAL = 0x330c,
    GEQII = 0x200d,
    GEQFF = 0x210d,
    GTII = 0x200e,
    GTFF = 0x210e,
    LTII = 0x200f,
    LTFF = 0x210f,
    LEQII = 0x2010,
    LEQFF = 0x2110,
    SHLEFTII = 0x2011,
    SHRIGHTII = 0x2012,
    USHRIGHTII = 0x2013,
    ADDII = 0x2014,
    ADDIF = 0x2514,
    ADDFI = 0x2614,
    ADDFF = 0x2114,
    ADDSS = 0x2314,
    ADDVV = 0x3a14,
    SUBII = 0x2015,
    SUBIF = 0x2515,
    SUBFI = 0x2615,
    SUBFF = 0x2115,
    SUBVV = 0x3a15,
    MULII = 0x2016,
    MULIF = 0x2516,
    MULFI = 0x2616,
    MULFF = 0x2116,
    MULVF = 0x3b16,
    MULFV = 0x3c16,
    DIVII = 0x2017,
    DIVIF = 0x2517,
    DIVFI = 0x2617,
    DIVFF = 0x2117,
    DIVVF = 0x3b17,
    DIVFV = 0x3c17,
    MODII = 0x2018,
    NEGI = 0x0319,
    NEGF = 0x0419,
    COMPI = 0x031a,
    MOVSP = 0x001b,
    JMP = 0x001d,
    JSR = 0x001e,
    JZ = 0x001f,
    RETN = 0x0020,
    DESTRUCT = 0x0121,
    NOTI = 0x0322,
    DECISP = 0x0323,
    INCISP = 0x0324,
    JNZ = 0x0025,
    CPDOWNBP = 0x0126,
    CPTOPBP = 0x0127,
    DECIBP = 0x0328,
    INCIBP = 0x0329,
    SAVEBP = 0x002a,
    RESTOREBP = 0x002b,
    STORE_STATE = 0x102c,
    NOP2 = 0x002d,
}

impl InstructionKind {
    /// The 16-bit wire code of this kind.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// The opcode byte, shared by all type-qualified variants of an operation.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        (self as u16 & 0xff) as u8
    }

    /// The type qualifier byte.
    #[must_use]
    pub const fn qualifier(self) -> u8 {
        (self as u16 >> 8) as u8
    }

    /// Returns `true` for jumps, conditional jumps and subroutine calls.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(
            self,
            InstructionKind::JMP | InstructionKind::JSR | InstructionKind::JZ | InstructionKind::JNZ
        )
    }
}

impl TryFrom<u16> for InstructionKind {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        InstructionKind::iter()
            .find(|kind| kind.code() == code)
            .ok_or(Error::UnknownOpcode(code))
    }
}

/// A decoded instruction.
///
/// Only the fields relevant to [`Instruction::kind`] carry meaning, the rest stay zero.
/// `offset` and `next_offset` are filled in by [`crate::bytecode::Program::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Instruction kind
    pub kind: InstructionKind,
    /// Absolute byte offset of the instruction
    pub offset: u32,
    /// Absolute byte offset of the following instruction
    pub next_offset: u32,
    /// Relative jump distance of JMP, JSR, JZ and JNZ
    pub jump_offset: i32,
    /// Relative stack offset of stack addressing instructions, in bytes
    pub stack_offset: i32,
    /// Size in bytes of copied, moved or destroyed stack regions
    pub size: u16,
    /// Size in bytes of the region DESTRUCT preserves
    pub size_no_destroy: u16,
    /// Size in bytes of the locals captured by STORE_STATE
    pub size_locals: i32,
    /// Payload of constant-load instructions
    pub value: Option<Variable>,
    /// Routine id of ACTION
    pub routine: u16,
    /// Argument count of ACTION
    pub argument_count: u8,
}

impl Instruction {
    /// Creates an instruction of the given kind with no operands.
    #[must_use]
    pub fn new(kind: InstructionKind) -> Self {
        Self {
            kind,
            offset: 0,
            next_offset: 0,
            jump_offset: 0,
            stack_offset: 0,
            size: 0,
            size_no_destroy: 0,
            size_locals: 0,
            value: None,
            routine: 0,
            argument_count: 0,
        }
    }

    /// Creates a jump-style instruction (JMP, JSR, JZ or JNZ).
    #[must_use]
    pub fn jump(kind: InstructionKind, jump_offset: i32) -> Self {
        Self {
            jump_offset,
            ..Self::new(kind)
        }
    }

    /// JMP by a relative distance.
    #[must_use]
    pub fn jmp(jump_offset: i32) -> Self {
        Self::jump(InstructionKind::JMP, jump_offset)
    }

    /// JSR by a relative distance.
    #[must_use]
    pub fn jsr(jump_offset: i32) -> Self {
        Self::jump(InstructionKind::JSR, jump_offset)
    }

    /// JZ by a relative distance.
    #[must_use]
    pub fn jz(jump_offset: i32) -> Self {
        Self::jump(InstructionKind::JZ, jump_offset)
    }

    /// JNZ by a relative distance.
    #[must_use]
    pub fn jnz(jump_offset: i32) -> Self {
        Self::jump(InstructionKind::JNZ, jump_offset)
    }

    /// CONSTI loading an integer.
    #[must_use]
    pub fn consti(value: i32) -> Self {
        Self {
            value: Some(Variable::Int(value)),
            ..Self::new(InstructionKind::CONSTI)
        }
    }

    /// CONSTF loading a float.
    #[must_use]
    pub fn constf(value: f32) -> Self {
        Self {
            value: Some(Variable::Float(value)),
            ..Self::new(InstructionKind::CONSTF)
        }
    }

    /// CONSTS loading a string.
    #[must_use]
    pub fn consts(value: impl Into<String>) -> Self {
        Self {
            value: Some(Variable::String(value.into())),
            ..Self::new(InstructionKind::CONSTS)
        }
    }

    /// CONSTO loading an object id.
    #[must_use]
    pub fn consto(object_id: u32) -> Self {
        Self {
            value: Some(Variable::Object(object_id)),
            ..Self::new(InstructionKind::CONSTO)
        }
    }

    /// ACTION calling an engine routine.
    #[must_use]
    pub fn action(routine: u16, argument_count: u8) -> Self {
        Self {
            routine,
            argument_count,
            ..Self::new(InstructionKind::ACTION)
        }
    }

    /// A stack copy (CPDOWNSP, CPTOPSP, CPDOWNBP or CPTOPBP).
    #[must_use]
    pub fn copy(kind: InstructionKind, stack_offset: i32, size: u16) -> Self {
        Self {
            stack_offset,
            size,
            ..Self::new(kind)
        }
    }

    /// CPDOWNSP copying the top `size` bytes down to `stack_offset`.
    #[must_use]
    pub fn cpdownsp(stack_offset: i32, size: u16) -> Self {
        Self::copy(InstructionKind::CPDOWNSP, stack_offset, size)
    }

    /// CPTOPSP copying `size` bytes at `stack_offset` onto the top.
    #[must_use]
    pub fn cptopsp(stack_offset: i32, size: u16) -> Self {
        Self::copy(InstructionKind::CPTOPSP, stack_offset, size)
    }

    /// CPDOWNBP copying the top `size` bytes down to a global slot.
    #[must_use]
    pub fn cpdownbp(stack_offset: i32, size: u16) -> Self {
        Self::copy(InstructionKind::CPDOWNBP, stack_offset, size)
    }

    /// CPTOPBP copying a global slot onto the top.
    #[must_use]
    pub fn cptopbp(stack_offset: i32, size: u16) -> Self {
        Self::copy(InstructionKind::CPTOPBP, stack_offset, size)
    }

    /// MOVSP releasing `-stack_offset` bytes.
    #[must_use]
    pub fn movsp(stack_offset: i32) -> Self {
        Self {
            stack_offset,
            ..Self::new(InstructionKind::MOVSP)
        }
    }

    /// An in-place increment or decrement (DECISP, INCISP, DECIBP or INCIBP).
    #[must_use]
    pub fn step(kind: InstructionKind, stack_offset: i32) -> Self {
        Self {
            stack_offset,
            ..Self::new(kind)
        }
    }

    /// DESTRUCT releasing `size` bytes but keeping `size_no_destroy` bytes at `stack_offset`.
    #[must_use]
    pub fn destruct(size: u16, stack_offset: i32, size_no_destroy: u16) -> Self {
        Self {
            size,
            stack_offset,
            size_no_destroy,
            ..Self::new(InstructionKind::DESTRUCT)
        }
    }

    /// STORE_STATE capturing `size` bytes of globals and `size_locals` bytes of locals.
    #[must_use]
    pub fn store_state(size: u16, size_locals: i32) -> Self {
        Self {
            size,
            size_locals,
            ..Self::new(InstructionKind::STORE_STATE)
        }
    }

    /// EQUALTT or NEQUALTT comparing two structures of `size` bytes.
    #[must_use]
    pub fn compare_structures(kind: InstructionKind, size: u16) -> Self {
        Self {
            size,
            ..Self::new(kind)
        }
    }

    /// Number of bytes this instruction occupies in the code section.
    #[must_use]
    pub fn encoded_len(&self) -> u32 {
        match self.kind {
            InstructionKind::CPDOWNSP
            | InstructionKind::CPTOPSP
            | InstructionKind::CPDOWNBP
            | InstructionKind::CPTOPBP
            | InstructionKind::DESTRUCT => 8,
            InstructionKind::CONSTI
            | InstructionKind::CONSTF
            | InstructionKind::CONSTO
            | InstructionKind::MOVSP
            | InstructionKind::JMP
            | InstructionKind::JSR
            | InstructionKind::JZ
            | InstructionKind::JNZ
            | InstructionKind::DECISP
            | InstructionKind::INCISP
            | InstructionKind::DECIBP
            | InstructionKind::INCIBP => 6,
            InstructionKind::CONSTS => match &self.value {
                Some(Variable::String(value)) => 4 + value.len() as u32,
                _ => 4,
            },
            InstructionKind::ACTION => 5,
            InstructionKind::STORE_STATE => 10,
            InstructionKind::EQUALTT | InstructionKind::NEQUALTT => 4,
            _ => 2,
        }
    }

    /// Absolute target of a jump-style instruction.
    #[must_use]
    pub fn jump_target(&self) -> u32 {
        self.offset.wrapping_add_signed(self.jump_offset)
    }

    /// Returns `true` if this is a jump-style instruction targeting an earlier offset or
    /// itself.
    #[must_use]
    pub fn is_backward_jump(&self) -> bool {
        self.kind.is_jump() && self.jump_offset <= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(InstructionKind::RSADDI.code(), 0x0302);
        assert_eq!(InstructionKind::RSADDI.opcode(), 0x02);
        assert_eq!(InstructionKind::RSADDI.qualifier(), 0x03);
        assert_eq!(InstructionKind::STORE_STATE.qualifier(), 0x10);
    }

    #[test]
    fn test_codes_are_unique() {
        let mut codes: Vec<u16> = InstructionKind::iter().map(InstructionKind::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), InstructionKind::COUNT);
    }

    #[test]
    fn test_try_from_code() {
        assert_eq!(
            InstructionKind::try_from(0x2014).ok(),
            Some(InstructionKind::ADDII)
        );
        assert!(matches!(
            InstructionKind::try_from(0x7777),
            Err(Error::UnknownOpcode(0x7777))
        ));
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(InstructionKind::STORE_STATE.to_string(), "STORE_STATE");
        assert_eq!(InstructionKind::EQUALEFFEFF.to_string(), "EQUALEFFEFF");
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Instruction::jsr(8).encoded_len(), 6);
        assert_eq!(Instruction::new(InstructionKind::RETN).encoded_len(), 2);
        assert_eq!(Instruction::cpdownsp(-8, 4).encoded_len(), 8);
        assert_eq!(Instruction::consts("abc").encoded_len(), 7);
        assert_eq!(Instruction::action(142, 3).encoded_len(), 5);
        assert_eq!(Instruction::store_state(8, 0).encoded_len(), 10);
        assert_eq!(
            Instruction::compare_structures(InstructionKind::EQUALTT, 8).encoded_len(),
            4
        );
    }

    #[test]
    fn test_jump_target() {
        let mut jump = Instruction::jnz(-22);
        jump.offset = 100;
        assert_eq!(jump.jump_target(), 78);
        assert!(jump.is_backward_jump());
        assert!(!Instruction::movsp(-4).is_backward_jump());
        assert!(Instruction::jmp(0).is_backward_jump());
        assert!(!Instruction::jmp(6).is_backward_jump());
    }
}
