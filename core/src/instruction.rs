//! 32-bit instruction encoding: `opcode:8 | op_a:12 | op_b:12`, aliased with
//! `opcode:8 | op_long:24` for single-operand forms.
//!
//! The bit widths match the source language's own encoding so bytecode stays
//! binary-compatible with it; see `Opcode::from_u8` for the inverse of the
//! `as u8` cast used when packing.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    NoOp,
    Return,
    ReturnValue,
    Reserve,
    Move,
    LoadConstant,
    NegationInt,
    NegationFloat,
    IntToFloat,
    FloatToInt,
    AddInt,
    SubtractInt,
    MultiplyInt,
    DivideInt,
    ModuloInt,
    AddFloat,
    SubtractFloat,
    MultiplyFloat,
    DivideFloat,
}

impl Opcode {
    /// Inverse of the opcode byte produced by packing; panics on a byte that
    /// was never emitted by this code generator (there is no way to recover
    /// from a corrupt bytecode stream short of rejecting it outright).
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0 => Opcode::NoOp,
            1 => Opcode::Return,
            2 => Opcode::ReturnValue,
            3 => Opcode::Reserve,
            4 => Opcode::Move,
            5 => Opcode::LoadConstant,
            6 => Opcode::NegationInt,
            7 => Opcode::NegationFloat,
            8 => Opcode::IntToFloat,
            9 => Opcode::FloatToInt,
            10 => Opcode::AddInt,
            11 => Opcode::SubtractInt,
            12 => Opcode::MultiplyInt,
            13 => Opcode::DivideInt,
            14 => Opcode::ModuloInt,
            15 => Opcode::AddFloat,
            16 => Opcode::SubtractFloat,
            17 => Opcode::MultiplyFloat,
            18 => Opcode::DivideFloat,
            other => panic!("invalid opcode byte {other}"),
        }
    }
}

const OPCODE_BITS: u32 = 8;
const OP_A_BITS: u32 = 12;
const OP_B_BITS: u32 = 12;
const OP_LONG_BITS: u32 = 24;

const OPCODE_SHIFT: u32 = 32 - OPCODE_BITS;
const OP_A_SHIFT: u32 = OPCODE_SHIFT - OP_A_BITS;
const OP_B_SHIFT: u32 = OP_A_SHIFT - OP_B_BITS;
const OP_LONG_SHIFT: u32 = OPCODE_SHIFT - OP_LONG_BITS;

const OP_A_MAX: u32 = (1 << OP_A_BITS) - 1;
const OP_B_MAX: u32 = (1 << OP_B_BITS) - 1;
const OP_LONG_MAX: u32 = (1 << OP_LONG_BITS) - 1;

/// A single packed 32-bit instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instruction(u32);

impl Instruction {
    pub const fn bare(opcode: Opcode) -> Self {
        Self((opcode as u32) << OPCODE_SHIFT)
    }

    /// Packs `opcode` with two 12-bit operands. Panics if either operand
    /// doesn't fit — the code generator never issues register numbers this
    /// large, since the VM's register window itself is far smaller.
    pub fn two_op(opcode: Opcode, op_a: u32, op_b: u32) -> Self {
        debug_assert!(op_a <= OP_A_MAX, "op_a {op_a} exceeds 12 bits");
        debug_assert!(op_b <= OP_B_MAX, "op_b {op_b} exceeds 12 bits");
        Self(((opcode as u32) << OPCODE_SHIFT) | (op_a << OP_A_SHIFT) | (op_b << OP_B_SHIFT))
    }

    /// Packs `opcode` with a single 24-bit operand.
    pub fn long_op(opcode: Opcode, op_long: u32) -> Self {
        debug_assert!(op_long <= OP_LONG_MAX, "op_long {op_long} exceeds 24 bits");
        Self(((opcode as u32) << OPCODE_SHIFT) | (op_long << OP_LONG_SHIFT))
    }

    pub fn opcode(self) -> Opcode {
        Opcode::from_u8((self.0 >> OPCODE_SHIFT) as u8)
    }

    pub fn op_a(self) -> u32 {
        (self.0 >> OP_A_SHIFT) & OP_A_MAX
    }

    pub fn op_b(self) -> u32 {
        (self.0 >> OP_B_SHIFT) & OP_B_MAX
    }

    pub fn op_long(self) -> u32 {
        (self.0 >> OP_LONG_SHIFT) & OP_LONG_MAX
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn two_op_round_trips() {
        let ins = Instruction::two_op(Opcode::AddInt, 5, 4000);
        assert_eq!(ins.opcode(), Opcode::AddInt);
        assert_eq!(ins.op_a(), 5);
        assert_eq!(ins.op_b(), 4000);
    }

    #[test]
    fn long_op_round_trips() {
        let ins = Instruction::long_op(Opcode::ReturnValue, 1_000_000);
        assert_eq!(ins.opcode(), Opcode::ReturnValue);
        assert_eq!(ins.op_long(), 1_000_000);
    }

    #[test]
    fn bare_has_zero_operands() {
        let ins = Instruction::bare(Opcode::NoOp);
        assert_eq!(ins.opcode(), Opcode::NoOp);
        assert_eq!(ins.op_a(), 0);
        assert_eq!(ins.op_b(), 0);
    }
}
