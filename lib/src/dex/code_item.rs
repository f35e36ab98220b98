use super::{Error, Format, Opcode};
use crate::util::Width;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Offset into a method's instructions, measured in 16-bit code units
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DexPc(pub u32);

impl DexPc {
    pub const START: DexPc = DexPc(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Position `units` code units further along, saturating at the largest representable pc
    pub fn advance(self, units: usize) -> DexPc {
        u32::try_from(units)
            .ok()
            .and_then(|units| self.0.checked_add(units))
            .map_or(DexPc(u32::MAX), DexPc)
    }
}

impl fmt::Debug for DexPc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifying first code units of the payload pseudo-instructions (which all have opcode `nop`)
const PACKED_SWITCH_SIGNATURE: u16 = 0x0100;
const SPARSE_SWITCH_SIGNATURE: u16 = 0x0200;
const FILL_ARRAY_DATA_SIGNATURE: u16 = 0x0300;

/// Instructions of one method body
///
/// The length is fixed: rewriting an instruction never changes its width, so in-place edits are
/// all that is needed (and all that is allowed).
#[derive(Clone, Eq, PartialEq)]
pub struct CodeItem {
    insns: Box<[u16]>,
}

impl CodeItem {
    pub fn new(insns: Vec<u16>) -> CodeItem {
        CodeItem {
            insns: insns.into_boxed_slice(),
        }
    }

    /// Decode little-endian code units, checking that every instruction fits
    pub fn from_le_bytes(bytes: &[u8]) -> Result<CodeItem, Error> {
        if bytes.len() % 2 != 0 {
            return Err(Error::OddCodeLength(bytes.len()));
        }
        let mut insns = vec![0u16; bytes.len() / 2];
        LittleEndian::read_u16_into(bytes, &mut insns);
        let code_item = CodeItem::new(insns);
        code_item.check_instructions()?;
        Ok(code_item)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.insns.len() * 2];
        LittleEndian::write_u16_into(&self.insns, &mut bytes);
        bytes
    }

    /// Check that the instruction stream ends exactly at the end of the code item
    pub fn check_instructions(&self) -> Result<(), Error> {
        for (dex_pc, insn) in self.instructions() {
            if insn.width() > self.insns.len() - dex_pc.index() {
                return Err(Error::TruncatedInstruction(dex_pc));
            }
        }
        Ok(())
    }

    pub fn units(&self) -> &[u16] {
        &self.insns
    }

    /// Size in code units
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn end(&self) -> DexPc {
        DexPc(self.insns.len() as u32)
    }

    pub fn instruction_at(&self, dex_pc: DexPc) -> Instruction<'_> {
        Instruction {
            units: &self.insns[dex_pc.index()..],
        }
    }

    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            units: &self.insns,
            dex_pc: DexPc::START,
        }
    }

    /// Replace the opcode, keeping the high byte of the first code unit
    pub fn set_opcode(&mut self, dex_pc: DexPc, opcode: Opcode) {
        let unit = &mut self.insns[dex_pc.index()];
        *unit = (*unit & 0xff00) | opcode.0 as u16;
    }

    /// Set the `AA` register of a 10x instruction (only ever 0 in valid code)
    pub fn set_vreg_a_10x(&mut self, dex_pc: DexPc, value: u8) {
        debug_assert_eq!(self.instruction_at(dex_pc).opcode().format(), Format::F10x);
        let unit = &mut self.insns[dex_pc.index()];
        *unit = (*unit & 0x00ff) | ((value as u16) << 8);
    }

    /// Set the `AA` register of a 21c instruction
    pub fn set_vreg_a_21c(&mut self, dex_pc: DexPc, value: u8) {
        debug_assert_eq!(self.instruction_at(dex_pc).opcode().format(), Format::F21c);
        let unit = &mut self.insns[dex_pc.index()];
        *unit = (*unit & 0x00ff) | ((value as u16) << 8);
    }

    /// Set the 16-bit reference operand (type, field, or method index, or its quick replacement)
    ///
    /// This is `BBBB` for 21c/35c/3rc and `CCCC` for 22c: in all cases the second code unit.
    pub fn set_reference_index(&mut self, dex_pc: DexPc, value: u16) {
        debug_assert!(matches!(
            self.instruction_at(dex_pc).opcode().format(),
            Format::F21c | Format::F22c | Format::F35c | Format::F3rc
        ));
        self.insns[dex_pc.index() + 1] = value;
    }
}

impl fmt::Debug for CodeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.instructions()).finish()
    }
}

/// View of one instruction, borrowed from its code item
#[derive(Copy, Clone)]
pub struct Instruction<'c> {
    /// Code units from the start of this instruction to the end of the method
    units: &'c [u16],
}

impl<'c> Instruction<'c> {
    pub fn opcode(&self) -> Opcode {
        Opcode((self.units[0] & 0xff) as u8)
    }

    /// Code units making up this instruction
    pub fn units(&self) -> &'c [u16] {
        &self.units[..std::cmp::min(self.width(), self.units.len())]
    }

    /// `AA` register of a 21c instruction
    pub fn vreg_a_21c(&self) -> u8 {
        debug_assert_eq!(self.opcode().format(), Format::F21c);
        (self.units[0] >> 8) as u8
    }

    /// `BBBB` operand of a 21c instruction (eg. the type of a `check-cast`)
    pub fn vreg_b_21c(&self) -> u16 {
        debug_assert_eq!(self.opcode().format(), Format::F21c);
        self.units[1]
    }

    /// `CCCC` operand of a 22c instruction (eg. the field of an `iget`)
    pub fn vreg_c_22c(&self) -> u16 {
        debug_assert_eq!(self.opcode().format(), Format::F22c);
        self.units[1]
    }

    /// `BBBB` operand of a 35c instruction (eg. the method of an `invoke-virtual`)
    pub fn vreg_b_35c(&self) -> u16 {
        debug_assert_eq!(self.opcode().format(), Format::F35c);
        self.units[1]
    }

    /// `BBBB` operand of a 3rc instruction (eg. the method of an `invoke-virtual/range`)
    pub fn vreg_b_3rc(&self) -> u16 {
        debug_assert_eq!(self.opcode().format(), Format::F3rc);
        self.units[1]
    }

    fn unit_or_zero(&self, idx: usize) -> usize {
        self.units.get(idx).copied().unwrap_or(0) as usize
    }
}

impl<'c> Width for Instruction<'c> {
    fn width(&self) -> usize {
        match self.units[0] {
            PACKED_SWITCH_SIGNATURE => 4 + self.unit_or_zero(1) * 2,
            SPARSE_SWITCH_SIGNATURE => 2 + self.unit_or_zero(1) * 4,
            FILL_ARRAY_DATA_SIGNATURE => {
                let element_width = self.unit_or_zero(1);
                let size = self.unit_or_zero(2) | (self.unit_or_zero(3) << 16);
                4usize.saturating_add(size.saturating_mul(element_width).saturating_add(1) / 2)
            }
            _ => self.opcode().format().width(),
        }
    }
}

impl<'c> fmt::Debug for Instruction<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode())?;
        for unit in self.units() {
            write!(f, " {:04x}", unit)?;
        }
        Ok(())
    }
}

/// Iterator over the instructions of a code item, in program order
pub struct Instructions<'c> {
    units: &'c [u16],
    dex_pc: DexPc,
}

impl<'c> Iterator for Instructions<'c> {
    type Item = (DexPc, Instruction<'c>);

    fn next(&mut self) -> Option<Self::Item> {
        let units = self.units.get(self.dex_pc.index()..).filter(|u| !u.is_empty())?;
        let insn = Instruction { units };
        let dex_pc = self.dex_pc;
        // An instruction running past the end is the last one
        self.dex_pc = dex_pc.advance(std::cmp::min(insn.width(), units.len()));
        Some((dex_pc, insn))
    }
}
