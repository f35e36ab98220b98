//! Dex opcodes and instruction formats
//!
//! Only the low byte of an instruction's first code unit is the opcode. The engine cares about a
//! handful of them by name, but it has to know the format (and hence the width) of every one of
//! them in order to walk a method body.
//!
//! [0]: https://source.android.com/docs/core/runtime/dalvik-bytecode

use crate::util::Width;
use std::fmt;

/// Instruction format, named as in the Dalvik format reference (`<units><registers><kind>`)
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Format {
    F10x,
    F12x,
    F11n,
    F11x,
    F10t,
    F20t,
    F22x,
    F21t,
    F21s,
    F21h,
    F21c,
    F23x,
    F22b,
    F22t,
    F22s,
    F22c,
    F32x,
    F30t,
    F31t,
    F31i,
    F31c,
    F35c,
    F3rc,
    F45cc,
    F4rcc,
    F51l,
}

impl Width for Format {
    fn width(&self) -> usize {
        match self {
            Format::F10x
            | Format::F12x
            | Format::F11n
            | Format::F11x
            | Format::F10t => 1,

            Format::F20t
            | Format::F22x
            | Format::F21t
            | Format::F21s
            | Format::F21h
            | Format::F21c
            | Format::F23x
            | Format::F22b
            | Format::F22t
            | Format::F22s
            | Format::F22c => 2,

            Format::F32x
            | Format::F30t
            | Format::F31t
            | Format::F31i
            | Format::F31c
            | Format::F35c
            | Format::F3rc => 3,

            Format::F45cc | Format::F4rcc => 4,

            Format::F51l => 5,
        }
    }
}

/// Dex opcode (low byte of the first code unit of an instruction)
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Opcode(pub u8);

impl Opcode {
    pub const NOP: Opcode = Opcode(0x00);
    pub const RETURN_VOID: Opcode = Opcode(0x0e);
    pub const CHECK_CAST: Opcode = Opcode(0x1f);

    pub const IGET: Opcode = Opcode(0x52);
    pub const IGET_WIDE: Opcode = Opcode(0x53);
    pub const IGET_OBJECT: Opcode = Opcode(0x54);
    pub const IGET_BOOLEAN: Opcode = Opcode(0x55);
    pub const IGET_BYTE: Opcode = Opcode(0x56);
    pub const IGET_CHAR: Opcode = Opcode(0x57);
    pub const IGET_SHORT: Opcode = Opcode(0x58);
    pub const IPUT: Opcode = Opcode(0x59);
    pub const IPUT_WIDE: Opcode = Opcode(0x5a);
    pub const IPUT_OBJECT: Opcode = Opcode(0x5b);
    pub const IPUT_BOOLEAN: Opcode = Opcode(0x5c);
    pub const IPUT_BYTE: Opcode = Opcode(0x5d);
    pub const IPUT_CHAR: Opcode = Opcode(0x5e);
    pub const IPUT_SHORT: Opcode = Opcode(0x5f);

    pub const INVOKE_VIRTUAL: Opcode = Opcode(0x6e);
    pub const RETURN_VOID_NO_BARRIER: Opcode = Opcode(0x73);
    pub const INVOKE_VIRTUAL_RANGE: Opcode = Opcode(0x74);

    pub const IGET_QUICK: Opcode = Opcode(0xe3);
    pub const IGET_WIDE_QUICK: Opcode = Opcode(0xe4);
    pub const IGET_OBJECT_QUICK: Opcode = Opcode(0xe5);
    pub const IPUT_QUICK: Opcode = Opcode(0xe6);
    pub const IPUT_WIDE_QUICK: Opcode = Opcode(0xe7);
    pub const IPUT_OBJECT_QUICK: Opcode = Opcode(0xe8);
    pub const INVOKE_VIRTUAL_QUICK: Opcode = Opcode(0xe9);
    pub const INVOKE_VIRTUAL_RANGE_QUICK: Opcode = Opcode(0xea);
    pub const IPUT_BOOLEAN_QUICK: Opcode = Opcode(0xeb);
    pub const IPUT_BYTE_QUICK: Opcode = Opcode(0xec);
    pub const IPUT_CHAR_QUICK: Opcode = Opcode(0xed);
    pub const IPUT_SHORT_QUICK: Opcode = Opcode(0xee);
    pub const IGET_BOOLEAN_QUICK: Opcode = Opcode(0xef);
    pub const IGET_BYTE_QUICK: Opcode = Opcode(0xf0);
    pub const IGET_CHAR_QUICK: Opcode = Opcode(0xf1);
    pub const IGET_SHORT_QUICK: Opcode = Opcode(0xf2);

    /// Generic and quick forms of every quickenable instruction
    const QUICKENING_PAIRS: [(Opcode, Opcode); 16] = [
        (Opcode::IGET, Opcode::IGET_QUICK),
        (Opcode::IGET_WIDE, Opcode::IGET_WIDE_QUICK),
        (Opcode::IGET_OBJECT, Opcode::IGET_OBJECT_QUICK),
        (Opcode::IGET_BOOLEAN, Opcode::IGET_BOOLEAN_QUICK),
        (Opcode::IGET_BYTE, Opcode::IGET_BYTE_QUICK),
        (Opcode::IGET_CHAR, Opcode::IGET_CHAR_QUICK),
        (Opcode::IGET_SHORT, Opcode::IGET_SHORT_QUICK),
        (Opcode::IPUT, Opcode::IPUT_QUICK),
        (Opcode::IPUT_WIDE, Opcode::IPUT_WIDE_QUICK),
        (Opcode::IPUT_OBJECT, Opcode::IPUT_OBJECT_QUICK),
        (Opcode::IPUT_BOOLEAN, Opcode::IPUT_BOOLEAN_QUICK),
        (Opcode::IPUT_BYTE, Opcode::IPUT_BYTE_QUICK),
        (Opcode::IPUT_CHAR, Opcode::IPUT_CHAR_QUICK),
        (Opcode::IPUT_SHORT, Opcode::IPUT_SHORT_QUICK),
        (Opcode::INVOKE_VIRTUAL, Opcode::INVOKE_VIRTUAL_QUICK),
        (Opcode::INVOKE_VIRTUAL_RANGE, Opcode::INVOKE_VIRTUAL_RANGE_QUICK),
    ];

    /// Quick counterpart of a generic instruction
    pub fn quickened(self) -> Option<Opcode> {
        Opcode::QUICKENING_PAIRS
            .iter()
            .find(|(generic, _)| *generic == self)
            .map(|(_, quick)| *quick)
    }

    /// Generic counterpart of a quick instruction
    pub fn dequickened(self) -> Option<Opcode> {
        Opcode::QUICKENING_PAIRS
            .iter()
            .find(|(_, quick)| *quick == self)
            .map(|(generic, _)| *generic)
    }

    /// Is this a quick form, carrying a resolved offset where its generic form has an index?
    ///
    /// `RETURN_VOID_NO_BARRIER` is not one: it carries no operand at all.
    pub fn is_quickened(self) -> bool {
        self.dequickened().is_some()
    }

    /// Classify field accesses (generic or quick)
    pub fn field_access(self) -> Option<FieldAccess> {
        let (generic, quick) = *Opcode::QUICKENING_PAIRS[..14]
            .iter()
            .find(|(generic, quick)| *generic == self || *quick == self)?;
        Some(FieldAccess {
            generic,
            quick,
            is_put: (Opcode::IPUT.0..=Opcode::IPUT_SHORT.0).contains(&generic.0),
        })
    }

    /// Classify virtual invocations (generic or quick)
    pub fn virtual_invoke(self) -> Option<VirtualInvoke> {
        match self {
            Opcode::INVOKE_VIRTUAL | Opcode::INVOKE_VIRTUAL_QUICK => Some(VirtualInvoke {
                generic: Opcode::INVOKE_VIRTUAL,
                quick: Opcode::INVOKE_VIRTUAL_QUICK,
                is_range: false,
            }),
            Opcode::INVOKE_VIRTUAL_RANGE | Opcode::INVOKE_VIRTUAL_RANGE_QUICK => {
                Some(VirtualInvoke {
                    generic: Opcode::INVOKE_VIRTUAL_RANGE,
                    quick: Opcode::INVOKE_VIRTUAL_RANGE_QUICK,
                    is_range: true,
                })
            }
            _ => None,
        }
    }

    pub fn format(self) -> Format {
        match self.0 {
            0x00 => Format::F10x,
            0x01 | 0x04 | 0x07 => Format::F12x,
            0x02 | 0x05 | 0x08 => Format::F22x,
            0x03 | 0x06 | 0x09 => Format::F32x,
            0x0a..=0x0d => Format::F11x,
            0x0e => Format::F10x,
            0x0f..=0x11 => Format::F11x,
            0x12 => Format::F11n,
            0x13 | 0x16 => Format::F21s,
            0x14 | 0x17 => Format::F31i,
            0x15 | 0x19 => Format::F21h,
            0x18 => Format::F51l,
            0x1a => Format::F21c,
            0x1b => Format::F31c,
            0x1c => Format::F21c,
            0x1d | 0x1e => Format::F11x,
            0x1f => Format::F21c,
            0x20 => Format::F22c,
            0x21 => Format::F12x,
            0x22 => Format::F21c,
            0x23 => Format::F22c,
            0x24 => Format::F35c,
            0x25 => Format::F3rc,
            0x26 => Format::F31t,
            0x27 => Format::F11x,
            0x28 => Format::F10t,
            0x29 => Format::F20t,
            0x2a => Format::F30t,
            0x2b | 0x2c => Format::F31t,
            0x2d..=0x31 => Format::F23x,
            0x32..=0x37 => Format::F22t,
            0x38..=0x3d => Format::F21t,
            0x3e..=0x43 => Format::F10x,
            0x44..=0x51 => Format::F23x,
            0x52..=0x5f => Format::F22c,
            0x60..=0x6d => Format::F21c,
            0x6e..=0x72 => Format::F35c,
            0x73 => Format::F10x,
            0x74..=0x78 => Format::F3rc,
            0x79 | 0x7a => Format::F10x,
            0x7b..=0x8f => Format::F12x,
            0x90..=0xaf => Format::F23x,
            0xb0..=0xcf => Format::F12x,
            0xd0..=0xd7 => Format::F22s,
            0xd8..=0xe2 => Format::F22b,
            0xe3..=0xe8 => Format::F22c,
            0xe9 => Format::F35c,
            0xea => Format::F3rc,
            0xeb..=0xf2 => Format::F22c,
            0xf3..=0xf9 => Format::F10x,
            0xfa => Format::F45cc,
            0xfb => Format::F4rcc,
            0xfc => Format::F35c,
            0xfd => Format::F3rc,
            0xfe | 0xff => Format::F21c,
        }
    }

    /// Mnemonic, for the opcodes the engine rewrites
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Opcode::NOP => "nop",
            Opcode::RETURN_VOID => "return-void",
            Opcode::CHECK_CAST => "check-cast",
            Opcode::IGET => "iget",
            Opcode::IGET_WIDE => "iget-wide",
            Opcode::IGET_OBJECT => "iget-object",
            Opcode::IGET_BOOLEAN => "iget-boolean",
            Opcode::IGET_BYTE => "iget-byte",
            Opcode::IGET_CHAR => "iget-char",
            Opcode::IGET_SHORT => "iget-short",
            Opcode::IPUT => "iput",
            Opcode::IPUT_WIDE => "iput-wide",
            Opcode::IPUT_OBJECT => "iput-object",
            Opcode::IPUT_BOOLEAN => "iput-boolean",
            Opcode::IPUT_BYTE => "iput-byte",
            Opcode::IPUT_CHAR => "iput-char",
            Opcode::IPUT_SHORT => "iput-short",
            Opcode::INVOKE_VIRTUAL => "invoke-virtual",
            Opcode::RETURN_VOID_NO_BARRIER => "return-void-no-barrier",
            Opcode::INVOKE_VIRTUAL_RANGE => "invoke-virtual/range",
            Opcode::IGET_QUICK => "iget-quick",
            Opcode::IGET_WIDE_QUICK => "iget-wide-quick",
            Opcode::IGET_OBJECT_QUICK => "iget-object-quick",
            Opcode::IPUT_QUICK => "iput-quick",
            Opcode::IPUT_WIDE_QUICK => "iput-wide-quick",
            Opcode::IPUT_OBJECT_QUICK => "iput-object-quick",
            Opcode::INVOKE_VIRTUAL_QUICK => "invoke-virtual-quick",
            Opcode::INVOKE_VIRTUAL_RANGE_QUICK => "invoke-virtual/range-quick",
            Opcode::IPUT_BOOLEAN_QUICK => "iput-boolean-quick",
            Opcode::IPUT_BYTE_QUICK => "iput-byte-quick",
            Opcode::IPUT_CHAR_QUICK => "iput-char-quick",
            Opcode::IPUT_SHORT_QUICK => "iput-short-quick",
            Opcode::IGET_BOOLEAN_QUICK => "iget-boolean-quick",
            Opcode::IGET_BYTE_QUICK => "iget-byte-quick",
            Opcode::IGET_CHAR_QUICK => "iget-char-quick",
            Opcode::IGET_SHORT_QUICK => "iget-short-quick",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "op_{:#04x}", self.0),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An instance field access (`iget*` or `iput*`), along with its quick form
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FieldAccess {
    pub generic: Opcode,
    pub quick: Opcode,
    pub is_put: bool,
}

/// A virtual invocation (`invoke-virtual` or its range form), along with its quick form
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct VirtualInvoke {
    pub generic: Opcode,
    pub quick: Opcode,
    pub is_range: bool,
}
