//! Quicken info tables
//!
//! A quicken table holds the original operands of every instruction quickening touched, in
//! program order. There are no dex pcs in the table: a reader walks the (quickened) instructions
//! and pops the next value each time it meets an instruction for which `needs_index` holds. That
//! only works if producer and consumer agree exactly on which instructions those are, so both
//! sides check that the number of entries lines up.
//!
//! Wire format: an unsigned LEB128 count, then that many little-endian `u16`, no padding.

use super::{Error, Serialize, Uleb128};
use crate::dex::{DexPc, Instruction, Opcode};
use crate::util::{read_uleb128, uleb128_size};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Raw table value marking a `nop` that was a `nop` all along
pub const NO_INDEX: u16 = 0xffff;

/// One entry of a quicken table, tagged with what it means
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum QuickenSlot {
    /// A genuine `nop` (or a payload, which also has opcode `nop`)
    NoIndex,

    /// Original field or method index of a quickened field access or invocation
    MemberIndex(u16),

    /// One of the two values recorded for an elided `check-cast`: first its register, then its
    /// type index
    CheckCastHalf(u16),
}

impl QuickenSlot {
    /// Value as stored in the table
    pub fn raw(self) -> u16 {
        match self {
            QuickenSlot::NoIndex => NO_INDEX,
            QuickenSlot::MemberIndex(idx) | QuickenSlot::CheckCastHalf(idx) => idx,
        }
    }

    /// Interpret a table value that was read for a `nop`
    pub fn from_nop_value(raw: u16) -> QuickenSlot {
        if raw == NO_INDEX {
            QuickenSlot::NoIndex
        } else {
            QuickenSlot::CheckCastHalf(raw)
        }
    }
}

/// Does the instruction at this position own an entry in the quicken table?
///
/// This is the contract between the writer and the reader of a table, evaluated over the
/// _quickened_ instruction stream.
pub fn needs_index(insn: &Instruction<'_>) -> bool {
    let opcode = insn.opcode();
    opcode == Opcode::NOP || opcode.is_quickened()
}

/// Something quickening did (or would do) at one dex pc
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct QuickenRecord {
    pub dex_pc: DexPc,
    pub slot: QuickenSlot,
}

/// Encode a quicken table
pub fn encode(indices: &[u16]) -> Vec<u8> {
    let mut builder = QuickenTableBuilder::new(indices.len());
    for idx in indices {
        builder.add_index(*idx);
    }
    builder.finish()
}

/// Incrementally build a quicken table whose length is known upfront
pub struct QuickenTableBuilder {
    data: Vec<u8>,
    expected: usize,
    added: usize,
}

impl QuickenTableBuilder {
    pub fn new(count: usize) -> QuickenTableBuilder {
        let mut data = Vec::with_capacity(uleb128_size(count as u32) + 2 * count);
        Uleb128(count as u32)
            .serialize(&mut data)
            .expect("in-memory write");
        QuickenTableBuilder {
            data,
            expected: count,
            added: 0,
        }
    }

    pub fn add_index(&mut self, idx: u16) {
        assert!(
            self.added < self.expected,
            "quicken table declared with {} entries",
            self.expected
        );
        idx.serialize(&mut self.data).expect("in-memory write");
        self.added += 1;
    }

    pub fn add_slot(&mut self, slot: QuickenSlot) {
        self.add_index(slot.raw());
    }

    pub fn finish(self) -> Vec<u8> {
        assert_eq!(
            self.added, self.expected,
            "quicken table entries do not match its declared length"
        );
        self.data
    }
}

/// Decoded view of a quicken table
///
/// Only the header is decoded upfront; entries are read directly out of the buffer.
#[derive(Copy, Clone)]
pub struct QuickenTable<'b> {
    /// Exactly the bytes of this table (header included)
    bytes: &'b [u8],
    header_size: usize,
    len: usize,
}

impl QuickenTable<'static> {
    /// Table with no entries
    pub const EMPTY: QuickenTable<'static> = QuickenTable {
        bytes: &[0],
        header_size: 1,
        len: 0,
    };
}

impl<'b> QuickenTable<'b> {
    /// Wrap the table at the front of this buffer
    ///
    /// Trailing bytes are allowed, since tables are often concatenated.
    pub fn new(bytes: &'b [u8]) -> Result<QuickenTable<'b>, Error> {
        let (len, header_size) = read_uleb128(bytes).ok_or(Error::MalformedTableHeader)?;
        let len = len as usize;
        let needed = header_size + 2 * len;
        if bytes.len() < needed {
            return Err(Error::TruncatedTable {
                needed,
                available: bytes.len(),
            });
        }
        Ok(QuickenTable {
            bytes: &bytes[..needed],
            header_size,
            len,
        })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry at a position
    pub fn get(&self, index: usize) -> Result<u16, Error> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let offset = self.header_size + 2 * index;
        Ok(LittleEndian::read_u16(&self.bytes[offset..offset + 2]))
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + 'b {
        let bytes = self.bytes;
        bytes[self.header_size..]
            .chunks_exact(2)
            .map(LittleEndian::read_u16)
    }

    /// Size of the header plus entries
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &'b [u8] {
        self.bytes
    }

    pub fn reader(&self) -> QuickenTableReader<'b> {
        QuickenTableReader {
            table: *self,
            position: 0,
        }
    }
}

impl<'b> fmt::Debug for QuickenTable<'b> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Size of the table at the front of this buffer, so the next one can be found
pub fn size_in_bytes(bytes: &[u8]) -> Result<usize, Error> {
    QuickenTable::new(bytes).map(|table| table.size_in_bytes())
}

/// Sequential consumer of a quicken table
///
/// Reading past the end is fatal: it means the table and the instructions it describes have gone
/// out of sync.
pub struct QuickenTableReader<'b> {
    table: QuickenTable<'b>,
    position: usize,
}

impl<'b> QuickenTableReader<'b> {
    fn next_value(&mut self) -> u16 {
        match self.table.get(self.position) {
            Ok(value) => {
                self.position += 1;
                value
            }
            Err(_) => panic!(
                "Mismatched number of quicken slots: reading entry {} of a table with {}",
                self.position,
                self.table.len()
            ),
        }
    }

    /// Original index of a quickened field access or invocation
    pub fn next_member_index(&mut self) -> u16 {
        self.next_value()
    }

    /// Entry for a `nop`: either a genuine `nop` or the first half of an elided `check-cast`
    pub fn next_nop_slot(&mut self) -> QuickenSlot {
        QuickenSlot::from_nop_value(self.next_value())
    }

    /// Second half of an elided `check-cast` (its type index)
    pub fn next_check_cast_type(&mut self) -> u16 {
        self.next_value()
    }

    /// Number of entries read so far
    pub fn consumed(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position == self.table.len()
    }

    pub fn table(&self) -> QuickenTable<'b> {
        self.table
    }
}
