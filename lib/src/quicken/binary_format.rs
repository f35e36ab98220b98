use crate::util::write_uleb128;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing quickening data
///
/// Quickening data has a couple of conventions that make it worth having a trait for:
///
///   - multi-byte values are always little-endian
///   - counts are unsigned LEB128
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

/// Unsigned LEB128 encoded integer
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Uleb128(pub u32);

impl Serialize for Uleb128 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        write_uleb128(writer, self.0)
    }
}
