use byteorder::WriteBytesExt;
use std::io::Result;

/// Write an unsigned LEB128 value (7 bits per byte, low groups first)
pub fn write_uleb128<W: WriteBytesExt>(writer: &mut W, mut value: u32) -> Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            return writer.write_u8(byte);
        }
        writer.write_u8(byte | 0x80)?;
    }
}

/// Number of bytes `write_uleb128` produces for this value
pub fn uleb128_size(value: u32) -> usize {
    let significant_bits = 32 - value.leading_zeros() as usize;
    std::cmp::max(1, (significant_bits + 6) / 7)
}

/// Read an unsigned LEB128 value from the front of a buffer
///
/// Returns the value and the number of bytes it occupied, or `None` if the buffer ends before the
/// value does or the encoding is longer than the 5 bytes a `u32` can need.
pub fn read_uleb128(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, byte) in bytes.iter().take(5).enumerate() {
        let group = (byte & 0x7f) as u32;
        if i == 4 && group > 0x0f {
            return None;
        }
        value |= group << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}
