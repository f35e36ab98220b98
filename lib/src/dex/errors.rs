use super::DexPc;

#[derive(Debug)]
pub enum Error {
    /// Code items are made of 16-bit code units, so their byte length must be even
    OddCodeLength(usize),

    /// The instruction starting here runs past the end of the code item
    TruncatedInstruction(DexPc),
}
