mod leb128;

pub use leb128::*;

/// Elements with a width in code units (eg. instructions in a method body)
pub trait Width {
    fn width(&self) -> usize;
}
