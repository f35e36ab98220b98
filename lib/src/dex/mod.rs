//! Model of dex method bodies
//!
//! A method body ("code item") is a flat array of 16-bit code units. Instructions are one to five
//! code units wide (payloads can be longer), with the opcode in the low byte of the first unit.
//! This module only models what quickening needs: walking instructions, reading and writing the
//! operands that get rewritten, and the method metadata that decides constructor barriers.

mod access_flags;
mod code_item;
mod errors;
mod method;
mod opcode;

pub use access_flags::*;
pub use code_item::*;
pub use errors::*;
pub use method::*;
pub use opcode::*;
