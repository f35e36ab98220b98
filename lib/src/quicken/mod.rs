//! Quickening of dex bytecode
//!
//! Quickening rewrites method bodies to use pre-resolved field offsets and vtable indices, and
//! drops checks that verification proved unnecessary. Everything it overwrites is recorded in a
//! quicken table, which is enough to restore the original instructions later on.

mod binary_format;
mod compiler;
mod decompiler;
mod errors;
mod section;
mod session;
mod settings;
mod table;
mod walker;

pub use binary_format::*;
pub use compiler::{
    compile_method, quicken, replay, CompilationUnit, QuickenOutcome, QuickenedMethod,
    ResolvedField, Resolver,
};
pub use decompiler::*;
pub use errors::*;
pub use section::*;
pub use session::*;
pub use settings::*;
pub use table::*;
