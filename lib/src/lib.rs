//! Quickening and dequickening of dex bytecode
//!
//! ```
//! use dexquicken::dex::{CodeItem, DexFileId, DexPc, MethodAccessFlags, MethodReference};
//! use dexquicken::quicken::{self, CompilationUnit, ResolvedField, Resolver, Settings};
//!
//! struct Fields;
//!
//! impl Resolver for Fields {
//!     fn requires_constructor_barrier(&self, _: DexFileId, _: u16) -> bool {
//!         false
//!     }
//!     fn is_safe_cast(&self, _: MethodReference, _: DexPc) -> bool {
//!         false
//!     }
//!     fn resolve_instance_field(
//!         &self,
//!         _: MethodReference,
//!         _field_index: u16,
//!         _is_put: bool,
//!     ) -> Option<ResolvedField> {
//!         Some(ResolvedField { offset: 12, is_volatile: false })
//!     }
//!     fn resolve_virtual_method(&self, _: MethodReference, _: u16) -> Option<u32> {
//!         None
//!     }
//! }
//!
//! // iget v0, v1, field@5 ; return-void
//! let original = CodeItem::new(vec![0x1052, 0x0005, 0x000e]);
//!
//! let settings = Settings::new();
//! let unit = CompilationUnit {
//!     method: MethodReference::new(DexFileId(0), 0),
//!     class_def_index: 0,
//!     access_flags: MethodAccessFlags::PUBLIC,
//!     resolver: &Fields,
//!     settings: &settings,
//! };
//! let mut code = original.clone();
//! let quickened = quicken::compile_method(&unit, &mut code).unwrap();
//! assert_eq!(code.units(), &[0x10e3, 0x000c, 0x0073]);
//!
//! quicken::dequicken(&mut code, quickened.table(), true);
//! assert_eq!(code, original);
//! ```

pub mod dex;
pub mod quicken;
mod util;
