use std::fmt;

/// Identifies one dex file among those being compiled together
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct DexFileId(pub u32);

/// A method, named by its dex file and its index into that file's `method_ids`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MethodReference {
    pub dex_file: DexFileId,
    pub method_index: u32,
}

impl MethodReference {
    pub fn new(dex_file: DexFileId, method_index: u32) -> MethodReference {
        MethodReference {
            dex_file,
            method_index,
        }
    }
}

impl fmt::Debug for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dex{}:method@{}", self.dex_file.0, self.method_index)
    }
}

/// Identity of a code item inside its container (its offset in the dex file)
///
/// Two method declarations with the same `CodeItemId` share one method body.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CodeItemId(pub u32);

/// One method declaration, as found when scanning class data
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MethodDecl {
    pub method: MethodReference,
    pub code_item: CodeItemId,
}
