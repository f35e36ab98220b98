#[derive(Debug)]
pub enum Error {
    /// The count at the start of a quicken table is not a valid unsigned LEB128
    MalformedTableHeader,

    /// The buffer ends before the last entry of the quicken table
    TruncatedTable {
        needed: usize,
        available: usize,
    },

    /// Checked access past the end of a quicken table
    IndexOutOfRange {
        index: usize,
        len: usize,
    },

    /// Quickening info section is inconsistent (bad header, or an offset outside the section)
    MalformedSection(&'static str),

    /// A method index was looked up that the section has no slot for
    MethodIndexOutOfRange {
        method_index: u32,
        num_method_ids: u32,
    },
}
