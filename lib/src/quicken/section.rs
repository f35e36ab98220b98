//! Quickening info section
//!
//! All quicken tables of one dex file live back-to-back in a single section, followed by an
//! offset table with one entry per method id:
//!
//! ```text
//! u32            num_method_ids
//! u32            offset_table_offset    (from the start of the section)
//! [u8]           quicken tables
//! [u32]          offsets                (num_method_ids entries)
//! ```
//!
//! An offset entry is `1 +` the byte offset of the method's table from the start of the tables,
//! or `0` if the method was not quickened. Methods with identical tables share one copy.

use super::{dequicken, Error, QuickenTable, QuickenedMethod, Serialize};
use crate::dex::{CodeItem, CodeItemId, MethodDecl};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::{HashMap, HashSet};

const HEADER_SIZE: usize = 8;

/// Accumulates the quicken tables of one dex file
pub struct QuickenSectionBuilder {
    num_method_ids: u32,

    /// Distinct table blobs, in insertion order
    blobs: Vec<Vec<u8>>,
    blob_indices: HashMap<Vec<u8>, usize>,

    /// For each method id, the blob holding its table
    methods: Vec<Option<usize>>,
}

impl QuickenSectionBuilder {
    pub fn new(num_method_ids: u32) -> QuickenSectionBuilder {
        QuickenSectionBuilder {
            num_method_ids,
            blobs: vec![],
            blob_indices: HashMap::new(),
            methods: vec![None; num_method_ids as usize],
        }
    }

    /// Set the quicken table of a method (replacing any previous one)
    ///
    /// The data must be exactly one quicken table.
    pub fn add(&mut self, method_index: u32, quicken_data: &[u8]) -> Result<(), Error> {
        self.check_method_index(method_index)?;
        let table = QuickenTable::new(quicken_data)?;
        if table.size_in_bytes() != quicken_data.len() {
            return Err(Error::MalformedSection(
                "quicken data has bytes past the end of its table",
            ));
        }

        let blob = match self.blob_indices.get(quicken_data) {
            Some(blob) => *blob,
            None => {
                let blob = self.blobs.len();
                self.blobs.push(quicken_data.to_vec());
                self.blob_indices.insert(quicken_data.to_vec(), blob);
                blob
            }
        };
        self.methods[method_index as usize] = Some(blob);
        Ok(())
    }

    /// Add a compiled method to the section
    pub fn add_method(&mut self, quickened: &QuickenedMethod) -> Result<(), Error> {
        self.add(quickened.method.method_index, &quickened.quicken_data)
    }

    /// Forget the quicken table of a method, returning whether it had one
    pub fn remove(&mut self, method_index: u32) -> Result<bool, Error> {
        self.check_method_index(method_index)?;
        Ok(self.methods[method_index as usize].take().is_some())
    }

    fn check_method_index(&self, method_index: u32) -> Result<(), Error> {
        if method_index >= self.num_method_ids {
            return Err(Error::MethodIndexOutOfRange {
                method_index,
                num_method_ids: self.num_method_ids,
            });
        }
        Ok(())
    }

    /// Lay out the section
    ///
    /// Only tables still referenced by some method are written.
    pub fn finish(self) -> Vec<u8> {
        let mut blob_offsets: Vec<Option<u32>> = vec![None; self.blobs.len()];
        let mut tables: Vec<u8> = vec![];
        for blob in self.methods.iter().flatten() {
            if blob_offsets[*blob].is_none() {
                blob_offsets[*blob] = Some(tables.len() as u32);
                tables.extend_from_slice(&self.blobs[*blob]);
            }
        }

        let mut section = vec![];
        let write = |section: &mut Vec<u8>| -> std::io::Result<()> {
            self.num_method_ids.serialize(section)?;
            ((HEADER_SIZE + tables.len()) as u32).serialize(section)?;
            section.extend_from_slice(&tables);
            for method in &self.methods {
                let entry = match method {
                    Some(blob) => blob_offsets[*blob].map_or(0, |offset| offset + 1),
                    None => 0,
                };
                entry.serialize(section)?;
            }
            Ok(())
        };
        write(&mut section).expect("in-memory write");
        section
    }
}

/// Read-only view of a quickening info section
#[derive(Copy, Clone, Debug)]
pub struct QuickenSection<'b> {
    num_method_ids: u32,
    tables: &'b [u8],
    offsets: &'b [u8],
}

impl<'b> QuickenSection<'b> {
    /// Check the header and the bounds of the offset table
    ///
    /// Individual tables are only decoded when they are looked up.
    pub fn new(bytes: &'b [u8]) -> Result<QuickenSection<'b>, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::MalformedSection("section is shorter than its header"));
        }
        let num_method_ids = LittleEndian::read_u32(&bytes[0..4]);
        let offset_table_offset = LittleEndian::read_u32(&bytes[4..8]) as usize;
        if offset_table_offset < HEADER_SIZE || offset_table_offset > bytes.len() {
            return Err(Error::MalformedSection("offset table is outside the section"));
        }
        let offsets_len = 4 * num_method_ids as usize;
        if bytes.len() - offset_table_offset < offsets_len {
            return Err(Error::MalformedSection("offset table is truncated"));
        }
        Ok(QuickenSection {
            num_method_ids,
            tables: &bytes[HEADER_SIZE..offset_table_offset],
            offsets: &bytes[offset_table_offset..offset_table_offset + offsets_len],
        })
    }

    pub fn num_method_ids(&self) -> u32 {
        self.num_method_ids
    }

    fn offset_entry(&self, method_index: u32) -> u32 {
        let start = 4 * method_index as usize;
        LittleEndian::read_u32(&self.offsets[start..start + 4])
    }

    /// Quicken table of a method, or `None` if the method was not quickened
    pub fn quicken_table_of(&self, method_index: u32) -> Result<Option<QuickenTable<'b>>, Error> {
        if method_index >= self.num_method_ids {
            return Err(Error::MethodIndexOutOfRange {
                method_index,
                num_method_ids: self.num_method_ids,
            });
        }
        let offset = match self.offset_entry(method_index) {
            0 => return Ok(None),
            entry => (entry - 1) as usize,
        };
        let tables = self.tables;
        match tables.get(offset..) {
            Some(rest) if !rest.is_empty() => Ok(Some(QuickenTable::new(rest)?)),
            _ => Err(Error::MalformedSection("quicken table offset is outside the section")),
        }
    }

    /// Method indices that have a quicken table, in increasing order
    pub fn quickened_methods(&self) -> impl Iterator<Item = u32> + 'b {
        let section = *self;
        (0..section.num_method_ids).filter(move |idx| section.offset_entry(*idx) != 0)
    }
}

/// Restore the code items of quickened methods
///
/// Methods without a quicken table, or whose code item is not in `code_items`, are left alone.
/// A code item shared by several methods is dequickened once. Returns how many code items were
/// dequickened.
pub fn unquicken_methods(
    section: &QuickenSection<'_>,
    methods: &[MethodDecl],
    code_items: &mut HashMap<CodeItemId, CodeItem>,
    decompile_return_instruction: bool,
) -> Result<usize, Error> {
    let mut restored: HashSet<CodeItemId> = HashSet::new();
    for decl in methods {
        let table = match section.quicken_table_of(decl.method.method_index)? {
            Some(table) => table,
            None => continue,
        };
        if restored.contains(&decl.code_item) {
            continue;
        }
        let code = match code_items.get_mut(&decl.code_item) {
            Some(code) => code,
            None => {
                log::debug!(
                    "No code item {:?} to unquicken for {:?}",
                    decl.code_item,
                    decl.method
                );
                continue;
            }
        };
        dequicken(code, table, decompile_return_instruction);
        restored.insert(decl.code_item);
    }
    log::debug!("Unquickened {} code items", restored.len());
    Ok(restored.len())
}
