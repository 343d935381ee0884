//! Concatenated update walking
//!
//! Vendors pack several microcode updates back to back in one FFS file
//! body, one per supported processor stepping. The walker decodes updates
//! until the first position that does not validate and reports what it
//! covered; finding none is a normal outcome, not an error.

use crate::ucode::{UcodeFile, UcodeHeader};
use serde::Serialize;

/// One valid update found by [`walk_chain`].
#[derive(Debug, Clone, Serialize)]
pub struct UpdateEntry {
    /// Offset of the update within the walked buffer.
    pub offset: usize,
    pub header: UcodeHeader,
}

/// Result of walking a buffer for concatenated updates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainReport {
    /// Updates found, in buffer order.
    pub updates: Vec<UpdateEntry>,
    /// Bytes covered by valid updates, from the start of the buffer.
    pub consumed: usize,
    /// Bytes left after the last valid update.
    pub trailing: usize,
}

impl ChainReport {
    /// Whether the walk found no valid update at all.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// Walk `data` for consecutive valid updates, stopping without error at
/// the first position that fails to decode or validate.
pub fn walk_chain(data: &[u8]) -> ChainReport {
    let mut updates = Vec::new();
    let mut offset = 0;

    while let Ok(update) = UcodeFile::parse(&data[offset..]) {
        updates.push(UpdateEntry {
            offset,
            header: update.header,
        });
        offset += update.len;
    }

    ChainReport {
        updates,
        consumed: offset,
        trailing: data.len() - offset,
    }
}
