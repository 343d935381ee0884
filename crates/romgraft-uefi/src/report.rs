//! Report types produced by the grafting engine
//!
//! Scans and patch runs both report per-record outcomes; the CLI prints
//! them one by one or emits the whole report as JSON.

use crate::chain::ChainReport;
use crate::ffs::FfsHeader;
use serde::Serialize;

/// Outcome of one GUID hit during a patch run.
#[derive(Debug, Clone, Serialize)]
pub enum RecordOutcome {
    /// The record validated and its body was rewritten.
    Patched {
        /// FFS type byte of the patched file.
        file_type: u8,
        /// Body bytes rewritten (fill plus content).
        body_len: usize,
        /// Updates that lived in the body before the graft.
        previous: ChainReport,
    },
    /// The record validated but its body cannot hold the replacement.
    BodyTooSmall { content_len: usize, body_len: usize },
    /// The record failed validation and was left untouched.
    Skipped { reason: String },
}

/// One GUID hit and what the patch run did with it.
#[derive(Debug, Clone, Serialize)]
pub struct PatchedRecord {
    /// Offset of the hit within the image.
    pub offset: usize,
    pub outcome: RecordOutcome,
}

/// Full report of a patch run.
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    /// Image length in bytes; unchanged by the run.
    pub image_len: usize,
    /// Replacement content length in bytes.
    pub replacement_len: usize,
    /// Update chain found inside the replacement content itself.
    pub replacement: ChainReport,
    /// Every GUID hit, in scan order.
    pub records: Vec<PatchedRecord>,
    /// Records whose body was rewritten.
    pub records_patched: usize,
    /// Total body bytes rewritten across all patched records.
    pub bytes_filled: usize,
}

/// Validity of one GUID hit during a non-mutating scan.
#[derive(Debug, Clone, Serialize)]
pub enum RecordStatus {
    /// The record validated; its body chain was walked.
    Valid {
        header: FfsHeader,
        body_len: usize,
        /// Updates found inside the body.
        microcode: ChainReport,
    },
    /// The record failed validation.
    Invalid { reason: String },
}

/// One GUID hit found by a scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedRecord {
    /// Offset of the hit within the image.
    pub offset: usize,
    pub status: RecordStatus,
}

/// Full report of a non-mutating scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Image length in bytes.
    pub image_len: usize,
    /// Every GUID hit, in scan order.
    pub records: Vec<ScannedRecord>,
}
