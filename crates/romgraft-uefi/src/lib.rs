//! UEFI image structures and the microcode grafting engine
//!
//! Format crate for romgraft: the FFS file codec, the Intel microcode
//! update codec, the concatenated-update walker, and the
//! [`MicrocodePatcher`] engine that ties them to the core scanner.

pub mod chain;
pub mod ffs;
pub mod patcher;
pub mod report;
pub mod ucode;

// Re-export commonly used types
pub use chain::{walk_chain, ChainReport, UpdateEntry};
pub use ffs::{FfsFile, FfsHeader, Guid, FFS_HEADER_LEN, UCODE_FFS_GUID};
pub use patcher::{patch_body, MicrocodePatcher, PatchError, FILL_BYTE};
pub use report::{
    PatchReport, PatchedRecord, RecordOutcome, RecordStatus, ScanReport, ScannedRecord,
};
pub use ucode::{UcodeFile, UcodeHeader, UCODE_HEADER_LEN};
