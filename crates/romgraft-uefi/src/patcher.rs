//! Microcode grafting engine
//!
//! Composes the scanner, the codecs, and the chain walker: find every
//! microcode FFS file by GUID, erase its body, and copy the replacement
//! update in. The image length never changes; a run that changes nothing
//! is an error and produces no output.

use crate::chain::walk_chain;
use crate::ffs::{FfsFile, Guid, UCODE_FFS_GUID};
use crate::report::{
    PatchReport, PatchedRecord, RecordOutcome, RecordStatus, ScanReport, ScannedRecord,
};
use crate::ucode::UcodeFile;
use romgraft_core::{find_all, find_from, ParseError};
use thiserror::Error;

/// Byte used to erase record bodies before the new content goes in.
pub const FILL_BYTE: u8 = 0xFF;

/// Errors while grafting a replacement update into an image.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The caller-supplied replacement does not validate. Fatal before
    /// any byte of the image is touched.
    #[error("Replacement microcode is invalid: {0}")]
    InvalidReplacement(#[from] ParseError),

    /// Replacement content does not fit the record body.
    #[error("Content length {content_len} exceeds record body length {body_len}")]
    ContentTooLarge { content_len: usize, body_len: usize },

    /// The run finished without changing a single byte. Fatal; the
    /// per-record report tells why each hit was skipped.
    #[error("No record was patched; the image is unchanged")]
    NoChange { report: PatchReport },
}

/// Erase `body` with [`FILL_BYTE`], then copy `content` over its front.
///
/// The remainder of the body keeps the fill value. Content longer than
/// the body is rejected before any byte is written.
pub fn patch_body(body: &mut [u8], content: &[u8]) -> Result<(), PatchError> {
    if content.len() > body.len() {
        return Err(PatchError::ContentTooLarge {
            content_len: content.len(),
            body_len: body.len(),
        });
    }

    body.fill(FILL_BYTE);
    body[..content.len()].copy_from_slice(content);
    Ok(())
}

/// In-place microcode replacement over a whole firmware image.
pub struct MicrocodePatcher {
    guid: Guid,
}

impl MicrocodePatcher {
    /// Patcher searching for the standard microcode file GUID.
    pub fn new() -> Self {
        Self {
            guid: UCODE_FFS_GUID,
        }
    }

    /// Patcher searching for a caller-chosen file GUID.
    pub fn with_guid(guid: Guid) -> Self {
        Self { guid }
    }

    /// Graft `ucode` into every matching record of `rom`.
    ///
    /// Returns a patched copy of the image together with the per-record
    /// report; the input is never mutated. Fails without producing any
    /// output when the replacement does not validate or when no record
    /// ends up patched.
    pub fn apply(&self, rom: &[u8], ucode: &[u8]) -> Result<(Vec<u8>, PatchReport), PatchError> {
        // The replacement must stand on its own before anything else.
        UcodeFile::parse(ucode)?;
        let replacement = walk_chain(ucode);

        let mut out = rom.to_vec();
        let needle = *self.guid.as_bytes();
        let mut records = Vec::new();
        let mut records_patched = 0;
        let mut bytes_filled = 0;

        // Scan the buffer being patched, resuming after each match, so a
        // GUID occurrence erased by an earlier graft is never revisited.
        let mut pos = 0;
        while let Some(offset) = find_from(&out, &needle, pos) {
            pos = offset + needle.len();

            let outcome = match FfsFile::parse(&out[offset..]) {
                Ok(file) => {
                    let body = offset + file.body.start..offset + file.body.end;
                    let previous = walk_chain(&out[body.clone()]);
                    match patch_body(&mut out[body.clone()], ucode) {
                        Ok(()) => {
                            records_patched += 1;
                            bytes_filled += body.len();
                            RecordOutcome::Patched {
                                file_type: file.header.file_type,
                                body_len: body.len(),
                                previous,
                            }
                        }
                        Err(PatchError::ContentTooLarge {
                            content_len,
                            body_len,
                        }) => RecordOutcome::BodyTooSmall {
                            content_len,
                            body_len,
                        },
                        Err(e) => return Err(e),
                    }
                }
                Err(e) => RecordOutcome::Skipped {
                    reason: e.to_string(),
                },
            };

            records.push(PatchedRecord { offset, outcome });
        }

        debug_assert_eq!(out.len(), rom.len());

        let report = PatchReport {
            image_len: rom.len(),
            replacement_len: ucode.len(),
            replacement,
            records,
            records_patched,
            bytes_filled,
        };

        if records_patched == 0 || out.as_slice() == rom {
            return Err(PatchError::NoChange { report });
        }

        Ok((out, report))
    }

    /// Inspect `rom` without mutating it: every GUID hit with its record
    /// status and any update chain embedded in the body.
    pub fn scan(&self, rom: &[u8]) -> ScanReport {
        let needle = self.guid.as_bytes();
        let mut records = Vec::new();

        for offset in find_all(rom, needle) {
            let status = match FfsFile::parse(&rom[offset..]) {
                Ok(file) => RecordStatus::Valid {
                    header: file.header,
                    body_len: file.body_len(),
                    microcode: walk_chain(&rom[offset + file.body.start..offset + file.body.end]),
                },
                Err(e) => RecordStatus::Invalid {
                    reason: e.to_string(),
                },
            };
            records.push(ScannedRecord { offset, status });
        }

        ScanReport {
            image_len: rom.len(),
            records,
        }
    }
}

impl Default for MicrocodePatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffs::{FfsHeader, FFS_HEADER_LEN};
    use crate::ucode::build_update;
    use romgraft_core::sum_as;

    /// Build an FFS record carrying `body`, with a holding checksum.
    fn build_record(guid: Guid, body: &[u8]) -> Vec<u8> {
        let mut header = FfsHeader {
            guid,
            header_checksum: 0,
            data_checksum: 0x5A,
            file_type: 0x20,
            attributes: 0x00,
            size: (FFS_HEADER_LEN + body.len()) as u32,
            state: 0xF8,
        };
        let residual = sum_as::<u8>(&header.encode())
            .wrapping_sub(header.data_checksum)
            .wrapping_sub(header.state);
        header.header_checksum = header.header_checksum.wrapping_sub(residual);

        let mut out = header.encode().to_vec();
        out.extend_from_slice(body);
        out
    }

    /// Deterministic padding free of the search GUID
    fn padding(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 5) as u8).collect()
    }

    #[test]
    fn test_patch_body_fills_then_copies() {
        let mut body = vec![0u8; 10];
        patch_body(&mut body, &[1, 2, 3]).unwrap();
        assert_eq!(body, vec![1, 2, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_patch_body_exact_fit() {
        let mut body = vec![0u8; 3];
        patch_body(&mut body, &[7, 8, 9]).unwrap();
        assert_eq!(body, vec![7, 8, 9]);
    }

    #[test]
    fn test_patch_body_rejects_oversized_content() {
        let mut body = vec![0u8; 2];
        let err = patch_body(&mut body, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            PatchError::ContentTooLarge {
                content_len: 3,
                body_len: 2
            }
        ));
        // Nothing was written
        assert_eq!(body, vec![0, 0]);
    }

    #[test]
    fn test_apply_single_record() {
        let old_body = build_update(64, 1);
        let mut old_padded = old_body.clone();
        old_padded.resize(100, 0xFF);

        let mut rom = padding(64);
        let record_offset = rom.len();
        rom.extend(build_record(UCODE_FFS_GUID, &old_padded));
        rom.extend(padding(32));

        let ucode = build_update(64, 0xC6);
        let patcher = MicrocodePatcher::new();
        let (out, report) = patcher.apply(&rom, &ucode).unwrap();

        assert_eq!(out.len(), rom.len());
        assert_eq!(report.records_patched, 1);
        assert_eq!(report.bytes_filled, 100);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].offset, record_offset);

        // Body: replacement content up front, fill behind it
        let body_start = record_offset + FFS_HEADER_LEN;
        assert_eq!(&out[body_start..body_start + 64], ucode.as_slice());
        assert!(out[body_start + 64..body_start + 100]
            .iter()
            .all(|&b| b == FILL_BYTE));

        // Every byte outside the body is untouched
        assert_eq!(&out[..body_start], &rom[..body_start]);
        assert_eq!(&out[body_start + 100..], &rom[body_start + 100..]);

        // The walker saw the update that was replaced
        match &report.records[0].outcome {
            RecordOutcome::Patched { previous, body_len, .. } => {
                assert_eq!(*body_len, 100);
                assert_eq!(previous.updates.len(), 1);
                assert_eq!(previous.updates[0].header.update_revision, 1);
            }
            other => panic!("expected a patched record, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_patches_every_matching_record() {
        let mut rom = padding(16);
        rom.extend(build_record(UCODE_FFS_GUID, &vec![0u8; 80]));
        rom.extend(padding(8));
        rom.extend(build_record(UCODE_FFS_GUID, &vec![0u8; 70]));

        let ucode = build_update(64, 2);
        let (_, report) = MicrocodePatcher::new().apply(&rom, &ucode).unwrap();
        assert_eq!(report.records_patched, 2);
        assert_eq!(report.bytes_filled, 150);
    }

    #[test]
    fn test_apply_rejects_invalid_replacement() {
        let rom = build_record(UCODE_FFS_GUID, &vec![0u8; 80]);
        let mut ucode = build_update(64, 1);
        ucode[50] ^= 0xFF;

        let err = MicrocodePatcher::new().apply(&rom, &ucode).unwrap_err();
        assert!(matches!(err, PatchError::InvalidReplacement(_)));
    }

    #[test]
    fn test_apply_fails_when_guid_absent() {
        let rom = padding(256);
        let ucode = build_update(64, 1);

        match MicrocodePatcher::new().apply(&rom, &ucode).unwrap_err() {
            PatchError::NoChange { report } => assert!(report.records.is_empty()),
            other => panic!("expected NoChange, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_skips_record_with_bad_checksum() {
        let mut record = build_record(UCODE_FFS_GUID, &vec![0u8; 80]);
        record[18] ^= 0xFF; // corrupt the type byte, breaking the checksum

        let ucode = build_update(64, 1);
        match MicrocodePatcher::new().apply(&record, &ucode).unwrap_err() {
            PatchError::NoChange { report } => {
                assert_eq!(report.records.len(), 1);
                assert!(matches!(
                    report.records[0].outcome,
                    RecordOutcome::Skipped { .. }
                ));
            }
            other => panic!("expected NoChange, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_skips_body_too_small() {
        let rom = build_record(UCODE_FFS_GUID, &vec![0u8; 32]);
        let ucode = build_update(64, 1);

        match MicrocodePatcher::new().apply(&rom, &ucode).unwrap_err() {
            PatchError::NoChange { report } => {
                assert!(matches!(
                    report.records[0].outcome,
                    RecordOutcome::BodyTooSmall {
                        content_len: 64,
                        body_len: 32
                    }
                ));
            }
            other => panic!("expected NoChange, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_identical_output_is_no_change() {
        // The record already holds exactly what the graft would write.
        let ucode = build_update(64, 1);
        let mut body = ucode.clone();
        body.resize(100, FILL_BYTE);
        let rom = build_record(UCODE_FFS_GUID, &body);

        let err = MicrocodePatcher::new().apply(&rom, &ucode).unwrap_err();
        assert!(matches!(err, PatchError::NoChange { .. }));
    }

    #[test]
    fn test_apply_does_not_revisit_erased_occurrence() {
        // A second GUID occurrence lives inside the first record's body;
        // the graft erases it before the scan gets there.
        let embedded = build_record(UCODE_FFS_GUID, &vec![0u8; 40]);
        let rom = build_record(UCODE_FFS_GUID, &embedded);

        let ucode = build_update(64, 1);
        let (_, report) = MicrocodePatcher::new().apply(&rom, &ucode).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records_patched, 1);
    }

    #[test]
    fn test_scan_reports_without_mutating() {
        let embedded = build_record(UCODE_FFS_GUID, &build_update(48, 7));
        let mut rom = padding(20);
        rom.extend(build_record(UCODE_FFS_GUID, &embedded));
        let mut corrupt = build_record(UCODE_FFS_GUID, &vec![0u8; 16]);
        corrupt[16] ^= 0xFF;
        rom.extend(corrupt);

        let report = MicrocodePatcher::new().scan(&rom);
        // The outer record, the record nested in its body, and the
        // corrupt one are all visible to a non-mutating scan.
        assert_eq!(report.records.len(), 3);
        assert!(matches!(report.records[0].status, RecordStatus::Valid { .. }));
        assert!(matches!(report.records[1].status, RecordStatus::Valid { .. }));
        assert!(matches!(
            report.records[2].status,
            RecordStatus::Invalid { .. }
        ));

        match &report.records[1].status {
            RecordStatus::Valid { microcode, .. } => {
                assert_eq!(microcode.updates.len(), 1);
                assert_eq!(microcode.updates[0].header.update_revision, 7);
            }
            _ => unreachable!(),
        }
    }
}
