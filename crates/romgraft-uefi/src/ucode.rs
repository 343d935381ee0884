//! Intel microcode update headers
//!
//! A microcode update begins with a fixed 48-byte little-endian header
//! followed by the update payload. The whole update (`total_size` bytes,
//! header included) sums to zero as 32-bit words.

use byteorder::{LittleEndian, ReadBytesExt};
use romgraft_core::{sum_as, ParseError};
use serde::Serialize;
use std::io::Cursor;

/// Length of a microcode update header in bytes.
pub const UCODE_HEADER_LEN: usize = 48;

/// Decoded microcode update header.
///
/// Decoding accepts any 48-byte input; whether the update is credible is
/// decided by the 32-bit checksum in [`UcodeFile::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UcodeHeader {
    /// Header format; 1 for every update released so far.
    pub header_type: u32,
    /// Update revision, the value the loader compares for upgrades.
    pub update_revision: u32,
    /// Release year, binary-coded decimal.
    pub year: u16,
    /// Release day, binary-coded decimal.
    pub day: u8,
    /// Release month, binary-coded decimal.
    pub month: u8,
    /// CPUID signature the update applies to.
    pub processor_signature: u32,
    /// Value chosen so the whole update sums to zero as 32-bit words.
    pub checksum: u32,
    /// Loader revision required to apply the update.
    pub loader_revision: u32,
    /// Platform ID bitmask.
    pub platform_ids: u32,
    /// Payload size in bytes; zero means the 2000-byte legacy default.
    pub data_size: u32,
    /// Total update size in bytes, header and payload included.
    pub total_size: u32,
    /// Extended metadata size in bytes.
    pub metadata_size: u32,
    /// Lowest revision this update may replace.
    pub update_revision_min: u32,
    pub reserved: u32,
}

impl UcodeHeader {
    /// Decode a header from the first 48 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < UCODE_HEADER_LEN {
            return Err(ParseError::Truncated {
                needed: UCODE_HEADER_LEN,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let read_err = |e: std::io::Error| ParseError::Malformed(e.to_string());

        let header_type = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let update_revision = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let year = cursor.read_u16::<LittleEndian>().map_err(read_err)?;
        let day = cursor.read_u8().map_err(read_err)?;
        let month = cursor.read_u8().map_err(read_err)?;
        let processor_signature = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let checksum = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let loader_revision = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let platform_ids = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let data_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let total_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let metadata_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let update_revision_min = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let reserved = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        Ok(Self {
            header_type,
            update_revision,
            year,
            day,
            month,
            processor_signature,
            checksum,
            loader_revision,
            platform_ids,
            data_size,
            total_size,
            metadata_size,
            update_revision_min,
            reserved,
        })
    }

    /// Encode the header back to its exact 48-byte layout.
    pub fn encode(&self) -> [u8; UCODE_HEADER_LEN] {
        let mut buf = [0u8; UCODE_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.header_type.to_le_bytes());
        buf[4..8].copy_from_slice(&self.update_revision.to_le_bytes());
        buf[8..10].copy_from_slice(&self.year.to_le_bytes());
        buf[10] = self.day;
        buf[11] = self.month;
        buf[12..16].copy_from_slice(&self.processor_signature.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.loader_revision.to_le_bytes());
        buf[24..28].copy_from_slice(&self.platform_ids.to_le_bytes());
        buf[28..32].copy_from_slice(&self.data_size.to_le_bytes());
        buf[32..36].copy_from_slice(&self.total_size.to_le_bytes());
        buf[36..40].copy_from_slice(&self.metadata_size.to_le_bytes());
        buf[40..44].copy_from_slice(&self.update_revision_min.to_le_bytes());
        buf[44..48].copy_from_slice(&self.reserved.to_le_bytes());
        buf
    }
}

/// A validated microcode update: header plus its total length.
#[derive(Debug, Clone, Copy)]
pub struct UcodeFile {
    /// Validated header.
    pub header: UcodeHeader,
    /// Total update length in bytes, header included.
    pub len: usize,
}

impl UcodeFile {
    /// Parse and validate a microcode update at the start of `data`.
    ///
    /// A `total_size` smaller than the header, not a multiple of 4, or
    /// larger than the buffer is malformed; otherwise the update is valid
    /// exactly when its 32-bit word sum is zero. Bytes past `total_size`
    /// are not part of the update.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = UcodeHeader::decode(data)?;

        let total = header.total_size as usize;
        if total < UCODE_HEADER_LEN {
            return Err(ParseError::Malformed(format!(
                "Total size {} is smaller than the update header",
                total
            )));
        }
        if total % 4 != 0 {
            return Err(ParseError::Malformed(format!(
                "Total size {} is not a multiple of 4",
                total
            )));
        }
        if total > data.len() {
            return Err(ParseError::OutOfBounds {
                declared: total,
                available: data.len(),
            });
        }

        let residual = sum_as::<u32>(&data[..total]);
        if residual != 0 {
            return Err(ParseError::ChecksumMismatch { residual });
        }

        Ok(Self { header, len: total })
    }
}

/// Build a valid update of `total_size` bytes with a synthetic payload.
/// Test support shared with the chain and patcher tests.
#[cfg(test)]
pub(crate) fn build_update(total_size: usize, revision: u32) -> Vec<u8> {
    assert!(total_size >= UCODE_HEADER_LEN && total_size % 4 == 0);

    let mut header = UcodeHeader {
        header_type: 1,
        update_revision: revision,
        year: 0x2024,
        day: 0x15,
        month: 0x08,
        processor_signature: 0x0009_06EA,
        checksum: 0,
        loader_revision: 1,
        platform_ids: 0x01,
        data_size: (total_size - UCODE_HEADER_LEN) as u32,
        total_size: total_size as u32,
        metadata_size: 0,
        update_revision_min: 0,
        reserved: 0,
    };

    let mut buf = header.encode().to_vec();
    buf.resize(total_size, 0xA5);
    header.checksum = sum_as::<u32>(&buf).wrapping_neg();
    buf[..UCODE_HEADER_LEN].copy_from_slice(&header.encode());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let bytes: Vec<u8> = (0..48).map(|i| (i * 7 + 3) as u8).collect();
        let header = UcodeHeader::decode(&bytes).unwrap();
        assert_eq!(header.encode().as_slice(), bytes.as_slice());
    }

    #[test]
    fn test_decode_truncated() {
        let err = UcodeHeader::decode(&[0u8; 47]).unwrap_err();
        assert!(matches!(err, ParseError::Truncated { needed: 48, .. }));
    }

    #[test]
    fn test_parse_valid_update() {
        let data = build_update(96, 0xC6);
        let file = UcodeFile::parse(&data).unwrap();
        assert_eq!(file.len, 96);
        assert_eq!(file.header.update_revision, 0xC6);
        assert_eq!(file.header.data_size, 48);
    }

    #[test]
    fn test_parse_ignores_trailing_bytes() {
        let mut data = build_update(64, 1);
        data.extend_from_slice(&[0xDE; 10]);
        let file = UcodeFile::parse(&data).unwrap();
        assert_eq!(file.len, 64);
    }

    #[test]
    fn test_parse_rejects_payload_flip() {
        let mut data = build_update(64, 1);
        data[50] ^= 0x01;
        let err = UcodeFile::parse(&data).unwrap_err();
        assert!(matches!(err, ParseError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_parse_rejects_revision_flip() {
        let mut data = build_update(64, 1);
        data[4] ^= 0x80;
        let err = UcodeFile::parse(&data).unwrap_err();
        assert!(matches!(err, ParseError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_parse_rejects_zero_total_size() {
        let mut data = build_update(64, 1);
        data[32..36].copy_from_slice(&0u32.to_le_bytes());
        let err = UcodeFile::parse(&data).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_unaligned_total_size() {
        let mut data = build_update(64, 1);
        data[32..36].copy_from_slice(&62u32.to_le_bytes());
        let err = UcodeFile::parse(&data).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn test_parse_rejects_oversized_total_size() {
        let mut data = build_update(64, 1);
        data[32..36].copy_from_slice(&128u32.to_le_bytes());
        let err = UcodeFile::parse(&data).unwrap_err();
        assert!(matches!(
            err,
            ParseError::OutOfBounds {
                declared: 128,
                available: 64
            }
        ));
    }
}
