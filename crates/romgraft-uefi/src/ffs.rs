//! EFI firmware file system (FFS) file headers
//!
//! An FFS file starts with a fixed 24-byte header: a 16-byte GUID naming
//! the file, two 8-bit checksums, a type byte, an attribute byte, and a
//! 32-bit word packing a 24-bit total size with an 8-bit lifecycle state.
//! The header validates when the wrapping byte sum of all 24 bytes, with
//! the data checksum and state subtracted back out, is zero.

use byteorder::{LittleEndian, ReadBytesExt};
use romgraft_core::{sum_as, ParseError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::{Cursor, Read};
use std::ops::Range;
use std::str::FromStr;

/// Length of an FFS file header in bytes.
pub const FFS_HEADER_LEN: usize = 24;

/// GUID of the FFS file that carries CPU microcode updates.
pub const UCODE_FFS_GUID: Guid = Guid::from_fields(
    0x197D_B236,
    0xF856,
    0x4924,
    [0x90, 0xF8, 0xCD, 0xF1, 0x2F, 0xB8, 0x75, 0xF3],
);

/// A GUID in EFI on-disk order: the first three fields little-endian, the
/// final eight bytes as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Build a GUID from its textual fields.
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let a = d1.to_le_bytes();
        let b = d2.to_le_bytes();
        let c = d3.to_le_bytes();
        Guid([
            a[0], a[1], a[2], a[3], b[0], b[1], c[0], c[1], d4[0], d4[1], d4[2], d4[3], d4[4],
            d4[5], d4[6], d4[7],
        ])
    }

    /// GUID from raw on-disk bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    /// Raw on-disk bytes, the exact pattern the scanner searches for.
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15]
        )
    }
}

impl FromStr for Guid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(ParseError::Malformed(format!("Invalid GUID text: {}", s)));
        }

        let mut raw = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| ParseError::Malformed(format!("Invalid GUID text: {}", s)))?;
            raw[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| ParseError::Malformed(format!("Invalid GUID text: {}", s)))?;
        }

        // Textual order is big-endian per field; swap into on-disk order.
        Ok(Guid::from_fields(
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            u16::from_be_bytes([raw[4], raw[5]]),
            u16::from_be_bytes([raw[6], raw[7]]),
            [
                raw[8], raw[9], raw[10], raw[11], raw[12], raw[13], raw[14], raw[15],
            ],
        ))
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Decoded FFS file header.
///
/// Decoding accepts any 24-byte input; whether the header is credible is
/// decided by the checksum in [`FfsFile::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FfsHeader {
    /// File GUID (on-disk byte order).
    pub guid: Guid,
    /// 8-bit checksum covering this header.
    pub header_checksum: u8,
    /// 8-bit checksum covering the file data; not verified here.
    pub data_checksum: u8,
    /// FFS file type.
    pub file_type: u8,
    /// Attribute flags.
    pub attributes: u8,
    /// Total file length including the header (24-bit field).
    pub size: u32,
    /// Lifecycle state bits; excluded from the header checksum.
    pub state: u8,
}

impl FfsHeader {
    /// Decode a header from the first 24 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < FFS_HEADER_LEN {
            return Err(ParseError::Truncated {
                needed: FFS_HEADER_LEN,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let mut guid = [0u8; 16];
        cursor
            .read_exact(&mut guid)
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let header_checksum = cursor
            .read_u8()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let data_checksum = cursor
            .read_u8()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let file_type = cursor
            .read_u8()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let attributes = cursor
            .read_u8()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;
        let packed = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| ParseError::Malformed(e.to_string()))?;

        Ok(Self {
            guid: Guid(guid),
            header_checksum,
            data_checksum,
            file_type,
            attributes,
            size: packed & 0x00FF_FFFF,
            state: (packed >> 24) as u8,
        })
    }

    /// Encode the header back to its exact 24-byte layout.
    pub fn encode(&self) -> [u8; FFS_HEADER_LEN] {
        let mut buf = [0u8; FFS_HEADER_LEN];
        buf[..16].copy_from_slice(self.guid.as_bytes());
        buf[16] = self.header_checksum;
        buf[17] = self.data_checksum;
        buf[18] = self.file_type;
        buf[19] = self.attributes;
        let packed = (self.size & 0x00FF_FFFF) | (u32::from(self.state) << 24);
        buf[20..24].copy_from_slice(&packed.to_le_bytes());
        buf
    }
}

/// A validated FFS file: header plus the body range within the buffer it
/// was parsed from.
#[derive(Debug, Clone)]
pub struct FfsFile {
    /// Validated header.
    pub header: FfsHeader,
    /// Body byte range, relative to the start of the file header.
    pub body: Range<usize>,
}

impl FfsFile {
    /// Parse and validate an FFS file at the start of `data`.
    ///
    /// The header checksum must hold and the declared size must fit the
    /// buffer. `data` may extend past the file; only `header.size` bytes
    /// belong to it.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let header = FfsHeader::decode(data)?;

        // The data checksum and state are not covered by the header
        // checksum; subtract them back out of the raw byte sum.
        let residual = sum_as::<u8>(&data[..FFS_HEADER_LEN])
            .wrapping_sub(header.data_checksum)
            .wrapping_sub(header.state);
        if residual != 0 {
            return Err(ParseError::ChecksumMismatch {
                residual: u32::from(residual),
            });
        }

        let size = header.size as usize;
        if size < FFS_HEADER_LEN {
            return Err(ParseError::Malformed(format!(
                "File size {} is smaller than its header",
                size
            )));
        }
        if size > data.len() {
            return Err(ParseError::OutOfBounds {
                declared: size,
                available: data.len(),
            });
        }

        Ok(Self {
            header,
            body: FFS_HEADER_LEN..size,
        })
    }

    /// Length of the file body in bytes.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
