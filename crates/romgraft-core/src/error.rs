//! Error types for romgraft

use thiserror::Error;

/// Errors while decoding or validating firmware structures.
///
/// During an image scan every variant is recoverable: the record at the
/// offending offset is reported and skipped. The same errors are fatal
/// when they apply to caller-supplied replacement content.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Truncated structure: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Checksum mismatch (residual {residual:#x})")]
    ChecksumMismatch { residual: u32 },

    #[error("Declared size {declared} exceeds the {available} available bytes")]
    OutOfBounds { declared: usize, available: usize },

    #[error("Malformed structure: {0}")]
    Malformed(String),
}
