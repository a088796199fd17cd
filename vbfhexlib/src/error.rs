//! The `error` module defines the two error types of the crate:
//! 1. [`VbfError`] describes why reading, parsing, encoding, or writing a VBF container
//!    failed. Every failure of [`convert`](crate::convert) and [`inspect`](crate::inspect)
//!    maps to exactly one of its variants.
//! 2. [`RecordError`] describes why a single Intel HEX record could not be created or
//!    parsed (via [`Record`](crate::Record)).

use crate::record::RecordType;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum VbfError {
    /// Input path does not exist
    NotFound(PathBuf),
    /// Input file has zero length
    EmptyInput(PathBuf),
    /// No balanced `{...}` group found in the file
    UnterminatedHeader,
    /// Block declares more bytes than remain in the file
    TruncatedBlock {
        address: u32,
        declared: u32,
        available: usize,
    },
    /// Read or write failure on either file
    IoError(io::ErrorKind),
    /// Output file could not be created or moved into place
    WriteFailure(PathBuf, io::ErrorKind),
    /// Block does not fit the address space of the selected policy
    AddressOutOfRange(u32, u64),
    /// Conversion option outside of its allowed range
    InvalidOption(&'static str),
}

impl fmt::Display for VbfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => {
                write!(f, "Input file not found: {}", path.display())
            }
            Self::EmptyInput(path) => {
                write!(f, "Input file is empty: {}", path.display())
            }
            Self::UnterminatedHeader => {
                write!(f, "Invalid VBF format: unmatched braces in header")
            }
            Self::TruncatedBlock {
                address,
                declared,
                available,
            } => {
                write!(
                    f,
                    "Block at 0x{address:08X} declares {declared} bytes, only {available} remain"
                )
            }
            Self::IoError(kind) => {
                write!(f, "I/O error: {kind}")
            }
            Self::WriteFailure(path, kind) => {
                write!(f, "Could not write output file {}: {kind}", path.display())
            }
            Self::AddressOutOfRange(start, end) => {
                write!(
                    f,
                    "Block 0x{start:08X}..0x{end:X} does not fit the selected address policy"
                )
            }
            Self::InvalidOption(what) => {
                write!(f, "Invalid conversion option: {what}")
            }
        }
    }
}

impl From<io::Error> for VbfError {
    fn from(err: io::Error) -> Self {
        Self::IoError(err.kind())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RecordError {
    /// Record does not begin with a ':'
    MissingStartCode,
    /// Record contains non-hexadecimal characters
    ContainsInvalidCharacters,
    /// Record is shorter than the smallest valid
    RecordTooShort,
    /// Record is longer than the largest valid
    RecordTooLong,
    /// Record length is odd
    RecordNotEvenLength,
    /// Payload size differs from the record's length byte
    RecordInvalidPayloadLength,
    /// Record type is not one of Data, End Of File, Extended Linear Address
    InvalidRecordType,
    /// Record's payload length does not match the record type
    RecordLengthInvalidForType(RecordType, usize, usize),
    /// Record's address does not match the record type
    RecordAddressInvalidForType(RecordType, usize, usize),
    /// Record checksum mismatch
    RecordChecksumMismatch(u8, u8),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStartCode => write!(f, "Missing start code ':'"),
            Self::ContainsInvalidCharacters => write!(f, "Record contains invalid character(s)"),
            Self::RecordTooShort => write!(f, "Record too short"),
            Self::RecordTooLong => write!(f, "Record too long"),
            Self::RecordNotEvenLength => write!(f, "Record with uneven length"),
            Self::RecordInvalidPayloadLength => {
                write!(f, "Payload (data bytes) size differs from record's lengths")
            }
            Self::InvalidRecordType => write!(f, "Invalid record type"),
            Self::RecordLengthInvalidForType(rtype, expected, actual) => {
                write!(
                    f,
                    "For record type {rtype:?} expected data length is {expected} bytes, found {actual}"
                )
            }
            Self::RecordAddressInvalidForType(rtype, expected, actual) => {
                write!(
                    f,
                    "For record type {rtype:?} expected address is 0x{expected:X}, found 0x{actual:X}"
                )
            }
            Self::RecordChecksumMismatch(expected, actual) => {
                write!(
                    f,
                    "Invalid record checksum - expected: 0x{expected:02X}, found: 0x{actual:02X}"
                )
            }
        }
    }
}

impl Error for VbfError {}
impl Error for RecordError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        // Arrange
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");

        // Act
        let vbf_err = VbfError::from(err);

        // Assert
        assert_eq!(vbf_err, VbfError::IoError(io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_truncated_block_message() {
        let err = VbfError::TruncatedBlock {
            address: 0x0001_0000,
            declared: 100,
            available: 50,
        };
        assert_eq!(
            err.to_string(),
            "Block at 0x00010000 declares 100 bytes, only 50 remain"
        );
    }
}
