//! The `block` module walks the binary region that follows the VBF header.
//!
//! The region is a plain sequence of length-prefixed blocks with no end marker:
//!
//! ```text
//! address (4 B, big-endian) | length (4 B, big-endian) | payload (length B) | checksum (2 B)
//! ```
//!
//! The trailing block checksum is read and kept but never verified.

use crate::error::VbfError;
use log::{debug, warn};

/// Address + length fields.
const BLOCK_HEADER_LEN: usize = 8;
/// Trailing block checksum.
const BLOCK_TRAILER_LEN: usize = 2;
/// Smallest possible block (empty payload).
const MIN_BLOCK_LEN: usize = BLOCK_HEADER_LEN + BLOCK_TRAILER_LEN;

/// Contiguous run of payload bytes destined for `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Absolute address of the first payload byte
    pub address: u32,
    /// Payload bytes
    pub payload: Vec<u8>,
    /// Checksum stored after the payload (not verified)
    pub trailer_checksum: u16,
}

impl DataBlock {
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Address one past the last payload byte. Can exceed `u32::MAX`.
    #[must_use]
    pub fn end_address(&self) -> u64 {
        u64::from(self.address) + self.payload.len() as u64
    }
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let field = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes(field.try_into().ok()?))
}

fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    let field = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes(field.try_into().ok()?))
}

/// Splits the binary region into blocks.
///
/// The walk stops as soon as fewer than 10 bytes remain; such a tail cannot hold a
/// block and is ignored. A block whose declared payload and checksum do not fit into
/// the remaining bytes fails the whole walk.
///
/// # Errors
/// Returns [`VbfError::TruncatedBlock`] if a block declares more bytes than remain.
pub fn walk_blocks(binary: &[u8]) -> Result<Vec<DataBlock>, VbfError> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while binary.len() - cursor >= MIN_BLOCK_LEN {
        let remaining = binary.len() - cursor;

        // Both reads are in bounds due to the loop condition
        let address = read_u32_be(binary, cursor).unwrap_or_default();
        let declared = read_u32_be(binary, cursor + 4).unwrap_or_default();

        let payload_start = cursor + BLOCK_HEADER_LEN;
        let available = remaining - BLOCK_HEADER_LEN;
        let length = declared as usize;
        if length.saturating_add(BLOCK_TRAILER_LEN) > available {
            return Err(VbfError::TruncatedBlock {
                address,
                declared,
                available,
            });
        }

        let payload_end = payload_start + length;
        let trailer_checksum = read_u16_be(binary, payload_end).unwrap_or_default();

        debug!(
            "Block #{} at 0x{address:08X}: {length} bytes, checksum 0x{trailer_checksum:04X}",
            blocks.len()
        );

        blocks.push(DataBlock {
            address,
            payload: binary[payload_start..payload_end].to_vec(),
            trailer_checksum,
        });

        cursor = payload_end + BLOCK_TRAILER_LEN;
    }

    if cursor < binary.len() {
        warn!(
            "Ignoring {} trailing byte(s) after the last block",
            binary.len() - cursor
        );
    }

    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_block(address: u32, payload: &[u8], checksum: u16) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&address.to_be_bytes());
        v.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
        v.extend_from_slice(payload);
        v.extend_from_slice(&checksum.to_be_bytes());
        v
    }

    #[test]
    fn test_walk_single_block() {
        // Arrange
        let binary = encode_block(0x0001_0000, &[0xAA, 0xBB, 0xCC], 0x1234);

        // Act
        let blocks = walk_blocks(&binary).unwrap();

        // Assert
        assert_eq!(
            blocks,
            vec![DataBlock {
                address: 0x0001_0000,
                payload: vec![0xAA, 0xBB, 0xCC],
                trailer_checksum: 0x1234,
            }]
        );
        assert_eq!(blocks[0].end_address(), 0x0001_0003);
    }

    #[test]
    fn test_walk_multiple_blocks() {
        // Arrange
        let mut binary = encode_block(0x1000, &[1, 2, 3, 4], 0xAAAA);
        binary.extend(encode_block(0x2000, &[], 0xBBBB));
        binary.extend(encode_block(0xFFFF_FFF0, &[5; 16], 0xCCCC));

        // Act
        let blocks = walk_blocks(&binary).unwrap();

        // Assert
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].address, 0x1000);
        assert_eq!(blocks[0].len(), 4);
        assert!(blocks[1].is_empty());
        assert_eq!(blocks[1].trailer_checksum, 0xBBBB);
        assert_eq!(blocks[2].end_address(), 0x1_0000_0000);
    }

    #[test]
    fn test_walk_empty_region() {
        assert!(walk_blocks(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_walk_ignores_short_tail() {
        // Arrange
        let mut binary = encode_block(0x1000, &[1, 2], 0);
        binary.extend_from_slice(&[0xFF; 9]);

        // Act
        let blocks = walk_blocks(&binary).unwrap();

        // Assert
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn test_walk_truncated_block() {
        // Arrange
        let mut binary = Vec::new();
        binary.extend_from_slice(&0x0000_8000u32.to_be_bytes());
        binary.extend_from_slice(&100u32.to_be_bytes());
        binary.extend_from_slice(&[0u8; 50]);

        // Act
        let res = walk_blocks(&binary);

        // Assert
        assert_eq!(
            res,
            Err(VbfError::TruncatedBlock {
                address: 0x8000,
                declared: 100,
                available: 50,
            })
        );
    }

    #[test]
    fn test_walk_missing_trailer_is_truncated() {
        // Payload is complete, checksum is missing one byte
        let mut binary = encode_block(0x10, &[7; 4], 0);
        binary.pop();

        let res = walk_blocks(&binary);

        assert_eq!(
            res,
            Err(VbfError::TruncatedBlock {
                address: 0x10,
                declared: 4,
                available: 5,
            })
        );
    }
}
