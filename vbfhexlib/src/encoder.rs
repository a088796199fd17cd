//! The `encoder` module turns an ordered list of [`DataBlock`]s into Intel HEX records.
//!
//! [`HexEncoder`] is an explicit state machine fed one payload byte at a time:
//!
//! - `AwaitingSegment`: the next byte needs an Extended Linear Address record first
//!   (only under [`AddressPolicy::Segmented`]).
//! - `AccumulatingLine`: bytes are appended to the open Data record.
//! - `LineFull`: the open record reached its payload size or the end of a 64 KB
//!   segment and is closed before the next byte is taken.
//!
//! Whatever remains in the open record when the input ends is emitted as a short
//! record; trailing bytes are never dropped.

use crate::block::DataBlock;
use crate::error::VbfError;
use crate::record::Record;
use log::debug;

/// Largest payload of a Data record produced by the encoder.
pub const MAX_RECORD_PAYLOAD: u8 = 32;

/// Size of one Extended Linear Address segment.
const SEGMENT_SIZE: u64 = 0x1_0000;

/// How 32-bit block addresses are mapped onto 16-bit record addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPolicy {
    /// Emit an Extended Linear Address record whenever a new 64 KB segment starts.
    /// Covers the full 32-bit address space.
    Segmented,
    /// Address every record directly from its block's base address. Every block has
    /// to end at or below `0x1_0000`.
    Direct,
}

/// Checks a Data record payload size against `1..=MAX_RECORD_PAYLOAD`.
pub(crate) const fn check_payload_size(size: u8) -> Result<(), VbfError> {
    if matches!(size, 1..=MAX_RECORD_PAYLOAD) {
        Ok(())
    } else {
        Err(VbfError::InvalidOption(
            "record payload size must be within 1..=32",
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncoderState {
    AwaitingSegment,
    AccumulatingLine,
    LineFull,
}

#[derive(Debug, Clone)]
pub struct HexEncoder {
    policy: AddressPolicy,
    max_payload_size: usize,
    state: EncoderState,
    /// Upper 16 address bits announced by the last ELA record
    segment: Option<u16>,
    /// Address of the byte that would continue the open record
    cursor: Option<u32>,
    line_address: u32,
    line: Vec<u8>,
    records: Vec<Record>,
    bytes: usize,
}

impl HexEncoder {
    /// Creates an encoder with the given address policy and 32-byte Data records.
    ///
    /// # Examples
    /// ```
    /// use vbfhexlib::{AddressPolicy, DataBlock, HexEncoder};
    ///
    /// let block = DataBlock { address: 0x0001_0000, payload: vec![0xAA, 0xBB, 0xCC], trailer_checksum: 0 };
    /// let records = HexEncoder::new(AddressPolicy::Segmented).encode(&[block]).unwrap();
    ///
    /// let lines: Vec<String> = records.iter().map(ToString::to_string).collect();
    /// assert_eq!(lines, [":020000040001F9", ":03000000AABBCCCC", ":00000001FF"]);
    /// ```
    #[must_use]
    pub fn new(policy: AddressPolicy) -> Self {
        let state = match policy {
            AddressPolicy::Segmented => EncoderState::AwaitingSegment,
            AddressPolicy::Direct => EncoderState::AccumulatingLine,
        };
        Self {
            policy,
            max_payload_size: MAX_RECORD_PAYLOAD as usize,
            state,
            segment: None,
            cursor: None,
            line_address: 0,
            line: Vec::with_capacity(MAX_RECORD_PAYLOAD as usize),
            records: Vec::new(),
            bytes: 0,
        }
    }

    /// Sets the maximum payload size of Data records (1..=32).
    ///
    /// # Errors
    /// Returns an error if `size` is 0 or larger than [`MAX_RECORD_PAYLOAD`].
    pub fn set_max_payload_size(&mut self, size: u8) -> Result<(), VbfError> {
        check_payload_size(size)?;
        self.max_payload_size = size as usize;
        Ok(())
    }

    #[must_use]
    pub const fn policy(&self) -> AddressPolicy {
        self.policy
    }

    /// Number of payload bytes taken so far.
    #[must_use]
    pub const fn bytes_encoded(&self) -> usize {
        self.bytes
    }

    /// Encodes all blocks in order and terminates the output with an End Of File record.
    ///
    /// # Errors
    /// Returns an error if a block does not fit the address space of the policy.
    pub fn encode(mut self, blocks: &[DataBlock]) -> Result<Vec<Record>, VbfError> {
        for block in blocks {
            self.encode_block(block)?;
        }
        Ok(self.finish())
    }

    /// Feeds the payload of one block into the encoder.
    ///
    /// Under [`AddressPolicy::Segmented`] a block that starts right where the previous
    /// one ended continues the open record; any other block starts a new one. Under
    /// [`AddressPolicy::Direct`] every block starts a new record.
    ///
    /// # Errors
    /// Returns [`VbfError::AddressOutOfRange`] if the block reaches past `0xFFFF_FFFF`,
    /// or past `0xFFFF` under [`AddressPolicy::Direct`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_block(&mut self, block: &DataBlock) -> Result<(), VbfError> {
        let end = block.end_address();
        let limit = match self.policy {
            AddressPolicy::Segmented => u64::from(u32::MAX) + 1,
            AddressPolicy::Direct => SEGMENT_SIZE,
        };
        if end > limit {
            return Err(VbfError::AddressOutOfRange(block.address, end));
        }

        if self.policy == AddressPolicy::Direct || self.cursor != Some(block.address) {
            self.close_line();
        }

        // `end` fits into the address space, so no offset overflows
        for (offset, &byte) in block.payload.iter().enumerate() {
            self.step(block.address.wrapping_add(offset as u32), byte);
        }
        Ok(())
    }

    /// Takes one payload byte destined for `address`.
    #[allow(clippy::cast_possible_truncation)]
    fn step(&mut self, address: u32, byte: u8) {
        if self.state == EncoderState::LineFull {
            self.close_line();
        }

        if self.policy == AddressPolicy::Segmented {
            let upper = (address >> 16) as u16;
            if self.segment != Some(upper) {
                self.close_line();
                self.state = EncoderState::AwaitingSegment;
            }
            if self.state == EncoderState::AwaitingSegment {
                self.records.push(Record::extended_linear_address(upper));
                self.segment = Some(upper);
            }
        }

        if self.line.is_empty() {
            self.line_address = address;
        }
        self.line.push(byte);
        self.bytes += 1;
        self.cursor = address.checked_add(1);

        let segment_ends = self.policy == AddressPolicy::Segmented && address & 0xFFFF == 0xFFFF;
        self.state = if self.line.len() >= self.max_payload_size || segment_ends {
            EncoderState::LineFull
        } else {
            EncoderState::AccumulatingLine
        };
    }

    /// Emits the open record (if any).
    #[allow(clippy::cast_possible_truncation)]
    fn close_line(&mut self) {
        if !self.line.is_empty() {
            let low_addr = (self.line_address & 0xFFFF) as u16;
            self.records.push(Record::new_data(low_addr, &self.line));
            self.line.clear();
        }
        if self.state == EncoderState::LineFull {
            self.state = EncoderState::AccumulatingLine;
        }
    }

    /// Flushes the open record and appends the End Of File record.
    #[must_use]
    pub fn finish(mut self) -> Vec<Record> {
        self.close_line();
        self.records.push(Record::end_of_file());
        debug!(
            "Encoded {} byte(s) into {} record(s)",
            self.bytes,
            self.records.len()
        );
        self.records
    }
}
