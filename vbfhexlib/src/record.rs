//! The `record` module defines the [`Record`] and [`RecordType`] which are used for
//! generating (and checking back) Intel HEX records.

use crate::error::RecordError;
use std::fmt;

mod ranges {
    use std::ops::Range;
    pub const RECORD_LEN_RANGE: Range<usize> = 1..3;
    pub const RECORD_ADDR_RANGE: Range<usize> = 3..7;
    pub const RECORD_TYPE_RANGE: Range<usize> = 7..9;
}
mod sizes {
    pub const BYTE_CHAR_LEN: usize = 2;
    pub const SMALLEST_RECORD: usize = (1 + 2 + 1 + 1) * 2; // len + addr + rtype + checksum
    pub const LARGEST_RECORD: usize = SMALLEST_RECORD + 255 * 2;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    Data = 0x0,
    EndOfFile = 0x1,
    ExtendedLinearAddress = 0x4,
}

impl RecordType {
    fn parse(s: &str) -> Result<Self, RecordError> {
        match s {
            "00" => Ok(Self::Data),
            "01" => Ok(Self::EndOfFile),
            "04" => Ok(Self::ExtendedLinearAddress),
            _ => Err(RecordError::InvalidRecordType),
        }
    }
}

/// Two's complement of the sum of `bytes`, i.e. the value that makes the total
/// sum (checksum included) zero modulo 256.
#[must_use]
pub fn calculate_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (!sum).wrapping_add(1)
}

/// Single Intel HEX line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub(crate) length: u8,
    pub(crate) address: u16,
    pub(crate) rtype: RecordType,
    pub(crate) data: Vec<u8>,
    pub(crate) checksum: u8,
}

impl Record {
    #[allow(clippy::cast_possible_truncation)]
    fn checksum_of(address: u16, rtype: RecordType, data: &[u8]) -> u8 {
        let mut v = vec![
            data.len() as u8,
            (address >> 8) as u8,
            (address & 0xFF) as u8,
            rtype as u8,
        ];
        v.extend_from_slice(data);
        calculate_checksum(&v)
    }

    /// Create a record from address, type and payload, validating the shape the
    /// record type demands.
    ///
    /// # Errors
    /// - Data records: returns an error if the payload exceeds 255 bytes.
    /// - End Of File / Extended Linear Address: returns an error if the payload length
    ///   or the address differ from the fixed values of the type.
    #[allow(clippy::cast_possible_truncation)]
    pub fn create(address: u16, rtype: RecordType, data: &[u8]) -> Result<Self, RecordError> {
        let length = data.len();

        let expected_length = match rtype {
            RecordType::Data => {
                if length > u8::MAX as usize {
                    return Err(RecordError::RecordTooLong);
                }
                None
            }
            RecordType::EndOfFile => Some(0),
            RecordType::ExtendedLinearAddress => Some(2),
        };

        if let Some(expected) = expected_length {
            if length != expected {
                return Err(RecordError::RecordLengthInvalidForType(
                    rtype, expected, length,
                ));
            }
            if address != 0 {
                return Err(RecordError::RecordAddressInvalidForType(
                    rtype,
                    0,
                    address as usize,
                ));
            }
        }

        Ok(Self {
            length: length as u8,
            address,
            rtype,
            data: data.to_vec(),
            checksum: Self::checksum_of(address, rtype, data),
        })
    }

    /// Data record built by the encoder, which never hands over more than 32 bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn new_data(address: u16, data: &[u8]) -> Self {
        debug_assert!(data.len() <= u8::MAX as usize);
        Self {
            length: data.len() as u8,
            address,
            rtype: RecordType::Data,
            data: data.to_vec(),
            checksum: Self::checksum_of(address, RecordType::Data, data),
        }
    }

    /// Extended Linear Address record carrying the upper 16 bits of an address.
    #[must_use]
    pub fn extended_linear_address(upper: u16) -> Self {
        let data = upper.to_be_bytes();
        Self {
            length: 2,
            address: 0,
            rtype: RecordType::ExtendedLinearAddress,
            data: data.to_vec(),
            checksum: Self::checksum_of(0, RecordType::ExtendedLinearAddress, &data),
        }
    }

    /// The fixed `:00000001FF` record.
    #[must_use]
    pub const fn end_of_file() -> Self {
        Self {
            length: 0,
            address: 0,
            rtype: RecordType::EndOfFile,
            data: Vec::new(),
            checksum: 0xFF,
        }
    }

    #[must_use]
    pub const fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Lower 16 bits of the address of the first payload byte (Data records),
    /// `0x0000` otherwise.
    #[must_use]
    pub const fn address(&self) -> u16 {
        self.address
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Parse a record line (without line terminator) and verify its checksum.
    ///
    /// # Errors
    /// Returns an error if the line is not a well-formed Data, End Of File or
    /// Extended Linear Address record.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        // Check for start code
        let Some(hexdigit_part) = line.strip_prefix(':') else {
            return Err(RecordError::MissingStartCode);
        };
        let hexdigit_part_len = hexdigit_part.len();

        // Validate all characters are hexadecimal (makes byte slicing below safe)
        if !hexdigit_part.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(RecordError::ContainsInvalidCharacters);
        }

        // Validate record's size
        if hexdigit_part_len < sizes::SMALLEST_RECORD {
            return Err(RecordError::RecordTooShort);
        } else if hexdigit_part_len > sizes::LARGEST_RECORD {
            return Err(RecordError::RecordTooLong);
        } else if hexdigit_part_len % 2 != 0 {
            return Err(RecordError::RecordNotEvenLength);
        }

        let length = parse_hex_byte(&line[ranges::RECORD_LEN_RANGE])?;

        // Check record end matches the declared length
        let data_end = ranges::RECORD_TYPE_RANGE.end + sizes::BYTE_CHAR_LEN * length as usize;
        let record_end = data_end + sizes::BYTE_CHAR_LEN;
        if record_end != line.len() {
            return Err(RecordError::RecordInvalidPayloadLength);
        }

        let rtype = RecordType::parse(&line[ranges::RECORD_TYPE_RANGE])?;
        let address = u16::from_str_radix(&line[ranges::RECORD_ADDR_RANGE], 16)
            .map_err(|_| RecordError::ContainsInvalidCharacters)?;

        let data = (ranges::RECORD_TYPE_RANGE.end..data_end)
            .step_by(sizes::BYTE_CHAR_LEN)
            .map(|i| parse_hex_byte(&line[i..i + sizes::BYTE_CHAR_LEN]))
            .collect::<Result<Vec<u8>, _>>()?;

        let checksum = parse_hex_byte(&line[data_end..record_end])?;

        // Shape checks per type
        let record = Self::create(address, rtype, &data)?;

        if record.checksum != checksum {
            return Err(RecordError::RecordChecksumMismatch(
                record.checksum,
                checksum,
            ));
        }

        Ok(record)
    }
}

fn parse_hex_byte(s: &str) -> Result<u8, RecordError> {
    u8::from_str_radix(s, 16).map_err(|_| RecordError::ContainsInvalidCharacters)
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            ":{:02X}{:04X}{:02X}",
            self.length, self.address, self.rtype as u8
        )?;
        for b in &self.data {
            write!(f, "{b:02X}")?;
        }
        write!(f, "{:02X}", self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns valid instances of Record
    fn get_valid_struct_records() -> [Record; 4] {
        [
            Record {
                length: 0x10,
                address: 0x0100,
                rtype: RecordType::Data,
                data: vec![
                    0x21, 0x46, 0x01, 0x36, 0x01, 0x21, 0x47, 0x01, 0x36, 0x00, 0x7E, 0xFE, 0x09,
                    0xD2, 0x19, 0x01,
                ],
                checksum: 0x40,
            },
            Record {
                length: 0x03,
                address: 0x0000,
                rtype: RecordType::Data,
                data: vec![0xAA, 0xBB, 0xCC],
                checksum: 0xCC,
            },
            Record {
                length: 0x00,
                address: 0x0000,
                rtype: RecordType::EndOfFile,
                data: vec![],
                checksum: 0xFF,
            },
            Record {
                length: 0x02,
                address: 0x0000,
                rtype: RecordType::ExtendedLinearAddress,
                data: vec![0x00, 0x03],
                checksum: 0xF7,
            },
        ]
    }

    /// Returns valid record strings
    fn get_valid_str_records() -> [&'static str; 4] {
        [
            ":10010000214601360121470136007EFE09D2190140",
            ":03000000AABBCCCC",
            ":00000001FF",
            ":020000040003F7",
        ]
    }

    /// Returns invalid record strings and corresponding errors
    fn get_invalid_str_records() -> [(&'static str, RecordError); 8] {
        [
            // Removed ':' from record str
            ("00000001FF", RecordError::MissingStartCode),
            // Payload shorter that record length byte
            (":100000000000FF", RecordError::RecordInvalidPayloadLength),
            // EOF record with fewer chars
            (":0000FF", RecordError::RecordTooShort),
            // EOF record with extra '0' added
            (":000000001FF", RecordError::RecordNotEvenLength),
            // Char 'Z' is not a hex digit
            (":0000000ZFF", RecordError::ContainsInvalidCharacters),
            // Checksum wrong - should be 0xF0
            (
                ":1000000000000000000000000000000000000000AA",
                RecordError::RecordChecksumMismatch(0xF0, 0xAA),
            ),
            // Extended segment address records are not produced nor accepted
            (":020000021200EA", RecordError::InvalidRecordType),
            // Address non-zero for extended linear addr record
            (
                ":020100041200EA",
                RecordError::RecordAddressInvalidForType(
                    RecordType::ExtendedLinearAddress,
                    0,
                    0x0100,
                ),
            ),
        ]
    }

    #[test]
    fn test_parse_record_types() {
        assert_eq!(RecordType::parse("00"), Ok(RecordType::Data));
        assert_eq!(RecordType::parse("01"), Ok(RecordType::EndOfFile));
        assert_eq!(RecordType::parse("04"), Ok(RecordType::ExtendedLinearAddress));
        assert_eq!(RecordType::parse("05"), Err(RecordError::InvalidRecordType));
        assert_eq!(RecordType::parse("0"), Err(RecordError::InvalidRecordType));
    }

    #[test]
    fn test_calculate_checksum() {
        // Each tuple = (record line, expected checksum)
        let cases = [
            (":10010000214601360121470136007EFE09D2190140", 0x40),
            (":100110002146017E17C20001FF5F16002148011928", 0x28),
            (":00000001FF", 0xFF),
            (":020000040003F7", 0xF7),
            (":0200000400FFFB", 0xFB),
        ];

        for (record, expected_checksum) in cases {
            // Strip information not used for checksum calculation
            let trimmed_record = &record[1..record.len() - 2];

            let bytes: Vec<u8> = (0..trimmed_record.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&trimmed_record[i..i + 2], 16).unwrap())
                .collect();

            assert_eq!(expected_checksum, calculate_checksum(&bytes));
        }
    }

    #[test]
    fn test_create_matches_struct_records() {
        for record in get_valid_struct_records() {
            let created = Record::create(record.address, record.rtype, &record.data).unwrap();
            assert_eq!(created, record);
        }
    }

    #[test]
    fn test_display_valid_records() {
        let records = get_valid_struct_records();
        let expected = get_valid_str_records();
        for (rec, rec_str) in records.iter().zip(expected.iter()) {
            assert_eq!(rec.to_string(), *rec_str);
        }
    }

    #[test]
    fn test_parse_valid_records() {
        let records = get_valid_str_records();
        let expected_records = get_valid_struct_records();
        for (rec_str, rec) in records.iter().zip(expected_records.iter()) {
            assert_eq!(Record::parse(rec_str).unwrap(), *rec);
        }
    }

    #[test]
    fn test_parse_invalid_records() {
        for (record, expected_error) in get_invalid_str_records() {
            assert_eq!(Record::parse(record).unwrap_err(), expected_error);
        }
    }

    #[test]
    fn test_create_invalid_shapes() {
        assert_eq!(
            Record::create(0, RecordType::ExtendedLinearAddress, &[0x01]),
            Err(RecordError::RecordLengthInvalidForType(
                RecordType::ExtendedLinearAddress,
                2,
                1
            ))
        );
        assert_eq!(
            Record::create(0x10, RecordType::EndOfFile, &[]),
            Err(RecordError::RecordAddressInvalidForType(
                RecordType::EndOfFile,
                0,
                0x10
            ))
        );
        assert_eq!(
            Record::create(0, RecordType::Data, &[0u8; 256]),
            Err(RecordError::RecordTooLong)
        );
    }

    #[test]
    fn test_special_records() {
        assert_eq!(Record::end_of_file().to_string(), ":00000001FF");
        assert_eq!(Record::end_of_file().checksum(), 0xFF);
        assert_eq!(Record::extended_linear_address(0x0001).checksum(), 0xF9);
        assert_eq!(
            Record::extended_linear_address(0x0001).to_string(),
            ":020000040001F9"
        );
        assert_eq!(
            Record::end_of_file(),
            Record::create(0, RecordType::EndOfFile, &[]).unwrap()
        );
    }
}
