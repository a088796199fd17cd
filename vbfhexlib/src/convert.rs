//! The `convert` module holds the two file-level operations of the crate,
//! [`convert`] and [`inspect`], together with their options and statistics.

use crate::encoder::{AddressPolicy, HexEncoder, MAX_RECORD_PAYLOAD, check_payload_size};
use crate::error::VbfError;
use crate::header::{VbfMetadata, find_header_end};
use crate::record::Record;
use crate::vbf::{VbfFile, read_input};
use log::{debug, warn};
use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, IntoInnerError, Write};
use std::path::{Path, PathBuf};

/// Line terminator written after every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
        }
    }
}

/// Options of a conversion. There is no default address policy; it is always chosen
/// by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    policy: AddressPolicy,
    max_payload_size: u8,
    line_ending: LineEnding,
}

impl ConvertOptions {
    /// Options with the given address policy, 32-byte Data records and `\n` line endings.
    #[must_use]
    pub const fn new(policy: AddressPolicy) -> Self {
        Self {
            policy,
            max_payload_size: MAX_RECORD_PAYLOAD,
            line_ending: LineEnding::Lf,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> AddressPolicy {
        self.policy
    }

    #[must_use]
    pub const fn max_payload_size(&self) -> u8 {
        self.max_payload_size
    }

    #[must_use]
    pub const fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// Sets the maximum payload size of Data records.
    ///
    /// # Errors
    /// Returns an error if `size` is outside of `1..=32`; the options stay unchanged.
    ///
    /// # Example
    /// ```
    /// use vbfhexlib::{AddressPolicy, ConvertOptions};
    ///
    /// let mut options = ConvertOptions::new(AddressPolicy::Segmented);
    /// assert!(options.set_max_payload_size(16).is_ok());
    /// assert!(options.set_max_payload_size(64).is_err());
    /// assert_eq!(options.max_payload_size(), 16);
    /// ```
    pub fn set_max_payload_size(&mut self, size: u8) -> Result<(), VbfError> {
        check_payload_size(size)?;
        self.max_payload_size = size;
        Ok(())
    }

    pub const fn set_line_ending(&mut self, line_ending: LineEnding) {
        self.line_ending = line_ending;
    }

    pub(crate) fn encoder(&self) -> Result<HexEncoder, VbfError> {
        let mut encoder = HexEncoder::new(self.policy);
        encoder.set_max_payload_size(self.max_payload_size)?;
        Ok(encoder)
    }
}

/// Summary of a finished conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionStats {
    /// Data blocks read from the container
    pub blocks: usize,
    /// Payload bytes written as Data records
    pub bytes: usize,
    /// Lines written, End Of File record included
    pub lines: usize,
}

/// Converts the VBF container at `input` into an Intel HEX file at `output`.
///
/// Either a complete hex file is produced or no file is left at `output`.
///
/// # Errors
/// Returns an error if the input is missing, empty, unreadable or malformed, if a block
/// does not fit the selected address policy, or if the output cannot be written.
///
/// # Example
/// ```
/// use vbfhexlib::{AddressPolicy, ConvertOptions, convert};
///
/// let options = ConvertOptions::new(AddressPolicy::Segmented);
/// let stats = convert("tests/fixtures/vbf_valid_1.vbf", "build/ex2/fw.hex", &options).unwrap();
///
/// assert_eq!(stats.blocks, 3);
/// ```
pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    options: &ConvertOptions,
) -> Result<ConversionStats, VbfError> {
    let vbf = VbfFile::from_vbf(input)?;
    vbf.write_hex(output, options)
}

/// Reads only the header of the VBF container at `input` and returns its metadata.
/// The binary region is not looked at.
///
/// # Errors
/// Returns an error if the input is missing, empty, unreadable, or has no balanced header.
///
/// # Example
/// ```
/// use vbfhexlib::inspect;
///
/// let metadata = inspect("tests/fixtures/vbf_valid_1.vbf").unwrap();
/// assert_eq!(metadata.sw_part_number.as_deref(), Some("HK62-12K532-PMD"));
/// ```
pub fn inspect<P: AsRef<Path>>(input: P) -> Result<VbfMetadata, VbfError> {
    let raw_bytes = read_input(input.as_ref())?;
    let header_end = find_header_end(&raw_bytes)?;
    Ok(VbfMetadata::from_header(&raw_bytes[..=header_end]))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_records<W: Write>(
    writer: &mut W,
    records: &[Record],
    line_ending: LineEnding,
) -> std::io::Result<()> {
    let terminator = line_ending.as_str();
    for record in records {
        write!(writer, "{record}{terminator}")?;
    }
    writer.flush()
}

/// Writes all records to a temporary sibling of `path` and moves it into place.
/// On failure the temporary file is removed and `path` is left untouched.
pub(crate) fn write_hex_file(
    path: &Path,
    records: &[Record],
    line_ending: LineEnding,
) -> Result<(), VbfError> {
    let write_failure = |err: std::io::Error| VbfError::WriteFailure(path.to_path_buf(), err.kind());

    // Ensure the parent directory exists
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_failure)?;
    }

    let tmp = temp_path(path);
    debug!("Writing {} record(s) to {}", records.len(), tmp.display());
    let file = fs::File::create(&tmp).map_err(write_failure)?;

    // Wrap in BufWriter for efficient line-by-line writing
    let mut writer = BufWriter::new(file);
    let written = write_records(&mut writer, records, line_ending)
        .and_then(|()| writer.into_inner().map_err(IntoInnerError::into_error))
        .and_then(|file| file.sync_all());
    if let Err(err) = written {
        discard(&tmp);
        return Err(VbfError::from(err));
    }

    fs::rename(&tmp, path).map_err(|err| {
        discard(&tmp);
        write_failure(err)
    })
}

fn discard(tmp: &Path) {
    if let Err(err) = fs::remove_file(tmp) {
        warn!("Could not remove {}: {err}", tmp.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path() {
        assert_eq!(
            temp_path(Path::new("build/out/fw.hex")),
            PathBuf::from("build/out/fw.hex.tmp")
        );
    }

    #[test]
    fn test_write_records_crlf() {
        // Arrange
        let records = [
            Record::extended_linear_address(0x0001),
            Record::end_of_file(),
        ];
        let mut out = Vec::new();

        // Act
        write_records(&mut out, &records, LineEnding::CrLf).unwrap();

        // Assert
        assert_eq!(out, b":020000040001F9\r\n:00000001FF\r\n");
    }

    #[test]
    fn test_options_reject_invalid_payload_size() {
        // Arrange
        let mut options = ConvertOptions::new(AddressPolicy::Direct);

        // Act
        let res = options.set_max_payload_size(0);

        // Assert
        assert!(matches!(res, Err(VbfError::InvalidOption(_))));
        assert_eq!(options.max_payload_size(), MAX_RECORD_PAYLOAD);
        assert_eq!(options.policy(), AddressPolicy::Direct);
        assert_eq!(options.line_ending(), LineEnding::Lf);
    }

    #[test]
    fn test_write_hex_file_leaves_no_temp() {
        // Arrange
        let path = Path::new("build/unit-write/fw.hex");

        // Act
        write_hex_file(path, &[Record::end_of_file()], LineEnding::Lf).unwrap();

        // Assert
        assert_eq!(fs::read(path).unwrap(), b":00000001FF\n");
        assert!(!temp_path(path).exists());
    }
}
