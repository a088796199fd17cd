//! The `vbf` module provides the [`VbfFile`] struct, the parsed form of a VBF
//! container: the raw text header, the metadata extracted from it, and the data
//! blocks of the binary region in file order.
//!
//! A `VbfFile` is built once per conversion and not modified afterwards; it can be
//! encoded into Intel HEX any number of times via [`VbfFile::to_records`] and
//! [`VbfFile::write_hex`].

use crate::block::{DataBlock, walk_blocks};
use crate::convert::{ConversionStats, ConvertOptions, write_hex_file};
use crate::error::VbfError;
use crate::header::{VbfMetadata, find_header_end};
use crate::record::Record;
use log::{debug, info};
use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct VbfFile {
    /// VBF file path
    pub filepath: PathBuf,
    /// VBF file size in bytes
    pub size: usize,
    /// Metadata fields found in the header
    pub metadata: VbfMetadata,
    /// Data blocks in file order
    pub blocks: Vec<DataBlock>,
    /// Raw header bytes, up to and including the closing brace
    header: Vec<u8>,
}

/// Reads the whole file, mapping a missing path and a zero-length file to their own
/// error kinds.
pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, VbfError> {
    let raw_bytes = std::fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => VbfError::NotFound(path.to_path_buf()),
        kind => VbfError::IoError(kind),
    })?;

    if raw_bytes.is_empty() {
        return Err(VbfError::EmptyInput(path.to_path_buf()));
    }
    Ok(raw_bytes)
}

impl VbfFile {
    /// Creates empty `VbfFile` struct instance.
    ///
    /// # Examples
    /// ```
    /// use vbfhexlib::VbfFile;
    ///
    /// let vbf = VbfFile::new();
    /// assert_eq!(vbf.size, 0);
    /// assert!(vbf.blocks.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears loaded data from the `VbfFile` struct instance.
    pub fn clear(&mut self) {
        self.filepath.clear();
        self.size = 0;
        self.metadata = VbfMetadata::default();
        self.blocks.clear();
        self.header.clear();
    }

    /// Parse the raw contents of a VBF file: header, metadata and data blocks.
    ///
    /// # Errors
    /// - Returns an error if the header braces never balance
    /// - Returns an error if a data block is truncated
    pub fn parse(&mut self, raw_bytes: &[u8]) -> Result<(), VbfError> {
        let header_end = find_header_end(raw_bytes)?;
        let (header, binary) = raw_bytes.split_at(header_end + 1);
        debug!(
            "Header spans {} byte(s), binary region {} byte(s)",
            header.len(),
            binary.len()
        );

        let blocks = walk_blocks(binary)?;

        self.metadata = VbfMetadata::from_header(header);
        self.header = header.to_vec();
        self.blocks = blocks;
        Ok(())
    }

    /// Creates a `VbfFile` instance and fills it with data from the provided file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, empty, unreadable or malformed.
    ///
    /// # Example
    /// ```
    /// use vbfhexlib::VbfFile;
    ///
    /// let vbf = VbfFile::from_vbf("tests/fixtures/vbf_valid_1.vbf").unwrap();
    /// assert_eq!(vbf.blocks.len(), 3);
    /// assert_eq!(vbf.metadata.ecu_address, Some(0x7E0));
    /// ```
    pub fn from_vbf<P: AsRef<Path>>(filepath: P) -> Result<Self, VbfError> {
        let mut vbf = Self::new();
        vbf.load_vbf(filepath)?;
        Ok(vbf)
    }

    /// Fills a `VbfFile` instance with data from the provided file.
    ///
    /// # Errors
    /// Returns an error if the file is missing, empty, unreadable or malformed.
    pub fn load_vbf<P: AsRef<Path>>(&mut self, filepath: P) -> Result<(), VbfError> {
        let raw_bytes = read_input(filepath.as_ref())?;

        self.clear();
        self.size = raw_bytes.len();
        self.filepath = filepath.as_ref().to_path_buf();

        self.parse(&raw_bytes)
    }

    /// Raw header as text (lossy for non-UTF-8 bytes).
    #[must_use]
    pub fn header_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.header)
    }

    /// Total payload bytes over all blocks.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.blocks.iter().map(DataBlock::len).sum()
    }

    /// Lowest address holding data.
    #[must_use]
    pub fn get_min_addr(&self) -> Option<u32> {
        self.blocks
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.address)
            .min()
    }

    /// Highest address holding data. Can exceed `u32::MAX` for a malformed container.
    #[must_use]
    pub fn get_max_addr(&self) -> Option<u64> {
        self.blocks
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.end_address() - 1)
            .max()
    }

    /// Encodes all blocks into Intel HEX records, End Of File record included.
    ///
    /// # Errors
    /// Returns an error if the options are invalid or a block does not fit the
    /// address space of the selected policy.
    pub fn to_records(&self, options: &ConvertOptions) -> Result<Vec<Record>, VbfError> {
        options.encoder()?.encode(&self.blocks)
    }

    /// Generates an Intel HEX file at the specified path.
    ///
    /// The records are fully encoded before the output is touched, and the file only
    /// appears at `filepath` once it was written completely.
    ///
    /// # Errors
    /// Returns an error if encoding fails or the file cannot be written.
    ///
    /// # Example
    /// ```
    /// use vbfhexlib::{AddressPolicy, ConvertOptions, VbfFile};
    ///
    /// let vbf = VbfFile::from_vbf("tests/fixtures/vbf_valid_1.vbf").unwrap();
    /// let stats = vbf
    ///     .write_hex("build/ex1/fw.hex", &ConvertOptions::new(AddressPolicy::Segmented))
    ///     .unwrap();
    ///
    /// assert_eq!(stats.bytes, vbf.data_size());
    /// ```
    pub fn write_hex<P: AsRef<Path>>(
        &self,
        filepath: P,
        options: &ConvertOptions,
    ) -> Result<ConversionStats, VbfError> {
        let records = self.to_records(options)?;
        write_hex_file(filepath.as_ref(), &records, options.line_ending())?;

        let stats = ConversionStats {
            blocks: self.blocks.len(),
            bytes: self.data_size(),
            lines: records.len(),
        };
        info!(
            "Wrote {} ({} block(s), {} byte(s), {} line(s))",
            filepath.as_ref().display(),
            stats.blocks,
            stats.bytes,
            stats.lines
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::AddressPolicy;

    fn container(header: &str, blocks: &[(u32, &[u8])]) -> Vec<u8> {
        let mut v = header.as_bytes().to_vec();
        for (address, payload) in blocks {
            v.extend_from_slice(&address.to_be_bytes());
            v.extend_from_slice(&u32::try_from(payload.len()).unwrap().to_be_bytes());
            v.extend_from_slice(payload);
            v.extend_from_slice(&[0xAB, 0xCD]);
        }
        v
    }

    #[test]
    fn test_parse_valid() {
        // Arrange
        let raw = container(
            "vbf_version = 2.3;\nheader { ecu_address = 0x1234; }",
            &[
                (0x0001_0000, &[0xAA, 0xBB, 0xCC][..]),
                (0x0002_0000, &[0x01][..]),
            ],
        );
        let mut vbf = VbfFile::new();

        // Act
        let res = vbf.parse(&raw);

        // Assert
        assert!(res.is_ok());
        assert_eq!(vbf.metadata.ecu_address, Some(0x1234));
        assert_eq!(vbf.metadata.version.as_deref(), Some("2.3"));
        assert_eq!(vbf.blocks.len(), 2);
        assert_eq!(vbf.blocks[0].trailer_checksum, 0xABCD);
        assert_eq!(vbf.data_size(), 4);
        assert_eq!(vbf.get_min_addr(), Some(0x0001_0000));
        assert_eq!(vbf.get_max_addr(), Some(0x0002_0000));
        assert!(vbf.header_text().ends_with("0x1234; }"));
    }

    #[test]
    fn test_parse_unterminated_header() {
        let mut vbf = VbfFile::new();
        let res = vbf.parse(b"header { ecu_address = 0x1234;");
        assert_eq!(res, Err(VbfError::UnterminatedHeader));
        assert!(vbf.blocks.is_empty());
    }

    #[test]
    fn test_parse_header_only() {
        // Arrange
        let mut vbf = VbfFile::new();

        // Act
        vbf.parse(b"header { }").unwrap();

        // Assert
        assert!(vbf.blocks.is_empty());
        assert_eq!(vbf.get_min_addr(), None);
        assert_eq!(vbf.get_max_addr(), None);
        let records = vbf
            .to_records(&ConvertOptions::new(AddressPolicy::Direct))
            .unwrap();
        assert_eq!(records, vec![Record::end_of_file()]);
    }

    #[test]
    fn test_binary_braces_do_not_affect_header_end() {
        // Arrange: payload full of brace characters
        let raw = container("header { }", &[(0x100, &b"}}}{{{"[..])]);
        let mut vbf = VbfFile::new();

        // Act
        vbf.parse(&raw).unwrap();

        // Assert
        assert_eq!(vbf.blocks[0].payload, b"}}}{{{");
    }

    #[test]
    fn test_load_missing_file() {
        let res = VbfFile::from_vbf("tests/fixtures/does_not_exist.vbf");
        assert_eq!(
            res.map(|_| ()),
            Err(VbfError::NotFound(PathBuf::from(
                "tests/fixtures/does_not_exist.vbf"
            )))
        );
    }
}
