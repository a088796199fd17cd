//! # `vbfhexlib`
//!
//! `vbfhexlib` is a Rust library for converting VBF firmware containers into Intel HEX files.
//!
//! A VBF file is a brace-delimited text header followed by binary data blocks
//! (`address | length | payload | checksum`). The library provides:
//! - Parser for VBF containers (via [`VbfFile`] struct) and their header metadata
//!   (via [`VbfMetadata`]).
//! - Intel HEX encoder with a selectable [`AddressPolicy`] (via [`HexEncoder`]).
//! - The file-level operations [`convert`] and [`inspect`].
//! - Error handling with [`VbfError`] and [`RecordError`].
//!
//! ## Example
//!
//! ```
//! use vbfhexlib::{AddressPolicy, ConvertOptions, convert, inspect};
//!
//! let metadata = inspect("tests/fixtures/vbf_valid_1.vbf").unwrap();
//! println!("ECU address: {:?}", metadata.ecu_address);
//!
//! let options = ConvertOptions::new(AddressPolicy::Segmented);
//! let stats = convert("tests/fixtures/vbf_valid_1.vbf", "build/ex0/fw.hex", &options).unwrap();
//! println!("{} bytes in {} lines", stats.bytes, stats.lines);
//! ```

mod block;
mod convert;
mod encoder;
mod error;
mod header;
mod record;
mod vbf;

// Public APIs
pub use block::{DataBlock, walk_blocks};
pub use convert::{ConversionStats, ConvertOptions, LineEnding, convert, inspect};
pub use encoder::{AddressPolicy, HexEncoder, MAX_RECORD_PAYLOAD};
pub use error::{RecordError, VbfError};
pub use header::{EraseRange, VbfMetadata, find_header_end};
pub use record::{Record, RecordType, calculate_checksum};
pub use vbf::VbfFile;
