//! Reading ZIP archives and extracting entries from them.
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 records, central directory
//!   entries) and MS-DOS date handling
//! - [`parser`]: locates the central directory and decodes its records
//! - [`extractor`]: streams matching entries to disk
//!
//! An archive ends with the End of Central Directory record, which points at
//! the central directory, which in turn points at each local header and its
//! payload. Listing reads only the first two; payloads are touched only when
//! something is extracted.
//!
//! Payloads may be stored or DEFLATE compressed and are checked against the
//! CRC32 in the central directory. ZIP64 sizes and offsets are honoured.
//! Encrypted and multi-disk archives are not supported; entries using other
//! compression methods are listed but fail to extract.

mod extractor;
mod parser;
mod structures;

pub use extractor::{ExtractError, ZipExtractor, extract};
pub use parser::ZipParser;
pub use structures::*;
