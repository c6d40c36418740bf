//! Immutable listing of an archive's entries.
//!
//! The catalog is built once when the archive is opened and then only read:
//! the filter derives views from it and the browser displays it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use crate::io::LocalFileReader;
use crate::zip::{CompressionMethod, ZipFileEntry, ZipParser};

/// Column titles, in the order of [`ArchiveEntry::columns`].
pub const COLUMN_HEADERS: [&str; 5] = ["NAME", "IS FOLDER", "SIZE", "MODIFIED ON", "CRC"];

/// Shown in place of a timestamp when the archive stores none.
pub const NO_TIMESTAMP: &str = "-";

/// One central-directory record, as displayed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    name: String,
    is_directory: bool,
    uncompressed_size: u64,
    compressed_size: u64,
    method: String,
    modified_at: String,
    crc32: u32,
}

impl ArchiveEntry {
    pub fn new(
        name: impl Into<String>,
        is_directory: bool,
        uncompressed_size: u64,
        compressed_size: u64,
        method: impl Into<String>,
        modified_at: impl Into<String>,
        crc32: u32,
    ) -> Self {
        Self {
            name: name.into(),
            is_directory,
            uncompressed_size,
            compressed_size,
            method: method.into(),
            modified_at: modified_at.into(),
            crc32,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// `STORE`, `DEFLATE` or `0x<code>`
    pub fn method(&self) -> &str {
        &self.method
    }

    /// RFC3339 UTC timestamp, or [`NO_TIMESTAMP`]
    pub fn modified_at(&self) -> &str {
        &self.modified_at
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// The rendered table cells: name, folder flag, size, modification time
    /// and CRC. Filtering matches against these exact strings.
    pub fn columns(&self) -> [String; 5] {
        [
            self.name.clone(),
            self.is_directory.to_string(),
            self.uncompressed_size.to_string(),
            self.modified_at.clone(),
            self.crc32.to_string(),
        ]
    }
}

impl From<&ZipFileEntry> for ArchiveEntry {
    fn from(entry: &ZipFileEntry) -> Self {
        let modified_at = entry
            .modified_at()
            .and_then(format_rfc3339)
            .unwrap_or_else(|| NO_TIMESTAMP.to_string());

        Self::new(
            entry.file_name.clone(),
            entry.is_directory(),
            entry.uncompressed_size,
            entry.compressed_size,
            method_to_string(entry.compression_method.as_u16()),
            modified_at,
            entry.crc32,
        )
    }
}

/// Entries in central-directory order. Cheap to clone, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveListing {
    entries: Arc<[ArchiveEntry]>,
}

impl ArchiveListing {
    pub fn new(entries: Vec<ArchiveEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ArchiveEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArchiveEntry> {
        self.entries.iter()
    }
}

/// Read the central directory of the archive at `path`.
///
/// Either every record is listed or an error is returned; the file is
/// closed before returning in both cases.
pub async fn build_catalog(path: &Path) -> Result<ArchiveListing> {
    let entries = {
        let reader = LocalFileReader::new(path)?;
        ZipParser::new(Arc::new(reader))
            .list_files()
            .await
            .with_context(|| format!("cannot read ZIP archive {}", path.display()))?
    };

    let listing = ArchiveListing::new(entries.iter().map(ArchiveEntry::from).collect());
    debug!(path = %path.display(), entries = listing.len(), "catalog built");
    Ok(listing)
}

/// Display name of a compression method code.
pub fn method_to_string(method: u16) -> String {
    match CompressionMethod::from_u16(method) {
        CompressionMethod::Stored => "STORE".to_string(),
        CompressionMethod::Deflate => "DEFLATE".to_string(),
        CompressionMethod::Unknown(code) => format!("0x{:X}", code),
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ`, or `None` for years RFC3339 cannot express.
pub fn format_rfc3339(at: OffsetDateTime) -> Option<String> {
    at.format(&Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::io::Write;

    #[test]
    fn method_names() {
        assert_eq!(method_to_string(0), "STORE");
        assert_eq!(method_to_string(8), "DEFLATE");
        assert_eq!(method_to_string(1), "0x1");
        assert_eq!(method_to_string(12), "0xC");
        assert_eq!(method_to_string(14), "0xE");
        assert_eq!(method_to_string(255), "0xFF");
    }

    fn rfc3339(secs: i64) -> String {
        format_rfc3339(OffsetDateTime::from_unix_timestamp(secs).unwrap()).unwrap()
    }

    #[test]
    fn rfc3339_formatting() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00Z");
        assert_eq!(rfc3339(1_705_314_600), "2024-01-15T10:30:00Z");
        assert_eq!(rfc3339(951_782_400), "2000-02-29T00:00:00Z");
    }

    #[test]
    fn entry_without_time_uses_placeholder() {
        let raw = ZipFileEntry {
            file_name: "folder/".into(),
            version_made_by: 0,
            compression_method: CompressionMethod::Unknown(14),
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            external_attrs: 0,
            extra_mtime: None,
        };

        let entry = ArchiveEntry::from(&raw);
        assert!(entry.is_directory());
        assert_eq!(entry.method(), "0xE");
        assert_eq!(entry.modified_at(), "-");
        assert_eq!(entry.crc32(), 0);
    }

    #[test]
    fn columns_render_display_strings() {
        let entry = ArchiveEntry::new(
            "test.txt",
            false,
            1024,
            512,
            "DEFLATE",
            "2024-01-15T10:30:00Z",
            12_345_678,
        );
        assert_eq!(
            entry.columns(),
            [
                "test.txt".to_string(),
                "false".to_string(),
                "1024".to_string(),
                "2024-01-15T10:30:00Z".to_string(),
                "12345678".to_string(),
            ]
        );
        assert_eq!(entry.compressed_size(), 512);
    }

    #[tokio::test]
    async fn builds_listing_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = testing::scenario(dir.path());

        let listing = build_catalog(&path).await.unwrap();
        assert_eq!(listing.len(), 3);

        let a = listing.get(0).unwrap();
        assert_eq!(a.name(), "a.txt");
        assert_eq!(a.method(), "STORE");
        assert_eq!(a.uncompressed_size(), 10);
        assert_eq!(a.compressed_size(), 10);
        assert!(!a.is_directory());
        // Fixture entries carry the default 1980-01-01 MS-DOS time
        assert_eq!(a.modified_at(), "1980-01-01T00:00:00Z");

        let dir_entry = listing.get(1).unwrap();
        assert_eq!(dir_entry.name(), "dir/");
        assert!(dir_entry.is_directory());
        assert_eq!(dir_entry.crc32(), 0);

        let b = listing.get(2).unwrap();
        assert_eq!(b.name(), "dir/b.txt");
        assert_eq!(b.method(), "DEFLATE");
        assert_eq!(b.uncompressed_size(), 20);

        let directories = listing.iter().filter(|e| e.is_directory()).count();
        assert_eq!(directories, 1);
    }

    #[tokio::test]
    async fn missing_archive_fails() {
        assert!(build_catalog(Path::new("/path/to/nonexistent/file.zip"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn corrupt_directory_entry_fails_whole_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = testing::scenario(dir.path());

        let mut bytes = std::fs::read(&path).unwrap();
        let headers: Vec<usize> = bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == b"PK\x01\x02")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(headers.len(), 3);
        // Break the signature of the second record
        bytes[headers[1] + 3] = 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = build_catalog(&path).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Corrupt Central Directory entry #1"));
    }

    #[tokio::test]
    async fn non_zip_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"This is not a zip file").unwrap();

        let err = build_catalog(file.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Not a valid ZIP file"));
    }
}
