//! Central directory reader.
//!
//! Locating the entries works backwards from the end of the file: the EOCD
//! record (possibly followed by a comment), then the ZIP64 locator and
//! record when the classic fields are saturated, then the central directory
//! itself. Local headers are only read to find where a payload starts.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};
use tracing::debug;

use super::structures::*;

/// Longest archive comment; bounds the backward EOCD search.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so tests and callers can plug in any
/// random-access source. Typically used through
/// [`ZipExtractor`](super::ZipExtractor) or the catalog builder.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(Arc::new(LocalFileReader::new(path)?));
/// for entry in parser.list_files().await? {
///     let offset = parser.data_offset(&entry).await?;
///     // Payload of `entry` starts at `offset`
/// }
/// ```
pub struct ZipParser<R: ReadAt> {
    reader: Arc<R>,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a parser over `reader`.
    ///
    /// # Arguments
    ///
    /// * `reader` - Shared random-access source; its size is read once here
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the file. Archives with a
    /// trailing comment are handled by searching backwards for the
    /// signature and checking that the comment length accounts for every
    /// remaining byte.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of the EOCD in the file).
    ///
    /// # Errors
    ///
    /// "Not a valid ZIP file" when the source is too short or no EOCD with
    /// a matching comment length exists.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        if self.size < EndOfCentralDirectory::SIZE as u64 {
            bail!("Not a valid ZIP file");
        }

        // Common case first: no comment, EOCD is the last 22 bytes
        let offset = self.size - EndOfCentralDirectory::SIZE as u64;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        let last_candidate = buf.len() - EndOfCentralDirectory::SIZE;
        for i in (0..=last_candidate).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }

            let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
            if eocd.comment_len as usize == buf.len() - i - EndOfCentralDirectory::SIZE {
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has saturated fields. The locator sits
    /// immediately before the regular EOCD and points at the ZIP64 record.
    ///
    /// # Arguments
    ///
    /// * `eocd_offset` - Offset of the regular EOCD, as returned by
    ///   [`find_eocd`](Self::find_eocd)
    ///
    /// # Errors
    ///
    /// Fails when the locator or the ZIP64 record is missing or has a bad
    /// signature.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("Missing ZIP64 End of Central Directory Locator")?;

        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List every record of the Central Directory, in file order.
    ///
    /// Fails as a whole if any header is malformed; there is no partial
    /// listing.
    ///
    /// # Returns
    ///
    /// One [`ZipFileEntry`] per record, with ZIP64 sizes and extra-field
    /// timestamps already applied.
    ///
    /// # Errors
    ///
    /// Any EOCD error, a directory extending past the end of the file, or
    /// "Corrupt Central Directory entry #N" naming the first bad record.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if cd_offset.saturating_add(cd_size) > self.size {
            bail!("Central Directory lies outside the archive");
        }
        if total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size {
            bail!("Central Directory is too small for {} entries", total_entries);
        }

        debug!(cd_offset, cd_size, total_entries, "reading central directory");

        // One read for the whole directory
        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..total_entries {
            let entry = parse_cdfh(&mut cursor)
                .with_context(|| format!("Corrupt Central Directory entry #{}", index))?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Offset of the first payload byte of `entry`.
    ///
    /// The Local File Header repeats the name and may carry a different
    /// extra field than the central record, so its lengths are read from
    /// the header itself.
    ///
    /// # Errors
    ///
    /// Fails when the Local File Header cannot be read or has a bad
    /// signature.
    pub async fn data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await
            .with_context(|| format!("Cannot read Local File Header of {}", entry.file_name))?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name);
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    /// The underlying source, for reading payloads.
    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

/// Decode one Central Directory File Header at the cursor position.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        bail!("Invalid Central Directory File Header");
    }

    let version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let _flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()?;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()?;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Non-UTF-8 names (legacy code pages) are shown lossily
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

    let mut extra = vec![0u8; extra_field_length as usize];
    cursor.read_exact(&mut extra)?;

    let mut entry = ZipFileEntry {
        file_name,
        version_made_by,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size: compressed_size as u64,
        uncompressed_size: uncompressed_size as u64,
        crc32,
        lfh_offset: lfh_offset as u64,
        last_mod_time,
        last_mod_date,
        external_attrs,
        extra_mtime: None,
    };
    apply_extra_fields(&mut entry, &extra, compressed_size, uncompressed_size, lfh_offset)?;

    // The comment is not shown anywhere
    cursor.set_position(cursor.position() + file_comment_length as u64);

    Ok(entry)
}

/// Seconds between 1601-01-01 (NTFS epoch) and 1970-01-01.
const NTFS_EPOCH_OFFSET: i64 = 11_644_473_600;
const NTFS_TICKS_PER_SECOND: u64 = 10_000_000;

/// Apply the extra fields we understand to `entry`.
///
/// ZIP64 values are present only for the header fields saturated at
/// `0xFFFFFFFF`, in the fixed order uncompressed, compressed, offset.
/// Timestamp fields are applied in order, the last one wins. A field
/// claiming more bytes than remain ends the walk; what was read so far
/// is kept.
fn apply_extra_fields(
    entry: &mut ZipFileEntry,
    extra: &[u8],
    compressed_size: u32,
    uncompressed_size: u32,
    lfh_offset: u32,
) -> Result<()> {
    let mut cursor = Cursor::new(extra);

    while cursor.position() + 4 <= extra.len() as u64 {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as u64;
        let field_end = cursor.position() + field_size;
        if field_end > extra.len() as u64 {
            debug!(
                entry = %entry.file_name,
                "extra field 0x{:04X} overruns its header, ignoring the rest",
                header_id
            );
            break;
        }

        match header_id {
            ZIP64_EXTRA_ID => {
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    entry.uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    entry.compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    entry.lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }
            NTFS_EXTRA_ID if field_size >= 4 => {
                let _reserved = cursor.read_u32::<LittleEndian>()?;
                while cursor.position() + 4 <= field_end {
                    let tag = cursor.read_u16::<LittleEndian>()?;
                    let size = cursor.read_u16::<LittleEndian>()? as u64;
                    let attr_end = cursor.position() + size;
                    if attr_end > field_end {
                        break;
                    }
                    // Attribute 1: mtime, atime, ctime
                    if tag == 1 && size == 24 {
                        let ticks = cursor.read_u64::<LittleEndian>()?;
                        let secs = (ticks / NTFS_TICKS_PER_SECOND) as i64;
                        entry.extra_mtime = Some(secs - NTFS_EPOCH_OFFSET);
                    }
                    cursor.set_position(attr_end);
                }
            }
            EXTENDED_TIMESTAMP_EXTRA_ID if field_size >= 5 => {
                let flags = cursor.read_u8()?;
                // Bit 0: modification time present
                if flags & 0x01 != 0 {
                    entry.extra_mtime = Some(cursor.read_u32::<LittleEndian>()? as i64);
                }
            }
            INFOZIP_UNIX_EXTRA_ID if field_size >= 8 => {
                let _atime = cursor.read_u32::<LittleEndian>()?;
                entry.extra_mtime = Some(cursor.read_u32::<LittleEndian>()? as i64);
            }
            _ => {}
        }

        cursor.set_position(field_end);
    }

    Ok(())
}
