use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Compression method code of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Classic EOCD record; 22 bytes plus the archive comment.
pub struct EndOfCentralDirectory {
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        // Skip signature, disk number and disk holding the central directory
        let mut cursor = Cursor::new(&data[8..]);

        Ok(Self {
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// Points at the ZIP64 EOCD record; sits right before the classic one.
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory Locator");
        }

        let mut cursor = Cursor::new(&data[8..]);

        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 EOCD record, only the fields needed to find the central directory.
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory");
        }

        // Record size, versions, disk numbers and per-disk entry count precede
        // the fields we need.
        let mut cursor = Cursor::new(&data[32..]);

        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Extra field carrying 64-bit sizes and offsets
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// NTFS extra field; attribute 1 holds 100ns FILETIME values
pub const NTFS_EXTRA_ID: u16 = 0x000a;
/// Info-ZIP extended timestamp extra field
pub const EXTENDED_TIMESTAMP_EXTRA_ID: u16 = 0x5455;
/// Older Info-ZIP Unix extra field: atime, mtime, optional uid/gid
pub const INFOZIP_UNIX_EXTRA_ID: u16 = 0x5855;

/// Host system codes found in the high byte of "version made by"
const HOST_MSDOS: u8 = 0;
const HOST_UNIX: u8 = 3;
const HOST_NTFS: u8 = 11;
const HOST_VFAT: u8 = 14;
const HOST_MACOS: u8 = 19;

const MSDOS_DIR_ATTR: u32 = 0x10;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_DIR_TYPE: u32 = 0o040000;

/// One central directory record.
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub version_made_by: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub external_attrs: u32,
    /// Modification time from a timestamp extra field, in Unix seconds
    pub extra_mtime: Option<i64>,
}

impl ZipFileEntry {
    /// MS-DOS date as (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// MS-DOS time as (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Whether the entry describes a directory.
    ///
    /// A trailing slash is the usual marker, but archivers also record the
    /// directory bit in the external attributes of the host that made them.
    pub fn is_directory(&self) -> bool {
        if self.file_name.ends_with('/') {
            return true;
        }

        match (self.version_made_by >> 8) as u8 {
            HOST_UNIX | HOST_MACOS => {
                (self.external_attrs >> 16) & UNIX_FILE_TYPE_MASK == UNIX_DIR_TYPE
            }
            HOST_MSDOS | HOST_NTFS | HOST_VFAT => self.external_attrs & MSDOS_DIR_ATTR != 0,
            _ => false,
        }
    }

    /// Modification time, UTC.
    ///
    /// A timestamp extra field wins over the MS-DOS fields. MS-DOS time has
    /// no zone and is read as UTC. `None` when the archive stores no time.
    pub fn modified_at(&self) -> Option<OffsetDateTime> {
        if let Some(at) = self
            .extra_mtime
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        {
            return Some(at);
        }

        if self.last_mod_date == 0 && self.last_mod_time == 0 {
            return None;
        }

        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();

        // Out-of-range fields are clamped rather than rejected
        let year = year as i32;
        let month = Month::try_from(month.clamp(1, 12)).ok()?;
        let day = day.clamp(1, time::util::days_in_year_month(year, month));
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let clock = Time::from_hms(hour.min(23), minute.min(59), second.min(59)).ok()?;

        Some(PrimitiveDateTime::new(date, clock).assume_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            version_made_by: 0,
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            external_attrs: 0,
            extra_mtime: None,
        }
    }

    #[test]
    fn directory_from_trailing_slash() {
        assert!(entry("docs/").is_directory());
        assert!(!entry("docs/readme.txt").is_directory());
    }

    #[test]
    fn directory_from_external_attributes() {
        let mut dos = entry("docs");
        dos.external_attrs = 0x10;
        assert!(dos.is_directory());

        let mut unix = entry("bin");
        unix.version_made_by = 3 << 8 | 20;
        unix.external_attrs = 0o040755 << 16;
        assert!(unix.is_directory());

        unix.external_attrs = 0o100644 << 16;
        assert!(!unix.is_directory());
    }

    #[test]
    fn windows_hosts_use_msdos_attribute() {
        for host in [11u16, 14] {
            let mut e = entry("docs");
            e.version_made_by = host << 8 | 20;
            e.external_attrs = 0x10;
            assert!(e.is_directory(), "host {host}");

            e.external_attrs = 0x20;
            assert!(!e.is_directory(), "host {host}");
        }
    }

    #[test]
    fn macos_host_uses_unix_mode() {
        let mut e = entry("Applications");
        e.version_made_by = 19 << 8 | 20;
        e.external_attrs = 0o040755 << 16;
        assert!(e.is_directory());

        e.external_attrs = (0o100644 << 16) | 0x10;
        assert!(!e.is_directory());
    }

    #[test]
    fn unknown_host_ignores_attributes() {
        let mut e = entry("docs");
        e.version_made_by = 10 << 8 | 20;
        e.external_attrs = 0x10;
        assert!(!e.is_directory());
    }

    #[test]
    fn dos_time_is_read_as_utc() {
        let mut e = entry("a.txt");
        // 2024-01-15 10:30:00
        e.last_mod_date = (44 << 9) | (1 << 5) | 15;
        e.last_mod_time = (10 << 11) | (30 << 5);
        let at = e.modified_at().unwrap();
        assert_eq!(at.unix_timestamp(), 1_705_314_600);
        assert!(at.offset().is_utc());
    }

    #[test]
    fn out_of_range_dos_fields_are_clamped() {
        let mut e = entry("a.txt");
        // 2024-00-00 25:61:62 clamps to 2024-01-01 23:59:59
        e.last_mod_date = 44 << 9;
        e.last_mod_time = (25 << 11) | (61 << 5) | 31;
        assert_eq!(e.modified_at().unwrap().unix_timestamp(), 1_704_153_599);

        // February 31st of a leap year clamps to the 29th
        e.last_mod_date = (44 << 9) | (2 << 5) | 31;
        e.last_mod_time = 0;
        let at = e.modified_at().unwrap();
        assert_eq!((at.month(), at.day()), (Month::February, 29));

        // Month 13 clamps to December
        e.last_mod_date = (43 << 9) | (13 << 5) | 5;
        assert_eq!(e.modified_at().unwrap().month(), Month::December);
    }

    #[test]
    fn missing_time_is_none() {
        assert_eq!(entry("a.txt").modified_at(), None);
    }

    #[test]
    fn extra_field_time_wins() {
        let mut e = entry("a.txt");
        e.last_mod_date = (44 << 9) | (1 << 5) | 15;
        e.extra_mtime = Some(0);
        assert_eq!(e.modified_at(), Some(OffsetDateTime::UNIX_EPOCH));
    }

    #[test]
    fn unrepresentable_extra_time_falls_back_to_dos() {
        let mut e = entry("a.txt");
        e.last_mod_date = (44 << 9) | (1 << 5) | 15;
        e.extra_mtime = Some(i64::MAX);
        assert_eq!(e.modified_at().unwrap().year(), 2024);
    }

    #[test]
    fn eocd_rejects_bad_signature() {
        let data = [0u8; EndOfCentralDirectory::SIZE];
        assert!(EndOfCentralDirectory::from_bytes(&data).is_err());
    }
}
