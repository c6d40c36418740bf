use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use flate2::Crc;
use flate2::write::DeflateDecoder;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::io::{LocalFileReader, ReadAt};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Compressed bytes read from the archive per step.
const CHUNK_SIZE: usize = 64 * 1024;

/// Why an extraction stopped.
///
/// None of these end the browsing session; they are shown next to the row
/// that triggered the extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file or folder '{0}' not found in ZIP archive")]
    NotFound(String),

    #[error("failed to open ZIP file: {0:#}")]
    Open(anyhow::Error),

    /// Writing one entry failed. Files written before it are kept.
    #[error("failed to extract {name}: {source:#}")]
    Entry {
        name: String,
        extracted: usize,
        #[source]
        source: anyhow::Error,
    },
}

impl ExtractError {
    /// Files fully written before the failure.
    pub fn extracted(&self) -> usize {
        match self {
            ExtractError::Entry { extracted, .. } => *extracted,
            ExtractError::NotFound(_) | ExtractError::Open(_) => 0,
        }
    }
}

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract `target_name` and everything below it into `dest_dir`.
    ///
    /// A record matches when its name equals `target_name` or starts with
    /// `target_name` followed by `/`, so the same call handles a single file
    /// and a whole folder. Directory records only mark a match; their files
    /// are what gets written.
    ///
    /// # Arguments
    ///
    /// * `target_name` - Entry name as shown in the listing, with or without
    ///   a trailing `/` for folders
    /// * `dest_dir` - Directory the entry paths are recreated under
    ///
    /// # Returns
    ///
    /// The number of files written; `0` for a folder holding no files.
    ///
    /// # Errors
    ///
    /// * [`ExtractError::Open`] - the Central Directory cannot be read
    /// * [`ExtractError::NotFound`] - no record matches; nothing is written
    /// * [`ExtractError::Entry`] - a file failed; earlier files stay on disk
    ///   and their count is carried in the error
    pub async fn extract_matching(
        &self,
        target_name: &str,
        dest_dir: &Path,
    ) -> Result<usize, ExtractError> {
        let entries = self.list_files().await.map_err(ExtractError::Open)?;

        let target_prefix = if target_name.ends_with('/') {
            target_name.to_string()
        } else {
            format!("{}/", target_name)
        };

        let mut found = false;
        let mut extracted = 0;

        for entry in entries
            .iter()
            .filter(|e| e.file_name == target_name || e.file_name.starts_with(&target_prefix))
        {
            found = true;

            if entry.is_directory() {
                continue;
            }

            let written = async {
                let path = output_path(dest_dir, &entry.file_name)?;
                self.extract_to_file(entry, &path).await?;
                Ok::<_, anyhow::Error>(path)
            }
            .await;

            match written {
                Ok(path) => {
                    debug!(entry = %entry.file_name, path = %path.display(), "extracted");
                    extracted += 1;
                }
                Err(source) => {
                    warn!(entry = %entry.file_name, extracted, "extraction aborted: {:#}", source);
                    return Err(ExtractError::Entry {
                        name: entry.file_name.clone(),
                        extracted,
                        source,
                    });
                }
            }
        }

        if !found {
            return Err(ExtractError::NotFound(target_name.to_string()));
        }

        info!(name = target_name, extracted, "extraction finished");
        Ok(extracted)
    }

    /// Decompress one entry into `output_path`, creating parent directories
    /// and replacing any existing file.
    ///
    /// The payload is streamed in chunks and checked against the size and
    /// CRC32 recorded in the central directory.
    pub async fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        let mut inflater = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(DeflateDecoder::new(Vec::new())),
            CompressionMethod::Unknown(code) => {
                bail!("unsupported compression method 0x{:X}", code)
            }
        };

        let data_offset = self.parser.data_offset(entry).await?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let file = fs::File::create(output_path)
            .await
            .with_context(|| format!("failed to create {}", output_path.display()))?;
        let mut out = BufWriter::new(file);

        let mut crc = Crc::new();
        let mut written = 0u64;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset = data_offset;
        let mut remaining = entry.compressed_size;

        while remaining > 0 {
            let n = remaining.min(CHUNK_SIZE as u64) as usize;
            self.parser
                .reader()
                .read_exact_at(offset, &mut buf[..n])
                .await?;
            offset += n as u64;
            remaining -= n as u64;

            let decoded: &[u8] = match inflater.as_mut() {
                Some(decoder) => {
                    decoder.write_all(&buf[..n]).context("corrupt deflate stream")?;
                    decoder.get_ref()
                }
                None => &buf[..n],
            };

            crc.update(decoded);
            written += decoded.len() as u64;
            out.write_all(decoded).await?;

            if let Some(decoder) = inflater.as_mut() {
                decoder.get_mut().clear();
            }
        }

        if let Some(decoder) = inflater {
            let tail = decoder.finish().context("corrupt deflate stream")?;
            crc.update(&tail);
            written += tail.len() as u64;
            out.write_all(&tail).await?;
        }

        out.flush().await?;

        if written != entry.uncompressed_size {
            bail!(
                "size mismatch: expected {} bytes, got {}",
                entry.uncompressed_size,
                written
            );
        }
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC32 mismatch: expected {:08x}, got {:08x}",
                entry.crc32,
                crc.sum()
            );
        }

        Ok(())
    }
}

/// Extract `target_name` (a file, or a folder and its whole subtree) from the
/// archive at `archive_path` into `dest_dir`.
///
/// The archive is opened for this call only and closed before returning.
pub async fn extract(
    archive_path: &Path,
    target_name: &str,
    dest_dir: &Path,
) -> Result<usize, ExtractError> {
    let reader = LocalFileReader::new(archive_path).map_err(ExtractError::Open)?;
    ZipExtractor::new(Arc::new(reader))
        .extract_matching(target_name, dest_dir)
        .await
}

/// Destination path of `name` under `dest_dir`.
///
/// Only plain path components are accepted; an absolute name or one
/// containing `..` would land outside `dest_dir`.
fn output_path(dest_dir: &Path, name: &str) -> Result<PathBuf> {
    let mut path = dest_dir.to_path_buf();
    let mut has_name = false;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                has_name = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("unsafe entry path: {}", name)
            }
        }
    }

    if !has_name {
        bail!("unsafe entry path: {}", name);
    }

    Ok(path)
}
