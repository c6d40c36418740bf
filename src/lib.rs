//! # zipnav
//!
//! Browse the contents of a ZIP archive in the terminal and extract single
//! files or whole folders.
//!
//! The archive's central directory is read once into an immutable
//! [`ArchiveListing`]. The [`BrowserState`] state machine turns key presses
//! into selection moves, filter edits and extraction requests; the
//! extraction engine reopens the archive for every request and streams
//! matching entries to disk.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let archive = Path::new("archive.zip");
//!     let listing = zipnav::build_catalog(archive).await?;
//!     for entry in listing.iter() {
//!         println!("{}", entry.name());
//!     }
//!
//!     let extracted = zipnav::extract(archive, "docs/", Path::new("out")).await?;
//!     println!("{} files", extracted);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod browser;
pub mod catalog;
pub mod cli;
pub mod filter;
pub mod io;
pub mod logging;
pub mod ui;
pub mod zip;

#[cfg(test)]
mod testing;

pub use app::App;
pub use browser::{BrowserState, Effect, Key, Mode};
pub use catalog::{ArchiveEntry, ArchiveListing, build_catalog};
pub use cli::{ArgumentError, Cli};
pub use crate::zip::{ExtractError, ZipExtractor, ZipFileEntry, extract};
pub use io::{LocalFileReader, ReadAt};
