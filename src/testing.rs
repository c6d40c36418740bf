//! Fixture archives for unit tests.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ::zip::write::SimpleFileOptions;
use ::zip::{CompressionMethod, ZipWriter};

pub enum Item<'a> {
    Dir(&'a str),
    Stored(&'a str, &'a [u8]),
    Deflated(&'a str, &'a [u8]),
}

pub fn write_zip(path: &Path, items: &[Item<'_>]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for item in items {
        match item {
            Item::Dir(name) => writer.add_directory(*name, stored).unwrap(),
            Item::Stored(name, data) => {
                writer.start_file(*name, stored).unwrap();
                writer.write_all(data).unwrap();
            }
            Item::Deflated(name, data) => {
                writer.start_file(*name, deflated).unwrap();
                writer.write_all(data).unwrap();
            }
        }
    }

    writer.finish().unwrap();
}

/// `a.txt` (stored, 10 bytes), `dir/`, `dir/b.txt` (deflated, 20 bytes).
pub fn scenario(dir: &Path) -> PathBuf {
    let path = dir.join("scenario.zip");
    write_zip(
        &path,
        &[
            Item::Stored("a.txt", b"0123456789"),
            Item::Dir("dir/"),
            Item::Deflated("dir/b.txt", b"deflated deflated!!!"),
        ],
    );
    path
}
