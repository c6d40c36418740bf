use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "zipnav")]
#[command(version)]
#[command(about = "Browse a ZIP archive in the terminal and extract files or folders", long_about = None)]
#[command(after_help = "Keys:\n  \
  Up/Down, j/k, PgUp/PgDn, g/G   move the selection\n  \
  Enter                          extract the selected file or folder\n  \
  f                              filter rows (Enter keeps, Esc clears)\n  \
  q, Ctrl+C                      quit")]
pub struct Cli {
    /// ZIP file to open, relative to the working directory
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,

    /// Extract files into DIR instead of the working directory
    #[arg(short = 'd', long = "extract-dir", value_name = "DIR")]
    pub extract_dir: Option<PathBuf>,

    /// Write logs to PATH (level from RUST_LOG, default info)
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Problems with the command line; reported before any UI is shown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("no zip file provided")]
    Missing,

    #[error("i don't know what to do with so many arguments")]
    TooMany,

    #[error("invalid zip file name")]
    InvalidName,
}

impl Cli {
    /// The single archive argument, checked for the `.zip` suffix.
    ///
    /// # Errors
    ///
    /// * [`ArgumentError::Missing`] - no positional argument
    /// * [`ArgumentError::TooMany`] - more than one
    /// * [`ArgumentError::InvalidName`] - the name does not end in `.zip`
    ///   (the check is case-sensitive)
    pub fn archive_name(&self) -> Result<&str, ArgumentError> {
        match self.files.as_slice() {
            [] => Err(ArgumentError::Missing),
            [name] if name.ends_with(".zip") => Ok(name),
            [_] => Err(ArgumentError::InvalidName),
            _ => Err(ArgumentError::TooMany),
        }
    }

    /// Archive path resolved against `cwd`.
    pub fn archive_path(&self, cwd: &Path) -> Result<PathBuf, ArgumentError> {
        Ok(cwd.join(self.archive_name()?))
    }

    /// Where extracted files go.
    ///
    /// # Returns
    ///
    /// `--extract-dir` resolved against `cwd`, or `cwd` itself.
    pub fn destination(&self, cwd: &Path) -> PathBuf {
        match &self.extract_dir {
            Some(dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("zipnav").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn accepts_single_zip() {
        assert_eq!(parse(&["test.zip"]).archive_name(), Ok("test.zip"));
        assert_eq!(
            parse(&["folder/test.zip"]).archive_name(),
            Ok("folder/test.zip")
        );
        assert_eq!(parse(&[".zip"]).archive_name(), Ok(".zip"));
    }

    #[test]
    fn argument_errors_are_distinct() {
        assert_eq!(parse(&[]).archive_name(), Err(ArgumentError::Missing));
        assert_eq!(
            parse(&["file1.zip", "file2.zip"]).archive_name(),
            Err(ArgumentError::TooMany)
        );
        assert_eq!(
            parse(&["test.txt"]).archive_name(),
            Err(ArgumentError::InvalidName)
        );
        assert_eq!(parse(&[""]).archive_name(), Err(ArgumentError::InvalidName));
    }

    #[test]
    fn suffix_check_is_case_sensitive() {
        assert_eq!(
            parse(&["ARCHIVE.ZIP"]).archive_name(),
            Err(ArgumentError::InvalidName)
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(ArgumentError::Missing.to_string(), "no zip file provided");
        assert_eq!(
            ArgumentError::TooMany.to_string(),
            "i don't know what to do with so many arguments"
        );
        assert_eq!(ArgumentError::InvalidName.to_string(), "invalid zip file name");
    }

    #[test]
    fn paths_resolve_against_working_directory() {
        let cwd = Path::new("/work");
        let cli = parse(&["-d", "out", "data/a.zip"]);
        assert_eq!(
            cli.archive_path(cwd).unwrap(),
            PathBuf::from("/work/data/a.zip")
        );
        assert_eq!(cli.destination(cwd), PathBuf::from("/work/out"));
        assert_eq!(parse(&["a.zip"]).destination(cwd), PathBuf::from("/work"));
    }
}
