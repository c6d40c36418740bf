//! Main entry point for the zipnav terminal browser.
//!
//! Arguments and the archive's Central Directory are checked before the
//! terminal is switched to the alternate screen, so those errors print as
//! plain messages. Once the browser runs, extraction failures are shown in
//! the table title instead.

use anyhow::{Context, Result};
use clap::Parser;

use zipnav::{App, BrowserState, Cli, build_catalog, logging};

/// Application entry point.
///
/// Parses arguments, installs file logging when requested, reads the
/// catalog and hands the terminal to [`App::run`] until the user quits.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let archive_name = cli.archive_name()?;
    let archive_path = cli.archive_path(&cwd)?;

    // Argument and archive errors are reported before the terminal is taken over
    let listing = build_catalog(&archive_path).await?;
    let app = App::new(
        BrowserState::new(archive_name, listing),
        archive_path,
        cli.destination(&cwd),
    );

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal).await;
    ratatui::restore();
    result
}
