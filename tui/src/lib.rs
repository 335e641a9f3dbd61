//! Terminal rendering for the slide library.

pub mod library_view;

use anyhow::Result;
use slide_client::SlideApi;
use slide_common::SlideConfig;
use slide_core::LibraryWorkflow;
use std::path::PathBuf;

pub use library_view::{Disclosure, LibraryBrowser};

/// Browse the library until the user quits. Downloads land in `download_dir`.
pub async fn run_library(config: &SlideConfig, download_dir: PathBuf) -> Result<()> {
    let api = SlideApi::from_config(config)?;
    let mut browser = LibraryBrowser::new(LibraryWorkflow::new(api, config), download_dir);
    browser.run().await
}
