//! `slide`: compose and generate decks, and browse the slide library.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    slide_cli::run_cli().await
}
