//! Verithrax thumbnail CLI
//!
//! Command-line interface for building inpainting mattes, studio canvases and
//! publication thumbnails with the verithrax-thumbnail library.

#[cfg(feature = "cli")]
use verithrax_thumbnail::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
