//! Cutout compositing CLI tool
//!
//! Applies the drop-shadow and background-fill passes of the
//! cutout-compose library to an already-segmented RGBA image.

#[cfg(feature = "cli")]
use cutout_compose::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
