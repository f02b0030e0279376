//! Service layer: image IO and output artifact persistence

pub mod io;

pub use io::{ArtifactStore, ImageIOService};
