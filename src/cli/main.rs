//! Command-line frontend for the compositing pipeline
//!
//! Segmentation is an external collaborator, so the CLI operates on an
//! already-segmented RGBA image: the input's alpha channel is taken as
//! the cutout mask, and the shadow and background passes run over it.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use crate::{
    color::Background,
    compositor::{ComposeOptions, Compositor, ShadowSpec},
    services::ImageIOService,
    tracing_config,
    types::Cutout,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout-compose")]
pub struct Cli {
    /// Input image (RGBA; alpha channel is the segmentation cutout)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output PNG path (defaults to <input>_composed.png)
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Background: "transparent", "#RRGGBB" hex, or a color name
    #[arg(short, long, default_value = "transparent")]
    pub background: String,

    /// Composite a ground-contact drop shadow
    #[arg(short, long)]
    pub shadow: bool,

    /// Shadow opacity (0.0 - 1.0)
    #[arg(long, default_value_t = 0.31)]
    pub shadow_opacity: f32,

    /// Shadow Gaussian blur radius in pixels
    #[arg(long, default_value_t = 12)]
    pub shadow_blur: u32,

    /// Shadow width as a multiple of the subject width
    #[arg(long, default_value_t = 1.0)]
    pub shadow_scale: f32,

    /// Horizontal shadow offset in pixels
    #[arg(long, default_value_t = 0)]
    pub shadow_offset_x: i32,

    /// Vertical shadow offset in pixels
    #[arg(long, default_value_t = 0)]
    pub shadow_offset_y: i32,

    /// Increase verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self
                .input
                .file_stem()
                .map_or_else(|| "output".into(), std::ffi::OsStr::to_os_string);
            let mut name = stem;
            name.push("_composed.png");
            self.input.with_file_name(name)
        })
    }

    fn compose_options(&self) -> anyhow::Result<ComposeOptions> {
        let background = Background::parse(&self.background)
            .with_context(|| format!("invalid --background '{}'", self.background))?;
        let shadow = if self.shadow {
            let spec = ShadowSpec::default()
                .with_opacity(self.shadow_opacity)
                .with_blur_radius(self.shadow_blur)
                .with_size_scale(self.shadow_scale)
                .with_offset(self.shadow_offset_x, self.shadow_offset_y);
            spec.validate()?;
            Some(spec)
        } else {
            None
        };
        Ok(ComposeOptions { shadow, background })
    }
}

/// CLI entry point
///
/// # Errors
///
/// Returns an error for unreadable input, invalid parameters, or
/// failed output writes.
pub fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_config::init_cli_tracing(cli.verbose)?;

    let options = cli.compose_options()?;
    let image = ImageIOService::load_image(&cli.input)
        .with_context(|| format!("failed to load '{}'", cli.input.display()))?;
    let cutout = Cutout::from_dynamic(&image);

    let composited = Compositor::composite(&cutout, &options)?;
    let output_path = cli.output_path();
    composited
        .save_with_format(&output_path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write '{}'", output_path.display()))?;

    info!(
        input = %cli.input.display(),
        output = %output_path.display(),
        "composited image written"
    );
    println!("{}", output_path.display());
    Ok(())
}
