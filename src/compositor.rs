//! Compositing pipeline: shadow synthesis, alpha blending, background fill
//!
//! Turns a [`Cutout`] into the final presentable image via two optional
//! passes applied in a fixed order: shadow first, then background fill.
//! The shadow must sit visually behind the subject, and the background
//! behind both, so the layer stack is always:
//!
//! ```text
//! background fill  (bottom, optional)
//! shadow layer     (optional)
//! cutout           (top)
//! ```
//!
//! All blending uses the standard non-premultiplied "over" operator.

use crate::{
    color::Background,
    error::{CutoutError, Result},
    types::{BoundingBox, Cutout},
};
use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};
use tracing::debug;

/// Minimum ground-contact ellipse height in pixels
///
/// Keeps the shadow visible for thin or single-pixel subjects instead of
/// collapsing to a zero-area ellipse.
const MIN_ELLIPSE_HEIGHT: f32 = 10.0;

/// Fraction of the subject's height used for the ellipse height
const ELLIPSE_HEIGHT_RATIO: f32 = 0.08;

/// Parameters for synthetic ground-contact shadow generation
///
/// The shadow geometry is derived entirely from the cutout's alpha
/// channel at composite time and recomputed per request.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShadowSpec {
    /// Shadow opacity in `[0, 1]`
    pub opacity: f32,
    /// Gaussian blur sigma applied to the rasterized ellipse (0 = no blur)
    pub blur_radius: u32,
    /// Multiplier on the subject's bounding-box width (> 0)
    pub size_scale: f32,
    /// Pixel offset applied to the ellipse center as (dx, dy)
    pub offset: (i32, i32),
}

impl Default for ShadowSpec {
    fn default() -> Self {
        Self {
            // 80/255, the halo fill earlier deployments shipped with
            opacity: 0.31,
            blur_radius: 12,
            size_scale: 1.0,
            offset: (0, 0),
        }
    }
}

impl ShadowSpec {
    /// Set the shadow opacity
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the blur radius
    #[must_use]
    pub fn with_blur_radius(mut self, blur_radius: u32) -> Self {
        self.blur_radius = blur_radius;
        self
    }

    /// Set the size scale
    #[must_use]
    pub fn with_size_scale(mut self, size_scale: f32) -> Self {
        self.size_scale = size_scale;
        self
    }

    /// Set the center offset
    #[must_use]
    pub fn with_offset(mut self, dx: i32, dy: i32) -> Self {
        self.offset = (dx, dy);
        self
    }

    /// Validate parameter ranges
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::InvalidConfig`] when opacity is outside
    /// `[0, 1]` or the size scale is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(CutoutError::invalid_config(format!(
                "shadow opacity must be within [0, 1], got {}",
                self.opacity
            )));
        }
        if !self.size_scale.is_finite() || self.size_scale <= 0.0 {
            return Err(CutoutError::invalid_config(format!(
                "shadow size scale must be positive, got {}",
                self.size_scale
            )));
        }
        Ok(())
    }
}

/// Per-request compositing options: the two optional passes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComposeOptions {
    /// Shadow pass; `None` disables it
    pub shadow: Option<ShadowSpec>,
    /// Background pass; `Transparent` disables it
    pub background: Background,
}

impl ComposeOptions {
    /// Options with both passes disabled (output alpha equals cutout alpha)
    #[must_use]
    pub fn passthrough() -> Self {
        Self::default()
    }
}

/// Ground-contact ellipse in sub-pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShadowEllipse {
    center_x: f32,
    center_y: f32,
    radius_x: f32,
    radius_y: f32,
}

/// Stateless compositing service
pub struct Compositor;

impl Compositor {
    /// Run the full compositing pipeline on a cutout
    ///
    /// When both passes are disabled the cutout is returned unchanged so
    /// the output alpha channel matches the segmentation result exactly.
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::Internal`] only for layer dimension
    /// mismatches, which cannot occur for layers built here and would
    /// indicate a bug rather than bad input.
    pub fn composite(cutout: &Cutout, options: &ComposeOptions) -> Result<RgbaImage> {
        if options.shadow.is_none() && options.background == Background::Transparent {
            return Ok(cutout.image().clone());
        }

        let (width, height) = cutout.dimensions();

        // Shadow pass: transparent base, shadow layer, cutout on top.
        let working = if let Some(spec) = options.shadow {
            spec.validate()?;
            let shadow_layer = Self::synthesize_shadow(cutout, &spec);
            let mut canvas = RgbaImage::new(width, height);
            composite_over(&mut canvas, &shadow_layer)?;
            composite_over(&mut canvas, cutout.image())?;
            canvas
        } else {
            cutout.image().clone()
        };

        // Background pass: working image over an opaque fill.
        match options.background.as_rgba() {
            Some(fill) => {
                let mut bottom = RgbaImage::from_pixel(width, height, fill);
                composite_over(&mut bottom, &working)?;
                Ok(bottom)
            },
            None => Ok(working),
        }
    }

    /// Synthesize a ground-contact shadow layer from the cutout's alpha
    ///
    /// The returned layer has the cutout's dimensions and is black
    /// everywhere, with the blurred ellipse mask as its alpha channel. A
    /// fully transparent cutout yields a fully transparent layer.
    #[must_use]
    pub fn synthesize_shadow(cutout: &Cutout, spec: &ShadowSpec) -> RgbaImage {
        let (width, height) = cutout.dimensions();

        let Some(bbox) = cutout.alpha_bounding_box() else {
            debug!("cutout has no foreground pixels, shadow layer is empty");
            return RgbaImage::new(width, height);
        };

        let ellipse = Self::shadow_ellipse(&bbox, spec);
        debug!(
            center_x = ellipse.center_x,
            center_y = ellipse.center_y,
            radius_x = ellipse.radius_x,
            radius_y = ellipse.radius_y,
            "rasterizing ground-contact shadow"
        );

        let fill = (255.0 * spec.opacity.clamp(0.0, 1.0)).round() as u8;
        let mut mask = GrayImage::new(width, height);
        for (x, y, pixel) in mask.enumerate_pixels_mut() {
            let nx = (x as f32 + 0.5 - ellipse.center_x) / ellipse.radius_x;
            let ny = (y as f32 + 0.5 - ellipse.center_y) / ellipse.radius_y;
            if nx.mul_add(nx, ny * ny) <= 1.0 {
                *pixel = Luma([fill]);
            }
        }

        let mask = if spec.blur_radius > 0 {
            imageops::blur(&mask, spec.blur_radius as f32)
        } else {
            mask
        };

        let mut layer = RgbaImage::new(width, height);
        for (mask_pixel, layer_pixel) in mask.pixels().zip(layer.pixels_mut()) {
            *layer_pixel = Rgba([0, 0, 0, mask_pixel.0[0]]);
        }
        layer
    }

    /// Ellipse geometry for a subject bounding box
    ///
    /// Width scales with the subject width; height is a thin slice of the
    /// subject height with a floor so it never degenerates. The vertical
    /// center sits at the bounding box's bottom edge so the shadow
    /// projects below the subject.
    fn shadow_ellipse(bbox: &BoundingBox, spec: &ShadowSpec) -> ShadowEllipse {
        let width = bbox.width as f32 * spec.size_scale;
        let height = (bbox.height as f32 * ELLIPSE_HEIGHT_RATIO * spec.size_scale)
            .max(MIN_ELLIPSE_HEIGHT);
        ShadowEllipse {
            center_x: bbox.center_x() + spec.offset.0 as f32,
            center_y: bbox.bottom() + spec.offset.1 as f32,
            radius_x: width / 2.0,
            radius_y: height / 2.0,
        }
    }
}

/// Blend `src` over `dst` in place using the standard "over" operator
///
/// Non-premultiplied alpha: coverage accumulates as
/// `a_out = a_src + a_dst * (1 - a_src)` and color is the alpha-weighted
/// blend renormalized by the accumulated coverage. A fully opaque source
/// pixel replaces the destination exactly.
///
/// # Errors
///
/// Returns [`CutoutError::Internal`] when the layers disagree on
/// dimensions; the compositor only builds same-sized layers, so this is
/// a bug guard, not a recoverable condition.
pub fn composite_over(dst: &mut RgbaImage, src: &RgbaImage) -> Result<()> {
    if dst.dimensions() != src.dimensions() {
        return Err(CutoutError::internal(format!(
            "layer dimension mismatch: {:?} over {:?}",
            src.dimensions(),
            dst.dimensions()
        )));
    }
    for (dst_pixel, src_pixel) in dst.pixels_mut().zip(src.pixels()) {
        *dst_pixel = over(*src_pixel, *dst_pixel);
    }
    Ok(())
}

/// The "over" operator for a single pixel pair
fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let src_a = f32::from(src.0[3]) / 255.0;
    let dst_a = f32::from(dst.0[3]) / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let weighted = f32::from(s) * src_a + f32::from(d) * dst_a * (1.0 - src_a);
        (weighted / out_a).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(src.0[0], dst.0[0]),
        blend(src.0[1], dst.0[1]),
        blend(src.0[2], dst.0[2]),
        (out_a * 255.0).round() as u8,
    ])
}
