//! Background color specification and parsing
//!
//! The upload endpoint carries the background as a free-form string:
//! `"transparent"`, a `#RRGGBB` hex value, or a recognized color name.
//! Anything else is rejected as a client fault.

use crate::error::{CutoutError, Result};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named colors accepted in background specifications
///
/// Deliberately small: the common CSS-style names that product-photo
/// deployments actually request.
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
];

/// Bottom-most compositing layer: either no layer at all, or an opaque fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Background {
    /// No background layer; the output alpha channel is preserved
    Transparent,
    /// Opaque solid fill in the given RGB color
    Solid([u8; 3]),
}

impl Default for Background {
    fn default() -> Self {
        Self::Transparent
    }
}

impl Background {
    /// Parse a background specification string
    ///
    /// Accepts `"transparent"` (case-insensitive), `#RRGGBB` hex, or a
    /// recognized color name.
    ///
    /// # Errors
    ///
    /// Returns [`CutoutError::InvalidColor`] when the string is neither.
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case("transparent") {
            return Ok(Self::Transparent);
        }
        parse_color(trimmed).map(Self::Solid)
    }

    /// The fill as an opaque RGBA pixel, or `None` for transparent
    #[must_use]
    pub fn as_rgba(&self) -> Option<Rgba<u8>> {
        match self {
            Self::Transparent => None,
            Self::Solid([r, g, b]) => Some(Rgba([*r, *g, *b, 255])),
        }
    }
}

impl FromStr for Background {
    type Err = CutoutError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Background {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transparent => write!(f, "transparent"),
            Self::Solid([r, g, b]) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

/// Parse a solid color from `#RRGGBB` hex or a recognized name
///
/// # Errors
///
/// Returns [`CutoutError::InvalidColor`] for malformed hex digits, wrong
/// hex length, or unrecognized names.
pub fn parse_color(spec: &str) -> Result<[u8; 3]> {
    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex(spec, hex);
    }

    let lower = spec.to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rgb)| *rgb)
        .ok_or_else(|| {
            CutoutError::invalid_color(format!(
                "'{spec}' is not 'transparent', '#RRGGBB' hex, or a recognized color name"
            ))
        })
}

fn parse_hex(original: &str, hex: &str) -> Result<[u8; 3]> {
    if hex.len() != 6 {
        return Err(CutoutError::invalid_color(format!(
            "'{original}' must be exactly 6 hex digits after '#'"
        )));
    }
    let channel = |range: std::ops::Range<usize>| -> Result<u8> {
        let digits = hex
            .get(range)
            .ok_or_else(|| CutoutError::invalid_color(format!("'{original}' is malformed")))?;
        u8::from_str_radix(digits, 16).map_err(|_| {
            CutoutError::invalid_color(format!("'{original}' contains non-hex digits"))
        })
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_color("#ff00aa").unwrap(), [255, 0, 170]);
        assert_eq!(parse_color("#FF00AA").unwrap(), [255, 0, 170]);
        assert_eq!(parse_color("#000000").unwrap(), [0, 0, 0]);
        assert_eq!(parse_color("#ffffff").unwrap(), [255, 255, 255]);
    }

    #[test]
    fn test_parse_named_colors() {
        assert_eq!(parse_color("white").unwrap(), [255, 255, 255]);
        assert_eq!(parse_color("White").unwrap(), [255, 255, 255]);
        assert_eq!(parse_color("grey").unwrap(), parse_color("gray").unwrap());
    }

    #[test]
    fn test_invalid_colors_are_client_faults() {
        for bad in ["notacolor", "#ff00a", "#ff00aaa", "#ggxxyy", "", "#"] {
            let err = parse_color(bad).unwrap_err();
            assert!(
                matches!(err, CutoutError::InvalidColor(_)),
                "expected InvalidColor for {bad:?}, got {err:?}"
            );
            assert!(err.is_client_fault());
        }
    }

    #[test]
    fn test_background_parse() {
        assert_eq!(
            Background::parse("transparent").unwrap(),
            Background::Transparent
        );
        assert_eq!(
            Background::parse("TRANSPARENT").unwrap(),
            Background::Transparent
        );
        assert_eq!(
            Background::parse("#ffffff").unwrap(),
            Background::Solid([255, 255, 255])
        );
        assert_eq!(
            "#ff00aa".parse::<Background>().unwrap(),
            Background::Solid([255, 0, 170])
        );
        assert!(Background::parse("notacolor").is_err());
    }

    #[test]
    fn test_background_display_round_trip() {
        let bg = Background::Solid([255, 0, 170]);
        assert_eq!(bg.to_string(), "#ff00aa");
        assert_eq!(Background::parse(&bg.to_string()).unwrap(), bg);
        assert_eq!(Background::Transparent.to_string(), "transparent");
    }

    #[test]
    fn test_as_rgba() {
        assert_eq!(Background::Transparent.as_rgba(), None);
        assert_eq!(
            Background::Solid([1, 2, 3]).as_rgba(),
            Some(Rgba([1, 2, 3, 255]))
        );
    }
}
