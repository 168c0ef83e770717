//! Core value types shared by profiles, the compositor and the store

use crate::error::{Result, WatermarkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a profile stamps onto the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkKind {
    #[default]
    Text,
    Image,
}

impl WatermarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatermarkKind::Text => "text",
            WatermarkKind::Image => "image",
        }
    }
}

impl fmt::Display for WatermarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkKind {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(WatermarkKind::Text),
            "image" => Ok(WatermarkKind::Image),
            other => Err(WatermarkError::InvalidInput {
                message: format!("unknown watermark type '{}'", other),
            }),
        }
    }
}

/// Watermark placement on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorPosition {
    #[default]
    UpperLeft,
    UpperCenter,
    UpperRight,
    CenterLeft,
    CenterCenter,
    CenterRight,
    LowerLeft,
    LowerCenter,
    LowerRight,
}

impl AnchorPosition {
    /// All anchors in reading order
    pub const ALL: [AnchorPosition; 9] = [
        AnchorPosition::UpperLeft,
        AnchorPosition::UpperCenter,
        AnchorPosition::UpperRight,
        AnchorPosition::CenterLeft,
        AnchorPosition::CenterCenter,
        AnchorPosition::CenterRight,
        AnchorPosition::LowerLeft,
        AnchorPosition::LowerCenter,
        AnchorPosition::LowerRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorPosition::UpperLeft => "upper-left",
            AnchorPosition::UpperCenter => "upper-center",
            AnchorPosition::UpperRight => "upper-right",
            AnchorPosition::CenterLeft => "center-left",
            AnchorPosition::CenterCenter => "center-center",
            AnchorPosition::CenterRight => "center-right",
            AnchorPosition::LowerLeft => "lower-left",
            AnchorPosition::LowerCenter => "lower-center",
            AnchorPosition::LowerRight => "lower-right",
        }
    }
}

impl fmt::Display for AnchorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnchorPosition {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        AnchorPosition::ALL
            .iter()
            .copied()
            .find(|anchor| anchor.as_str() == wanted)
            .ok_or_else(|| WatermarkError::InvalidInput {
                message: format!("unknown anchor position '{}'", s),
            })
    }
}

/// RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.a, self.r, self.g, self.b)
        }
    }
}

impl FromStr for Color {
    type Err = WatermarkError;

    /// Accepts `#rgb`, `#rrggbb` and `#aarrggbb`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WatermarkError::InvalidInput {
            message: format!("invalid color '{}'", s),
        };

        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

        match hex.len() {
            3 => {
                let nibble = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|n| n * 17)
                        .map_err(|_| invalid())
                };
                Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::new(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = WatermarkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Font family, size and style of a text watermark
///
/// Serialized as `family,point_size,bold,italic,underline` with `0`/`1`
/// flags. The family may contain commas; parsing splits from the right.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub family: String,
    pub point_size: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl FontDescriptor {
    pub const DEFAULT_FAMILY: &'static str = "DejaVu Sans";
    pub const DEFAULT_POINT_SIZE: u32 = 48;

    pub fn new(family: impl Into<String>, point_size: u32) -> Self {
        Self {
            family: family.into(),
            point_size,
            bold: false,
            italic: false,
            underline: false,
        }
    }

    /// Pixel height of the em square at 96 DPI
    pub fn pixel_size(&self) -> f32 {
        self.point_size as f32 * 96.0 / 72.0
    }
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FAMILY, Self::DEFAULT_POINT_SIZE)
    }
}

impl fmt::Display for FontDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.family,
            self.point_size,
            self.bold as u8,
            self.italic as u8,
            self.underline as u8
        )
    }
}

impl FromStr for FontDescriptor {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || WatermarkError::InvalidInput {
            message: format!("invalid font descriptor '{}'", s),
        };
        let flag = |v: &str| match v.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            _ => Err(invalid()),
        };

        let mut parts = s.rsplitn(5, ',');
        let underline = flag(parts.next().ok_or_else(invalid)?)?;
        let italic = flag(parts.next().ok_or_else(invalid)?)?;
        let bold = flag(parts.next().ok_or_else(invalid)?)?;
        let point_size = parts
            .next()
            .ok_or_else(invalid)?
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid())?;
        let family = parts.next().ok_or_else(invalid)?.trim();

        if family.is_empty() || point_size == 0 {
            return Err(invalid());
        }

        Ok(Self {
            family: family.to_string(),
            point_size,
            bold,
            italic,
            underline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_round_trip_names() {
        for anchor in AnchorPosition::ALL {
            assert_eq!(anchor.as_str().parse::<AnchorPosition>().unwrap(), anchor);
        }
        assert!("middle".parse::<AnchorPosition>().is_err());
        assert_eq!(AnchorPosition::default(), AnchorPosition::UpperLeft);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("#ffffff".parse::<Color>().unwrap(), Color::white());
        assert_eq!("#000".parse::<Color>().unwrap(), Color::black());
        assert_eq!("#80ff0000".parse::<Color>().unwrap(), Color::new(255, 0, 0, 128));
        assert!("ffffff".parse::<Color>().is_err());
        assert!("#ggg".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(0x12, 0xab, 0x0f).to_string(), "#12ab0f");
        assert_eq!(Color::new(1, 2, 3, 4).to_string(), "#04010203");
    }

    #[test]
    fn test_font_descriptor_format() {
        let mut font = FontDescriptor::new("Liberation Serif", 24);
        font.bold = true;
        font.underline = true;
        assert_eq!(font.to_string(), "Liberation Serif,24,1,0,1");
        assert_eq!(font.to_string().parse::<FontDescriptor>().unwrap(), font);
    }

    #[test]
    fn test_font_descriptor_family_with_commas() {
        let font: FontDescriptor = "/fonts/a,b.ttf,12,0,1,0".parse().unwrap();
        assert_eq!(font.family, "/fonts/a,b.ttf");
        assert_eq!(font.point_size, 12);
        assert!(font.italic);
    }

    #[test]
    fn test_font_descriptor_rejects_garbage() {
        assert!("n/a".parse::<FontDescriptor>().is_err());
        assert!("Sans,0,0,0,0".parse::<FontDescriptor>().is_err());
        assert!(",12,0,0,0".parse::<FontDescriptor>().is_err());
    }

    #[test]
    fn test_pixel_size() {
        assert_eq!(FontDescriptor::new("x", 72).pixel_size(), 96.0);
    }
}
