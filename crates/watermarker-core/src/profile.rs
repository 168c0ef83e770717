//! Watermark profiles: one named, editable watermark configuration

use crate::error::{Result, WatermarkError};
use crate::models::{Color, FontDescriptor, WatermarkKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the profile that always exists, stored or not
pub const DEFAULT_PROFILE_NAME: &str = "Default";

/// Transparencies closer than this compare equal
pub const TRANSPARENCY_EPSILON: f64 = 1e-5;

pub const DEFAULT_MARGIN: i32 = 10;
pub const DEFAULT_TRANSPARENCY: f64 = 0.5;

/// Text stamped by a fresh profile
pub fn default_watermark_text() -> String {
    format!("Watermarker {}", crate::version())
}

/// A named watermark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkProfile {
    name: String,
    kind: WatermarkKind,
    text: String,
    image_path: PathBuf,
    margin_horizontal: i32,
    margin_vertical: i32,
    transparency: f64,
    font: FontDescriptor,
    main_color: Color,
    outline_color: Color,
}

impl WatermarkProfile {
    /// A profile holding only default values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: WatermarkKind::Text,
            text: default_watermark_text(),
            image_path: PathBuf::new(),
            margin_horizontal: DEFAULT_MARGIN,
            margin_vertical: DEFAULT_MARGIN,
            transparency: DEFAULT_TRANSPARENCY,
            font: FontDescriptor::default(),
            main_color: Color::white(),
            outline_color: Color::black(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn kind(&self) -> WatermarkKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: WatermarkKind) {
        self.kind = kind;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn set_image_path(&mut self, path: impl Into<PathBuf>) {
        self.image_path = path.into();
    }

    pub fn margin_horizontal(&self) -> i32 {
        self.margin_horizontal
    }

    pub fn set_margin_horizontal(&mut self, margin: i32) {
        self.margin_horizontal = margin;
    }

    pub fn margin_vertical(&self) -> i32 {
        self.margin_vertical
    }

    pub fn set_margin_vertical(&mut self, margin: i32) {
        self.margin_vertical = margin;
    }

    pub fn transparency(&self) -> f64 {
        self.transparency
    }

    pub fn set_transparency(&mut self, transparency: f64) {
        self.transparency = transparency;
    }

    pub fn font(&self) -> &FontDescriptor {
        &self.font
    }

    pub fn set_font(&mut self, font: FontDescriptor) {
        self.font = font;
    }

    pub fn main_color(&self) -> Color {
        self.main_color
    }

    pub fn set_main_color(&mut self, color: Color) {
        self.main_color = color;
    }

    pub fn outline_color(&self) -> Color {
        self.outline_color
    }

    pub fn set_outline_color(&mut self, color: Color) {
        self.outline_color = color;
    }

    /// Text profiles need text, image profiles need an existing overlay file
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`is_valid`](Self::is_valid) but says what is wrong
    pub fn validate(&self) -> Result<()> {
        let reason = match self.kind {
            WatermarkKind::Text if self.text.is_empty() => "watermark text is empty",
            WatermarkKind::Image if !self.image_path.exists() => "overlay image does not exist",
            _ => return Ok(()),
        };

        Err(WatermarkError::InvalidProfile {
            name: self.name.clone(),
            reason: reason.to_string(),
        })
    }
}

impl Default for WatermarkProfile {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE_NAME)
    }
}

/// Field-wise comparison used to detect unsaved edits; the name is ignored
impl PartialEq for WatermarkProfile {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.text == other.text
            && self.margin_horizontal == other.margin_horizontal
            && self.margin_vertical == other.margin_vertical
            && self.image_path == other.image_path
            && self.font == other.font
            && self.main_color == other.main_color
            && self.outline_color == other.outline_color
            && (self.transparency - other.transparency).abs() < TRANSPARENCY_EPSILON
    }
}
