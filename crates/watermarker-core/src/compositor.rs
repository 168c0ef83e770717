//! Watermark placement and compositing
//!
//! A profile is turned into a [`Watermark`] once per run: the overlay image
//! is decoded, or the text is rasterized with fill and outline, and the
//! profile's transparency is baked into the layer's alpha. Applying it to
//! a canvas is then a position calculation plus one alpha blit.

use crate::error::Result;
use crate::fonts::FontResolver;
use crate::models::{AnchorPosition, Color, WatermarkKind};
use crate::profile::WatermarkProfile;
use crate::utils::format;
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{imageops, DynamicImage, GrayImage, Luma, Pixel, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::morphology::{dilate, erode};
use imageproc::rect::Rect;
use tracing::debug;

/// Stroke width of the text outline in pixels
pub const OUTLINE_WIDTH: u32 = 2;

/// Top-left corner of the watermark for the given anchor
///
/// Integer arithmetic with truncating division. The upper-left anchor sits
/// at the canvas origin and ignores margins; the result may be negative
/// when the watermark is larger than the canvas.
pub fn compute_origin(
    canvas_width: u32,
    canvas_height: u32,
    content_width: u32,
    content_height: u32,
    anchor: AnchorPosition,
    margin_horizontal: i32,
    margin_vertical: i32,
) -> (i32, i32) {
    let (cw, ch) = (canvas_width as i32, canvas_height as i32);
    let (w, h) = (content_width as i32, content_height as i32);

    let center_x = cw / 2 - w / 2;
    let center_y = ch / 2 - h / 2;
    let right = cw - w - margin_horizontal;
    let bottom = ch - h - margin_vertical;

    match anchor {
        AnchorPosition::UpperLeft => (0, 0),
        AnchorPosition::UpperCenter => (center_x, margin_vertical),
        AnchorPosition::UpperRight => (right, margin_vertical),
        AnchorPosition::CenterLeft => (margin_horizontal, center_y),
        AnchorPosition::CenterCenter => (center_x, center_y),
        AnchorPosition::CenterRight => (right, center_y),
        AnchorPosition::LowerLeft => (margin_horizontal, bottom),
        AnchorPosition::LowerCenter => (center_x, bottom),
        AnchorPosition::LowerRight => (right, bottom),
    }
}

/// A profile rendered into a ready-to-blit layer
#[derive(Debug, Clone)]
pub struct Watermark {
    kind: WatermarkKind,
    /// Layer with the transparency already applied to its alpha channel
    layer: RgbaImage,
    /// Offset of the content box inside `layer`
    padding: u32,
    content_width: u32,
    content_height: u32,
    margin_horizontal: i32,
    margin_vertical: i32,
}

impl Watermark {
    /// Load whatever the profile needs (overlay image or font) and render it
    pub fn prepare(profile: &WatermarkProfile, fonts: &FontResolver) -> Result<Self> {
        profile.validate()?;

        match profile.kind() {
            WatermarkKind::Image => {
                let logo = format::open_image(profile.image_path())?.to_rgba8();
                Ok(Self::from_image(profile, logo))
            }
            WatermarkKind::Text => {
                let font = fonts.load(profile.font())?;
                Ok(Self::from_text(profile, &font))
            }
        }
    }

    /// Image watermark from an already decoded overlay
    pub fn from_image(profile: &WatermarkProfile, logo: RgbaImage) -> Self {
        let (width, height) = logo.dimensions();
        let mut layer = logo;
        fade(&mut layer, profile.transparency());

        Self {
            kind: WatermarkKind::Image,
            layer,
            padding: 0,
            content_width: width,
            content_height: height,
            margin_horizontal: profile.margin_horizontal(),
            margin_vertical: profile.margin_vertical(),
        }
    }

    /// Text watermark rasterized with the given font
    pub fn from_text(profile: &WatermarkProfile, font: &FontVec) -> Self {
        let descriptor = profile.font();
        let scale = PxScale::from(descriptor.pixel_size());
        let scaled = font.as_scaled(scale);
        let ascent = scaled.ascent();
        let descent = scaled.descent();

        let (content_width, _) = text_size(scale, font, profile.text());
        let content_height = (ascent - descent).ceil().max(0.0) as u32;

        // Baseline on the bottom edge of the content box; descenders hang below it.
        let padding = OUTLINE_WIDTH;
        let descender = (-descent).ceil().max(0.0) as u32;
        let width = content_width + 2 * padding;
        let height = content_height + descender + 2 * padding;
        let baseline = (padding + content_height) as f32;

        let mut coverage = GrayImage::new(width, height);
        draw_text_mut(
            &mut coverage,
            Luma([255u8]),
            padding as i32,
            (baseline - ascent).round() as i32,
            scale,
            font,
            profile.text(),
        );

        if descriptor.underline && content_width > 0 {
            let thickness = (descriptor.pixel_size() / 14.0).round().max(1.0) as u32;
            let y = (baseline + (-descent / 3.0).max(1.0)).round() as i32;
            draw_filled_rect_mut(
                &mut coverage,
                Rect::at(padding as i32, y).of_size(content_width, thickness),
                Luma([255u8]),
            );
        }

        let mut layer = paint_text_layer(
            &coverage,
            profile.main_color(),
            profile.outline_color(),
        );
        fade(&mut layer, profile.transparency());

        debug!(
            "Rendered text watermark {:?}: {}x{} at {}px",
            profile.text(),
            content_width,
            content_height,
            descriptor.pixel_size()
        );

        Self {
            kind: WatermarkKind::Text,
            layer,
            padding,
            content_width,
            content_height,
            margin_horizontal: profile.margin_horizontal(),
            margin_vertical: profile.margin_vertical(),
        }
    }

    pub fn kind(&self) -> WatermarkKind {
        self.kind
    }

    /// Natural size of the watermark, excluding outline padding
    pub fn content_size(&self) -> (u32, u32) {
        (self.content_width, self.content_height)
    }

    /// The faded layer that gets blitted
    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }

    /// Where the content box lands on a canvas of the given size
    pub fn origin(&self, canvas_width: u32, canvas_height: u32, anchor: AnchorPosition) -> (i32, i32) {
        compute_origin(
            canvas_width,
            canvas_height,
            self.content_width,
            self.content_height,
            anchor,
            self.margin_horizontal,
            self.margin_vertical,
        )
    }

    /// Blend the watermark onto `canvas`, clipping at the edges
    pub fn apply(&self, canvas: &mut RgbaImage, anchor: AnchorPosition) -> (i32, i32) {
        let (x, y) = self.origin(canvas.width(), canvas.height(), anchor);
        imageops::overlay(
            canvas,
            &self.layer,
            i64::from(x) - i64::from(self.padding),
            i64::from(y) - i64::from(self.padding),
        );
        (x, y)
    }

    /// Composite onto a decoded image, keeping an opaque image opaque
    pub fn apply_to_image(&self, image: &DynamicImage, anchor: AnchorPosition) -> DynamicImage {
        let mut canvas = image.to_rgba8();
        let (x, y) = self.apply(&mut canvas, anchor);
        debug!("Placed {} watermark at ({}, {})", self.kind, x, y);

        if image.color().has_alpha() {
            DynamicImage::ImageRgba8(canvas)
        } else {
            DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
        }
    }
}

/// Watermarked copy of `sample`, scaled to `zoom` percent of its height
pub fn render_preview(
    sample: &DynamicImage,
    watermark: &Watermark,
    anchor: AnchorPosition,
    zoom: u32,
) -> DynamicImage {
    let stamped = watermark.apply_to_image(sample, anchor);
    if zoom == 100 || stamped.height() == 0 {
        return stamped;
    }

    let height = (u64::from(stamped.height()) * u64::from(zoom) / 100).max(1);
    let width = (u64::from(stamped.width()) * height / u64::from(stamped.height())).max(1);
    stamped.resize_exact(
        width.min(u64::from(u32::MAX)) as u32,
        height.min(u64::from(u32::MAX)) as u32,
        imageops::FilterType::Triangle,
    )
}

/// Neutral checkerboard used when no sample image is given
pub fn sample_canvas(width: u32, height: u32) -> DynamicImage {
    const TILE: u32 = 32;
    let canvas = RgbaImage::from_fn(width, height, |x, y| {
        if (x / TILE + y / TILE) % 2 == 0 {
            Rgba([170, 170, 170, 255])
        } else {
            Rgba([110, 110, 110, 255])
        }
    });
    DynamicImage::ImageRgba8(canvas)
}

/// Fill by glyph coverage, then stroke a band one pixel either side of the edge
fn paint_text_layer(coverage: &GrayImage, main: Color, outline: Color) -> RgbaImage {
    let solid = GrayImage::from_fn(coverage.width(), coverage.height(), |x, y| {
        if coverage.get_pixel(x, y)[0] >= 128 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let outer = dilate(&solid, Norm::LInf, (OUTLINE_WIDTH / 2) as u8);
    let inner = erode(&solid, Norm::LInf, (OUTLINE_WIDTH / 2) as u8);

    let main = main.to_rgba();
    let outline = outline.to_rgba();

    RgbaImage::from_fn(coverage.width(), coverage.height(), |x, y| {
        let cover = u32::from(coverage.get_pixel(x, y)[0]);
        let mut pixel = Rgba([
            main[0],
            main[1],
            main[2],
            (u32::from(main[3]) * cover / 255) as u8,
        ]);
        if outer.get_pixel(x, y)[0] > 0 && inner.get_pixel(x, y)[0] == 0 {
            pixel.blend(&outline);
        }
        pixel
    })
}

fn fade(layer: &mut RgbaImage, transparency: f64) {
    let opacity = transparency.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for pixel in layer.pixels_mut() {
        pixel[3] = (f64::from(pixel[3]) * opacity).round() as u8;
    }
}
