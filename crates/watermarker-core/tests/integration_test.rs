//! Integration tests for the watermarker core

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use watermarker_core::{
    init, version, AnchorPosition, AppConfig, BatchJob, BatchRunner, Color, ConfigManager,
    FontDescriptor, FontResolver, ProfileStore, SilentObserver, Watermark, WatermarkKind,
    WatermarkProfile,
};

#[test]
fn test_core_initialization() {
    let result = init(&AppConfig::default());
    assert!(result.is_ok(), "Core initialization should succeed");
}

#[test]
fn test_version_info() {
    let version_str = version();
    assert_eq!(version_str, "0.1.0", "Version should match workspace version");
}

#[test]
fn test_config_manager() {
    let temp_dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_path(temp_dir.path().join("test_config.toml")).unwrap();

    let config = manager.config();
    assert_eq!(config.batch.quality, 100);
    assert_eq!(config.storage.organization, "watermarker");
}

#[test]
fn test_stored_profile_drives_batch() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::open(temp_dir.path().join("profiles.toml"));

    let logo = temp_dir.path().join("logo.png");
    RgbaImage::from_pixel(6, 6, Rgba([0, 255, 0, 255]))
        .save_with_format(&logo, ImageFormat::Png)
        .unwrap();

    let mut profile = WatermarkProfile::new("Green");
    profile.set_kind(WatermarkKind::Image);
    profile.set_image_path(&logo);
    profile.set_transparency(1.0);
    profile.set_margin_horizontal(4);
    profile.set_margin_vertical(4);
    store.save(&profile).unwrap();

    let loaded = store.load("Green");
    assert_eq!(loaded, profile);
    assert!(store.list().contains(&"Green".to_string()));

    let source = temp_dir.path().join("photos");
    let destination = temp_dir.path().join("stamped");
    std::fs::create_dir_all(source.join("nested")).unwrap();
    RgbImage::from_pixel(30, 20, Rgb([0, 0, 0]))
        .save_with_format(source.join("nested/a.png"), ImageFormat::Png)
        .unwrap();

    let job = BatchJob::new(&source, &destination)
        .recursive(true)
        .anchor(AnchorPosition::LowerRight);
    let report = BatchRunner::new()
        .run(&job, &loaded, &FontResolver::new(Vec::new()), &mut SilentObserver)
        .unwrap();
    assert_eq!(report.written(), 1);

    // lower-right: (30 - 6 - 4, 20 - 6 - 4) = (20, 10)
    let output = image::open(destination.join("nested/a.png")).unwrap().to_rgb8();
    assert_eq!(*output.get_pixel(20, 10), Rgb([0, 255, 0]));
    assert_eq!(*output.get_pixel(25, 15), Rgb([0, 255, 0]));
    assert_eq!(*output.get_pixel(19, 9), Rgb([0, 0, 0]));
}

#[test]
fn test_text_watermark_with_system_font() {
    let resolver = FontResolver::system();
    let Some(font_path) = resolver
        .scan()
        .into_iter()
        .find(|(name, _)| ["dejavusans", "liberationsans", "arial"].contains(&name.as_str()))
        .map(|(_, path)| path)
    else {
        return;
    };

    let mut profile = WatermarkProfile::new("Text");
    profile.set_text("Sample");
    profile.set_font(FontDescriptor::new(font_path.to_string_lossy(), 24));
    profile.set_main_color(Color::white());
    profile.set_outline_color(Color::black());
    profile.set_transparency(1.0);

    let Ok(watermark) = Watermark::prepare(&profile, &resolver) else {
        // collections or unusual faces may not parse
        return;
    };
    let (width, height) = watermark.content_size();
    assert!(width > 0);
    assert!(height > 0);

    let mut canvas = RgbaImage::from_pixel(400, 200, Rgba([128, 128, 128, 255]));
    watermark.apply(&mut canvas, AnchorPosition::CenterCenter);
    assert!(canvas.pixels().any(|p| *p != Rgba([128, 128, 128, 255])));
}
