//! Configuration loading across formats

use std::io::Write;
use tempfile::NamedTempFile;
use vidmark_annotate::{catalog::TypeCatalog, FrameUrls};
use vidmark_core::AnnotatorConfig;

fn temp_with(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_toml_file_drives_components() {
    let file = temp_with(
        r##"
log_level = "debug"

[review]
interval_ms = 250

[frames]
base_url = "https://cdn.example"

[catalog]
default_types = ["Bench", "Kiosk"]
palette = ["#111111"]
"##,
        ".toml",
    );

    let config = AnnotatorConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();
    assert_eq!(config.log_level(), "debug");
    assert_eq!(config.review.interval().as_millis(), 250);
    assert_eq!(config.models.model_edge, 1024.0);

    let catalog = TypeCatalog::new(&config.catalog);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.get("kiosk").unwrap().color, "#111111");

    let urls = FrameUrls::new(&config.frames, "hall");
    assert_eq!(urls.raw("a.jpg"), "https://cdn.example/video_images_raw/hall/a.jpg");
}

#[test]
fn test_yaml_and_json_are_accepted() {
    let yaml = AnnotatorConfig::from_str("tracking:\n  timeout_secs: 30\n").unwrap();
    assert_eq!(yaml.tracking.timeout_secs, 30);

    let json = AnnotatorConfig::from_str(r#"{"models": {"foreground_threshold": 0.7}}"#).unwrap();
    assert!((json.models.foreground_threshold - 0.7).abs() < 1e-6);
}

#[test]
fn test_invalid_values_rejected() {
    let config = AnnotatorConfig::from_str(r#"{"models": {"mask_threshold": 1.5}}"#).unwrap();
    assert!(config.validate().is_err());
    assert!(AnnotatorConfig::from_file("../outside.toml").is_err());
}
