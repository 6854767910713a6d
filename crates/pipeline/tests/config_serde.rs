//! Pipeline configuration survives a JSON round trip and is re-validated
//! after loading.
//!
//! Run with: cargo test -p bk-pipeline --features serde --test config_serde

#![cfg(feature = "serde")]

use bk_pipeline::config::{ConfigError, PipelineConfig, PipelineMode};
use bk_platform::camera::Fps;

#[test]
fn test_every_preset_round_trips() {
    let presets = [
        PipelineConfig::rgb_yuv_display(),
        PipelineConfig::rgb_yuv_blend(),
        PipelineConfig::rgb_jpeg_display().with_display_fps(Fps::Fps10),
        PipelineConfig::rgb_jpeg_capture(),
        PipelineConfig::rgb_solid_color(0x07E0_07E0),
        PipelineConfig::i8080_display(),
    ];
    for config in presets {
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
        assert!(back.validate().is_ok());
    }
}

#[test]
fn test_loaded_config_is_still_validated() {
    let mut value = serde_json::to_value(PipelineConfig::rgb_jpeg_display()).unwrap();
    value["segment_count"] = serde_json::json!(3);
    let config: PipelineConfig = serde_json::from_value(value).unwrap();
    assert_eq!(config.mode, PipelineMode::JpegDisplay);
    assert_eq!(config.validate(), Err(ConfigError::SegmentMismatch));
}
