//! Persistence Tests
//!
//! Config files, parameter blobs, controller parameter writes and WAV
//! import/export.

mod common;

use approx::assert_relative_eq;
use common::*;
use layerloop::engine::{read_wav, write_wav, BitDepth, GlobalSettings, StereoBuffer};
use layerloop::{EngineConfig, LooperError, MixMode};
use tempfile::tempdir;
use test_case::test_case;

// === Config Files ===

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("looper.json");
    let config = EngineConfig {
        sample_rate: 44100,
        max_loop_seconds: 12.0,
        mix_mode: MixMode::Layer,
        input_monitoring: false,
        ..EngineConfig::default()
    };

    config.save_json_file(&path).unwrap();
    let loaded = EngineConfig::from_json_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_config_fields_take_defaults() {
    let config = EngineConfig::from_json_str(r#"{ "sample_rate": 96000 }"#).unwrap();
    assert_eq!(config.sample_rate, 96000);
    assert_eq!(config.max_block_size, EngineConfig::default().max_block_size);
}

#[test_case(r#"{ "sample_rate": 0 }"# ; "zero sample rate")]
#[test_case(r#"{ "max_block_size": 0 }"# ; "zero block size")]
#[test_case(r#"{ "max_loop_seconds": -1.0 }"# ; "negative loop length")]
#[test_case(r#"{ "smoothing_ms": -5.0 }"# ; "negative smoothing")]
fn test_invalid_config_is_rejected(json: &str) {
    let err = EngineConfig::from_json_str(json).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CONFIG");
    assert!(!err.is_recoverable());
}

// === Parameter Blobs ===

#[test]
fn test_parameter_blob_restores_another_engine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("params.json");

    let (mut engine, _controller) = exact_engine();
    engine.set_layer_volume(layer(3), 0.25);
    engine.set_layer_pan(layer(5), -0.5);
    engine.set_layer_mute(layer(8), true);
    engine.set_speed(1.5);
    engine.set_loop_length_bars(2, 1);
    engine.set_mix_mode(MixMode::Layer);
    std::fs::write(&path, engine.save_parameters().unwrap()).unwrap();

    let (mut other, _controller) = exact_engine();
    other.load_parameters(&std::fs::read(&path).unwrap()).unwrap();

    assert_eq!(other.layer_settings(layer(3)).volume, 0.25);
    assert_eq!(other.layer_settings(layer(5)).pan, -0.5);
    assert!(other.layer_settings(layer(8)).mute);
    let global = other.global_settings();
    assert_eq!(global.speed, 1.5);
    assert_eq!((global.preset_bars, global.preset_beats), (2, 1));
    assert_eq!(global.mix_mode, MixMode::Layer);
}

#[test]
fn test_tampered_blob_is_rejected() {
    let (mut engine, _controller) = exact_engine();
    engine.set_layer_volume(layer(1), 0.5);
    let blob = engine.save_parameters().unwrap();

    let mut envelope: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    let payload = envelope["payload"].as_str().unwrap().replace("0.5", "0.9");
    envelope["payload"] = serde_json::Value::String(payload);
    let tampered = serde_json::to_vec(&envelope).unwrap();

    let err = engine.load_parameters(&tampered).unwrap_err();
    assert!(matches!(err, LooperError::ChecksumMismatch));
    assert!(err.is_recoverable());
    assert_eq!(engine.layer_settings(layer(1)).volume, 0.5);
}

#[test]
fn test_garbage_blob_is_a_persistence_error() {
    let (mut engine, _controller) = exact_engine();
    let err = engine.load_parameters(b"not a blob").unwrap_err();
    assert_eq!(err.error_code(), "PERSISTENCE_ERROR");
}

// === Controller Writes ===

#[test]
fn test_controller_parameters_apply_on_next_block() {
    let (mut engine, controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, |_| 0.4);
    engine.play();

    controller.update_layer(1, |s| s.volume = 0.5).unwrap();
    controller.update_global(|g| g.speed = 2.0);
    assert_eq!(engine.layer_settings(layer(1)).volume, 1.0);

    let (left, _) = silence(&mut engine, 64);
    assert_eq!(engine.layer_settings(layer(1)).volume, 0.5);
    assert_relative_eq!(left[10], 0.2, epsilon = 1e-6);
    assert_eq!(engine.global_settings().speed, 2.0);
}

#[test]
fn test_controller_rejects_unknown_layer() {
    let (_engine, controller) = exact_engine();
    let err = controller.update_layer(9, |s| s.mute = true).unwrap_err();
    assert_eq!(err.error_code(), "LAYER_OUT_OF_RANGE");
}

// === Preset Length ===

#[test_case(120.0, 4, 0, 44100 => 352800 ; "four bars at 120")]
#[test_case(120.0, 1, 0, 48000 => 96000 ; "one bar at 120")]
#[test_case(90.0, 0, 3, 48000 => 96000 ; "three beats at 90")]
#[test_case(120.0, 0, 0, 48000 => 0 ; "free length")]
fn test_target_length_samples(bpm: f32, bars: u32, beats: u32, sample_rate: u32) -> usize {
    let settings = GlobalSettings {
        host_bpm: bpm,
        preset_bars: bars,
        preset_beats: beats,
        ..GlobalSettings::default()
    };
    settings.target_length_samples(sample_rate)
}

// === WAV Files ===

#[test]
fn test_float_wav_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    let left: Vec<f32> = (0..500).map(tone).collect();
    let right: Vec<f32> = (0..500).map(other_tone).collect();
    let buffer = StereoBuffer::from_channels(left.clone(), right.clone());

    write_wav(&path, &buffer, 500, SR, BitDepth::Float32).unwrap();
    let loaded = read_wav(&path, SR).unwrap();

    assert_eq!(loaded.capacity(), 500);
    assert_eq!(loaded.left(), &left[..]);
    assert_eq!(loaded.right(), &right[..]);
}

#[test]
fn test_unsupported_bit_depth() {
    let err = BitDepth::from_bits(12).unwrap_err();
    assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
}
