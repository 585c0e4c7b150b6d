//! Loop Boundary Tests
//!
//! Anti-click ducking and smear, speed/direction/region playback, fade per
//! pass, input monitoring and real-time safety of the block path.

mod common;

use approx::assert_relative_eq;
use common::*;
use layerloop::{AntiClickSettings, EngineConfig, TrackState};

fn ramp(i: usize) -> f32 {
    i as f32 / 512.0
}

/// Layer 1 holding `frames` frames of `signal`, playing from the start
fn playing_engine(
    config: EngineConfig,
    frames: usize,
    signal: impl Fn(usize) -> f32,
) -> layerloop::LayerOrchestrator {
    let (mut engine, _controller) = engine_with(config);
    engine.record();
    run(&mut engine, frames, signal);
    engine.play();
    engine
}

// === Anti-Click ===

#[test]
fn test_output_is_ducked_around_the_wrap() {
    let config = EngineConfig {
        anti_click: AntiClickSettings::default(),
        ..exact_config()
    };
    let mut engine = playing_engine(config, 4800, |_| 0.5);
    let (left, right) = silence(&mut engine, 9600);

    assert_eq!(left[2400], 0.5);
    assert_eq!(right[7200], 0.5);
    assert!(left[4799] < 0.3);
    assert!(left[4800] < 0.3);
    assert!(left[4700] < 0.5);
    assert_eq!(left[4800 + 480 + 10], 0.5);
}

#[test]
fn test_disabled_anti_click_leaves_wrap_untouched() {
    let mut engine = playing_engine(exact_config(), 4800, |_| 0.5);
    let (left, _) = silence(&mut engine, 9600);
    assert!(left.iter().all(|&s| s == 0.5));
}

#[test]
fn test_reverse_playback_ducks_before_loop_start() {
    let config = EngineConfig {
        anti_click: AntiClickSettings::default(),
        ..exact_config()
    };
    let mut engine = playing_engine(config, 4800, |_| 0.5);
    engine.set_reverse(true);
    let (left, _) = silence(&mut engine, 4800);

    assert_eq!(left[2400], 0.5);
    // Frame 4799 plays position 1, one sample before the reverse wrap
    assert!(left[4799] < 0.3);
}

#[test]
fn test_smear_only_changes_audio_after_the_wrap() {
    let plain = EngineConfig {
        anti_click: AntiClickSettings::default(),
        ..exact_config()
    };
    let smeared = EngineConfig {
        anti_click: AntiClickSettings {
            smear_amount: 1.0,
            ..AntiClickSettings::default()
        },
        ..exact_config()
    };
    let mut a = playing_engine(plain, 4800, tone);
    let mut b = playing_engine(smeared, 4800, tone);
    let (plain_out, _) = silence(&mut a, 6000);
    let (smeared_out, _) = silence(&mut b, 6000);

    assert_eq!(plain_out[..4800], smeared_out[..4800]);
    assert!((4800..5280).any(|i| plain_out[i] != smeared_out[i]));
    assert!(smeared_out.iter().all(|s| s.abs() < 1.0));
}

// === Speed, Direction, Region, Fade ===

#[test]
fn test_double_speed_skips_every_other_sample() {
    let mut engine = playing_engine(exact_config(), 256, ramp);
    engine.set_speed(2.0);
    let (left, _) = silence(&mut engine, 256);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, ramp((2 * i) % 256));
    }
}

#[test]
fn test_reverse_reads_backwards() {
    let mut engine = playing_engine(exact_config(), 256, ramp);
    engine.set_reverse(true);
    let (left, _) = silence(&mut engine, 256);
    assert_relative_eq!(left[0], ramp(0));
    for i in 1..256 {
        assert_relative_eq!(left[i], ramp(256 - i));
    }
}

#[test]
fn test_loop_region_restricts_playback() {
    let mut engine = playing_engine(exact_config(), 256, ramp);
    engine.set_loop_region(0.25, 0.75);
    let (left, _) = silence(&mut engine, 256);

    // The playhead is folded into [64, 192) and keeps cycling there
    assert_relative_eq!(left[0], ramp(128));
    assert_relative_eq!(left[63], ramp(191));
    assert_relative_eq!(left[64], ramp(64));
    assert!(left.iter().all(|&s| (ramp(64)..ramp(192)).contains(&s)));
}

#[test]
fn test_fade_decays_once_per_pass() {
    let mut engine = playing_engine(exact_config(), 256, |_| 0.4);
    engine.set_layer_fade(layer(1), 0.5);
    let (left, _) = silence(&mut engine, 768);
    assert_relative_eq!(left[100], 0.4, epsilon = 1e-6);
    assert_relative_eq!(left[300], 0.2, epsilon = 1e-6);
    assert_relative_eq!(left[600], 0.1, epsilon = 1e-6);
}

// === Monitoring ===

#[test]
fn test_input_passes_through_when_nothing_plays() {
    let config = EngineConfig {
        input_monitoring: true,
        ..exact_config()
    };
    let (mut engine, _controller) = engine_with(config);
    let (left, _) = run(&mut engine, 300, tone);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, tone(i));
    }

    // Monitored while recording, loop only while playing
    engine.record();
    let (left, _) = run(&mut engine, 256, |_| 0.25);
    assert_relative_eq!(left[100], 0.25);
    engine.play();
    let (left, _) = run(&mut engine, 256, |_| 0.1);
    assert_relative_eq!(left[100], 0.25);
}

// === Real-Time Safety ===

#[test]
fn test_non_finite_input_never_reaches_the_output() {
    let (mut engine, _controller) = exact_engine();
    engine.record();
    let (left, _) = run(&mut engine, 256, |i| {
        if i % 2 == 0 {
            f32::NAN
        } else {
            f32::INFINITY
        }
    });
    assert!(left.iter().all(|s| s.is_finite()));
    engine.play();
    let (left, right) = silence(&mut engine, 256);
    assert!(left.iter().chain(&right).all(|&s| s == 0.0));
}

#[test]
fn test_hot_overdub_stays_bounded() {
    let (mut engine, _controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, |_| 0.8);
    engine.overdub();
    run(&mut engine, 512, |_| 0.8);
    engine.overdub();
    let (left, _) = silence(&mut engine, 256);
    assert!(left.iter().all(|&s| s > 0.9 && s < 1.0));
}

#[test]
fn test_block_size_does_not_change_output() {
    let (mut chunked, _c1) = exact_engine();
    let (mut whole, _c2) = exact_engine();

    chunked.record();
    let a1 = run(&mut chunked, 1000, tone);
    chunked.play();
    let a2 = silence(&mut chunked, 2000);

    whole.record();
    let input: Vec<f32> = (0..1000).map(tone).collect();
    let mut b1 = (vec![0.0; 1000], vec![0.0; 1000]);
    whole.process_block(&input, &input, &mut b1.0, &mut b1.1);
    whole.play();
    let silent = vec![0.0; 2000];
    let mut b2 = (vec![0.0; 2000], vec![0.0; 2000]);
    whole.process_block(&silent, &silent, &mut b2.0, &mut b2.1);

    assert_eq!(a1, b1);
    assert_eq!(a2, b2);
}

#[test]
fn test_short_input_silences_rest_of_output() {
    let (mut engine, _controller) = exact_engine();
    let input = vec![0.2; 40];
    let mut out_l = vec![1.0; 80];
    let mut out_r = vec![1.0; 80];
    engine.process_block(&input, &input, &mut out_l, &mut out_r);
    assert!(out_l[40..].iter().all(|&s| s == 0.0));
    assert!(out_r[40..].iter().all(|&s| s == 0.0));
}

#[test]
fn test_recording_stops_at_capacity() {
    let config = EngineConfig {
        max_loop_seconds: 0.0625,
        ..exact_config()
    };
    let (mut engine, _controller) = engine_with(config);
    engine.record();
    run(&mut engine, 4000, tone);
    assert_eq!(engine.master_length(), 3000);
    assert_eq!(engine.engine_state(), TrackState::Playing);
}
