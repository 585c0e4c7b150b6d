//! Mixing Tests
//!
//! Track and Layer compositing, solo/mute, Layer-mode bounce, flatten and
//! ADD+ override capture.

mod common;

use approx::assert_relative_eq;
use common::*;
use layerloop::dsp::Effect;
use layerloop::engine::LayerSettings;
use layerloop::{EngineEvent, LayerType, MixMode, TrackState};
use test_case::test_case;

/// Record `first` on layer 1 and overdub `second` on layer 2, then play
fn two_layers(
    mode: MixMode,
    first: impl Fn(usize) -> f32,
    second: impl Fn(usize) -> f32,
) -> (layerloop::LayerOrchestrator, layerloop::LooperController) {
    let (mut engine, controller) = exact_engine();
    engine.set_mix_mode(mode);
    engine.record();
    run(&mut engine, 256, first);
    engine.record();
    run(&mut engine, 256, second);
    engine.play();
    (engine, controller)
}

/// Post-loop stage that halves the level
struct Half;

impl Effect for Half {
    fn prepare(&mut self, _sample_rate: u32, _max_block_size: usize) {}

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s *= 0.5;
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Half"
    }
}

// === Track Mode ===

#[test]
fn test_track_mode_sums_with_pan() {
    let (mut engine, _controller) = two_layers(MixMode::Track, |_| 0.2, |_| 0.3);
    engine.set_layer_pan(layer(2), 1.0);

    let (left, right) = silence(&mut engine, 256);
    for i in 0..256 {
        assert_relative_eq!(left[i], 0.2, epsilon = 1e-6);
        assert_relative_eq!(right[i], 0.5, epsilon = 1e-6);
    }
}

#[test]
fn test_track_mode_records_no_bounce() {
    let (engine, _controller) = two_layers(MixMode::Track, tone, |_| 0.0);
    assert_eq!(engine.layer(layer(2)).buffer().frame(20), (0.0, 0.0));
    assert!(!engine.is_bounce_complete());
}

#[test]
fn test_solo_silences_other_layers() {
    let (mut engine, _controller) = two_layers(MixMode::Track, tone, other_tone);
    engine.set_layer_solo(layer(1), true);
    let (left, _) = silence(&mut engine, 256);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, tone(i));
    }
    assert_eq!(engine.audible_layers(), 1);

    engine.set_layer_solo(layer(1), false);
    assert_eq!(engine.audible_layers(), 1);
    silence(&mut engine, 1);
    assert_eq!(engine.audible_layers(), 2);
}

#[test]
fn test_volume_scales_layer() {
    let (mut engine, _controller) = two_layers(MixMode::Track, |_| 0.4, |_| 0.0);
    engine.set_layer_volume(layer(1), 0.5);
    let (left, right) = silence(&mut engine, 64);
    assert_relative_eq!(left[30], 0.2, epsilon = 1e-6);
    assert_relative_eq!(right[30], 0.2, epsilon = 1e-6);
}

// === Layer Mode ===

#[test]
fn test_layer_mode_top_layer_replaces_and_mute_falls_through() {
    let (mut engine, _controller) = two_layers(MixMode::Layer, tone, |_| 0.1);

    // Layer 2 holds the bounced layer 1 plus its own overdub
    let (left, _) = silence(&mut engine, 256);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, tone(i) + 0.1, epsilon = 1e-6);
    }

    engine.set_layer_mute(layer(2), true);
    let (left, _) = silence(&mut engine, 256);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, tone(i), epsilon = 1e-6);
    }
}

#[test]
fn test_layer_mode_bounce_copies_one_loop_from_highest_layer() {
    let (mut engine, mut controller) = exact_engine();
    engine.set_mix_mode(MixMode::Layer);
    engine.record();
    run(&mut engine, 256, tone);

    engine.record();
    assert_eq!(engine.bounce_source(), Some(layer(1)));
    run(&mut engine, 512, |_| 0.0);
    assert!(engine.is_bounce_complete());
    assert_eq!(engine.bounce_progress(), 1.0);
    engine.play();

    // Two passes went by but only one loop was bounced
    for i in (0..256).step_by(7) {
        let (l, r) = engine.layer(layer(2)).buffer().frame(i);
        assert_relative_eq!(l, tone(i), epsilon = 1e-6);
        assert_relative_eq!(r, tone(i), epsilon = 1e-6);
    }

    // Layer 3 bounces from layer 2 only, not from the sum of 1 and 2
    engine.record();
    assert_eq!(engine.current_layer(), layer(3));
    assert_eq!(engine.bounce_source(), Some(layer(2)));
    run(&mut engine, 256, |_| 0.0);
    engine.play();
    for i in (0..256).step_by(7) {
        let (l, _) = engine.layer(layer(3)).buffer().frame(i);
        assert_relative_eq!(l, tone(i), epsilon = 1e-6);
    }

    let (left, _) = silence(&mut engine, 256);
    for (i, sample) in left.iter().enumerate() {
        assert_relative_eq!(*sample, tone(i), epsilon = 1e-6);
    }

    let events = events(&mut controller);
    assert!(events.contains(&EngineEvent::BounceComplete { layer: layer(2) }));
    assert!(events.contains(&EngineEvent::BounceComplete { layer: layer(3) }));
}

#[test]
fn test_switching_to_track_mode_cancels_bounce() {
    let (mut engine, _controller) = exact_engine();
    engine.set_mix_mode(MixMode::Layer);
    engine.record();
    run(&mut engine, 256, tone);
    engine.record();
    run(&mut engine, 64, |_| 0.0);

    engine.set_mix_mode(MixMode::Track);
    assert_eq!(engine.bounce_source(), None);
    run(&mut engine, 192, |_| 0.0);
    assert_eq!(engine.layer(layer(2)).buffer().frame(200), (0.0, 0.0));
}

// === Flatten ===

#[test]
fn test_flatten_bakes_gain_and_pan_then_resets_controls() {
    let (mut engine, mut controller) = two_layers(MixMode::Track, |_| 0.4, |_| 0.2);
    engine.set_layer_volume(layer(1), 0.5);
    engine.set_layer_pan(layer(2), -1.0);
    engine.set_layer_reverse(layer(2), true);
    engine.set_layer_eq(layer(1), 0.0, 0.0, 0.0);

    engine.flatten();

    assert_eq!(engine.engine_state(), TrackState::Playing);
    assert_eq!(engine.highest_layer(), layer(1));
    assert!(!engine.layer(layer(2)).has_content());
    let (l, r) = engine.layer(layer(1)).buffer().frame(100);
    assert_relative_eq!(l, 0.4, epsilon = 1e-6);
    assert_relative_eq!(r, 0.2, epsilon = 1e-6);

    for k in 1..=8 {
        assert_eq!(engine.layer_settings(layer(k)), LayerSettings::default());
    }

    let (left, right) = silence(&mut engine, 256);
    assert_relative_eq!(left[50], 0.4, epsilon = 1e-6);
    assert_relative_eq!(right[50], 0.2, epsilon = 1e-6);
    assert!(events(&mut controller).contains(&EngineEvent::Flattened { layers: 2 }));
}

#[test]
fn test_flatten_skips_undone_layers() {
    let (mut engine, _controller) = two_layers(MixMode::Track, |_| 0.3, |_| 0.2);
    engine.undo();
    engine.flatten();
    let (l, _) = engine.layer(layer(1)).buffer().frame(10);
    assert_relative_eq!(l, 0.3, epsilon = 1e-6);
}

#[test]
fn test_flatten_without_loop_is_noop() {
    let (mut engine, mut controller) = exact_engine();
    engine.flatten();
    assert!(events(&mut controller).is_empty());
}

// === ADD+ ===

#[test]
fn test_additive_capture_commits_output_into_override_layer() {
    let (mut engine, mut controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, tone);
    engine.play();

    // With ADD+ on, record starts a capture instead of a new layer
    engine.set_additive_mode(true);
    engine.record();
    assert!(engine.is_additive_capture_active());
    assert_eq!(engine.highest_layer(), layer(1));

    silence(&mut engine, 256 + 10);
    assert_eq!(engine.additive_commits(), 1);
    assert_eq!(engine.layer(layer(2)).layer_type(), LayerType::Override);

    // The override replaces layer 1, so the output is unchanged
    let (left, _) = silence(&mut engine, 246);
    for (j, sample) in left.iter().enumerate() {
        let i = j + 10;
        assert_relative_eq!(*sample, tone(i), epsilon = 1e-6);
    }
    silence(&mut engine, 10);
    assert_eq!(engine.additive_commits(), 2);
    assert_eq!(engine.highest_layer(), layer(2));

    let events = events(&mut controller);
    assert!(events.contains(&EngineEvent::AdditiveCaptureStarted));
    assert!(events.contains(&EngineEvent::OverrideCommitted {
        layer: layer(2),
        new_layer: true
    }));
    assert!(events.contains(&EngineEvent::OverrideCommitted {
        layer: layer(2),
        new_layer: false
    }));
}

#[test_case(2.0 ; "double speed")]
#[test_case(0.5 ; "half speed")]
fn test_additive_capture_covers_whole_loop_off_unity_speed(speed: f32) {
    let (mut engine, _controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, |_| 0.25);
    engine.play();
    engine.set_speed(speed);
    engine.set_additive_mode(true);
    engine.record();

    silence(&mut engine, 1024);
    assert!(engine.additive_commits() >= 1);
    let committed = engine.layer(layer(2));
    assert_eq!(committed.layer_type(), LayerType::Override);
    for i in 0..256 {
        let (l, r) = committed.buffer().frame(i);
        assert_relative_eq!(l, 0.25, epsilon = 1e-6);
        assert_relative_eq!(r, 0.25, epsilon = 1e-6);
    }
}

#[test]
fn test_additive_capture_compounds_post_effects() {
    let (mut engine, _controller) = exact_engine();
    engine.add_post_effect(Box::new(Half));
    engine.record();
    run(&mut engine, 256, tone);
    engine.play();
    engine.set_additive_mode(true);
    engine.record();

    silence(&mut engine, 512 + 10);
    assert_eq!(engine.additive_commits(), 2);
    // The first frames of the second pass were rendered before the first commit
    for i in (16..256).step_by(5) {
        let (l, _) = engine.layer(layer(2)).buffer().frame(i);
        assert_relative_eq!(l, 0.25 * tone(i), epsilon = 1e-6);
    }
}

#[test]
fn test_second_trigger_commits_into_new_layer() {
    let (mut engine, _controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, tone);
    engine.play();
    engine.set_additive_mode(true);
    engine.record();
    silence(&mut engine, 256 + 10);
    assert_eq!(engine.highest_layer(), layer(2));

    engine.record();
    silence(&mut engine, 256);
    assert_eq!(engine.highest_layer(), layer(3));
    assert_eq!(engine.layer(layer(3)).layer_type(), LayerType::Override);
}

#[test]
fn test_disabling_additive_mode_stops_capture() {
    let (mut engine, mut controller) = exact_engine();
    engine.record();
    run(&mut engine, 256, tone);
    engine.play();
    engine.set_additive_mode(true);
    engine.record();
    silence(&mut engine, 100);

    engine.set_additive_mode(false);
    assert!(!engine.is_additive_capture_active());
    silence(&mut engine, 512);
    assert_eq!(engine.additive_commits(), 0);
    assert!(!engine.layer(layer(2)).has_content());
    assert!(events(&mut controller).contains(&EngineEvent::AdditiveCaptureStopped));
}
