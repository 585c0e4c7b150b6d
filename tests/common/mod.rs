//! Shared helpers for the integration tests

#![allow(dead_code)]

use layerloop::{
    AntiClickSettings, EngineConfig, EngineEvent, LayerIndex, LayerOrchestrator, LooperController,
};

pub const SR: u32 = 48000;
pub const BLOCK: usize = 64;

/// Config whose output is exactly the sum of the layer contents
///
/// No ramps, no seam crossfade, no boundary processing, no monitoring.
pub fn exact_config() -> EngineConfig {
    EngineConfig {
        sample_rate: SR,
        max_block_size: BLOCK,
        max_loop_seconds: 0.5,
        seam_crossfade_samples: 0,
        smoothing_ms: 0.0,
        input_monitoring: false,
        anti_click: AntiClickSettings::disabled(),
        ..EngineConfig::default()
    }
}

pub fn engine_with(config: EngineConfig) -> (LayerOrchestrator, LooperController) {
    let mut engine = LayerOrchestrator::new(config).unwrap();
    let controller = engine.take_controller().unwrap();
    (engine, controller)
}

pub fn exact_engine() -> (LayerOrchestrator, LooperController) {
    engine_with(exact_config())
}

pub fn layer(number: usize) -> LayerIndex {
    LayerIndex::from_display(number).unwrap()
}

/// Run `frames` frames of mono input `signal(i)` through the engine
///
/// Returns the left and right output.
pub fn run(
    engine: &mut LayerOrchestrator,
    frames: usize,
    signal: impl Fn(usize) -> f32,
) -> (Vec<f32>, Vec<f32>) {
    let mut out_l = Vec::with_capacity(frames);
    let mut out_r = Vec::with_capacity(frames);
    let mut done = 0;
    while done < frames {
        // Odd block size so host blocks never line up with engine chunks
        let n = 100.min(frames - done);
        let input: Vec<f32> = (done..done + n).map(&signal).collect();
        let mut l = vec![0.0; n];
        let mut r = vec![0.0; n];
        engine.process_block(&input, &input, &mut l, &mut r);
        out_l.extend_from_slice(&l);
        out_r.extend_from_slice(&r);
        done += n;
    }
    (out_l, out_r)
}

pub fn silence(engine: &mut LayerOrchestrator, frames: usize) -> (Vec<f32>, Vec<f32>) {
    run(engine, frames, |_| 0.0)
}

pub fn events(controller: &mut LooperController) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    controller.drain_events(|event| events.push(event));
    events
}

/// A recognisable signal that stays well inside the linear range
pub fn tone(i: usize) -> f32 {
    0.3 * (i as f32 * 0.05).sin()
}

pub fn other_tone(i: usize) -> f32 {
    0.2 * (i as f32 * 0.013).cos()
}
