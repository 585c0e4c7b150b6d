//! CLI Command Implementations
//!
//! Every command drives a [`LayerOrchestrator`] offline: audio is pushed
//! through `process_block` in fixed-size blocks and the output is written
//! to WAV.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::config::EngineConfig;
use crate::dsp::{Delay, Saturation};
use crate::engine::{
    generate_test_tone, read_wav, write_wav, BitDepth, LooperController, MixMode, StereoBuffer,
};
use crate::layers::LayerOrchestrator;

/// Frames handed to the engine per call
const RENDER_BLOCK: usize = 512;

/// Offline renderer collecting the engine output
struct Session {
    engine: LayerOrchestrator,
    controller: LooperController,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Session {
    fn new(config: EngineConfig) -> Result<Self> {
        let mut engine = LayerOrchestrator::new(config).context("failed to create engine")?;
        let controller = engine
            .take_controller()
            .context("engine controller already taken")?;
        Ok(Self {
            engine,
            controller,
            left: Vec::new(),
            right: Vec::new(),
        })
    }

    /// Run `frames` frames, feeding `input` from its start (silence past its end)
    fn render(&mut self, input: Option<&StereoBuffer>, frames: usize) {
        let silence = [0.0f32; RENDER_BLOCK];
        let mut out_l = [0.0f32; RENDER_BLOCK];
        let mut out_r = [0.0f32; RENDER_BLOCK];
        let mut done = 0;
        while done < frames {
            let n = RENDER_BLOCK.min(frames - done);
            let (in_l, in_r) = match input {
                Some(buffer) if done + n <= buffer.capacity() => {
                    (&buffer.left()[done..done + n], &buffer.right()[done..done + n])
                }
                _ => (&silence[..n], &silence[..n]),
            };
            self.engine
                .process_block(in_l, in_r, &mut out_l[..n], &mut out_r[..n]);
            self.left.extend_from_slice(&out_l[..n]);
            self.right.extend_from_slice(&out_r[..n]);
            self.controller.log_events();
            done += n;
        }
    }

    fn write(self, path: &Path, bits: u16) -> Result<()> {
        let depth = BitDepth::from_bits(bits)?;
        let frames = self.left.len();
        let sample_rate = self.engine.sample_rate();
        let buffer = StereoBuffer::from_channels(self.left, self.right);
        write_wav(path, &buffer, frames, sample_rate, depth)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!(
            "Wrote {:.2} s to {}",
            frames as f64 / sample_rate as f64,
            path.display()
        );
        Ok(())
    }
}

/// Render a scripted three-layer performance
pub fn demo(
    config: EngineConfig,
    output: &Path,
    seconds: f32,
    layer_mode: bool,
    bits: u16,
) -> Result<()> {
    let sample_rate = config.sample_rate;
    let frames = (seconds.max(0.1) as f64 * sample_rate as f64) as usize;
    info!("Rendering demo: {} frame loop at {} Hz", frames, sample_rate);

    let bass = generate_test_tone(110.0, 110.0, 0.3, frames, sample_rate);
    let fifth = generate_test_tone(330.0, 330.0, 0.15, frames, sample_rate);
    let octave = generate_test_tone(440.0, 660.0, 0.1, frames, sample_rate);

    let mut session = Session::new(config)?;
    if layer_mode {
        session.engine.set_mix_mode(MixMode::Layer);
    }

    // Layer 1 defines the loop, then each press of record stacks a layer
    session.engine.record();
    session.render(Some(&bass), frames);
    session.engine.record();
    session.render(Some(&fifth), frames);
    session.engine.record();
    session.render(Some(&octave), frames);
    session.engine.play();
    session.render(None, frames);

    // Undo the top layer, bring it back, then flatten everything
    session.engine.undo();
    session.render(None, frames);
    session.engine.redo();
    session.render(None, frames);
    session.engine.flatten();
    session.render(None, frames);
    session.engine.stop();

    session.write(output, bits)
}

/// Loop an input file for `passes` passes
#[allow(clippy::too_many_arguments)]
pub fn loop_file(
    config: EngineConfig,
    input: &Path,
    output: &Path,
    passes: usize,
    layer_mode: bool,
    additive: bool,
    drive: f32,
    delay_ms: Option<f32>,
    speed: f32,
    reverse: bool,
    bits: u16,
) -> Result<()> {
    let audio = read_wav(input, config.sample_rate)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let frames = audio.capacity().min(config.loop_capacity_samples());
    info!("Looping {} ({} frames)", input.display(), frames);

    let mut session = Session::new(config)?;
    if layer_mode {
        session.engine.set_mix_mode(MixMode::Layer);
    }
    if additive {
        session.engine.add_post_effect(Box::new(Saturation::new(drive)));
    }
    if let Some(ms) = delay_ms {
        session.engine.add_post_effect(Box::new(Delay::new(ms)));
    }

    session.engine.record();
    session.render(Some(&audio), frames);
    session.engine.play();
    session.engine.set_speed(speed);
    session.engine.set_reverse(reverse);

    if additive {
        session.engine.set_additive_mode(true);
        session.engine.record();
    }
    let loop_len = session.engine.master_length();
    session.render(None, loop_len.saturating_mul(passes));
    if additive {
        println!("Committed {} override passes", session.engine.additive_commits());
    }
    session.engine.stop();

    session.write(output, bits)
}

/// Validate a config file, optionally writing the defaults first
pub fn check_config(path: &Path, write_default: bool) -> Result<()> {
    if write_default {
        EngineConfig::default()
            .save_json_file(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote default config to {}", path.display());
    }

    let config = EngineConfig::from_json_file(path)
        .with_context(|| format!("invalid config {}", path.display()))?;
    println!("Config OK: {}", path.display());
    println!("  Sample rate:      {} Hz", config.sample_rate);
    println!("  Max block size:   {} frames", config.max_block_size);
    println!(
        "  Layer capacity:   {:.1} s ({} frames)",
        config.max_loop_seconds,
        config.loop_capacity_samples()
    );
    println!("  Mix mode:         {:?}", config.mix_mode);
    println!("  Input monitoring: {}", config.input_monitoring);
    Ok(())
}
