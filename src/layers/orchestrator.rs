//! Layer Orchestrator
//!
//! Owns the eight-slot layer arena, the undo cursor (`current`) and the
//! written-layer watermark (`highest`), the master loop clock, and every
//! buffer the block pipeline touches. All storage is allocated in
//! [`LayerOrchestrator::new`]; [`LayerOrchestrator::process_block`] never
//! allocates, locks or logs.
//!
//! # Block pipeline
//!
//! Blocks longer than `max_block_size` are cut into chunks. Per chunk:
//!
//! 1. Drain queued commands, read the host tempo and the shared parameters.
//! 2. Resolve solo/override gains.
//! 3. Process layers in ascending order into per-layer scratch buffers;
//!    a Layer-mode bounce feeds the source layer's output into its target.
//! 4. Composite with the Track or Layer rule, soft-clip.
//! 5. Loop-boundary anti-click on the loop-only mix while advancing the
//!    master clock.
//! 6. Add live input monitoring, run the post-loop effect chain, sanitize
//!    and soft-clip.
//! 7. ADD+ capture of the effected output, committing at wraps.
//! 8. Publish status.

use std::sync::Arc;

use log::info;

use super::anti_click::AntiClick;
use super::capture::AdditiveCapture;
use super::mixing::{mix_into, Bounce};
use super::track::{LoopTrack, TrackTransition};
use crate::config::EngineConfig;
use crate::dsp::math::{lerp, sanitize, soft_clip, soft_clip_slice};
use crate::dsp::{
    DelayLinePitchShifter, Effect, EffectChain, PitchShifter, SmoothedValue, ThreeBandEq,
};
use crate::engine::buffer::{count_clipped, peak_of};
use crate::engine::command::{control_link, EngineLink};
use crate::engine::{
    Command, EngineStatus, GlobalSettings, HostTransport, LayerSettings, LooperController,
    SharedParameters, StereoBuffer, TrackState, MAX_LAYERS,
};
use crate::error::Result;

/// Multi-layer looper engine
pub struct LayerOrchestrator {
    pub(super) config: EngineConfig,
    pub(super) sample_rate: u32,
    pub(super) max_block: usize,

    // Layer arena
    pub(super) tracks: [LoopTrack; MAX_LAYERS],
    pub(super) current: usize,
    pub(super) highest: usize,

    // Master loop clock
    pub(super) master_len: usize,
    pub(super) master_position: f64,
    pub(super) master_speed: SmoothedValue,

    // Controls as last applied
    pub(super) global: GlobalSettings,
    pub(super) last_layers: [LayerSettings; MAX_LAYERS],
    pub(super) tempo_bpm: f32,
    pub(super) host: Option<Box<dyn HostTransport>>,
    pub(super) host_playing: bool,

    // Sessions and boundary processing
    pub(super) bounce: Bounce,
    pub(super) capture: AdditiveCapture,
    pub(super) anti_click: AntiClick,
    pub(super) post_fx: EffectChain,

    // Threads
    pub(super) params: Arc<SharedParameters>,
    pub(super) status: Arc<EngineStatus>,
    pub(super) link: EngineLink,
    pub(super) controller: Option<LooperController>,

    // Block scratch
    pub(super) input: StereoBuffer,
    pub(super) record_in: StereoBuffer,
    pub(super) render: StereoBuffer,
    pub(super) loop_mix: StereoBuffer,
    pub(super) track_out: [StereoBuffer; MAX_LAYERS],
    pub(super) track_gain: [Vec<f32>; MAX_LAYERS],
    pub(super) master_index: Vec<usize>,
    pub(super) wrap_flags: Vec<bool>,
    pub(super) unity_gain: Vec<f32>,

    // Flatten
    pub(super) mixdown: StereoBuffer,
    pub(super) flatten_eq: ThreeBandEq,
    pub(super) flatten_pitch: Box<dyn PitchShifter>,

    // Meters
    pub(super) master_peak: f32,
    pub(super) master_clipped: u64,
}

impl LayerOrchestrator {
    /// Validate `config` and allocate every buffer the engine will use
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let sample_rate = config.sample_rate;
        let max_block = config.max_block_size;
        let capacity = config.loop_capacity_samples();

        let global = GlobalSettings {
            mix_mode: config.mix_mode,
            anti_click: config.anti_click,
            ..GlobalSettings::default()
        }
        .clamped();
        let params = Arc::new(SharedParameters::new(&global));
        let status = Arc::new(EngineStatus::default());
        let (link, controller) = control_link(Arc::clone(&params), Arc::clone(&status));

        let tracks: [LoopTrack; MAX_LAYERS] = std::array::from_fn(|_| {
            let mut track = LoopTrack::new(capacity);
            track.prepare(
                sample_rate,
                max_block,
                config.smoothing_ms,
                config.seam_crossfade_samples,
            );
            track
        });

        let mut master_speed = SmoothedValue::new(global.speed);
        master_speed.prepare(sample_rate as f32, config.smoothing_ms);
        let mut anti_click = AntiClick::new(&global.anti_click);
        anti_click.prepare(sample_rate);
        let mut post_fx = EffectChain::new();
        post_fx.prepare(sample_rate, max_block);
        let mut flatten_eq = ThreeBandEq::new();
        flatten_eq.prepare(sample_rate);
        let mut flatten_pitch: Box<dyn PitchShifter> = Box::new(DelayLinePitchShifter::new());
        flatten_pitch.prepare(sample_rate, max_block);

        let mut engine = Self {
            sample_rate,
            max_block,
            tracks,
            current: 0,
            highest: 0,
            master_len: 0,
            master_position: 0.0,
            master_speed,
            global,
            last_layers: [LayerSettings::default(); MAX_LAYERS],
            tempo_bpm: global.host_bpm,
            host: None,
            host_playing: false,
            bounce: Bounce::default(),
            capture: AdditiveCapture::new(capacity),
            anti_click,
            post_fx,
            params,
            status,
            link,
            controller: Some(controller),
            input: StereoBuffer::new(max_block),
            record_in: StereoBuffer::new(max_block),
            render: StereoBuffer::new(max_block),
            loop_mix: StereoBuffer::new(max_block),
            track_out: std::array::from_fn(|_| StereoBuffer::new(max_block)),
            track_gain: std::array::from_fn(|_| vec![0.0; max_block]),
            master_index: vec![0; max_block],
            wrap_flags: vec![false; max_block],
            unity_gain: vec![1.0; max_block],
            mixdown: StereoBuffer::new(capacity),
            flatten_eq,
            flatten_pitch,
            master_peak: 0.0,
            master_clipped: 0,
            config,
        };
        for k in 0..MAX_LAYERS {
            let settings = engine.last_layers[k];
            engine.tracks[k].apply_settings(&settings);
            engine.apply_global_broadcast(k);
        }

        info!(
            "Layer engine ready: {} Hz, {} frame blocks, {} frames per layer",
            sample_rate, max_block, capacity
        );
        Ok(engine)
    }

    /// Hand out the control-thread handle; `None` after the first call
    pub fn take_controller(&mut self) -> Option<LooperController> {
        self.controller.take()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared parameter store
    pub fn params(&self) -> &Arc<SharedParameters> {
        &self.params
    }

    /// Status published at the end of every block
    pub fn status(&self) -> &Arc<EngineStatus> {
        &self.status
    }

    /// Attach the host tempo source read at the start of every block
    pub fn set_host(&mut self, host: Box<dyn HostTransport>) {
        self.host = Some(host);
        self.sync_host();
    }

    /// Whether the host transport reported running on the last block
    pub fn is_host_playing(&self) -> bool {
        self.host_playing
    }

    /// Post-loop effect chain whose output ADD+ captures
    pub fn post_effects(&self) -> &EffectChain {
        &self.post_fx
    }

    /// Append an effect to the post-loop chain (setup only)
    pub fn add_post_effect(&mut self, effect: Box<dyn Effect>) {
        self.post_fx.push(effect);
    }

    // ========================================================================
    // Master Clock
    // ========================================================================

    /// Active region of the master loop `[start, end)` in samples
    pub(super) fn master_region(&self) -> (usize, usize) {
        let len = self.master_len;
        if len == 0 {
            return (0, 0);
        }
        let start = ((self.global.loop_start as f64 * len as f64).round() as usize).min(len - 1);
        let end = ((self.global.loop_end as f64 * len as f64).round() as usize).min(len);
        if end > start {
            (start, end)
        } else {
            (0, len)
        }
    }

    /// Where playback starts in the current direction
    pub(super) fn master_start_position(&self) -> f64 {
        let (start, end) = self.master_region();
        if self.global.reverse && end > start {
            (end - 1) as f64
        } else {
            start as f64
        }
    }

    /// Pull the master position back inside the region after it changed
    pub(super) fn wrap_master_position(&mut self) {
        let (start, end) = self.master_region();
        if end <= start {
            return;
        }
        let (s, e) = (start as f64, end as f64);
        if !(self.master_position >= s && self.master_position < e) {
            let offset = if self.master_position.is_finite() {
                (self.master_position - s).rem_euclid(e - s)
            } else {
                0.0
            };
            self.master_position = s + offset;
        }
        self.anti_click.rebase();
    }

    /// Re-apply the engine-wide loop region, direction and speed to a layer
    pub(super) fn apply_global_broadcast(&mut self, layer: usize) {
        let g = self.global;
        let track = &mut self.tracks[layer];
        track.set_loop_region(g.loop_start, g.loop_end);
        track.set_reverse(g.reverse);
        track.set_rate(g.speed);
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Process one host block
    ///
    /// Reads live input from `in_l`/`in_r` and writes the engine output to
    /// `out_l`/`out_r`. Frames beyond the shortest slice are left silent.
    pub fn process_block(
        &mut self,
        in_l: &[f32],
        in_r: &[f32],
        out_l: &mut [f32],
        out_r: &mut [f32],
    ) {
        let len = in_l.len().min(in_r.len()).min(out_l.len()).min(out_r.len());
        out_l[len..].iter_mut().for_each(|s| *s = 0.0);
        out_r[len..].iter_mut().for_each(|s| *s = 0.0);

        let mut offset = 0;
        while offset < len {
            let n = self.max_block.min(len - offset);
            let range = offset..offset + n;
            self.process_chunk(
                &in_l[range.clone()],
                &in_r[range.clone()],
                &mut out_l[range.clone()],
                &mut out_r[range],
            );
            offset += n;
        }
    }

    fn process_chunk(&mut self, in_l: &[f32], in_r: &[f32], out_l: &mut [f32], out_r: &mut [f32]) {
        let len = out_l.len();

        while let Some(command) = self.link.next_command() {
            self.apply_command(command);
        }
        self.sync_host();
        self.sync_parameters();
        self.check_bounce();
        self.update_solo_gains();

        {
            let (il, ir) = self.input.slices_mut(len);
            for i in 0..len {
                il[i] = sanitize(in_l[i]);
                ir[i] = sanitize(in_r[i]);
            }
        }

        let defined_by = self.process_tracks(len);
        if let Some(k) = defined_by {
            self.master_position = self.tracks[k].play_head();
        }
        self.composite(len);

        let looping = self.tracks.iter().any(LoopTrack::is_looping);
        let running = looping && self.master_len > 0 && defined_by.is_none();
        self.boundary_stage(len, running);

        let monitor =
            self.config.input_monitoring && (self.engine_state().is_writing() || !looping);
        {
            let (ml, mr) = self.loop_mix.slices(len);
            let (il, ir) = self.input.slices(len);
            for i in 0..len {
                out_l[i] = ml[i] + if monitor { il[i] } else { 0.0 };
                out_r[i] = mr[i] + if monitor { ir[i] } else { 0.0 };
            }
        }
        self.post_fx.process(out_l, out_r);

        self.master_clipped += (count_clipped(out_l) + count_clipped(out_r)) as u64;
        for s in out_l.iter_mut().chain(out_r.iter_mut()) {
            *s = soft_clip(sanitize(*s));
        }
        self.master_peak = peak_of(out_l).max(peak_of(out_r));

        if running && self.capture.is_active() {
            self.capture_stage(out_l, out_r);
        }
        self.publish_status();
    }

    /// Run every layer; returns the layer whose recording defined the loop
    fn process_tracks(&mut self, len: usize) -> Option<usize> {
        let mut defined_by = None;
        for k in 0..MAX_LAYERS {
            if !self.tracks[k].has_content() && self.tracks[k].state() == TrackState::Idle {
                self.track_out[k].clear_prefix(len);
                self.track_gain[k][..len].iter_mut().for_each(|g| *g = 0.0);
                continue;
            }

            let bounce = self
                .bounce
                .source_for(k)
                .map(|source| (source, self.bounce.remaining(self.master_len).min(len)));
            let (lower, upper) = self.track_out.split_at_mut(k);
            let out = &mut upper[0];
            let gain = &mut self.track_gain[k][..len];
            let mut bounced = 0;

            let transition = match bounce {
                Some((source, frames)) if frames > 0 => {
                    let src = &lower[source];
                    self.record_in.copy_prefix_from(&self.input, len);
                    {
                        let (rl, rr) = self.record_in.slices_mut(frames);
                        let (sl, sr) = src.slices(frames);
                        for i in 0..frames {
                            rl[i] = soft_clip(rl[i] + sl[i]);
                            rr[i] = soft_clip(rr[i] + sr[i]);
                        }
                    }
                    let (il, ir) = self.record_in.slices(len);
                    let (ol, or) = out.slices_mut(len);
                    let transition = self.tracks[k].process((il, ir), (ol, or), gain);

                    let (ol, or) = out.slices_mut(frames);
                    let (sl, sr) = src.slices(frames);
                    for i in 0..frames {
                        ol[i] += sl[i];
                        or[i] += sr[i];
                    }
                    bounced = frames;
                    transition
                }
                _ => {
                    let (il, ir) = self.input.slices(len);
                    let (ol, or) = out.slices_mut(len);
                    self.tracks[k].process((il, ir), (ol, or), gain)
                }
            };

            if bounced > 0 && self.bounce.advance(bounced, self.master_len) {
                self.finish_bounce(k);
            }
            if let Some(TrackTransition::RecordingComplete { length }) = transition {
                if self.on_recording_complete(k, length) {
                    defined_by = Some(k);
                }
            }
        }
        defined_by
    }

    fn composite(&mut self, len: usize) {
        let mode = self.global.mix_mode;
        self.loop_mix.clear_prefix(len);
        let (ml, mr) = self.loop_mix.slices_mut(len);
        for k in 0..MAX_LAYERS {
            let (ol, or) = self.track_out[k].slices(len);
            let gain = &self.track_gain[k][..len];
            mix_into(mode, ml, ol, gain);
            mix_into(mode, mr, or, gain);
        }
        soft_clip_slice(ml);
        soft_clip_slice(mr);
    }

    /// Anti-click on the loop mix while the master clock advances
    fn boundary_stage(&mut self, len: usize, running: bool) {
        let (start, end) = self.master_region();
        let reverse = self.global.reverse;
        let (ml, mr) = self.loop_mix.slices_mut(len);

        for i in 0..len {
            let speed = self.master_speed.next_value() as f64;
            if !running || end <= start {
                self.master_index[i] = 0;
                self.wrap_flags[i] = false;
                continue;
            }
            let (s, e) = (start as f64, end as f64);
            let pos = self.master_position;
            let norm = ((pos - s) / (e - s)) as f32;
            let wrapped = self.anti_click.observe(norm, reverse);
            let ahead = if reverse { pos - s } else { e - pos };
            let (l, r) = self.anti_click.process_frame(ml[i], mr[i], ahead / speed, wrapped);
            ml[i] = l;
            mr[i] = r;
            self.master_index[i] = (pos.max(0.0) as usize).min(self.master_len - 1);
            self.wrap_flags[i] = wrapped;

            let mut next = pos + if reverse { -speed } else { speed };
            if next >= e || next < s {
                next = s + (next - s).rem_euclid(e - s);
            }
            self.master_position = next;
        }
    }

    fn capture_stage(&mut self, out_l: &[f32], out_r: &[f32]) {
        let (start, end) = self.master_region();
        let reverse = self.global.reverse;
        let pass = end - start;

        for i in 0..out_l.len() {
            if !self.capture.is_active() {
                break;
            }
            let index = self.master_index[i];
            let span = self.capture.span_to(index, start, end, reverse);
            if span == 0 {
                if self.wrap_flags[i] && self.capture.pass_complete(pass) {
                    self.commit_override();
                }
                self.capture.write(index, out_l[i], out_r[i]);
                continue;
            }

            // Fill the positions the playhead skipped on its way to `index`
            let (from_l, from_r) = self.capture.last_values();
            for step in 1..=span {
                let (position, wrapped) = self.capture.next_position(start, end, reverse);
                if wrapped && self.capture.pass_complete(pass) {
                    self.commit_override();
                }
                if step == span {
                    self.capture.write(position, out_l[i], out_r[i]);
                } else {
                    let frac = step as f32 / span as f32;
                    self.capture.write(
                        position,
                        lerp(from_l, out_l[i], frac),
                        lerp(from_r, out_r[i], frac),
                    );
                }
            }
        }
    }

    /// Carry out one queued transport command
    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::Record => self.record(),
            Command::Play => self.play(),
            Command::Stop => self.stop(),
            Command::Overdub => self.overdub(),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::Clear => self.clear(),
            Command::ClearLayer(index) => self.clear_layer(index),
            Command::DeleteLayer(index) => self.delete_layer(index),
            Command::JumpToLayer(index) => self.jump_to_layer(index),
            Command::FlattenLayers => self.flatten(),
            Command::TriggerAdditiveCapture => self.trigger_additive_capture(),
            Command::StopAdditiveCapture => self.stop_additive_capture(),
        }
    }
}
