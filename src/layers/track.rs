//! Loop Track
//!
//! One layer of the looper: a fixed-capacity stereo circular buffer with its
//! own transport state and per-layer effect chain.
//!
//! # State machine
//!
//! ```text
//! Idle --start_recording--> Recording --stop_recording--> Playing | Overdubbing
//! Playing --start_overdub--> Overdubbing --stop_overdub--> Playing
//! any --stop--> Idle
//! ```
//!
//! Invalid transitions are silent no-ops. `loop_length` is fixed when a
//! recording stops and stays fixed until [`LoopTrack::clear`].
//!
//! # Output
//!
//! [`LoopTrack::process`] produces the *loop-only* signal: recorded content,
//! never the live input. Input monitoring is composited by the orchestrator
//! so the loop-boundary processing never touches it.
//!
//! Per-layer effect order on the way out:
//! EQ -> pitch shift -> pan/volume -> fade-per-pass -> mute/solo gain.

use crate::dsp::math::{hermite, sanitize, soft_clip, wrap_index};
use crate::dsp::{DelayLinePitchShifter, PitchShifter, SmoothedValue, ThreeBandEq};
use crate::engine::buffer::{count_clipped, peak_of};
use crate::engine::status::LayerSnapshot;
use crate::engine::{LayerSettings, LayerType, StereoBuffer, TrackState};

/// Default length of the seam crossfade applied when a recording closes
pub const DEFAULT_SEAM_CROSSFADE: usize = 256;

/// Balance pan law: centre is unity on both sides
#[inline]
pub(crate) fn pan_gains(pan: f32) -> (f32, f32) {
    ((1.0 - pan).min(1.0), (1.0 + pan).min(1.0))
}

/// Transport change that happened inside a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackTransition {
    /// Recording reached its target length or the buffer capacity
    RecordingComplete { length: usize },
}

/// A single loop layer
pub struct LoopTrack {
    buffer: StereoBuffer,
    state: TrackState,
    layer_type: LayerType,
    has_content: bool,
    undone: bool,
    /// Frames that may hold non-zero data
    dirty_len: usize,

    // Recording
    write_head: usize,
    recorded: usize,
    target_length: usize,
    /// Recording is phase-locked to an existing master loop
    aligned: bool,
    record_start: usize,

    // Playback
    play_head: f64,
    loop_length: usize,
    loop_start: usize,
    loop_end: usize,
    region: (f32, f32),
    rate: SmoothedValue,
    reverse: bool,

    // Effect chain
    volume: SmoothedValue,
    pan: SmoothedValue,
    eq: ThreeBandEq,
    pitch: Box<dyn PitchShifter>,
    pitch_semitones: f32,
    pitch_high_quality: bool,
    fade: f32,
    fade_level: SmoothedValue,
    mute: bool,
    solo: bool,
    mute_gain: SmoothedValue,
    solo_gain: SmoothedValue,

    // Setup
    sample_rate: u32,
    seam_crossfade: usize,
    fade_env: Vec<f32>,

    // Meters
    peak: f32,
    clipped: u64,
}

impl LoopTrack {
    /// Allocate a track holding up to `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self::with_pitch_shifter(capacity, Box::new(DelayLinePitchShifter::new()))
    }

    /// Allocate a track with a custom pitch-shift collaborator
    pub fn with_pitch_shifter(capacity: usize, pitch: Box<dyn PitchShifter>) -> Self {
        Self {
            buffer: StereoBuffer::new(capacity),
            state: TrackState::Idle,
            layer_type: LayerType::Regular,
            has_content: false,
            undone: false,
            dirty_len: 0,
            write_head: 0,
            recorded: 0,
            target_length: 0,
            aligned: false,
            record_start: 0,
            play_head: 0.0,
            loop_length: 0,
            loop_start: 0,
            loop_end: 0,
            region: (0.0, 1.0),
            rate: SmoothedValue::new(1.0),
            reverse: false,
            volume: SmoothedValue::new(1.0),
            pan: SmoothedValue::new(0.0),
            eq: ThreeBandEq::new(),
            pitch,
            pitch_semitones: 0.0,
            pitch_high_quality: false,
            fade: 1.0,
            fade_level: SmoothedValue::new(1.0),
            mute: false,
            solo: false,
            mute_gain: SmoothedValue::new(1.0),
            solo_gain: SmoothedValue::new(1.0),
            sample_rate: 48000,
            seam_crossfade: DEFAULT_SEAM_CROSSFADE,
            fade_env: Vec::new(),
            peak: 0.0,
            clipped: 0,
        }
    }

    /// Size scratch storage and configure ramps; call before processing
    pub fn prepare(
        &mut self,
        sample_rate: u32,
        max_block_size: usize,
        smoothing_ms: f32,
        seam_crossfade: usize,
    ) {
        self.sample_rate = sample_rate;
        self.seam_crossfade = seam_crossfade;
        let sr = sample_rate as f32;
        for ramp in [
            &mut self.rate,
            &mut self.volume,
            &mut self.pan,
            &mut self.fade_level,
            &mut self.mute_gain,
            &mut self.solo_gain,
        ] {
            ramp.prepare(sr, smoothing_ms);
        }
        self.eq.prepare(sample_rate);
        self.pitch.prepare(sample_rate, max_block_size);
        self.pitch.set_semitones(self.pitch_semitones);
        self.pitch.set_high_quality(self.pitch_high_quality);
        self.fade_env = vec![1.0; max_block_size];
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    /// True once a recording has completed (or content was loaded)
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    /// Silenced by undo
    pub fn is_undone(&self) -> bool {
        self.undone
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    pub fn is_soloed(&self) -> bool {
        self.solo
    }

    /// Neither muted nor undone
    pub fn is_audible(&self) -> bool {
        !self.mute && !self.undone
    }

    pub fn loop_length(&self) -> usize {
        self.loop_length
    }

    /// Active playback region `[start, end)` in samples
    pub fn loop_region(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn play_head(&self) -> f64 {
        self.play_head
    }

    /// Frames written by the current (or last) recording
    pub fn recorded_samples(&self) -> usize {
        self.recorded
    }

    pub fn target_length(&self) -> usize {
        self.target_length
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn buffer(&self) -> &StereoBuffer {
        &self.buffer
    }

    pub fn volume(&self) -> f32 {
        self.volume.target()
    }

    pub fn pan(&self) -> f32 {
        self.pan.target()
    }

    pub fn eq_gains(&self) -> (f32, f32, f32) {
        self.eq.gains()
    }

    pub fn pitch(&self) -> (f32, bool) {
        (self.pitch_semitones, self.pitch_high_quality)
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    pub fn fade(&self) -> f32 {
        self.fade
    }

    /// Current per-pass amplitude factor
    pub fn fade_level(&self) -> f32 {
        self.fade_level.current()
    }

    /// Target of the solo/override gain set by the orchestrator
    pub fn solo_gain_target(&self) -> f32 {
        self.solo_gain.target()
    }

    /// True while the loop is audible (playing or overdubbing a loop)
    pub fn is_looping(&self) -> bool {
        matches!(self.state, TrackState::Playing | TrackState::Overdubbing)
            && self.loop_end > self.loop_start
    }

    /// Playhead within the active region, 0..1
    pub fn normalized_position(&self) -> f32 {
        if self.state == TrackState::Recording {
            return if self.target_length > 0 {
                (self.recorded as f32 / self.target_length as f32).min(1.0)
            } else {
                0.0
            };
        }
        let span = self.loop_end.saturating_sub(self.loop_start);
        if span == 0 {
            return 0.0;
        }
        ((self.play_head - self.loop_start as f64) / span as f64).clamp(0.0, 1.0) as f32
    }

    /// 0-1 progress toward the recording target, 0 when unlimited
    pub fn recording_progress(&self) -> f32 {
        if self.state == TrackState::Recording && self.target_length > 0 {
            (self.recorded as f32 / self.target_length as f32).min(1.0)
        } else {
            0.0
        }
    }

    /// Frames that currently make up the content, including mid-recording
    fn content_len(&self) -> usize {
        match self.state {
            TrackState::Recording if self.aligned => self.target_length,
            TrackState::Recording => self.recorded.min(self.buffer.capacity()),
            _ => self.loop_length,
        }
    }

    /// Fill `points` with the peak of each equal-width bucket of content
    pub fn waveform(&self, points: &mut [f32]) {
        let len = self.content_len();
        let n = points.len();
        if n == 0 {
            return;
        }
        if len == 0 {
            points.iter_mut().for_each(|p| *p = 0.0);
            return;
        }
        let (left, right) = self.buffer.slices(len);
        for (b, point) in points.iter_mut().enumerate() {
            let from = b * len / n;
            let to = ((b + 1) * len / n).max(from + 1).min(len);
            *point = if from < len {
                peak_of(&left[from..to]).max(peak_of(&right[from..to]))
            } else {
                0.0
            };
        }
    }

    /// Output peak of the last processed block
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Clipped output samples since the last clear
    pub fn clipped_samples(&self) -> u64 {
        self.clipped
    }

    pub(crate) fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot {
            state: self.state,
            length: self.loop_length,
            position: self.play_head.max(0.0) as usize,
            has_content: self.has_content,
            undone: self.undone,
            layer_type: self.layer_type,
            peak: self.peak,
            clipped: self.clipped,
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Begin writing input
    ///
    /// `target_length` of 0 records until capacity. A non-zero
    /// `aligned_start` locks the write position to an existing loop of
    /// `target_length` frames, starting at that index.
    pub fn start_recording(&mut self, target_length: usize, aligned_start: Option<usize>) {
        self.clear_audio();
        let capacity = self.buffer.capacity();
        self.target_length = target_length.min(capacity);
        self.aligned = aligned_start.is_some() && self.target_length > 0;
        self.record_start = match aligned_start {
            Some(start) if self.aligned => start % self.target_length,
            _ => 0,
        };
        self.write_head = self.record_start;
        self.recorded = 0;
        self.loop_length = 0;
        self.loop_start = 0;
        self.loop_end = 0;
        self.play_head = 0.0;
        self.has_content = false;
        self.layer_type = LayerType::Regular;
        self.set_undone(false);
        self.state = TrackState::Recording;
    }

    /// Close the recording and start looping it
    ///
    /// Returns the fixed loop length, or `None` if nothing was recorded (the
    /// track is then cleared).
    pub fn stop_recording(&mut self, to_overdub: bool) -> Option<usize> {
        if self.state != TrackState::Recording {
            return None;
        }
        if self.recorded == 0 {
            self.clear();
            return None;
        }

        let length = if self.aligned {
            self.target_length
        } else {
            self.recorded.min(self.buffer.capacity())
        };
        let seam = if self.aligned { self.record_start } else { 0 };
        self.apply_seam_crossfade(seam, length);

        self.loop_length = length;
        self.has_content = true;
        self.update_region();
        self.play_head = if self.aligned {
            self.write_head as f64
        } else {
            self.loop_start as f64
        };
        self.wrap_play_head();
        self.target_length = 0;
        self.aligned = false;
        self.state = if to_overdub {
            TrackState::Overdubbing
        } else {
            TrackState::Playing
        };
        Some(length)
    }

    /// Start adding input on top of existing content
    pub fn start_overdub(&mut self) {
        if matches!(self.state, TrackState::Playing | TrackState::Idle) && self.loop_length > 0 {
            self.state = TrackState::Overdubbing;
        }
    }

    pub fn stop_overdub(&mut self) {
        if self.state == TrackState::Overdubbing {
            self.state = TrackState::Playing;
        }
    }

    /// Turn an empty track into a silent loop of `length` and overdub it
    pub fn start_overdub_empty(&mut self, length: usize, position: f64) {
        self.clear_audio();
        self.loop_length = length.min(self.buffer.capacity());
        self.dirty_len = self.loop_length;
        self.has_content = self.loop_length > 0;
        self.layer_type = LayerType::Regular;
        self.recorded = 0;
        self.target_length = 0;
        self.set_undone(false);
        self.update_region();
        self.play_head = position;
        self.wrap_play_head();
        self.state = if self.loop_length > 0 {
            TrackState::Overdubbing
        } else {
            TrackState::Idle
        };
    }

    /// Start looping existing content from `position`
    pub fn play_from(&mut self, position: f64) {
        if !self.has_content || self.loop_length == 0 || self.state.is_writing() {
            return;
        }
        self.play_head = position;
        self.wrap_play_head();
        self.state = TrackState::Playing;
    }

    /// Finalize any recording and return to Idle at the region start
    pub fn stop(&mut self) {
        if self.state == TrackState::Recording {
            self.stop_recording(false);
        }
        self.state = TrackState::Idle;
        self.play_head = if self.reverse && self.loop_end > self.loop_start {
            (self.loop_end - 1) as f64
        } else {
            self.loop_start as f64
        };
    }

    /// Drop all content; controls are kept
    pub fn clear(&mut self) {
        self.clear_audio();
        self.state = TrackState::Idle;
        self.layer_type = LayerType::Regular;
        self.has_content = false;
        self.write_head = 0;
        self.recorded = 0;
        self.target_length = 0;
        self.aligned = false;
        self.play_head = 0.0;
        self.loop_length = 0;
        self.loop_start = 0;
        self.loop_end = 0;
        self.set_undone(false);
        self.fade_level.set_immediate(1.0);
        self.eq.reset();
        self.pitch.reset();
        self.peak = 0.0;
        self.clipped = 0;
    }

    /// Replace the content with `length` frames of `source`
    pub fn load_content(
        &mut self,
        source: &StereoBuffer,
        length: usize,
        layer_type: LayerType,
        position: f64,
        state: TrackState,
    ) {
        self.clear_audio();
        let length = length.min(self.buffer.capacity()).min(source.capacity());
        self.buffer.copy_prefix_from(source, length);
        self.dirty_len = length;
        self.loop_length = length;
        self.has_content = length > 0;
        self.layer_type = layer_type;
        self.recorded = 0;
        self.target_length = 0;
        self.aligned = false;
        self.set_undone(false);
        self.update_region();
        self.play_head = position;
        self.wrap_play_head();
        self.state = if self.has_content {
            state
        } else {
            TrackState::Idle
        };
    }

    /// Silence written frames; new content always starts at full level
    fn clear_audio(&mut self) {
        self.buffer.clear_prefix(self.dirty_len);
        self.dirty_len = 0;
        self.fade_level.set_immediate(1.0);
    }

    /// Match the samples either side of `seam` so the wrap is continuous
    ///
    /// Half the step is ramped into each side over the crossfade length.
    fn apply_seam_crossfade(&mut self, seam: usize, length: usize) {
        let xf = self.seam_crossfade.min(length / 2);
        if xf == 0 {
            return;
        }
        let (left, right) = self.buffer.channels_mut();
        for channel in [left, right] {
            let head = seam % length;
            let tail = wrap_index(seam as isize - 1, 0, length);
            let half_step = 0.5 * (channel[head] - channel[tail]);
            for j in 0..xf {
                let weight = half_step * (1.0 - j as f32 / xf as f32);
                let t = wrap_index(tail as isize - j as isize, 0, length);
                let h = wrap_index(head as isize + j as isize, 0, length);
                channel[t] += weight;
                channel[h] -= weight;
            }
        }
    }

    // ========================================================================
    // Controls
    // ========================================================================

    /// Apply every per-layer control at once
    pub fn apply_settings(&mut self, settings: &LayerSettings) {
        let s = settings.clamped();
        self.set_mute(s.mute);
        self.set_solo(s.solo);
        self.set_volume(s.volume);
        self.set_pan(s.pan);
        self.set_eq(s.eq_low_db, s.eq_mid_db, s.eq_high_db);
        self.set_pitch(s.pitch_semitones, s.pitch_high_quality);
        self.set_loop_region(s.loop_start, s.loop_end);
        self.set_reverse(s.reverse);
        self.set_fade(s.fade);
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
        self.refresh_mute_gain();
    }

    /// Solo flag; the resulting gain is decided by the orchestrator
    pub fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    pub fn set_undone(&mut self, undone: bool) {
        self.undone = undone;
        self.refresh_mute_gain();
    }

    fn refresh_mute_gain(&mut self) {
        self.mute_gain
            .set_target(if self.is_audible() { 1.0 } else { 0.0 });
    }

    /// Gain (0 or 1) derived from solo and override state
    pub fn set_solo_gain(&mut self, gain: f32) {
        self.solo_gain.set_target(gain.clamp(0.0, 1.0));
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 2.0) } else { 1.0 };
        self.volume.set_target(volume);
    }

    pub fn set_pan(&mut self, pan: f32) {
        let pan = if pan.is_finite() { pan.clamp(-1.0, 1.0) } else { 0.0 };
        self.pan.set_target(pan);
    }

    pub fn set_eq(&mut self, low_db: f32, mid_db: f32, high_db: f32) {
        self.eq.set_gains(low_db, mid_db, high_db);
    }

    pub fn set_pitch(&mut self, semitones: f32, high_quality: bool) {
        self.pitch.set_semitones(semitones);
        self.pitch.set_high_quality(high_quality);
        self.pitch_semitones = if semitones.is_finite() {
            semitones.clamp(-24.0, 24.0)
        } else {
            0.0
        };
        self.pitch_high_quality = high_quality;
    }

    /// Normalized playback region; an empty region means the whole loop
    pub fn set_loop_region(&mut self, start: f32, end: f32) {
        let start = if start.is_finite() { start.clamp(0.0, 1.0) } else { 0.0 };
        let end = if end.is_finite() { end.clamp(0.0, 1.0) } else { 1.0 };
        self.region = (start, end);
        self.update_region();
        self.wrap_play_head();
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    /// Per-pass amplitude factor (1 sustains forever)
    pub fn set_fade(&mut self, fade: f32) {
        self.fade = if fade.is_finite() { fade.clamp(0.0, 1.0) } else { 1.0 };
    }

    /// Playback rate target (0.25-4)
    pub fn set_rate(&mut self, rate: f32) {
        let rate = if rate.is_finite() { rate.clamp(0.25, 4.0) } else { 1.0 };
        self.rate.set_target(rate);
    }

    /// Copy another ramp's position so a new layer moves in step
    pub fn inherit_rate(&mut self, current: f32, target: f32) {
        self.rate.set_immediate(current);
        self.set_rate(target);
    }

    fn update_region(&mut self) {
        let len = self.loop_length;
        if len == 0 {
            self.loop_start = 0;
            self.loop_end = 0;
            return;
        }
        let (s, e) = self.region;
        let start = ((s as f64 * len as f64).round() as usize).min(len - 1);
        let end = ((e as f64 * len as f64).round() as usize).min(len);
        if end > start {
            self.loop_start = start;
            self.loop_end = end;
        } else {
            self.loop_start = 0;
            self.loop_end = len;
        }
    }

    fn wrap_play_head(&mut self) {
        let span = self.loop_end.saturating_sub(self.loop_start);
        if span == 0 {
            self.play_head = 0.0;
            return;
        }
        let start = self.loop_start as f64;
        if !self.play_head.is_finite() {
            self.play_head = start;
        }
        if self.play_head < start || self.play_head >= self.loop_end as f64 {
            self.play_head = start + (self.play_head - start).rem_euclid(span as f64);
        }
    }

    // ========================================================================
    // Processing
    // ========================================================================

    /// Interpolated read at a fractional position inside the region
    #[inline]
    fn read_frame(&self, position: f64) -> (f32, f32) {
        let start = self.loop_start;
        let span = self.loop_end - self.loop_start;
        let base = position.floor();
        let frac = (position - base) as f32;
        let i = base as isize;
        let i0 = wrap_index(i, start, span);
        if frac == 0.0 {
            return self.buffer.frame(i0);
        }
        let (m_l, m_r) = self.buffer.frame(wrap_index(i - 1, start, span));
        let (a_l, a_r) = self.buffer.frame(i0);
        let (b_l, b_r) = self.buffer.frame(wrap_index(i + 1, start, span));
        let (c_l, c_r) = self.buffer.frame(wrap_index(i + 2, start, span));
        (
            hermite(m_l, a_l, b_l, c_l, frac),
            hermite(m_r, a_r, b_r, c_r, frac),
        )
    }

    /// Move the playhead one sample; true if it wrapped
    #[inline]
    fn advance(&mut self, rate: f64) -> bool {
        let start = self.loop_start as f64;
        let end = self.loop_end as f64;
        self.play_head += if self.reverse { -rate } else { rate };
        if self.play_head >= end || self.play_head < start {
            self.play_head = start + (self.play_head - start).rem_euclid(end - start);
            true
        } else {
            false
        }
    }

    /// Write one input frame while recording; true when the recording is full
    #[inline]
    fn record_frame(&mut self, left: f32, right: f32) -> bool {
        let capacity = self.buffer.capacity();
        if capacity == 0 {
            return true;
        }
        self.buffer
            .set_frame(self.write_head, sanitize(left), sanitize(right));
        self.dirty_len = self.dirty_len.max(self.write_head + 1);
        self.recorded += 1;
        self.write_head += 1;
        if self.target_length > 0 && self.write_head >= self.target_length {
            self.write_head = 0;
        }
        if self.target_length > 0 {
            self.recorded >= self.target_length
        } else {
            self.recorded >= capacity
        }
    }

    /// Process one block
    ///
    /// `input` is what gets written while recording or overdubbing. The
    /// loop-only output overwrites `output`; `gain` receives the per-sample
    /// mute x solo gain used by Layer-mode compositing.
    pub fn process(
        &mut self,
        input: (&[f32], &[f32]),
        output: (&mut [f32], &mut [f32]),
        gain: &mut [f32],
    ) -> Option<TrackTransition> {
        let (in_l, in_r) = input;
        let (out_l, out_r) = output;
        let len = out_l
            .len()
            .min(out_r.len())
            .min(in_l.len())
            .min(in_r.len())
            .min(gain.len())
            .min(self.fade_env.len());
        let mut transition = None;

        for i in 0..len {
            let rate = self.rate.next_value() as f64;
            self.fade_env[i] = self.fade_level.next_value();

            let (l, r) = match self.state {
                TrackState::Idle => (0.0, 0.0),
                TrackState::Recording => {
                    if self.record_frame(in_l[i], in_r[i]) {
                        if let Some(length) = self.stop_recording(false) {
                            transition = Some(TrackTransition::RecordingComplete { length });
                        }
                    }
                    (0.0, 0.0)
                }
                TrackState::Playing | TrackState::Overdubbing => {
                    if self.loop_end <= self.loop_start {
                        (0.0, 0.0)
                    } else {
                        let frame = self.read_frame(self.play_head);
                        if self.state == TrackState::Overdubbing {
                            let index = wrap_index(
                                self.play_head.floor() as isize,
                                self.loop_start,
                                self.loop_end - self.loop_start,
                            );
                            let (old_l, old_r) = self.buffer.frame(index);
                            self.buffer.set_frame(
                                index,
                                soft_clip(old_l + sanitize(in_l[i])),
                                soft_clip(old_r + sanitize(in_r[i])),
                            );
                        }
                        if self.advance(rate) && self.fade < 1.0 {
                            let decayed = self.fade_level.target() * self.fade;
                            self.fade_level.set_target(decayed);
                        }
                        frame
                    }
                }
            };
            out_l[i] = l;
            out_r[i] = r;
        }

        let out_l = &mut out_l[..len];
        let out_r = &mut out_r[..len];
        self.eq.process(out_l, out_r);
        self.pitch.process(out_l, out_r);

        for i in 0..len {
            let (pan_l, pan_r) = pan_gains(self.pan.next_value());
            let level = self.volume.next_value() * self.fade_env[i];
            let g = self.mute_gain.next_value() * self.solo_gain.next_value();
            out_l[i] = sanitize(out_l[i] * level * pan_l * g);
            out_r[i] = sanitize(out_r[i] * level * pan_r * g);
            gain[i] = g;
        }

        self.peak = peak_of(out_l).max(peak_of(out_r));
        self.clipped += (count_clipped(out_l) + count_clipped(out_r)) as u64;
        transition
    }

    /// Raw content at one master-loop index, ignoring region and direction
    pub(crate) fn content_frame(&self, master_index: usize) -> (f32, f32) {
        if self.loop_length == 0 {
            return (0.0, 0.0);
        }
        self.buffer.frame(master_index % self.loop_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 48000;
    const BLOCK: usize = 64;

    fn track(capacity: usize) -> LoopTrack {
        let mut t = LoopTrack::new(capacity);
        t.prepare(SR, BLOCK, 0.0, 4);
        t
    }

    /// Feed `input` through the track block by block, returning the output
    fn run(t: &mut LoopTrack, input: &[f32]) -> (Vec<f32>, Vec<Option<TrackTransition>>) {
        let mut out = Vec::with_capacity(input.len());
        let mut transitions = Vec::new();
        for chunk in input.chunks(BLOCK) {
            let mut l = vec![0.0; chunk.len()];
            let mut r = vec![0.0; chunk.len()];
            let mut g = vec![0.0; chunk.len()];
            transitions.push(t.process((chunk, chunk), (&mut l, &mut r), &mut g));
            out.extend_from_slice(&l);
        }
        (out, transitions)
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 / n as f32 * 0.5).collect()
    }

    #[test]
    fn test_record_then_stop_fixes_length() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.25; 300]);
        assert_eq!(t.stop_recording(false), Some(300));
        assert_eq!(t.state(), TrackState::Playing);
        assert_eq!(t.loop_length(), 300);
        assert!(t.has_content());
    }

    #[test]
    fn test_recording_auto_stops_at_target() {
        let mut t = track(1000);
        t.start_recording(200, None);
        let (_, transitions) = run(&mut t, &vec![0.1; 256]);
        assert!(transitions.contains(&Some(TrackTransition::RecordingComplete { length: 200 })));
        assert_eq!(t.state(), TrackState::Playing);
        assert_eq!(t.loop_length(), 200);
    }

    #[test]
    fn test_recording_stops_at_capacity() {
        let mut t = track(100);
        t.start_recording(0, None);
        run(&mut t, &vec![0.1; 128]);
        assert_eq!(t.state(), TrackState::Playing);
        assert_eq!(t.loop_length(), 100);
    }

    #[test]
    fn test_empty_recording_is_discarded() {
        let mut t = track(100);
        t.start_recording(0, None);
        assert_eq!(t.stop_recording(false), None);
        assert_eq!(t.state(), TrackState::Idle);
        assert!(!t.has_content());
    }

    #[test]
    fn test_playback_loops_content() {
        let mut t = track(1000);
        t.start_recording(0, None);
        let input: Vec<f32> = vec![0.3; 128];
        run(&mut t, &input);
        t.stop_recording(false);
        let (out, _) = run(&mut t, &vec![0.0; 384]);
        for &s in &out {
            assert_relative_eq!(s, 0.3, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_seam_crossfade_closes_the_gap() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &ramp(128));
        t.stop_recording(false);
        let (left, _) = t.buffer().slices(128);
        assert_relative_eq!(left[0], left[127], epsilon = 1e-6);
    }

    #[test]
    fn test_overdub_adds_input() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.2; 128]);
        t.stop_recording(true);
        assert_eq!(t.state(), TrackState::Overdubbing);
        run(&mut t, &vec![0.1; 128]);
        t.stop_overdub();
        assert_eq!(t.state(), TrackState::Playing);
        assert_relative_eq!(t.buffer().left()[10], 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_overdub_is_soft_clipped() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.8; 64]);
        t.stop_recording(true);
        for _ in 0..4 {
            run(&mut t, &vec![0.8; 64]);
        }
        assert!(t.buffer().peak(64) < 1.0);
    }

    #[test]
    fn test_reverse_reads_backwards() {
        let mut t = track(1000);
        t.prepare(SR, BLOCK, 0.0, 0);
        t.start_recording(0, None);
        let input: Vec<f32> = (0..64).map(|i| i as f32 / 100.0).collect();
        run(&mut t, &input);
        t.stop_recording(false);
        t.set_reverse(true);
        t.stop();
        t.play_from(63.0);
        let (out, _) = run(&mut t, &vec![0.0; 4]);
        assert_relative_eq!(out[0], 0.63, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.62, epsilon = 1e-6);
    }

    #[test]
    fn test_half_speed_interpolates() {
        let mut t = track(1000);
        t.prepare(SR, BLOCK, 0.0, 0);
        t.start_recording(0, None);
        let input: Vec<f32> = (0..64).map(|i| i as f32 / 100.0).collect();
        run(&mut t, &input);
        t.stop_recording(false);
        t.set_rate(0.5);
        t.stop();
        t.play_from(10.0);
        let (out, _) = run(&mut t, &vec![0.0; 3]);
        assert_relative_eq!(out[0], 0.10, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.105, epsilon = 1e-4);
    }

    #[test]
    fn test_fade_decays_each_pass() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.5; 64]);
        t.stop_recording(false);
        t.set_fade(0.5);
        run(&mut t, &vec![0.0; 64]);
        let (out, _) = run(&mut t, &vec![0.0; 64]);
        assert_relative_eq!(out[32], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_fade_silences_after_one_pass() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.5; 64]);
        t.stop_recording(false);
        t.set_fade(0.0);
        run(&mut t, &vec![0.0; 64]);
        let (out, _) = run(&mut t, &vec![0.0; 64]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mute_is_ramped() {
        let mut t = LoopTrack::new(2000);
        t.prepare(SR, BLOCK, 1.0, 0);
        t.start_recording(0, None);
        run(&mut t, &vec![0.5; 1024]);
        t.stop_recording(false);
        t.set_mute(true);
        let (out, _) = run(&mut t, &vec![0.0; 128]);
        assert!(out[0] > 0.0 && out[0] < 0.5);
        assert!(out[10] < out[0]);
        assert_eq!(out[127], 0.0);
    }

    #[test]
    fn test_invalid_transitions_are_noops() {
        let mut t = track(100);
        t.stop_overdub();
        t.start_overdub();
        assert_eq!(t.stop_recording(false), None);
        t.play_from(0.0);
        assert_eq!(t.state(), TrackState::Idle);
    }

    #[test]
    fn test_loop_region_invariant() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.1; 200]);
        t.stop_recording(false);
        t.set_loop_region(0.25, 0.75);
        assert_eq!(t.loop_region(), (50, 150));
        t.set_loop_region(0.9, 0.1);
        assert_eq!(t.loop_region(), (0, 200));
        t.set_loop_region(f32::NAN, 2.0);
        let (start, end) = t.loop_region();
        assert!(start < end && end <= t.loop_length());
    }

    #[test]
    fn test_aligned_recording_keeps_phase() {
        let mut t = track(1000);
        t.start_recording(100, Some(40));
        let input: Vec<f32> = (0..100).map(|i| i as f32 / 1000.0).collect();
        run(&mut t, &input);
        assert_eq!(t.state(), TrackState::Playing);
        assert_eq!(t.loop_length(), 100);
        assert_relative_eq!(t.buffer().left()[50], 0.010, epsilon = 1e-6);
        assert_eq!(t.play_head(), 40.0);
    }

    #[test]
    fn test_waveform_mid_recording() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &[vec![0.2; 50], vec![0.6; 50]].concat());
        let mut points = [0.0; 4];
        t.waveform(&mut points);
        assert_relative_eq!(points[0], 0.2);
        assert_relative_eq!(points[3], 0.6);
    }

    #[test]
    fn test_pan_law_centre_is_unity() {
        assert_eq!(pan_gains(0.0), (1.0, 1.0));
        assert_eq!(pan_gains(1.0), (0.0, 1.0));
        assert_eq!(pan_gains(-0.5), (1.0, 0.5));
    }

    #[test]
    fn test_clear_resets_content() {
        let mut t = track(1000);
        t.start_recording(0, None);
        run(&mut t, &vec![0.5; 100]);
        t.stop_recording(false);
        t.clear();
        assert!(!t.has_content());
        assert_eq!(t.loop_length(), 0);
        assert_eq!(t.buffer().peak(1000), 0.0);
    }
}
