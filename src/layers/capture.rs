//! ADD+ additive override capture
//!
//! While active, the fully effected output is written into a loop-length
//! buffer at the master playhead. At every wrap, once a whole loop has been
//! written, the buffer is committed into an Override layer. Committing into
//! the same Override layer pass after pass is what lets effects compound.
//!
//! Coverage is counted in loop positions, not output frames. Above 1x the
//! playhead skips indices; those are filled by interpolating between the
//! frames on either side, so every commit covers the whole loop.

use super::orchestrator::LayerOrchestrator;
use crate::engine::{EngineEvent, LayerIndex, LayerType, StereoBuffer, TrackState};

/// Widest index jump treated as skipped positions rather than a seek
const MAX_SPAN: usize = 8;

/// Capture buffer and commit bookkeeping
#[derive(Debug, Clone, Default)]
pub(crate) struct AdditiveCapture {
    buffer: StereoBuffer,
    active: bool,
    /// Distinct loop positions written since the capture started or last committed
    written: usize,
    /// Index and values of the last frame written
    last: Option<(usize, f32, f32)>,
    /// Override layer receiving the commits
    target: Option<usize>,
    /// Next commit goes into a fresh Override layer
    create_new: bool,
    commits: usize,
}

impl AdditiveCapture {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buffer: StereoBuffer::new(capacity),
            ..Self::default()
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn target(&self) -> Option<usize> {
        self.target
    }

    pub(crate) fn wants_new_layer(&self) -> bool {
        self.create_new
    }

    pub(crate) fn commits(&self) -> usize {
        self.commits
    }

    pub(crate) fn buffer(&self) -> &StereoBuffer {
        &self.buffer
    }

    pub(crate) fn start(&mut self) {
        self.active = true;
        self.written = 0;
        self.last = None;
        self.target = None;
        self.create_new = false;
        self.commits = 0;
    }

    /// Stop capturing; a partial pass is discarded
    pub(crate) fn stop(&mut self) -> bool {
        let was_active = self.active;
        self.active = false;
        self.written = 0;
        self.last = None;
        self.create_new = false;
        was_active
    }

    /// Schedule the next commit into a new Override layer
    pub(crate) fn request_new_layer(&mut self) {
        self.create_new = true;
    }

    /// Record one output frame at master index `index`
    #[inline]
    pub(crate) fn write(&mut self, index: usize, left: f32, right: f32) {
        self.buffer.set_frame(index, left, right);
        if self.last.map(|(last, _, _)| last) != Some(index) {
            self.written += 1;
        }
        self.last = Some((index, left, right));
    }

    /// Values of the last frame written, silence before the first
    pub(crate) fn last_values(&self) -> (f32, f32) {
        self.last.map_or((0.0, 0.0), |(_, l, r)| (l, r))
    }

    /// Positions from the last written index to `index` in the play direction
    ///
    /// 0 when `index` was the last one written, before the first write, or
    /// when the jump is wide enough to be a seek.
    pub(crate) fn span_to(&self, index: usize, start: usize, end: usize, reverse: bool) -> usize {
        let Some((last, _, _)) = self.last else {
            return 0;
        };
        let region = start..end;
        if !region.contains(&last) || !region.contains(&index) {
            return 0;
        }
        let len = end - start;
        let span = if reverse {
            (last + len - index) % len
        } else {
            (index + len - last) % len
        };
        if span > MAX_SPAN {
            0
        } else {
            span
        }
    }

    /// Position after the last written one, and whether stepping there wraps
    pub(crate) fn next_position(&self, start: usize, end: usize, reverse: bool) -> (usize, bool) {
        let last = self.last.map_or(start, |(last, _, _)| last);
        if reverse {
            if last <= start {
                (end - 1, true)
            } else {
                (last - 1, false)
            }
        } else if last + 1 >= end {
            (start, true)
        } else {
            (last + 1, false)
        }
    }

    /// True once `length` distinct loop positions have been written
    #[inline]
    pub(crate) fn pass_complete(&self, length: usize) -> bool {
        length > 0 && self.written >= length
    }

    /// Start the next pass without committing
    pub(crate) fn restart_pass(&mut self) {
        self.written = 0;
    }

    pub(crate) fn committed(&mut self, layer: usize) {
        self.target = Some(layer);
        self.create_new = false;
        self.written = 0;
        self.commits += 1;
    }

    /// Forget the target if its layer was cleared
    pub(crate) fn layer_cleared(&mut self, layer: usize) {
        if self.target == Some(layer) {
            self.target = None;
        }
    }

    /// Follow the target down after a deletion
    pub(crate) fn layer_removed(&mut self, removed: usize) {
        match self.target {
            Some(target) if target == removed => self.target = None,
            Some(target) if target > removed => self.target = Some(target - 1),
            _ => {}
        }
    }
}

impl LayerOrchestrator {
    /// Start capturing, or ask for a new Override layer if already capturing
    pub fn trigger_additive_capture(&mut self) {
        if !self.global.additive_mode || self.master_len == 0 {
            return;
        }
        if self.capture.is_active() {
            self.capture.request_new_layer();
            return;
        }
        self.capture.start();
        self.link.emit(EngineEvent::AdditiveCaptureStarted);
    }

    /// Stop capturing; nothing partial is committed
    pub fn stop_additive_capture(&mut self) {
        if self.capture.stop() {
            self.link.emit(EngineEvent::AdditiveCaptureStopped);
        }
    }

    pub fn is_additive_capture_active(&self) -> bool {
        self.capture.is_active()
    }

    /// Completed ADD+ commits since the capture started
    pub fn additive_commits(&self) -> usize {
        self.capture.commits()
    }

    /// Commit the captured pass into its Override layer
    pub(super) fn commit_override(&mut self) {
        self.commit_undone();

        let existing = self.capture.target().filter(|&t| {
            self.tracks[t].layer_type() == LayerType::Override && self.tracks[t].has_content()
        });
        let slot = match existing {
            Some(target) if !self.capture.wants_new_layer() => Some(target),
            _ => self.first_empty_slot(),
        };
        let Some(slot) = slot else {
            self.capture.restart_pass();
            self.link.emit(EngineEvent::CapacityReached);
            return;
        };
        let new_layer = existing != Some(slot);

        self.tracks[slot].load_content(
            self.capture.buffer(),
            self.master_len,
            LayerType::Override,
            self.master_position,
            TrackState::Playing,
        );
        self.tracks[slot].inherit_rate(self.master_speed.current(), self.global.speed);
        self.current = slot;
        self.highest = self.highest.max(slot);
        self.capture.committed(slot);

        if let Some(layer) = LayerIndex::new(slot) {
            self.link.emit(EngineEvent::OverrideCommitted { layer, new_layer });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_completes_after_full_loop() {
        let mut capture = AdditiveCapture::new(16);
        capture.start();
        for i in 0..15 {
            capture.write(i, 0.1, 0.1);
        }
        assert!(!capture.pass_complete(16));
        capture.write(15, 0.1, 0.1);
        assert!(capture.pass_complete(16));
        assert!(!capture.pass_complete(0));
    }

    #[test]
    fn test_rewriting_an_index_adds_no_coverage() {
        let mut capture = AdditiveCapture::new(4);
        capture.start();
        capture.write(0, 0.1, 0.1);
        capture.write(0, 0.2, 0.2);
        capture.write(1, 0.3, 0.3);
        assert!(capture.pass_complete(2));
        assert!(!capture.pass_complete(3));
        assert_eq!(capture.last_values(), (0.3, 0.3));
    }

    #[test]
    fn test_span_walks_the_region() {
        let mut capture = AdditiveCapture::new(16);
        capture.start();
        assert_eq!(capture.span_to(3, 0, 16, false), 0);
        capture.write(14, 0.0, 0.0);
        assert_eq!(capture.span_to(14, 0, 16, false), 0);
        assert_eq!(capture.span_to(0, 0, 16, false), 2);
        assert_eq!(capture.span_to(12, 0, 16, true), 2);
        assert_eq!(capture.span_to(8, 0, 16, false), 0);
        assert_eq!(capture.next_position(0, 16, false), (15, false));
        assert_eq!(capture.next_position(4, 15, false), (4, true));

        capture.write(4, 0.0, 0.0);
        assert_eq!(capture.next_position(4, 15, true), (14, true));
        assert_eq!(capture.next_position(0, 16, true), (3, false));
    }

    #[test]
    fn test_commit_bookkeeping() {
        let mut capture = AdditiveCapture::new(8);
        capture.start();
        capture.committed(3);
        assert_eq!(capture.target(), Some(3));
        assert_eq!(capture.commits(), 1);
        capture.request_new_layer();
        assert!(capture.wants_new_layer());
        capture.committed(4);
        assert!(!capture.wants_new_layer());
    }

    #[test]
    fn test_stop_discards_partial_pass() {
        let mut capture = AdditiveCapture::new(8);
        capture.start();
        capture.write(0, 0.5, 0.5);
        assert!(capture.stop());
        assert!(!capture.stop());
        assert!(!capture.is_active());
        assert!(!capture.pass_complete(1));
    }

    #[test]
    fn test_target_follows_layer_changes() {
        let mut capture = AdditiveCapture::new(8);
        capture.committed(5);
        capture.layer_removed(2);
        assert_eq!(capture.target(), Some(4));
        capture.layer_cleared(4);
        assert_eq!(capture.target(), None);
    }
}
