use std::collections::VecDeque;

use va_domain::config::VadConfig;

use crate::segment::{Frame, VoiceSegment};

/// The four-state VAD machine, with hysteresis on both onset and offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    VoiceOnset,
    VoiceActive,
    VoiceEnded,
}

/// Converts a frame stream into voice segments. Infallible against bad
/// input: malformed frames are counted and skipped rather than erroring.
pub struct AudioProcessor {
    config: VadConfig,
    state: VadState,
    frame_duration_ms: Option<u32>,

    /// Consecutive frames agreeing with the current onset/offset attempt.
    consecutive_positive: u32,
    consecutive_negative: u32,

    /// Pre-onset lookback buffer, capped at `buffer_size_frames`; frames
    /// collected here are folded into the segment once onset confirms, so
    /// the segment is not missing the frames that triggered detection.
    pending: VecDeque<Frame>,

    /// Frames belonging to the segment currently being accumulated.
    active_frames: Vec<Frame>,

    /// Sliding window of recent voice/silence votes, for multi-frame
    /// smoothing.
    smoothing_window: VecDeque<bool>,

    noise_floor: f32,

    pub malformed_frame_count: u64,
    pub buffer_drops: u64,
}

impl AudioProcessor {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            state: VadState::Silence,
            frame_duration_ms: None,
            consecutive_positive: 0,
            consecutive_negative: 0,
            pending: VecDeque::new(),
            active_frames: Vec::new(),
            smoothing_window: VecDeque::new(),
            noise_floor: 0.0,
            malformed_frame_count: 0,
            buffer_drops: 0,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }

    fn frame_duration(&mut self, frame: &Frame) -> u32 {
        *self.frame_duration_ms.get_or_insert(frame.duration_ms.max(1))
    }

    /// Effective detection threshold: the configured base, or the
    /// noise-adapted floor when `adaptive_threshold` is set.
    fn effective_threshold(&self) -> f32 {
        if self.config.adaptive_threshold {
            self.config
                .energy_threshold
                .max(self.noise_floor * self.config.sensitivity)
        } else {
            self.config.energy_threshold
        }
    }

    fn is_voice_frame(&self, frame: &Frame) -> bool {
        let energy_hit = frame.energy() >= self.effective_threshold();
        if !self.config.use_zero_crossing_rate {
            return energy_hit;
        }
        let zcr = frame.zero_crossing_rate();
        energy_hit && zcr >= self.config.zcr_min && zcr <= self.config.zcr_max
    }

    /// Apply multi-frame smoothing (>=60% agreement over a sliding window)
    /// if configured; otherwise pass the raw per-frame vote through.
    fn smoothed_vote(&mut self, raw_vote: bool) -> bool {
        if !self.config.multi_frame_smoothing {
            return raw_vote;
        }
        self.smoothing_window.push_back(raw_vote);
        while self.smoothing_window.len() > self.config.smoothing_window_frames {
            self.smoothing_window.pop_front();
        }
        let positive = self.smoothing_window.iter().filter(|v| **v).count();
        (positive as f32 / self.smoothing_window.len() as f32) >= 0.6
    }

    fn update_noise_floor(&mut self, frame: &Frame) {
        const ALPHA: f32 = 0.05;
        self.noise_floor = self.noise_floor * (1.0 - ALPHA) + frame.energy() * ALPHA;
    }

    fn push_pending(&mut self, frame: Frame) {
        self.pending.push_back(frame);
        while self.pending.len() > self.config.buffer_size_frames {
            self.pending.pop_front();
            self.buffer_drops += 1;
        }
    }

    /// Feed one frame. Returns a completed segment on voice-offset (or the
    /// forced cap), otherwise `None`.
    pub fn process_frame(&mut self, frame: Frame) -> Option<VoiceSegment> {
        if frame.is_malformed() {
            self.malformed_frame_count += 1;
            return None;
        }

        let frame_duration = self.frame_duration(&frame);
        let voice_required = self.config.voice_frames_required(frame_duration);
        let silence_required = self.config.silence_frames_required(frame_duration);

        let raw_vote = self.is_voice_frame(&frame);
        let vote = self.smoothed_vote(raw_vote);

        match self.state {
            VadState::Silence => {
                self.update_noise_floor(&frame);
                if vote {
                    self.consecutive_positive += 1;
                    self.push_pending(frame);
                    if self.consecutive_positive >= voice_required {
                        self.state = VadState::VoiceOnset;
                        self.consecutive_negative = 0;
                        self.active_frames = self.pending.drain(..).collect();
                        if self.segment_duration_ms() >= self.config.max_segment_duration_s * 1000 {
                            return self.force_offset(false);
                        }
                    }
                } else {
                    self.consecutive_positive = 0;
                    self.push_pending(frame);
                }
                None
            }
            VadState::VoiceOnset | VadState::VoiceActive => {
                self.state = VadState::VoiceActive;
                self.active_frames.push(frame);

                if self.segment_duration_ms() >= self.config.max_segment_duration_s * 1000 {
                    return self.force_offset(true);
                }

                if vote {
                    self.consecutive_negative = 0;
                } else {
                    self.consecutive_negative += 1;
                    if self.consecutive_negative >= silence_required {
                        return self.finish_segment(false);
                    }
                }
                None
            }
            VadState::VoiceEnded => {
                // Transient state; process_frame always resolves it before
                // returning, so reaching it here means start fresh.
                self.state = VadState::Silence;
                self.process_frame(frame)
            }
        }
    }

    fn segment_duration_ms(&self) -> u32 {
        self.active_frames.iter().map(|f| f.duration_ms).sum()
    }

    fn force_offset(&mut self, truncated: bool) -> Option<VoiceSegment> {
        self.finish_segment(truncated)
    }

    fn finish_segment(&mut self, truncated: bool) -> Option<VoiceSegment> {
        let frames = std::mem::take(&mut self.active_frames);
        self.state = VadState::Silence;
        self.consecutive_positive = 0;
        self.consecutive_negative = 0;
        self.pending.clear();
        if frames.is_empty() {
            return None;
        }
        Some(VoiceSegment { frames, truncated })
    }

    /// Flush any in-progress segment at end of stream (no natural offset
    /// was observed). Per the "lazy finite sequence" contract, callers
    /// must drain via this after exhausting `process_stream`.
    pub fn finish(&mut self) -> Option<VoiceSegment> {
        if self.active_frames.is_empty() {
            return None;
        }
        self.finish_segment(false)
    }

    /// Lazily transform a frame iterator into a segment iterator. The
    /// returned iterator is not restartable; drain it fully.
    pub fn process_stream<I>(mut self, frames: I) -> impl Iterator<Item = VoiceSegment>
    where
        I: IntoIterator<Item = Frame>,
    {
        let mut iter = frames.into_iter();
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            loop {
                match iter.next() {
                    Some(frame) => {
                        if let Some(seg) = self.process_frame(frame) {
                            return Some(seg);
                        }
                    }
                    None => {
                        done = true;
                        return self.finish();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice_frame() -> Frame {
        // Alternating samples give both high energy and a non-trivial ZCR.
        Frame::new(vec![20000, -20000, 20000, -20000], 20)
    }

    fn silence_frame() -> Frame {
        Frame::new(vec![0, 0, 0, 0], 20)
    }

    fn config() -> VadConfig {
        VadConfig {
            use_zero_crossing_rate: false,
            // 5 frames (20ms each) to confirm onset, 8 to confirm offset.
            voice_duration_ms: 100,
            silence_duration_ms: 160,
            ..VadConfig::default()
        }
    }

    #[test]
    fn all_silent_frames_yield_no_segments() {
        let processor = AudioProcessor::new(config());
        let frames: Vec<Frame> = (0..20).map(|_| silence_frame()).collect();
        let segments: Vec<_> = processor.process_stream(frames).collect();
        assert!(segments.is_empty());
    }

    #[test]
    fn sustained_voice_yields_one_segment_on_stream_end() {
        let processor = AudioProcessor::new(config());
        let frames: Vec<Frame> = (0..10).map(|_| voice_frame()).collect();
        let segments: Vec<_> = processor.process_stream(frames).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].frame_count(), 10);
        assert!(!segments[0].truncated);
    }

    #[test]
    fn voice_then_silence_emits_segment_at_offset() {
        let mut processor = AudioProcessor::new(config());
        let mut segments = Vec::new();
        for _ in 0..5 {
            if let Some(seg) = processor.process_frame(voice_frame()) {
                segments.push(seg);
            }
        }
        for _ in 0..8 {
            if let Some(seg) = processor.process_frame(silence_frame()) {
                segments.push(seg);
            }
        }
        assert_eq!(segments.len(), 1);
        assert_eq!(processor.state(), VadState::Silence);
    }

    #[test]
    fn malformed_frames_are_counted_and_skipped() {
        let mut processor = AudioProcessor::new(config());
        let malformed = Frame::new(vec![], 20);
        assert!(processor.process_frame(malformed).is_none());
        assert_eq!(processor.malformed_frame_count, 1);
    }

    #[test]
    fn segment_cap_forces_truncated_offset() {
        let mut cfg = config();
        cfg.max_segment_duration_s = 1; // 1000ms cap
        let mut processor = AudioProcessor::new(cfg);
        let mut segments = Vec::new();
        // 20ms frames; 60 frames = 1200ms of continuous voice.
        for _ in 0..60 {
            if let Some(seg) = processor.process_frame(voice_frame()) {
                segments.push(seg);
            }
        }
        assert_eq!(segments.len(), 1);
        assert!(segments[0].truncated);
    }

    #[test]
    fn buffer_cap_drops_oldest_pending_frames() {
        let mut cfg = config();
        cfg.buffer_size_frames = 3;
        let mut processor = AudioProcessor::new(cfg);
        for _ in 0..10 {
            processor.process_frame(silence_frame());
        }
        assert!(processor.buffer_drops > 0);
    }
}
