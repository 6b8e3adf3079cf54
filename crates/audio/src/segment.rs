/// A single fixed-duration audio frame, typically 10-30ms of PCM samples.
#[derive(Debug, Clone)]
pub struct Frame {
    pub samples: Vec<i16>,
    pub duration_ms: u32,
}

impl Frame {
    pub fn new(samples: Vec<i16>, duration_ms: u32) -> Self {
        Self {
            samples,
            duration_ms,
        }
    }

    /// RMS energy, normalized to `[0, 1]` against the full `i16` range.
    pub fn energy(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self
            .samples
            .iter()
            .map(|&s| (s as f64) * (s as f64))
            .sum();
        let rms = (sum_sq / self.samples.len() as f64).sqrt();
        (rms / i16::MAX as f64).min(1.0) as f32
    }

    /// Zero-crossing rate over the frame, in `[0, 1]`.
    pub fn zero_crossing_rate(&self) -> f32 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let crossings = self
            .samples
            .windows(2)
            .filter(|w| (w[0] >= 0) != (w[1] >= 0))
            .count();
        crossings as f32 / (self.samples.len() - 1) as f32
    }

    /// A frame is malformed if it carries no samples but claims non-zero
    /// duration; the processor counts and skips these rather than failing.
    pub fn is_malformed(&self) -> bool {
        self.samples.is_empty() && self.duration_ms > 0
    }
}

/// A contiguous run of frames classified as speech, bounded by detected
/// onset and offset events.
#[derive(Debug, Clone)]
pub struct VoiceSegment {
    pub frames: Vec<Frame>,
    /// Set when the segment was cut short by `max_segment_duration_s`
    /// rather than a natural silence-triggered offset.
    pub truncated: bool,
}

impl VoiceSegment {
    pub fn duration_ms(&self) -> u32 {
        self.frames.iter().map(|f| f.duration_ms).sum()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
