//! Clip references and time segments.

use serde::{Deserialize, Serialize};

/// Opaque reference to an animation clip owned by the host application.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(pub u32);

/// A sub-range of a clip, in seconds. Immutable once constructed; the
/// constructor clamps the range so `0 <= start <= end <= clip_duration`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationSegment {
    clip: ClipId,
    start: f32,
    end: f32,
}

impl AnimationSegment {
    pub fn new(clip: ClipId, start: f32, end: f32, clip_duration: f32) -> Self {
        let duration = clip_duration.max(0.0);
        let start = start.clamp(0.0, duration);
        let end = end.clamp(start, duration);
        Self { clip, start, end }
    }

    pub fn clip(&self) -> ClipId {
        self.clip
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn end(&self) -> f32 {
        self.end
    }

    pub fn duration(&self) -> f32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.duration() <= 0.0
    }

    pub fn contains_time(&self, time: f32) -> bool {
        time >= self.start && time <= self.end
    }

    /// Fractional temporal overlap in `[0, 1]`, relative to the shorter
    /// segment. Segments on different clips never overlap.
    pub fn overlap(&self, other: &AnimationSegment) -> f32 {
        if self.clip != other.clip {
            return 0.0;
        }
        let inter = self.end.min(other.end) - self.start.max(other.start);
        if inter < 0.0 {
            return 0.0;
        }
        let shorter = self.duration().min(other.duration());
        if shorter <= 0.0 {
            // Zero-length segments overlap fully when they fall inside the
            // other's range (covers overlap(A, A) == 1 for empty A).
            return 1.0;
        }
        (inter / shorter).clamp(0.0, 1.0)
    }

    /// Union of the two segments when they overlap; otherwise a zero-length
    /// segment at `self`'s start.
    pub fn merge(&self, other: &AnimationSegment) -> AnimationSegment {
        if self.overlap(other) > 0.0 {
            AnimationSegment {
                clip: self.clip,
                start: self.start.min(other.start),
                end: self.end.max(other.end),
            }
        } else {
            AnimationSegment {
                clip: self.clip,
                start: self.start,
                end: self.start,
            }
        }
    }
}
