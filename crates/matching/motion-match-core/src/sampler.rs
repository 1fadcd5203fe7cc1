//! The single capability this core requires from its environment.

use crate::segment::ClipId;
use crate::skeleton::{BoneMask, Skeleton};

/// Samples bone world positions out of a clip. Implementations must be
/// deterministic and stateless with respect to repeated calls at the same
/// time; the grid builder relies on identical inputs producing identical
/// poses.
pub trait PoseSampler {
    /// Total length of `clip`, in seconds. Unknown clips report 0.
    fn clip_duration(&self, clip: ClipId) -> f32;

    /// Write the world position of every bone of `skeleton` at `time` into
    /// `out`, one `[x, y, z]` per bone. `out` is cleared and resized by the
    /// implementation; bones disabled in `mask` may be left at the origin.
    fn sample_pose(
        &self,
        skeleton: &Skeleton,
        clip: ClipId,
        time: f32,
        mask: &BoneMask,
        out: &mut Vec<[f32; 3]>,
    );
}
