//! Build parameters for grids, webs and the index.

use serde::{Deserialize, Serialize};

/// Knobs controlling index and match-web construction. Defaults are tuned
/// for 30 Hz comparison of human locomotion clips.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildParams {
    /// Frames per second at which both segments are sampled.
    pub sample_rate: f32,
    /// Temporal window, in seconds, compared around each frame pair.
    pub window_length: f32,
    /// Comparison-rate reduction factor. Accepted for API compatibility but
    /// currently unused: the comparison always runs at `sample_rate` and no
    /// upsampling pass exists.
    pub resample_factor: u32,
    /// Normalized local-minima threshold in `[0, 1]`; a cell only qualifies
    /// below `min + min_dist * (max - min)`.
    pub min_dist: f32,
    /// Relative distance increase tolerated while flood-extending a blend
    /// region away from a minimum.
    pub max_dist_diff: f32,
    /// Minimum chain duration, in seconds; shorter chains are discarded.
    pub min_chain_length: f32,
    /// Manhattan budget for bridges between chains, in seconds.
    pub max_bridge_length: f32,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            window_length: 0.35,
            resample_factor: 1,
            min_dist: 0.05,
            max_dist_diff: 0.25,
            min_chain_length: 0.25,
            max_bridge_length: 0.5,
        }
    }
}
