//! Frame-pair distance field between two animation segments.
//!
//! For every sampled frame pair the grid stores how dissimilar the two poses
//! are once optimally aligned on the ground plane, together with the aligning
//! transform. The comparison runs over a temporal window around each frame so
//! velocity-like information enters the metric implicitly. On top of the raw
//! field the grid derives local minima, blend regions and degeneracy-bounded
//! DTW optimal paths; those feed chain and bridge extraction in `web`.

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::error::CoreError;
use crate::sampler::PoseSampler;
use crate::segment::AnimationSegment;
use crate::skeleton::{BoneMask, Skeleton};

/// Maximum consecutive single-axis steps allowed in DTW paths and chain
/// growth before a run counts as degenerate.
pub const DEGENERACY_LIMIT: usize = 4;

/// Side length of the rectangular DTW segments; bounds the DP table size.
const DTW_KERNEL: usize = 32;

const WEIGHT_EPS: f32 = 1e-9;

/// Cell coordinate: frame `a` of the first segment, frame `b` of the second.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridIndex {
    pub a: usize,
    pub b: usize,
}

impl GridIndex {
    pub fn new(a: usize, b: usize) -> Self {
        Self { a, b }
    }

    /// Componentwise `<=` on both axes.
    pub fn precedes(&self, other: &GridIndex) -> bool {
        self.a <= other.a && self.b <= other.b
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub index: GridIndex,
    pub distance: f32,
    pub alignment: Alignment,
}

/// Result of an optimal-path query: grid points with indices non-decreasing
/// on both axes, plus the summed point distances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GridPath {
    pub points: Vec<GridPoint>,
    pub cost: f32,
}

impl GridPath {
    /// Sentinel for queries with no admissible path (e.g. reversed indices).
    pub fn unreachable() -> Self {
        Self {
            points: Vec::new(),
            cost: f32::INFINITY,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.cost.is_finite()
    }
}

/// Per-frame precomputation shared by every cell touching that frame.
struct FrameTerms {
    positions: Vec<[f32; 3]>,
    /// Weighted ground-plane centroid sums (Σ w·x, Σ w·z).
    cx: f32,
    cz: f32,
    /// Weighted squared ground-plane magnitude (Σ w·(x² + z²)).
    mag: f32,
}

/// The (samples1 × samples2) field of pose dissimilarity between two
/// segments. Built once by [`DistanceGrid::build`]; queries are read-only
/// afterwards except the explicit point mutators.
#[derive(Clone, Debug)]
pub struct DistanceGrid {
    skeleton: Skeleton,
    weights: Vec<f32>,
    segments: [AnimationSegment; 2],
    sample_rate: f32,
    samples: [usize; 2],
    points: Vec<GridPoint>,
    min_distance: f32,
    max_distance: f32,
    window_length: f32,
    local_minima: Vec<GridIndex>,
    blend_region: HashSet<GridIndex>,
}

impl DistanceGrid {
    /// Create an unbuilt grid. Default bone weights are the normalized
    /// subtree masses; individual overrides via [`set_bone_weight`] are not
    /// renormalized (caller responsibility).
    ///
    /// [`set_bone_weight`]: DistanceGrid::set_bone_weight
    pub fn new(
        skeleton: &Skeleton,
        segment1: AnimationSegment,
        segment2: AnimationSegment,
        sample_rate: f32,
    ) -> Result<Self, CoreError> {
        let weights = skeleton.default_weights()?;
        let samples = [
            Self::sample_count(&segment1, sample_rate),
            Self::sample_count(&segment2, sample_rate),
        ];
        Ok(Self {
            skeleton: skeleton.clone(),
            weights,
            segments: [segment1, segment2],
            sample_rate,
            samples,
            points: Vec::new(),
            min_distance: 0.0,
            max_distance: 0.0,
            window_length: 0.0,
            local_minima: Vec::new(),
            blend_region: HashSet::new(),
        })
    }

    fn sample_count(segment: &AnimationSegment, sample_rate: f32) -> usize {
        ((segment.duration() * sample_rate).floor() as usize) + 1
    }

    pub fn samples(&self) -> (usize, usize) {
        (self.samples[0], self.samples[1])
    }

    pub fn segments(&self) -> &[AnimationSegment; 2] {
        &self.segments
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn window_length(&self) -> f32 {
        self.window_length
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn bone_weight(&self, bone: usize) -> Result<f32, CoreError> {
        self.weights
            .get(bone)
            .copied()
            .ok_or(CoreError::UnknownBone(bone))
    }

    pub fn set_bone_weight(&mut self, bone: usize, weight: f32) -> Result<(), CoreError> {
        match self.weights.get_mut(bone) {
            Some(slot) => {
                *slot = weight;
                Ok(())
            }
            None => Err(CoreError::UnknownBone(bone)),
        }
    }

    fn check_index(&self, index: GridIndex) -> Result<(), CoreError> {
        if index.a >= self.samples[0] || index.b >= self.samples[1] {
            return Err(CoreError::IndexOutOfRange {
                a: index.a,
                b: index.b,
                samples1: self.samples[0],
                samples2: self.samples[1],
            });
        }
        Ok(())
    }

    fn offset(&self, index: GridIndex) -> usize {
        index.a * self.samples[1] + index.b
    }

    pub fn point(&self, index: GridIndex) -> Result<&GridPoint, CoreError> {
        self.check_index(index)?;
        Ok(&self.points[self.offset(index)])
    }

    /// Overwrite a cell for specialized callers. Does not re-derive the
    /// grid's min/max distance.
    pub fn set_point(&mut self, index: GridIndex, point: GridPoint) -> Result<(), CoreError> {
        self.check_index(index)?;
        let offset = self.offset(index);
        self.points[offset] = point;
        Ok(())
    }

    pub fn distance(&self, index: GridIndex) -> Result<f32, CoreError> {
        Ok(self.point(index)?.distance)
    }

    /// Distance normalized into `[0, 1]` over the grid's range; 1 when the
    /// grid is flat (min == max).
    pub fn norm_distance(&self, index: GridIndex) -> Result<f32, CoreError> {
        let d = self.distance(index)?;
        let span = self.max_distance - self.min_distance;
        if span <= 0.0 {
            return Ok(1.0);
        }
        Ok((d - self.min_distance) / span)
    }

    pub fn alignment(&self, index: GridIndex) -> Result<Alignment, CoreError> {
        Ok(self.point(index)?.alignment)
    }

    /// Clip times corresponding to a cell, clamped to the segment ranges.
    pub fn index_to_times(&self, index: GridIndex) -> (f32, f32) {
        (self.frame_time(0, index.a), self.frame_time(1, index.b))
    }

    fn frame_time(&self, axis: usize, frame: usize) -> f32 {
        let segment = &self.segments[axis];
        (segment.start() + frame as f32 / self.sample_rate).min(segment.end())
    }

    /// Nearest frame on one axis for a clip time, clamped to the grid.
    pub fn time_to_index(&self, axis: usize, time: f32) -> usize {
        let segment = &self.segments[axis];
        let frame = ((time - segment.start()) * self.sample_rate).round();
        (frame.max(0.0) as usize).min(self.samples[axis] - 1)
    }

    /// Build the full distance field. All-or-nothing: the point array is
    /// computed into a fresh buffer and swapped in at the end.
    pub fn build(&mut self, window_length: f32, sampler: &dyn PoseSampler) {
        let (n1, n2) = (self.samples[0], self.samples[1]);
        let bones = self.skeleton.len();
        let mask = BoneMask::all(bones);
        let frames = [
            self.sample_frames(0, &mask, sampler),
            self.sample_frames(1, &mask, sampler),
        ];
        let weight_sum: f32 = self.weights.iter().sum();

        // Centered triangular window, normalized to unit total weight.
        let window_samples = ((window_length * self.sample_rate).round() as isize).max(1);
        let half = window_samples / 2;
        let mut window = Vec::with_capacity((2 * half + 1) as usize);
        for k in -half..=half {
            window.push((half + 1 - k.abs()) as f32);
        }
        let window_total: f32 = window.iter().sum();
        for w in &mut window {
            *w /= window_total;
        }

        let mut points = Vec::with_capacity(n1 * n2);
        let mut min_distance = f32::INFINITY;
        let mut max_distance = f32::NEG_INFINITY;

        for i in 0..n1 {
            for j in 0..n2 {
                let mut cross_dot = 0.0f32;
                let mut cross_perp = 0.0f32;
                let mut sx1 = 0.0f32;
                let mut sz1 = 0.0f32;
                let mut sx2 = 0.0f32;
                let mut sz2 = 0.0f32;
                let mut mag1 = 0.0f32;
                let mut mag2 = 0.0f32;

                for (w, k) in window.iter().zip(-half..=half) {
                    // Boundary frames clamp by repetition.
                    let fi = (i as isize + k).clamp(0, n1 as isize - 1) as usize;
                    let fj = (j as isize + k).clamp(0, n2 as isize - 1) as usize;
                    let fa = &frames[0][fi];
                    let fb = &frames[1][fj];

                    let mut dot = 0.0f32;
                    let mut perp = 0.0f32;
                    for (bone, bw) in self.weights.iter().enumerate() {
                        let p = fa.positions[bone];
                        let q = fb.positions[bone];
                        dot += bw * (p[0] * q[0] + p[2] * q[2]);
                        perp += bw * (p[0] * q[2] - p[2] * q[0]);
                    }
                    cross_dot += w * dot;
                    cross_perp += w * perp;
                    sx1 += w * fa.cx;
                    sz1 += w * fa.cz;
                    sx2 += w * fb.cx;
                    sz2 += w * fb.cz;
                    mag1 += w * fa.mag;
                    mag2 += w * fb.mag;
                }

                let index = GridIndex::new(i, j);
                let point = if weight_sum <= WEIGHT_EPS {
                    GridPoint {
                        index,
                        distance: 0.0,
                        alignment: Alignment::IDENTITY,
                    }
                } else {
                    // Closed-form least-squares alignment: rotation from the
                    // centroid-corrected cross terms, translation by
                    // substitution, residual as the cell distance.
                    let num = cross_perp - (sx1 * sz2 - sz1 * sx2) / weight_sum;
                    let den = cross_dot - (sx1 * sx2 + sz1 * sz2) / weight_sum;
                    let angle = num.atan2(den);
                    let (sin, cos) = angle.sin_cos();
                    let x = (sx1 - sx2 * cos - sz2 * sin) / weight_sum;
                    let z = (sz1 + sx2 * sin - sz2 * cos) / weight_sum;
                    let residual = mag1 + mag2
                        - 2.0 * (cross_dot * cos + cross_perp * sin)
                        - weight_sum * (x * x + z * z);
                    GridPoint {
                        index,
                        // Floating-point cancellation can push the residual
                        // slightly negative.
                        distance: residual.max(0.0),
                        alignment: Alignment::new(x, z, angle),
                    }
                };
                min_distance = min_distance.min(point.distance);
                max_distance = max_distance.max(point.distance);
                points.push(point);
            }
        }

        log::debug!(
            "distance grid built: {}x{} cells, distance range [{min_distance}, {max_distance}]",
            n1,
            n2
        );

        self.points = points;
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self.window_length = window_length;
        self.local_minima.clear();
        self.blend_region.clear();
    }

    fn sample_frames(
        &self,
        axis: usize,
        mask: &BoneMask,
        sampler: &dyn PoseSampler,
    ) -> Vec<FrameTerms> {
        let segment = &self.segments[axis];
        let mut frames = Vec::with_capacity(self.samples[axis]);
        let mut positions = Vec::new();
        for frame in 0..self.samples[axis] {
            let time = self.frame_time(axis, frame);
            sampler.sample_pose(&self.skeleton, segment.clip(), time, mask, &mut positions);
            let mut cx = 0.0f32;
            let mut cz = 0.0f32;
            let mut mag = 0.0f32;
            for (bone, bw) in self.weights.iter().enumerate() {
                let p = positions.get(bone).copied().unwrap_or([0.0; 3]);
                cx += bw * p[0];
                cz += bw * p[2];
                mag += bw * (p[0] * p[0] + p[2] * p[2]);
            }
            frames.push(FrameTerms {
                positions: positions.clone(),
                cx,
                cz,
                mag,
            });
        }
        frames
    }

    fn distance_or_max(&self, a: isize, b: isize) -> f32 {
        if a < 0 || b < 0 || a as usize >= self.samples[0] || b as usize >= self.samples[1] {
            return self.max_distance;
        }
        self.points[a as usize * self.samples[1] + b as usize].distance
    }

    fn minima_threshold(&self, min_dist: f32) -> f32 {
        self.min_distance + min_dist * (self.max_distance - self.min_distance)
    }

    fn is_minimum_2d(&self, index: GridIndex) -> bool {
        let d = self.points[self.offset(index)].distance;
        let (a, b) = (index.a as isize, index.b as isize);
        for da in -1..=1isize {
            for db in -1..=1isize {
                if da == 0 && db == 0 {
                    continue;
                }
                if d >= self.distance_or_max(a + da, b + db) {
                    return false;
                }
            }
        }
        true
    }

    /// Minimum along one axis: axis 0 compares the two neighbors varying
    /// frame `a`, axis 1 the two varying frame `b`.
    fn is_minimum_axis(&self, index: GridIndex, axis: usize) -> bool {
        let d = self.points[self.offset(index)].distance;
        let (a, b) = (index.a as isize, index.b as isize);
        let (n1, n2) = if axis == 0 {
            (self.distance_or_max(a - 1, b), self.distance_or_max(a + 1, b))
        } else {
            (self.distance_or_max(a, b - 1), self.distance_or_max(a, b + 1))
        };
        d < n1 && d < n2
    }

    /// Recompute the local-minima set (and optionally the blend region) for
    /// a normalized threshold `min_dist`. Returns the minima in ascending
    /// index order.
    pub fn find_local_minima(
        &mut self,
        min_dist: f32,
        only_2d: bool,
        compute_blend_region: bool,
        max_dist_diff: f32,
    ) -> &[GridIndex] {
        let threshold = self.minima_threshold(min_dist);
        let mut minima = Vec::new();
        let mut blend = HashSet::new();

        for i in 0..self.samples[0] {
            for j in 0..self.samples[1] {
                let index = GridIndex::new(i, j);
                let d = self.points[self.offset(index)].distance;
                if d >= threshold {
                    continue;
                }
                if only_2d {
                    if self.is_minimum_2d(index) {
                        minima.push(index);
                    }
                    continue;
                }
                let along_a = self.is_minimum_axis(index, 0);
                let along_b = self.is_minimum_axis(index, 1);
                if !along_a && !along_b {
                    continue;
                }
                minima.push(index);
                if compute_blend_region {
                    blend.insert(index);
                    if along_a {
                        self.extend_blend(index, 0, threshold, max_dist_diff, &mut blend);
                    }
                    if along_b {
                        self.extend_blend(index, 1, threshold, max_dist_diff, &mut blend);
                    }
                }
            }
        }

        self.local_minima = minima;
        self.blend_region = blend;
        &self.local_minima
    }

    fn extend_blend(
        &self,
        from: GridIndex,
        axis: usize,
        threshold: f32,
        max_dist_diff: f32,
        blend: &mut HashSet<GridIndex>,
    ) {
        let base = self.points[self.offset(from)].distance.max(WEIGHT_EPS);
        for dir in [-1isize, 1] {
            let mut step = dir;
            loop {
                let (a, b) = if axis == 0 {
                    (from.a as isize + step, from.b as isize)
                } else {
                    (from.a as isize, from.b as isize + step)
                };
                if a < 0 || b < 0 || a as usize >= self.samples[0] || b as usize >= self.samples[1]
                {
                    break;
                }
                let index = GridIndex::new(a as usize, b as usize);
                let d = self.points[self.offset(index)].distance;
                let relative = (d - base) / base;
                // Stop at the first cell that is neither nearly as good as
                // the minimum nor under the minima threshold.
                if relative >= max_dist_diff && d >= threshold {
                    break;
                }
                blend.insert(index);
                step += dir;
            }
        }
    }

    /// Single-cell version of the [`find_local_minima`] predicate.
    ///
    /// [`find_local_minima`]: DistanceGrid::find_local_minima
    pub fn is_local_minimum(
        &self,
        index: GridIndex,
        min_dist: f32,
        only_2d: bool,
    ) -> Result<bool, CoreError> {
        self.check_index(index)?;
        let d = self.points[self.offset(index)].distance;
        if d >= self.minima_threshold(min_dist) {
            return Ok(false);
        }
        if only_2d {
            return Ok(self.is_minimum_2d(index));
        }
        Ok(self.is_minimum_axis(index, 0) || self.is_minimum_axis(index, 1))
    }

    pub fn local_minima(&self) -> &[GridIndex] {
        &self.local_minima
    }

    pub fn in_blend_region(&self, index: GridIndex) -> bool {
        self.blend_region.contains(&index)
    }

    pub fn blend_region(&self) -> &HashSet<GridIndex> {
        &self.blend_region
    }

    /// Minimal-cost monotonic path from `src` to `dst`.
    ///
    /// Returns the unreachable sentinel when `src` does not precede `dst` on
    /// both axes. The warp is processed in rectangular segments of bounded
    /// size; after each intermediate segment only the leading two thirds of
    /// its points are retained and the next segment restarts from the last
    /// retained point, which reduces sensitivity to poor tail estimates.
    pub fn optimal_path(&self, src: GridIndex, dst: GridIndex) -> Result<GridPath, CoreError> {
        self.check_index(src)?;
        self.check_index(dst)?;
        if !src.precedes(&dst) {
            return Ok(GridPath::unreachable());
        }

        let mut indices: Vec<GridIndex> = Vec::new();
        let mut start = src;
        loop {
            let end = GridIndex::new(
                (start.a + DTW_KERNEL - 1).min(dst.a),
                (start.b + DTW_KERNEL - 1).min(dst.b),
            );
            let mut segment = self.dtw_segment(start, end);
            let last = end == dst;
            if !last {
                let keep = ((segment.len() * 2).div_ceil(3)).max(2);
                segment.truncate(keep);
            }
            let skip = usize::from(!indices.is_empty());
            indices.extend(segment.iter().skip(skip));
            start = *segment.last().unwrap_or(&start);
            if last {
                break;
            }
        }

        let mut points = Vec::with_capacity(indices.len());
        let mut cost = 0.0f32;
        for index in indices {
            let point = self.points[self.offset(index)];
            cost += point.distance;
            points.push(point);
        }
        Ok(GridPath { points, cost })
    }

    /// Exact DP over one bounded rectangle. States track how the cell was
    /// entered (diagonal, or a single-axis run of bounded length) so runs
    /// longer than the degeneracy limit never win.
    fn dtw_segment(&self, start: GridIndex, end: GridIndex) -> Vec<GridIndex> {
        const L: usize = DEGENERACY_LIMIT;
        const NSTATES: usize = 2 * L + 1;
        // Preference order for tie-breaking: vertical runs first.
        const PREF: [usize; NSTATES] = {
            let mut order = [0usize; NSTATES];
            let mut i = 0;
            while i < L {
                order[i] = L + 1 + i;
                i += 1;
            }
            order[L] = 0;
            let mut j = 0;
            while j < L {
                order[L + 1 + j] = 1 + j;
                j += 1;
            }
            order
        };

        let width = end.a - start.a + 1;
        let height = end.b - start.b + 1;
        let mut cost = vec![f32::INFINITY; width * height * NSTATES];
        let mut pred = vec![0u8; width * height * NSTATES];
        let slot = |x: usize, y: usize, s: usize| (x * height + y) * NSTATES + s;

        cost[slot(0, 0, 0)] = self.points[self.offset(start)].distance;

        for x in 0..width {
            for y in 0..height {
                if x == 0 && y == 0 {
                    continue;
                }
                let d = self.points[self.offset(GridIndex::new(start.a + x, start.b + y))].distance;

                // Diagonal arrival: best state of (x-1, y-1).
                if x > 0 && y > 0 {
                    let mut best = f32::INFINITY;
                    let mut best_state = 0usize;
                    for &s in &PREF {
                        let c = cost[slot(x - 1, y - 1, s)];
                        if c < best {
                            best = c;
                            best_state = s;
                        }
                    }
                    if best.is_finite() {
                        cost[slot(x, y, 0)] = best + d;
                        pred[slot(x, y, 0)] = best_state as u8;
                    }
                }

                // Horizontal arrival (advancing `a`).
                if x > 0 {
                    // Run start: after a diagonal or a vertical run,
                    // vertical preferred on ties.
                    let mut best = f32::INFINITY;
                    let mut best_state = 0usize;
                    for s in (L + 1)..NSTATES {
                        let c = cost[slot(x - 1, y, s)];
                        if c < best {
                            best = c;
                            best_state = s;
                        }
                    }
                    let diag = cost[slot(x - 1, y, 0)];
                    if diag < best {
                        best = diag;
                        best_state = 0;
                    }
                    if best.is_finite() {
                        cost[slot(x, y, 1)] = best + d;
                        pred[slot(x, y, 1)] = best_state as u8;
                    }
                    for r in 2..=L {
                        let c = cost[slot(x - 1, y, r - 1)];
                        if c.is_finite() {
                            cost[slot(x, y, r)] = c + d;
                            pred[slot(x, y, r)] = (r - 1) as u8;
                        }
                    }
                }

                // Vertical arrival (advancing `b`).
                if y > 0 {
                    // Run start: only after a diagonal or a horizontal run,
                    // never after another vertical state, so a run cannot
                    // launder its own length counter.
                    let mut best = cost[slot(x, y - 1, 0)];
                    let mut best_state = 0usize;
                    for s in 1..=L {
                        let c = cost[slot(x, y - 1, s)];
                        if c < best {
                            best = c;
                            best_state = s;
                        }
                    }
                    if best.is_finite() {
                        cost[slot(x, y, L + 1)] = best + d;
                        pred[slot(x, y, L + 1)] = best_state as u8;
                    }
                    for r in 2..=L {
                        let c = cost[slot(x, y - 1, L + r - 1)];
                        if c.is_finite() {
                            cost[slot(x, y, L + r)] = c + d;
                            pred[slot(x, y, L + r)] = (L + r - 1) as u8;
                        }
                    }
                }
            }
        }

        // Pick the destination state, vertical-preferred.
        let mut final_state = None;
        let mut final_cost = f32::INFINITY;
        for &s in &PREF {
            let c = cost[slot(width - 1, height - 1, s)];
            if c < final_cost {
                final_cost = c;
                final_state = Some(s);
            }
        }

        let Some(mut state) = final_state else {
            // The run limit can make degenerate rectangles unreachable;
            // fall back to a synthesized staircase.
            return staircase(start, end);
        };

        let mut cells = Vec::new();
        let (mut x, mut y) = (width - 1, height - 1);
        loop {
            cells.push(GridIndex::new(start.a + x, start.b + y));
            if x == 0 && y == 0 {
                break;
            }
            let prev_state = pred[slot(x, y, state)] as usize;
            match state {
                0 if x > 0 && y > 0 => {
                    x -= 1;
                    y -= 1;
                }
                s if (1..=L).contains(&s) && x > 0 => x -= 1,
                s if s > L && y > 0 => y -= 1,
                // Inconsistent predecessor at the rectangle boundary; stop
                // here and staircase the remainder.
                _ => break,
            }
            state = prev_state;
        }
        cells.reverse();
        if cells.first() != Some(&start) {
            // Backtracking fell short of the source; synthesize a staircase
            // of grid points down to it.
            let landing = cells[0];
            let mut full = staircase(start, landing);
            full.pop();
            full.extend(cells);
            return full;
        }
        cells
    }
}

/// Monotonic staircase between two ordered indices: diagonal while both axes
/// advance, then straight along the remaining axis.
fn staircase(src: GridIndex, dst: GridIndex) -> Vec<GridIndex> {
    let mut cells = vec![src];
    let (mut a, mut b) = (src.a, src.b);
    while a < dst.a && b < dst.b {
        a += 1;
        b += 1;
        cells.push(GridIndex::new(a, b));
    }
    while a < dst.a {
        a += 1;
        cells.push(GridIndex::new(a, b));
    }
    while b < dst.b {
        b += 1;
        cells.push(GridIndex::new(a, b));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::ClipId;

    /// Grid with a hand-written distance field; min/max derived from it.
    fn synthetic(n1: usize, n2: usize, distances: Vec<f32>) -> DistanceGrid {
        assert_eq!(distances.len(), n1 * n2);
        let mut min_distance = f32::INFINITY;
        let mut max_distance = f32::NEG_INFINITY;
        let mut points = Vec::with_capacity(distances.len());
        for a in 0..n1 {
            for b in 0..n2 {
                let distance = distances[a * n2 + b];
                min_distance = min_distance.min(distance);
                max_distance = max_distance.max(distance);
                points.push(GridPoint {
                    index: GridIndex::new(a, b),
                    distance,
                    alignment: Alignment::IDENTITY,
                });
            }
        }
        let segment = AnimationSegment::new(ClipId(0), 0.0, 0.0, 0.0);
        DistanceGrid {
            skeleton: Skeleton::default(),
            weights: Vec::new(),
            segments: [segment, segment],
            sample_rate: 30.0,
            samples: [n1, n2],
            points,
            min_distance,
            max_distance,
            window_length: 0.0,
            local_minima: Vec::new(),
            blend_region: HashSet::new(),
        }
    }

    #[test]
    fn optimal_path_bounds_single_axis_runs() {
        // Cheap first row and cheap last column; everything else expensive.
        // A warp that hugged the cheap cells corner to corner would need a
        // vertical run far past the degeneracy limit.
        let (n1, n2) = (3usize, 12usize);
        let mut distances = vec![1000.0f32; n1 * n2];
        for b in 0..n2 {
            distances[b] = 0.0;
        }
        for a in 0..n1 {
            distances[a * n2 + (n2 - 1)] = 0.0;
        }
        let grid = synthetic(n1, n2, distances);

        let src = GridIndex::new(0, 0);
        let dst = GridIndex::new(n1 - 1, n2 - 1);
        let path = grid.optimal_path(src, dst).unwrap();
        assert!(path.is_reachable());
        assert_eq!(path.points.first().map(|p| p.index), Some(src));
        assert_eq!(path.points.last().map(|p| p.index), Some(dst));

        let mut run_a = 0usize;
        let mut run_b = 0usize;
        for pair in path.points.windows(2) {
            let da = pair[1].index.a - pair[0].index.a;
            let db = pair[1].index.b - pair[0].index.b;
            if da > 0 && db == 0 {
                run_a += 1;
                run_b = 0;
            } else if da == 0 && db > 0 {
                run_b += 1;
                run_a = 0;
            } else {
                run_a = 0;
                run_b = 0;
            }
            assert!(
                run_a <= DEGENERACY_LIMIT && run_b <= DEGENERACY_LIMIT,
                "single-axis run past the limit at {:?}",
                pair[1].index
            );
        }
        // Breaking up the long vertical run forces at least one expensive
        // cell into the warp.
        assert!(path.cost >= 1000.0, "cost {}", path.cost);
    }

    #[test]
    fn blend_region_stops_at_the_first_violating_cell() {
        // One row carries a minimum at (1, 2) with a gentle ramp behind it.
        // With min_dist = 0.05 the threshold is 1.0 + 0.05 * 8.0 = 1.4 and
        // max_dist_diff = 0.25 admits cells up to 25% above the minimum:
        //   (1, 3) d=1.2  relative 0.2  -> in (relative arm)
        //   (1, 4) d=1.3  relative 0.3  -> in (absolute arm only, 1.3 < 1.4)
        //   (1, 5) d=2.0  relative 1.0, 2.0 >= 1.4 -> first violating cell
        // Row 0 mirrors columns 3 and 4 so neither ramp cell is itself a
        // row-axis minimum.
        let distances = vec![
            9.0, 9.0, 9.0, 1.2, 1.3, 9.0, 9.0, 9.0, //
            9.0, 5.0, 1.0, 1.2, 1.3, 2.0, 9.0, 9.0, //
            9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
        ];
        let mut grid = synthetic(3, 8, distances);

        let minima = grid.find_local_minima(0.05, false, true, 0.25).to_vec();
        assert_eq!(minima, vec![GridIndex::new(0, 3), GridIndex::new(1, 2)]);

        assert!(grid.in_blend_region(GridIndex::new(1, 2)));
        assert!(grid.in_blend_region(GridIndex::new(1, 3)));
        assert!(grid.in_blend_region(GridIndex::new(1, 4)));
        assert!(!grid.in_blend_region(GridIndex::new(1, 5)));
        assert!(!grid.in_blend_region(GridIndex::new(1, 1)));
        // (0, 3) extends over (0, 4) by the relative arm; nothing else
        // qualifies anywhere.
        assert_eq!(grid.blend_region().len(), 5);
    }

    #[test]
    fn staircase_is_monotonic_and_complete() {
        let cells = staircase(GridIndex::new(1, 2), GridIndex::new(4, 3));
        assert_eq!(cells.first(), Some(&GridIndex::new(1, 2)));
        assert_eq!(cells.last(), Some(&GridIndex::new(4, 3)));
        for pair in cells.windows(2) {
            assert!(pair[0].precedes(&pair[1]));
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn grid_index_precedes_is_componentwise() {
        let a = GridIndex::new(1, 5);
        assert!(a.precedes(&GridIndex::new(1, 5)));
        assert!(a.precedes(&GridIndex::new(2, 6)));
        assert!(!a.precedes(&GridIndex::new(0, 9)));
        assert!(!a.precedes(&GridIndex::new(9, 0)));
    }
}
