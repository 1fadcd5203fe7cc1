//! Chains, bridges and similarity search over one segment pair.
//!
//! A `MatchWeb` owns the distance grid for a pair of indexed segments and
//! distills it into a directed graph of paths: chains grown through
//! consecutive local minima, and DTW bridges connecting chains that do not
//! join directly. Queries walk the paths intersecting a segment range and
//! return deduplicated matches on the other clip.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::config::BuildParams;
use crate::error::CoreError;
use crate::grid::{DistanceGrid, GridIndex, GridPoint, DEGENERACY_LIMIT};
use crate::sampler::PoseSampler;
use crate::segment::AnimationSegment;
use crate::skeleton::Skeleton;

/// Canonical unordered pair of segment indices identifying a web.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WebIndex {
    first: usize,
    second: usize,
}

impl WebIndex {
    pub fn new(i: usize, j: usize) -> Self {
        Self {
            first: i.min(j),
            second: i.max(j),
        }
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn second(&self) -> usize {
        self.second
    }

    pub fn contains(&self, segment: usize) -> bool {
        self.first == segment || self.second == segment
    }

    /// The pair member that is not `segment`.
    pub fn other(&self, segment: usize) -> Option<usize> {
        if segment == self.first {
            Some(self.second)
        } else if segment == self.second {
            Some(self.first)
        } else {
            None
        }
    }
}

/// Location of a point inside another path.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PathLink {
    pub path: usize,
    pub point: usize,
}

/// An ordered run of grid points, strictly increasing on both axes. A path
/// may branch into a diverging path at one of its points and may join into
/// another path at its end.
#[derive(Clone, Debug)]
pub struct WebPath {
    pub points: Vec<GridPoint>,
    /// `(point index, target path)` pairs where another path diverges.
    pub branches: Vec<(usize, usize)>,
    /// Path and point this one flows into after its last point.
    pub join: Option<PathLink>,
}

impl WebPath {
    fn frame_range(&self, axis: usize) -> Option<(usize, usize)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some(if axis == 0 {
            (first.index.a, last.index.a)
        } else {
            (first.index.b, last.index.b)
        })
    }
}

/// One correspondence along a match: times on both clips plus the alignment
/// that maps the second clip's pose into the first's frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchPoint {
    pub time1: f32,
    pub time2: f32,
    pub alignment: Alignment,
}

/// A similar segment discovered on the other clip of the pair.
#[derive(Clone, Debug)]
pub struct Match {
    pub segment: AnimationSegment,
    pub points: Vec<MatchPoint>,
    avg_distance: f32,
}

impl Match {
    pub fn avg_distance(&self) -> f32 {
        self.avg_distance
    }
}

/// Distance grid plus the chain/bridge paths extracted from it for one
/// segment pair. Chains occupy path indices `0..num_chains`; bridges are
/// appended after all chains, so branch and join targets always reference
/// already-assigned path indices.
#[derive(Debug)]
pub struct MatchWeb {
    index: WebIndex,
    grid: DistanceGrid,
    paths: Vec<WebPath>,
    num_chains: usize,
}

impl MatchWeb {
    pub fn new(
        index: WebIndex,
        skeleton: &Skeleton,
        segment1: AnimationSegment,
        segment2: AnimationSegment,
        sample_rate: f32,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            index,
            grid: DistanceGrid::new(skeleton, segment1, segment2, sample_rate)?,
            paths: Vec::new(),
            num_chains: 0,
        })
    }

    pub fn index(&self) -> WebIndex {
        self.index
    }

    pub fn grid(&self) -> &DistanceGrid {
        &self.grid
    }

    pub fn paths(&self) -> &[WebPath] {
        &self.paths
    }

    pub fn num_chains(&self) -> usize {
        self.num_chains
    }

    /// Build the grid, grow chains through its local minima and bridge
    /// chains within the bridge budget. All-or-nothing: the path list is
    /// assembled separately and swapped in at the end.
    ///
    /// `params.resample_factor` is accepted but the comparison always runs
    /// at the full sample rate; the web stays at build resolution.
    pub fn build(
        &mut self,
        params: &BuildParams,
        sampler: &dyn PoseSampler,
    ) -> Result<(), CoreError> {
        let _ = params.resample_factor;
        self.grid.build(params.window_length, sampler);
        self.grid
            .find_local_minima(params.min_dist, false, true, params.max_dist_diff);

        let mut paths = self.grow_chains(params)?;
        let num_chains = paths.len();
        self.build_bridges(params, &mut paths, num_chains)?;

        log::debug!(
            "match web {:?}: {} chains, {} bridges",
            self.index,
            num_chains,
            paths.len() - num_chains
        );
        self.paths = paths;
        self.num_chains = num_chains;
        Ok(())
    }

    fn grow_chains(&self, params: &BuildParams) -> Result<Vec<WebPath>, CoreError> {
        // Minima arrive in ascending index order from the grid scan.
        let minima: Vec<GridIndex> = self.grid.local_minima().to_vec();
        let minima_set: HashSet<GridIndex> = minima.iter().copied().collect();
        let mut claimed: HashMap<GridIndex, PathLink> = HashMap::new();
        let mut paths: Vec<WebPath> = Vec::new();

        let mut prev: Option<GridIndex> = None;
        for &start in &minima {
            // "Has no predecessor minimum" is approximated by adjacency to
            // the previous minimum in sorted order.
            let has_predecessor = prev.is_some_and(|p| {
                start == GridIndex::new(p.a + 1, p.b + 1)
                    || start == GridIndex::new(p.a + 1, p.b)
                    || start == GridIndex::new(p.a, p.b + 1)
            });
            prev = Some(start);
            if has_predecessor {
                continue;
            }

            let mut indices = vec![start];
            let mut join = None;
            let mut run_a = 0usize;
            let mut run_b = 0usize;
            let mut current = start;
            loop {
                let steps = [(1usize, 1usize), (1, 0), (0, 1)];
                let Some(&(da, db)) = steps
                    .iter()
                    .find(|(da, db)| {
                        minima_set.contains(&GridIndex::new(current.a + da, current.b + db))
                    })
                else {
                    break;
                };
                let next = GridIndex::new(current.a + da, current.b + db);
                if let Some(link) = claimed.get(&next) {
                    join = Some(*link);
                    break;
                }
                if da == 1 && db == 0 {
                    run_a += 1;
                    run_b = 0;
                } else if da == 0 && db == 1 {
                    run_b += 1;
                    run_a = 0;
                } else {
                    run_a = 0;
                    run_b = 0;
                }
                if run_a > DEGENERACY_LIMIT || run_b > DEGENERACY_LIMIT {
                    break;
                }
                indices.push(next);
                current = next;
            }

            let duration = indices.len() as f32 / params.sample_rate;
            if duration < params.min_chain_length {
                continue;
            }
            let path_index = paths.len();
            let mut points = Vec::with_capacity(indices.len());
            for (pi, &index) in indices.iter().enumerate() {
                claimed.insert(
                    index,
                    PathLink {
                        path: path_index,
                        point: pi,
                    },
                );
                points.push(*self.grid.point(index)?);
            }
            paths.push(WebPath {
                points,
                branches: Vec::new(),
                join,
            });
        }
        Ok(paths)
    }

    fn build_bridges(
        &self,
        params: &BuildParams,
        paths: &mut Vec<WebPath>,
        num_chains: usize,
    ) -> Result<(), CoreError> {
        let budget = ((params.max_bridge_length * params.sample_rate).round() as usize).max(1);

        for ca in 0..num_chains {
            for cb in 0..num_chains {
                if ca == cb || !self.boxes_touch(&paths[ca], &paths[cb], budget) {
                    continue;
                }

                // Shortest bridge (fewest points) over all admissible point
                // pairs of this ordered chain pair.
                let mut best: Option<(Vec<GridPoint>, usize, usize)> = None;
                for (pi, p) in paths[ca].points.iter().enumerate() {
                    for (qi, q) in paths[cb].points.iter().enumerate() {
                        if p.index.a >= q.index.a || p.index.b >= q.index.b {
                            continue;
                        }
                        let manhattan =
                            (q.index.a - p.index.a) + (q.index.b - p.index.b);
                        if manhattan > budget {
                            continue;
                        }
                        let path = self.grid.optimal_path(p.index, q.index)?;
                        if !path.is_reachable() {
                            continue;
                        }
                        let better = best
                            .as_ref()
                            .map_or(true, |(points, _, _)| path.points.len() < points.len());
                        if better {
                            best = Some((path.points, pi, qi));
                        }
                    }
                }

                let Some((bridge, src_point, dst_point)) = best else {
                    continue;
                };
                let chain_end = paths[ca].points.len() - 1;
                if src_point == chain_end && paths[ca].join.is_none() {
                    // The bridge continues straight out of the chain's last
                    // point; splice instead of branching.
                    paths[ca].points.extend(bridge.into_iter().skip(1));
                    paths[ca].join = Some(PathLink {
                        path: cb,
                        point: dst_point,
                    });
                } else {
                    let bridge_index = paths.len();
                    paths[ca].branches.push((src_point, bridge_index));
                    paths.push(WebPath {
                        points: bridge,
                        branches: Vec::new(),
                        join: Some(PathLink {
                            path: cb,
                            point: dst_point,
                        }),
                    });
                }
            }
        }
        Ok(())
    }

    /// Index-space bounding boxes, each expanded by the bridge budget.
    fn boxes_touch(&self, a: &WebPath, b: &WebPath, budget: usize) -> bool {
        let (Some(a0), Some(a1), Some(b0), Some(b1)) = (
            a.points.first(),
            a.points.last(),
            b.points.first(),
            b.points.last(),
        ) else {
            return false;
        };
        let overlap_1d = |lo1: usize, hi1: usize, lo2: usize, hi2: usize| {
            lo1.saturating_sub(budget) <= hi2 + budget && lo2.saturating_sub(budget) <= hi1 + budget
        };
        overlap_1d(a0.index.a, a1.index.a, b0.index.a, b1.index.a)
            && overlap_1d(a0.index.b, a1.index.b, b0.index.b, b1.index.b)
    }

    /// Find every match for a query range on one of the pair's clips.
    /// Candidates are walked through branches and joins so combined matches
    /// stay contiguous, then greedily deduplicated: the lowest-average-
    /// distance candidate wins and suppresses candidates overlapping it by
    /// more than `max_overlap`.
    pub fn search(&self, query: &AnimationSegment, max_overlap: f32) -> Vec<Match> {
        let Some(axis) = self.query_axis(query) else {
            return Vec::new();
        };
        let qs = self.grid.time_to_index(axis, query.start());
        let qe = self.grid.time_to_index(axis, query.end());

        let mut candidates: Vec<Match> = Vec::new();
        for (pi, path) in self.paths.iter().enumerate() {
            let Some((lo, hi)) = path.frame_range(axis) else {
                continue;
            };
            if hi < qs || lo > qe {
                continue;
            }
            let Some(from) = path
                .points
                .iter()
                .position(|p| Self::coord(p, axis) >= qs && Self::coord(p, axis) <= qe)
            else {
                continue;
            };
            self.collect(pi, from, axis, qs, qe, Vec::new(), 0, &mut candidates);
        }

        // Greedy independent-set selection over the 1D overlap graph:
        // deterministic, not optimal.
        let mut matches = Vec::new();
        while !candidates.is_empty() {
            let best = candidates
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.avg_distance.total_cmp(&b.avg_distance))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let keep = candidates.swap_remove(best);
            candidates.retain(|c| c.segment.overlap(&keep.segment) <= max_overlap);
            matches.push(keep);
        }
        matches
    }

    /// Axis whose segment carries the query's clip; when both do, the one
    /// with the larger time intersection wins.
    fn query_axis(&self, query: &AnimationSegment) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (axis, segment) in self.grid.segments().iter().enumerate() {
            if segment.clip() != query.clip() {
                continue;
            }
            let inter = segment.end().min(query.end()) - segment.start().max(query.start());
            if inter < 0.0 {
                continue;
            }
            if best.map_or(true, |(_, b)| inter > b) {
                best = Some((axis, inter));
            }
        }
        best.map(|(axis, _)| axis)
    }

    fn coord(point: &GridPoint, axis: usize) -> usize {
        if axis == 0 {
            point.index.a
        } else {
            point.index.b
        }
    }

    /// Walk one path from `from`, appending points inside the query region,
    /// diverging into branches and flowing through joins. `min_len` marks
    /// how many points the accumulator held when this walk began: a walk
    /// that appends nothing emits no candidate.
    #[allow(clippy::too_many_arguments)]
    fn collect(
        &self,
        path_index: usize,
        from: usize,
        axis: usize,
        qs: usize,
        qe: usize,
        mut acc: Vec<GridPoint>,
        min_len: usize,
        out: &mut Vec<Match>,
    ) {
        let path = &self.paths[path_index];
        let mut i = from;
        while i < path.points.len() {
            let point = path.points[i];
            let coord = Self::coord(&point, axis);
            if coord < qs || coord > qe {
                break;
            }
            // Bridge endpoints duplicate the chain points they attach to.
            if acc.last().map(|p| p.index) != Some(point.index) {
                acc.push(point);
            }
            for &(branch_point, target) in &path.branches {
                if branch_point == i {
                    self.collect(target, 0, axis, qs, qe, acc.clone(), acc.len(), out);
                }
            }
            i += 1;
        }
        if i == path.points.len() {
            if let Some(join) = path.join {
                self.collect(join.path, join.point, axis, qs, qe, acc, min_len, out);
                return;
            }
        }
        if acc.len() > min_len {
            if let Some(m) = self.make_match(axis, acc) {
                out.push(m);
            }
        }
    }

    fn make_match(&self, axis: usize, points: Vec<GridPoint>) -> Option<Match> {
        let first = points.first()?;
        let last = points.last()?;
        let other = 1 - axis;
        let other_segment = &self.grid.segments()[other];
        let (first_t1, first_t2) = self.grid.index_to_times(first.index);
        let (last_t1, last_t2) = self.grid.index_to_times(last.index);
        let (start, end) = if other == 0 {
            (first_t1, last_t1)
        } else {
            (first_t2, last_t2)
        };
        let segment = AnimationSegment::new(
            other_segment.clip(),
            start,
            end,
            other_segment.end().max(end),
        );

        let mut total = 0.0f32;
        let match_points = points
            .iter()
            .map(|p| {
                total += p.distance;
                let (time1, time2) = self.grid.index_to_times(p.index);
                MatchPoint {
                    time1,
                    time2,
                    alignment: p.alignment,
                }
            })
            .collect::<Vec<_>>();
        let avg_distance = total / match_points.len() as f32;
        Some(Match {
            segment,
            points: match_points,
            avg_distance,
        })
    }
}
