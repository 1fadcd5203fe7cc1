//! Pairwise indexing and query orchestration.
//!
//! The index owns a deduplicating list of segments and one match web per
//! unordered segment pair. Queries breadth-first-expand a `MatchGraph`:
//! every frontier node is searched against every web pairing its covering
//! segment with another indexed segment, and sufficiently novel matches
//! become new nodes.

use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::config::BuildParams;
use crate::error::CoreError;
use crate::graph::MatchGraph;
use crate::sampler::PoseSampler;
use crate::segment::AnimationSegment;
use crate::skeleton::Skeleton;
use crate::web::{MatchWeb, WebIndex};

#[derive(Debug, Default)]
pub struct AnimationIndex {
    skeleton: Skeleton,
    segments: Vec<AnimationSegment>,
    webs: HashMap<WebIndex, MatchWeb>,
}

impl AnimationIndex {
    pub fn new(skeleton: Skeleton) -> Self {
        Self {
            skeleton,
            segments: Vec::new(),
            webs: HashMap::new(),
        }
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn segments(&self) -> &[AnimationSegment] {
        &self.segments
    }

    pub fn web(&self, index: WebIndex) -> Option<&MatchWeb> {
        self.webs.get(&index)
    }

    pub fn num_webs(&self) -> usize {
        self.webs.len()
    }

    /// Add a segment, merging it into any stored segments it overlaps
    /// (possibly several, iteratively), so the list never holds duplicates
    /// or overlapping ranges. A plain append keeps existing webs valid; a
    /// merge shifts segment indices, so it drops all webs.
    pub fn add_segment(&mut self, segment: AnimationSegment) {
        let mut merged = segment;
        let mut did_merge = false;
        while let Some(pos) = self
            .segments
            .iter()
            .position(|s| s.overlap(&merged) > 0.0)
        {
            merged = merged.merge(&self.segments.remove(pos));
            did_merge = true;
        }
        self.segments.push(merged);
        if did_merge {
            self.webs.clear();
        }
    }

    /// Remove a stored segment. Webs are keyed by list position, so any
    /// removal drops them all.
    pub fn remove_segment(&mut self, position: usize) -> Option<AnimationSegment> {
        if position >= self.segments.len() {
            return None;
        }
        let removed = self.segments.remove(position);
        self.webs.clear();
        Some(removed)
    }

    /// Build a match web for every unordered pair of stored segments that
    /// does not have one yet. Already-built pairs are left untouched, so
    /// adding segments and rebuilding is incremental-safe. This is the
    /// dominant cost of indexing (O(N²) web builds).
    pub fn build_index(
        &mut self,
        params: &BuildParams,
        sampler: &dyn PoseSampler,
    ) -> Result<(), CoreError> {
        for i in 0..self.segments.len() {
            for j in (i + 1)..self.segments.len() {
                let key = WebIndex::new(i, j);
                if self.webs.contains_key(&key) {
                    continue;
                }
                let mut web = MatchWeb::new(
                    key,
                    &self.skeleton,
                    self.segments[i],
                    self.segments[j],
                    params.sample_rate,
                )?;
                web.build(params, sampler)?;
                self.webs.insert(key, web);
            }
        }
        log::debug!(
            "index built: {} segments, {} webs",
            self.segments.len(),
            self.webs.len()
        );
        Ok(())
    }

    /// Drop every built web, keeping the segment list.
    pub fn drop_index(&mut self) {
        self.webs.clear();
    }

    /// Stored segment with the largest overlap against `segment`, if any.
    fn covering_segment(&self, segment: &AnimationSegment) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, stored) in self.segments.iter().enumerate() {
            let overlap = stored.overlap(segment);
            if overlap > 0.0 && best.map_or(true, |(_, b)| overlap > b) {
                best = Some((i, overlap));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Assemble the result graph for a query segment. Returns `Ok(None)`
    /// when no indexed segment covers the query's clip; otherwise a graph
    /// rooted at the query, possibly containing only the root.
    pub fn search(
        &self,
        query: &AnimationSegment,
        max_overlap: f32,
    ) -> Result<Option<MatchGraph>, CoreError> {
        let Some(cover) = self.covering_segment(query) else {
            return Ok(None);
        };

        let mut graph = MatchGraph::new();
        let root = graph.create_root(*query)?;
        let mut frontier = VecDeque::new();
        frontier.push_back((root, cover));

        while let Some((handle, covering)) = frontier.pop_front() {
            let Some(node_segment) = graph.node(handle).map(|n| n.segment) else {
                continue;
            };
            for other in 0..self.segments.len() {
                if other == covering {
                    continue;
                }
                let Some(web) = self.webs.get(&WebIndex::new(covering, other)) else {
                    continue;
                };
                for m in web.search(&node_segment, max_overlap) {
                    // A match overlapping existing graph content this much
                    // is a duplicate of what we already found.
                    let strongest = graph
                        .nodes()
                        .map(|n| n.segment.overlap(&m.segment))
                        .fold(0.0f32, f32::max);
                    if strongest >= 1.0 - max_overlap {
                        continue;
                    }
                    let cost = m.avg_distance();
                    let next = graph.create_node(handle, m.segment, m.points, cost)?;
                    if let Some(next_cover) = self.covering_segment(&m.segment) {
                        frontier.push_back((next, next_cover));
                    }
                }
            }
        }
        Ok(Some(graph))
    }
}
