use motion_match_core::{AnimationSegment, BuildParams, ClipId, MatchWeb, WebIndex};
use motion_match_fixtures::{biped_skeleton, ClipSpec, ProceduralSampler};

/// Web over two clips rendered from the same walk spec.
fn twin_walk_web(duration: f32) -> (MatchWeb, AnimationSegment, AnimationSegment) {
    let skeleton = biped_skeleton();
    let sampler = ProceduralSampler::new()
        .with_clip(ClipId(0), ClipSpec::walk(duration))
        .with_clip(ClipId(1), ClipSpec::walk(duration));
    let s1 = AnimationSegment::new(ClipId(0), 0.0, duration, duration);
    let s2 = AnimationSegment::new(ClipId(1), 0.0, duration, duration);
    let mut web = MatchWeb::new(WebIndex::new(0, 1), &skeleton, s1, s2, 30.0).unwrap();
    web.build(&BuildParams::default(), &sampler).unwrap();
    (web, s1, s2)
}

/// Web over a walk and a phase-shifted variant of the same walk; similar
/// enough to produce minima, different enough for a non-trivial structure.
fn shifted_walk_web(duration: f32) -> (MatchWeb, AnimationSegment) {
    let skeleton = biped_skeleton();
    let base = ClipSpec::walk(duration);
    let shifted = ClipSpec { phase: 0.9, ..base };
    let sampler = ProceduralSampler::new()
        .with_clip(ClipId(0), base)
        .with_clip(ClipId(1), shifted);
    let s1 = AnimationSegment::new(ClipId(0), 0.0, duration, duration);
    let s2 = AnimationSegment::new(ClipId(1), 0.0, duration, duration);
    let mut web = MatchWeb::new(WebIndex::new(0, 1), &skeleton, s1, s2, 30.0).unwrap();
    web.build(&BuildParams::default(), &sampler).unwrap();
    (web, s1)
}

/// it should normalize the pair key and answer membership queries
#[test]
fn web_index_is_canonical() {
    let key = WebIndex::new(4, 1);
    assert_eq!(key, WebIndex::new(1, 4));
    assert_eq!(key.first(), 1);
    assert_eq!(key.second(), 4);
    assert!(key.contains(1) && key.contains(4) && !key.contains(2));
    assert_eq!(key.other(1), Some(4));
    assert_eq!(key.other(4), Some(1));
    assert_eq!(key.other(7), None);
}

/// it should grow exactly one chain spanning the diagonal of identical clips
#[test]
fn identical_clips_produce_one_diagonal_chain() {
    let (web, _, _) = twin_walk_web(1.0);
    assert_eq!(web.num_chains(), 1);
    assert_eq!(web.paths().len(), 1);
    let chain = &web.paths()[0];
    let (n, _) = web.grid().samples();
    assert_eq!(chain.points.len(), n);
    for (i, p) in chain.points.iter().enumerate() {
        assert_eq!((p.index.a, p.index.b), (i, i));
    }
    assert!(chain.join.is_none());
    assert!(chain.branches.is_empty());
}

/// it should report the twin segment as a near-perfect match
#[test]
fn search_finds_the_twin_segment() {
    let (web, s1, s2) = twin_walk_web(1.0);
    let matches = web.search(&s1, 0.3);
    assert_eq!(matches.len(), 1);
    let m = &matches[0];
    assert_eq!(m.segment.clip(), ClipId(1));
    assert!(m.segment.overlap(&s2) > 0.9);
    assert!(m.avg_distance() < 1e-3);
    assert_eq!(m.points.len(), web.grid().samples().0);
    // Times advance together along the diagonal correspondence.
    for pair in m.points.windows(2) {
        assert!(pair[1].time1 > pair[0].time1);
        assert!(pair[1].time2 > pair[0].time2);
    }
}

/// it should answer queries on either clip of the pair
#[test]
fn search_works_from_both_axes() {
    let (web, s1, s2) = twin_walk_web(1.0);
    let from_second = web.search(&s2, 0.3);
    assert_eq!(from_second.len(), 1);
    assert_eq!(from_second[0].segment.clip(), ClipId(0));
    assert!(from_second[0].segment.overlap(&s1) > 0.9);
}

/// it should return nothing for clips outside the pair
#[test]
fn search_ignores_foreign_clips() {
    let (web, _, _) = twin_walk_web(1.0);
    let foreign = AnimationSegment::new(ClipId(7), 0.0, 1.0, 1.0);
    assert!(web.search(&foreign, 0.3).is_empty());
}

/// it should keep every stored path monotonic with valid branch and join
/// targets
#[test]
fn paths_are_monotonic_with_valid_links() {
    let (web, _) = shifted_walk_web(2.0);
    let paths = web.paths();
    let num_chains = web.num_chains();
    assert!(num_chains >= 1);
    assert!(num_chains <= paths.len());

    for (pi, path) in paths.iter().enumerate() {
        assert!(!path.points.is_empty());
        for pair in path.points.windows(2) {
            assert!(pair[0].index.precedes(&pair[1].index));
            assert_ne!(pair[0].index, pair[1].index);
        }
        // Branches diverge into bridges; joins land on chains.
        for &(point, target) in &path.branches {
            assert!(point < path.points.len());
            assert!(target >= num_chains && target < paths.len());
        }
        if let Some(join) = path.join {
            assert!(join.path < num_chains);
            assert!(join.point < paths[join.path].points.len());
        }
        if pi >= num_chains {
            assert!(path.join.is_some(), "bridge {pi} must join a chain");
        }
    }
}

/// it should never return two matches overlapping beyond the limit
#[test]
fn search_respects_the_overlap_limit() {
    let (web, _) = shifted_walk_web(2.0);
    let query = AnimationSegment::new(ClipId(0), 0.0, 2.0, 2.0);
    let max_overlap = 0.3;
    let matches = web.search(&query, max_overlap);
    for (i, a) in matches.iter().enumerate() {
        for b in matches.iter().skip(i + 1) {
            assert!(a.segment.overlap(&b.segment) <= max_overlap + 1e-6);
        }
    }
    // Matches are emitted in selection order, best first.
    for pair in matches.windows(2) {
        assert!(pair[0].avg_distance() <= pair[1].avg_distance());
    }
}

/// it should keep matches inside the queried time range on the query axis
#[test]
fn search_clips_to_the_query_range() {
    let (web, _, _) = twin_walk_web(1.0);
    let query = AnimationSegment::new(ClipId(0), 0.2, 0.6, 1.0);
    let matches = web.search(&query, 0.3);
    assert!(!matches.is_empty());
    for m in &matches {
        for p in &m.points {
            assert!(p.time1 >= 0.2 - 1e-3 && p.time1 <= 0.6 + 1e-3);
        }
    }
}
