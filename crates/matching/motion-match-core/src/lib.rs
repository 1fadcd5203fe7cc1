//! Motion-matching and motion-graph construction core (engine-agnostic).
//!
//! Given raw motion-capture clips reachable through a [`PoseSampler`], the
//! core discovers pairs of frames with similar, blendable poses, grows
//! chains and bridges of such matches over a pairwise distance field, and
//! answers "find clips similar to this segment" queries as a shortest-path-
//! queryable result graph.

pub mod alignment;
pub mod config;
pub mod error;
pub mod graph;
pub mod grid;
pub mod index;
pub mod sampler;
pub mod segment;
pub mod skeleton;
pub mod web;

// Re-exports for consumers (adapters)
pub use alignment::Alignment;
pub use config::BuildParams;
pub use error::CoreError;
pub use graph::{GraphEdge, GraphNode, MatchGraph, NodeHandle, NodePath};
pub use grid::{DistanceGrid, GridIndex, GridPath, GridPoint, DEGENERACY_LIMIT};
pub use index::AnimationIndex;
pub use sampler::PoseSampler;
pub use segment::{AnimationSegment, ClipId};
pub use skeleton::{Bone, BoneMask, Skeleton};
pub use web::{Match, MatchPoint, MatchWeb, PathLink, WebIndex, WebPath};
