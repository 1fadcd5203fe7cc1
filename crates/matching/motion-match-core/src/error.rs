//! Error type for public API boundaries.
//!
//! Precondition violations surface as `CoreError`; empty or unreachable
//! results (no path, no matches, no covering segment) are ordinary `Ok`
//! values and never errors.

use crate::graph::NodeHandle;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoreError {
    #[error("grid index ({a}, {b}) out of range for a {samples1}x{samples2} grid")]
    IndexOutOfRange {
        a: usize,
        b: usize,
        samples1: usize,
        samples2: usize,
    },

    #[error("bone index {0} out of range")]
    UnknownBone(usize),

    #[error("skeleton has no bones to derive weights from")]
    EmptySkeleton,

    #[error("unknown node handle {0:?}")]
    UnknownHandle(NodeHandle),

    #[error("the graph already has a root node")]
    RootExists,

    #[error("the root node cannot be deleted")]
    RootDeletion,
}
