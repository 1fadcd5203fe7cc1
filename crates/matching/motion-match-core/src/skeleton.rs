//! Bone-hierarchy metadata consumed from the host application.
//!
//! The core only needs parent links and per-bone reference lengths: lengths
//! drive the default distance-grid bone weights (subtree mass), and the mask
//! selects which bones a pose sampler has to produce.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, `None` for the root.
    pub parent: Option<usize>,
    /// Reference length of the bone, in meters.
    pub length: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Self { bones }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone(&self, index: usize) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Subtree mass per bone: the bone's own length plus the lengths of all
    /// of its descendants.
    pub fn subtree_masses(&self) -> Vec<f32> {
        let mut masses = vec![0.0f32; self.bones.len()];
        for (i, bone) in self.bones.iter().enumerate() {
            masses[i] += bone.length;
            let mut parent = bone.parent;
            while let Some(p) = parent {
                masses[p] += bone.length;
                parent = self.bones[p].parent;
            }
        }
        masses
    }

    /// Default distance-grid weights: subtree masses normalized to sum to 1.
    /// Falls back to uniform weights when every bone has zero length.
    pub fn default_weights(&self) -> Result<Vec<f32>, CoreError> {
        if self.bones.is_empty() {
            return Err(CoreError::EmptySkeleton);
        }
        let masses = self.subtree_masses();
        let total: f32 = masses.iter().sum();
        if total <= 0.0 {
            let uniform = 1.0 / self.bones.len() as f32;
            return Ok(vec![uniform; self.bones.len()]);
        }
        Ok(masses.into_iter().map(|m| m / total).collect())
    }
}

/// Per-bone selection mask handed to the pose sampler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneMask {
    enabled: Vec<bool>,
}

impl BoneMask {
    pub fn all(bones: usize) -> Self {
        Self {
            enabled: vec![true; bones],
        }
    }

    pub fn none(bones: usize) -> Self {
        Self {
            enabled: vec![false; bones],
        }
    }

    pub fn set(&mut self, bone: usize, enabled: bool) {
        if let Some(slot) = self.enabled.get_mut(bone) {
            *slot = enabled;
        }
    }

    /// Out-of-range bones read as disabled.
    pub fn is_enabled(&self, bone: usize) -> bool {
        self.enabled.get(bone).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}
