//! Ground-plane rigid transforms.

use serde::{Deserialize, Serialize};

/// A 2D rigid transform on the ground plane: translation along x/z plus a
/// rotation about the vertical axis. Produced by the least-squares pose
/// alignment and used to re-express one clip's pose in the other's frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub x: f32,
    pub z: f32,
    pub angle: f32,
}

impl Alignment {
    pub const IDENTITY: Alignment = Alignment {
        x: 0.0,
        z: 0.0,
        angle: 0.0,
    };

    pub fn new(x: f32, z: f32, angle: f32) -> Self {
        Self { x, z, angle }
    }

    /// Apply the transform to a world position. The vertical component is
    /// passed through unchanged.
    pub fn apply(&self, p: [f32; 3]) -> [f32; 3] {
        let (sin, cos) = self.angle.sin_cos();
        [
            p[0] * cos + p[2] * sin + self.x,
            p[1],
            -p[0] * sin + p[2] * cos + self.z,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_unchanged() {
        let p = [1.0, 2.0, 3.0];
        assert_eq!(Alignment::IDENTITY.apply(p), p);
    }

    #[test]
    fn quarter_turn_swaps_axes() {
        let t = Alignment::new(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let p = t.apply([1.0, 0.0, 0.0]);
        assert!(p[0].abs() < 1e-6);
        assert!((p[2] + 1.0).abs() < 1e-6);
    }
}
