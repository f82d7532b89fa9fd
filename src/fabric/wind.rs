use crate::constants::wind::{ANGLE_STEP, STRENGTH_STEP};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Wind direction and strength in spherical coordinates.
///
/// `theta` is the azimuth in the xz plane, `phi` the angle from +y.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindController {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl WindController {
    pub fn new(radius: f32, theta: f32, phi: f32) -> Self {
        Self {
            radius: radius.max(0.0),
            theta,
            phi,
        }
    }

    pub fn calm() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Cartesian wind vector
    pub fn wind(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        Vec3::new(
            self.radius * sin_phi * cos_theta,
            self.radius * cos_phi,
            self.radius * sin_phi * sin_theta,
        )
    }

    /// Rotate around +y by `steps` increments
    pub fn adjust_azimuth(&mut self, steps: f32) {
        self.theta += steps * ANGLE_STEP;
    }

    /// Tilt away from +y by `steps` increments
    pub fn adjust_polar(&mut self, steps: f32) {
        self.phi += steps * ANGLE_STEP;
    }

    /// Strengthen or weaken by `steps` increments; never negative
    pub fn adjust_strength(&mut self, steps: f32) {
        self.radius = (self.radius + steps * STRENGTH_STEP).max(0.0);
    }
}

impl Default for WindController {
    fn default() -> Self {
        Self::calm()
    }
}
