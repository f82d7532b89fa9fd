use crate::constants::layout::CONSTANTS_SIZE_BYTES;
use crate::error::{FabricError, FabricResult};
use crate::fabric::FabricGrid;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Physical coefficients of the fabric
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub spring: f32,
    pub damper: f32,
    pub wind: f32,
}

impl Coefficients {
    pub fn new(spring: f32, damper: f32, wind: f32) -> Self {
        Self { spring, damper, wind }
    }

    pub fn validate(&self) -> FabricResult<()> {
        for (name, value) in [
            ("spring", self.spring),
            ("damper", self.damper),
            ("wind", self.wind),
        ] {
            if !value.is_finite() {
                return Err(FabricError::invalid_parameter(name, value));
            }
        }
        Ok(())
    }

    fn as_array(&self) -> [f32; 3] {
        [self.spring, self.damper, self.wind]
    }
}

impl Default for Coefficients {
    fn default() -> Self {
        use crate::constants::defaults;
        Self {
            spring: defaults::SPRING,
            damper: defaults::DAMPER,
            wind: defaults::WIND,
        }
    }
}

/// Uniform block shared by the update and disturb kernels.
///
/// Field order mirrors `FabricConstants` in `shaders/fabric.wgsl`; every field is
/// a 4-byte scalar so the WGSL side can declare them individually without vec3
/// alignment gaps.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimulationConstants {
    /// spring, damper, wind
    pub coefficients: [f32; 3],
    pub spatial_step: f32,
    /// (column, row) of the disturb target
    pub disturb_index: [u32; 2],
    /// (columns, rows)
    pub grid_size: [u32; 2],
    pub wind: [f32; 3],
    pub time_step: f32,
    pub disturb_magnitude: f32,
    pub _padding: [f32; 3],
}

const _: () = assert!(std::mem::size_of::<SimulationConstants>() as u64 == CONSTANTS_SIZE_BYTES);

impl SimulationConstants {
    /// Constants for one update dispatch
    pub fn for_update(grid: &FabricGrid, coefficients: &Coefficients, time_step: f32, wind: Vec3) -> Self {
        Self {
            coefficients: coefficients.as_array(),
            spatial_step: grid.spatial_step(),
            disturb_index: [0, 0],
            grid_size: [grid.cols(), grid.rows()],
            wind: wind.to_array(),
            time_step,
            disturb_magnitude: 0.0,
            _padding: [0.0; 3],
        }
    }

    /// Constants for one disturb dispatch
    pub fn for_disturb(
        grid: &FabricGrid,
        coefficients: &Coefficients,
        time_step: f32,
        wind: Vec3,
        row: u32,
        col: u32,
        magnitude: f32,
    ) -> Self {
        Self {
            disturb_index: [col, row],
            disturb_magnitude: magnitude,
            ..Self::for_update(grid, coefficients, time_step, wind)
        }
    }

    pub fn spring(&self) -> f32 {
        self.coefficients[0]
    }

    pub fn damper(&self) -> f32 {
        self.coefficients[1]
    }

    pub fn wind_coefficient(&self) -> f32 {
        self.coefficients[2]
    }

    pub fn cols(&self) -> u32 {
        self.grid_size[0]
    }

    pub fn rows(&self) -> u32 {
        self.grid_size[1]
    }

    pub fn disturb_row(&self) -> u32 {
        self.disturb_index[1]
    }

    pub fn disturb_col(&self) -> u32 {
        self.disturb_index[0]
    }

    pub fn wind_vector(&self) -> Vec3 {
        Vec3::from_array(self.wind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disturb_index_is_column_major_pair() {
        let grid = FabricGrid::new(16, 32, 1.0).unwrap();
        let constants = SimulationConstants::for_disturb(
            &grid,
            &Coefficients::new(10.0, 1.0, 0.1),
            1.0 / 30.0,
            Vec3::ZERO,
            3,
            7,
            -0.25,
        );
        assert_eq!(constants.disturb_index, [7, 3]);
        assert_eq!(constants.disturb_row(), 3);
        assert_eq!(constants.disturb_col(), 7);
        assert_eq!(constants.grid_size, [32, 16]);
        assert_eq!(constants.disturb_magnitude, -0.25);
    }

    #[test]
    fn test_constants_bytes_are_uniform_sized() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let constants =
            SimulationConstants::for_update(&grid, &Coefficients::default(), 0.005, Vec3::new(1.0, 2.0, 3.0));
        let bytes = bytemuck::bytes_of(&constants);
        assert_eq!(bytes.len(), 64);
        assert_eq!(constants.wind_vector(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_non_finite_coefficient_rejected() {
        let coefficients = Coefficients::new(f32::NAN, 1.0, 1.0);
        assert!(matches!(
            coefficients.validate(),
            Err(FabricError::InvalidParameter { name: "spring", .. })
        ));
    }
}
