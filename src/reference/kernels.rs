//! CPU versions of the fabric kernels
//!
//! Same arithmetic as `shaders/fabric.wgsl`, one loop iteration per GPU thread.

use crate::constants::dispatch::TILE_SIZE;
use crate::fabric::{DispatchSize, GridCell, SimulationConstants};
use glam::Vec3;

const NEIGHBOURS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn neighbour(constants: &SimulationConstants, row: u32, col: u32, offset: (i64, i64)) -> Option<usize> {
    let r = row as i64 + offset.0;
    let c = col as i64 + offset.1;
    if r < 0 || c < 0 || r >= constants.rows() as i64 || c >= constants.cols() as i64 {
        return None;
    }
    Some((r as u64 * constants.cols() as u64 + c as u64) as usize)
}

/// Net force on one cell from its springs, damping and wind
pub fn cell_force(constants: &SimulationConstants, current: &[GridCell], velocity: Vec3, row: u32, col: u32) -> Vec3 {
    let index = (row * constants.cols() + col) as usize;
    let p = current[index].xyz();

    let mut force = Vec3::ZERO;
    for offset in NEIGHBOURS {
        let Some(n) = neighbour(constants, row, col, offset) else {
            continue;
        };
        let d = current[n].xyz() - p;
        let length = d.length();
        if length > f32::EPSILON {
            force += constants.spring() * (length - constants.spatial_step) * d / length;
        }
    }

    force - constants.damper() * velocity + constants.wind_coefficient() * constants.wind_vector()
}

/// Verlet step over every cell covered by `groups`.
///
/// Writes the next position into `previous` and the new velocity into `velocity`.
pub fn update_kernel(
    constants: &SimulationConstants,
    groups: DispatchSize,
    previous: &mut [GridCell],
    current: &[GridCell],
    velocity: &mut [GridCell],
) {
    let dt = constants.time_step;
    let rows = constants.rows().min(groups.y * TILE_SIZE);
    let cols = constants.cols().min(groups.x * TILE_SIZE);

    for row in 0..rows {
        for col in 0..cols {
            let index = (row * constants.cols() + col) as usize;
            let p = current[index].xyz();
            let q = previous[index].xyz();
            let v = velocity[index].xyz();

            let force = cell_force(constants, current, v, row, col);
            let next = 2.0 * p - q + force * dt * dt;
            let next_velocity = (next - q) / (2.0 * dt);

            previous[index] = previous[index].with_xyz(next);
            velocity[index] = velocity[index].with_xyz(next_velocity);
        }
    }
}

/// Push the target cell by the magnitude along y and its neighbours by half
pub fn disturb_kernel(constants: &SimulationConstants, position: &mut [GridCell], velocity: &mut [GridCell]) {
    let row = constants.disturb_row();
    let col = constants.disturb_col();
    if row >= constants.rows() || col >= constants.cols() {
        return;
    }
    let magnitude = constants.disturb_magnitude;

    let target = (row * constants.cols() + col) as usize;
    position[target].y += magnitude;
    velocity[target].y += magnitude;

    for offset in NEIGHBOURS {
        if let Some(n) = neighbour(constants, row, col, offset) {
            position[n].y += 0.5 * magnitude;
            velocity[n].y += 0.5 * magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fabric::{Coefficients, FabricGrid};

    fn constants(grid: &FabricGrid) -> SimulationConstants {
        SimulationConstants::for_update(grid, &Coefficients::new(10.0, 1.0, 0.1), 1.0 / 30.0, Vec3::ZERO)
    }

    fn interior(grid: &FabricGrid) -> impl Iterator<Item = usize> + '_ {
        (1..grid.rows() - 1).flat_map(move |row| (1..grid.cols() - 1).map(move |col| grid.index(row, col)))
    }

    #[test]
    fn test_interior_forces_cancel_on_flat_grid() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let constants = constants(&grid);
        let current = grid.flat_positions();
        let mut previous = current.clone();
        let mut velocity = grid.zero_cells();

        update_kernel(&constants, grid.update_groups().into(), &mut previous, &current, &mut velocity);

        for index in interior(&grid) {
            assert!((previous[index].xyz() - current[index].xyz()).length() < 1e-5);
            assert!(velocity[index].xyz().length() < 1e-3);
        }
    }

    #[test]
    fn test_corner_pulled_inwards() {
        // Flat spacing is width / (cols - 1), slightly longer than dx
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let constants = constants(&grid);
        let current = grid.flat_positions();
        let force = cell_force(&constants, &current, Vec3::ZERO, 0, 0);
        assert!(force.x > 0.0);
        assert!(force.z < 0.0);
        assert_eq!(force.y, 0.0);
    }

    #[test]
    fn test_wind_pushes_interior_cells() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let mut constants = constants(&grid);
        constants.wind = [0.0, 0.0, 3.0];
        let current = grid.flat_positions();
        let mut previous = current.clone();
        let mut velocity = grid.zero_cells();

        update_kernel(&constants, grid.update_groups().into(), &mut previous, &current, &mut velocity);

        let dt = constants.time_step;
        let expected = 0.1 * 3.0 * dt * dt;
        for index in interior(&grid) {
            assert!((previous[index].z - current[index].z - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn test_w_component_preserved() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let constants = constants(&grid);
        let current = grid.flat_positions();
        let mut previous: Vec<GridCell> = current.iter().map(|c| GridCell { w: 7.0, ..*c }).collect();
        let mut velocity: Vec<GridCell> = grid.zero_cells().into_iter().map(|c| GridCell { w: 3.0, ..c }).collect();

        update_kernel(&constants, grid.update_groups().into(), &mut previous, &current, &mut velocity);

        assert!(previous.iter().all(|c| c.w == 7.0));
        assert!(velocity.iter().all(|c| c.w == 3.0));
    }

    #[test]
    fn test_disturb_at_corner_skips_missing_neighbours() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let constants = SimulationConstants::for_disturb(
            &grid,
            &Coefficients::default(),
            0.005,
            Vec3::ZERO,
            0,
            0,
            -0.4,
        );
        let mut position = grid.flat_positions();
        let mut velocity = grid.zero_cells();

        disturb_kernel(&constants, &mut position, &mut velocity);

        assert_eq!(position[0].y, -0.4);
        assert_eq!(position[1].y, -0.2);
        assert_eq!(position[16].y, -0.2);
        assert_eq!(velocity[0].y, -0.4);
        let touched = position.iter().filter(|c| c.y != 0.0).count();
        assert_eq!(touched, 3);
    }
}
