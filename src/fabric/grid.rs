use crate::constants::dispatch::{TILE_CELLS, TILE_SIZE};
use crate::constants::layout::CELL_SIZE_BYTES;
use crate::error::{FabricError, FabricResult};
use bytemuck::{Pod, Zeroable};

/// One simulation cell - position or velocity, w unused
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GridCell {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl GridCell {
    pub const ZERO: GridCell = GridCell {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, w: 0.0 }
    }

    pub fn xyz(&self) -> glam::Vec3 {
        glam::Vec3::new(self.x, self.y, self.z)
    }

    /// Replace xyz, keeping w
    pub fn with_xyz(self, v: glam::Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
            w: self.w,
        }
    }
}

/// Immutable grid geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FabricGrid {
    rows: u32,
    cols: u32,
    spatial_step: f32,
}

impl FabricGrid {
    /// Validate dimensions and build the grid.
    ///
    /// The cell count must split into whole 16×16 tiles; the grid is never padded.
    pub fn new(rows: u32, cols: u32, spatial_step: f32) -> FabricResult<Self> {
        let precondition = |reason: String| FabricError::ConstructionPrecondition { rows, cols, reason };

        if rows < 2 || cols < 2 {
            return Err(precondition("grid needs at least 2 rows and 2 columns".to_string()));
        }

        let cells = (rows as u64) * (cols as u64);
        if cells % TILE_CELLS as u64 != 0 {
            return Err(precondition(format!(
                "{} cells is not divisible by the {}x{} tile",
                cells, TILE_SIZE, TILE_SIZE
            )));
        }

        // Cell and triangle counts are u32 here and in the kernels
        let triangles = (rows as u64 - 1) * (cols as u64 - 1) * 2;
        if cells > u32::MAX as u64 || triangles > u32::MAX as u64 {
            return Err(precondition(format!(
                "{} cells ({} triangles) exceeds the 32-bit index range",
                cells, triangles
            )));
        }

        if !spatial_step.is_finite() || spatial_step <= 0.0 {
            return Err(FabricError::invalid_parameter("spatial_step", spatial_step));
        }

        Ok(Self {
            rows,
            cols,
            spatial_step,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn spatial_step(&self) -> f32 {
        self.spatial_step
    }

    pub fn vertex_count(&self) -> u32 {
        self.rows * self.cols
    }

    pub fn triangle_count(&self) -> u32 {
        (self.rows - 1) * (self.cols - 1) * 2
    }

    /// Extent along x
    pub fn width(&self) -> f32 {
        self.cols as f32 * self.spatial_step
    }

    /// Extent along z
    pub fn depth(&self) -> f32 {
        self.rows as f32 * self.spatial_step
    }

    /// Bytes needed for one array of cells
    pub fn array_size_bytes(&self) -> u64 {
        self.vertex_count() as u64 * CELL_SIZE_BYTES
    }

    /// Row-major cell index
    pub fn index(&self, row: u32, col: u32) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row < self.rows && col < self.cols
    }

    /// Thread groups covering the grid, x over columns and y over rows
    pub fn update_groups(&self) -> [u32; 3] {
        [
            (self.cols + TILE_SIZE - 1) / TILE_SIZE,
            (self.rows + TILE_SIZE - 1) / TILE_SIZE,
            1,
        ]
    }

    /// Flat grid in the xz plane, centred on the origin, y = 0.
    ///
    /// Row 0 lies at +depth/2, column 0 at -width/2.
    pub fn flat_positions(&self) -> Vec<GridCell> {
        let half_width = 0.5 * self.width();
        let half_depth = 0.5 * self.depth();
        let dx = self.width() / (self.cols - 1) as f32;
        let dz = self.depth() / (self.rows - 1) as f32;

        let mut cells = Vec::with_capacity(self.vertex_count() as usize);
        for i in 0..self.rows {
            let z = half_depth - i as f32 * dz;
            for j in 0..self.cols {
                let x = -half_width + j as f32 * dx;
                cells.push(GridCell::new(x, 0.0, z));
            }
        }
        cells
    }

    pub fn zero_cells(&self) -> Vec<GridCell> {
        vec![GridCell::ZERO; self.vertex_count() as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimensions() {
        let grid = FabricGrid::new(32, 32, 3.0).unwrap();
        assert_eq!(grid.vertex_count(), 1024);
        assert_eq!(grid.triangle_count(), 31 * 31 * 2);
        assert_eq!(grid.width(), 96.0);
        assert_eq!(grid.depth(), 96.0);
        assert_eq!(grid.update_groups(), [2, 2, 1]);
        assert_eq!(grid.array_size_bytes(), 1024 * 16);
    }

    #[test]
    fn test_rejects_partial_tiles() {
        let err = FabricGrid::new(10, 10, 1.0).unwrap_err();
        assert!(matches!(err, FabricError::ConstructionPrecondition { rows: 10, cols: 10, .. }));
    }

    #[test]
    fn test_rejects_degenerate_axis() {
        assert!(matches!(
            FabricGrid::new(1, 256, 1.0),
            Err(FabricError::ConstructionPrecondition { .. })
        ));
    }

    #[test]
    fn test_rejects_counts_past_u32() {
        // Divisible by 256, but 2^32 cells
        let err = FabricGrid::new(65536, 65536, 1.0).unwrap_err();
        assert!(matches!(
            err,
            FabricError::ConstructionPrecondition { rows: 65536, cols: 65536, .. }
        ));

        // Cells fit, triangles do not
        assert!(matches!(
            FabricGrid::new(65536, 49152, 1.0),
            Err(FabricError::ConstructionPrecondition { .. })
        ));
    }

    #[test]
    fn test_largest_counts_stay_in_range() {
        let grid = FabricGrid::new(32768, 32768, 1.0).unwrap();
        assert_eq!(grid.vertex_count(), 1 << 30);
        assert_eq!(grid.triangle_count(), 32767 * 32767 * 2);
        assert_eq!(grid.array_size_bytes(), (1u64 << 30) * 16);
        assert_eq!(grid.index(32767, 32767), (1usize << 30) - 1);
    }

    #[test]
    fn test_rejects_bad_spacing() {
        assert!(matches!(
            FabricGrid::new(16, 16, 0.0),
            Err(FabricError::InvalidParameter { name: "spatial_step", .. })
        ));
    }

    #[test]
    fn test_flat_positions_span_extent() {
        let grid = FabricGrid::new(16, 16, 1.0).unwrap();
        let cells = grid.flat_positions();
        assert_eq!(cells.len(), 256);

        let first = cells[0];
        assert_eq!((first.x, first.y, first.z, first.w), (-8.0, 0.0, 8.0, 0.0));

        let last = cells[255];
        assert!((last.x - 8.0).abs() < 1e-5);
        assert!((last.z + 8.0).abs() < 1e-5);
        assert!(cells.iter().all(|c| c.y == 0.0 && c.w == 0.0));
    }

    #[test]
    fn test_uneven_axes_round_groups_up() {
        let grid = FabricGrid::new(8, 32, 1.0).unwrap();
        assert_eq!(grid.update_groups(), [2, 1, 1]);
    }
}
