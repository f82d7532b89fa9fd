// Fabric Engine Constants - SINGLE SOURCE OF TRUTH
//
// Both CPU and GPU code read these values. The WGSL prelude is generated from
// this module so kernel tile sizes can never drift from the dispatch math.

/// Dispatch geometry shared by the update kernel and the host
pub mod dispatch {
    /// Threads per tile edge; the update kernel runs 16×16 threads per group
    pub const TILE_SIZE: u32 = 16;

    /// Cells covered by one thread group
    pub const TILE_CELLS: u32 = TILE_SIZE * TILE_SIZE;

    /// The disturb kernel is a single thread in a single group
    pub const DISTURB_GROUPS: [u32; 3] = [1, 1, 1];
}

/// Memory layout of simulation arrays and descriptors
pub mod layout {
    /// Floats per grid cell (xyz + unused w)
    pub const CELL_COMPONENTS: usize = 4;

    /// Bytes per grid cell
    pub const CELL_SIZE_BYTES: u64 = (CELL_COMPONENTS * std::mem::size_of::<f32>()) as u64;

    /// Number of simulation arrays (previous, current position, current velocity)
    pub const ARRAY_COUNT: usize = 3;

    /// One read view and one read/write view per array
    pub const DESCRIPTOR_COUNT: u32 = (ARRAY_COUNT * 2) as u32;

    /// Size of the uniform block handed to both kernels
    pub const CONSTANTS_SIZE_BYTES: u64 = 64;

    /// Bind group slots, matching the WGSL declarations
    pub const BINDING_CONSTANTS: u32 = 0;
    pub const BINDING_PREVIOUS: u32 = 1;
    pub const BINDING_CURRENT_POSITION: u32 = 2;
    pub const BINDING_CURRENT_VELOCITY: u32 = 3;
}

/// Defaults taken from the reference fabric scene
pub mod defaults {
    pub const ROWS: u32 = 32;
    pub const COLS: u32 = 32;
    pub const SPATIAL_STEP: f32 = 3.0;
    pub const TIME_STEP: f32 = 0.005;
    pub const SPRING: f32 = 118.58;
    pub const DAMPER: f32 = 1.05;
    pub const WIND: f32 = 2.0;

    /// Disturb impulses push the fabric down
    pub const DISTURB_MAGNITUDE_MIN: f32 = -0.5;
    pub const DISTURB_MAGNITUDE_MAX: f32 = -0.1;

    pub const DEMO_FRAMES: u32 = 600;
    pub const DEMO_FRAME_TIME: f32 = 1.0 / 60.0;
    pub const DEMO_DISTURB_EVERY: u32 = 30;
    pub const DEMO_SEED: u64 = 42;
}

/// Wind controller step sizes
pub mod wind {
    /// Radians per azimuth/polar adjustment
    pub const ANGLE_STEP: f32 = 0.5;

    /// Strength change per adjustment
    pub const STRENGTH_STEP: f32 = 0.1;
}

/// Generate the WGSL constant prelude prepended to the fabric kernels
pub fn generate_wgsl_constants() -> String {
    format!(
        r#"// AUTO-GENERATED FABRIC CONSTANTS - DO NOT EDIT
// Generated from src/constants.rs

const TILE_SIZE: u32 = {}u;
const CELL_COMPONENTS: u32 = {}u;
"#,
        dispatch::TILE_SIZE,
        layout::CELL_COMPONENTS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_count_covers_all_views() {
        assert_eq!(layout::DESCRIPTOR_COUNT, 6);
        assert_eq!(dispatch::TILE_CELLS, 256);
    }

    #[test]
    fn test_wgsl_prelude_matches_tile_size() {
        let prelude = generate_wgsl_constants();
        assert!(prelude.contains("const TILE_SIZE: u32 = 16u;"));
    }
}
