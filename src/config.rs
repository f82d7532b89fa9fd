//! TOML configuration for the fabric demo
//!
//! Every field has a default, so an empty file (or no file) reproduces the
//! stock 32×32 demo.

use crate::constants::defaults;
use crate::error::{FabricError, FabricResult};
use crate::fabric::{Coefficients, FabricDescriptor, FabricGrid, TimeAccumulator, WindController};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub spatial_step: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: defaults::ROWS,
            cols: defaults::COLS,
            spatial_step: defaults::SPATIAL_STEP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub time_step: f32,
    pub spring: f32,
    pub damper: f32,
    pub wind: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_step: defaults::TIME_STEP,
            spring: defaults::SPRING,
            damper: defaults::DAMPER,
            wind: defaults::WIND,
        }
    }
}

/// Initial wind in spherical coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    pub radius: f32,
    pub theta: f32,
    pub phi: f32,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            radius: 0.0,
            theta: 0.0,
            phi: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub frames: u32,
    /// Seconds fed to the simulation per frame
    pub frame_time: f32,
    /// Frames between random disturbs; 0 disables them
    pub disturb_every: u32,
    pub disturb_magnitude_min: f32,
    pub disturb_magnitude_max: f32,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: defaults::DEMO_FRAMES,
            frame_time: defaults::DEMO_FRAME_TIME,
            disturb_every: defaults::DEMO_DISTURB_EVERY,
            disturb_magnitude_min: defaults::DISTURB_MAGNITUDE_MIN,
            disturb_magnitude_max: defaults::DISTURB_MAGNITUDE_MAX,
            seed: defaults::DEMO_SEED,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    pub grid: GridConfig,
    pub simulation: SimulationConfig,
    pub wind: WindConfig,
    pub demo: DemoConfig,
}

impl FabricConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> FabricResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| FabricError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("[FabricConfig::load] Loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> FabricResult<Self> {
        let config: FabricConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> FabricResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check everything a simulation or the demo loop would reject later
    pub fn validate(&self) -> FabricResult<()> {
        FabricGrid::new(self.grid.rows, self.grid.cols, self.grid.spatial_step)?;
        TimeAccumulator::new(self.simulation.time_step)?;
        self.coefficients().validate()?;

        if !self.demo.frame_time.is_finite() || self.demo.frame_time < 0.0 {
            return Err(FabricError::invalid_parameter("demo.frame_time", self.demo.frame_time));
        }
        let (min, max) = (self.demo.disturb_magnitude_min, self.demo.disturb_magnitude_max);
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(FabricError::invalid_parameter(
                "demo.disturb_magnitude",
                format!("[{}, {}]", min, max),
            ));
        }
        for (name, value) in [
            ("wind.radius", self.wind.radius),
            ("wind.theta", self.wind.theta),
            ("wind.phi", self.wind.phi),
        ] {
            if !value.is_finite() {
                return Err(FabricError::invalid_parameter(name, value));
            }
        }
        if self.wind.radius < 0.0 {
            return Err(FabricError::invalid_parameter("wind.radius", self.wind.radius));
        }
        Ok(())
    }

    pub fn coefficients(&self) -> Coefficients {
        Coefficients::new(self.simulation.spring, self.simulation.damper, self.simulation.wind)
    }

    pub fn descriptor(&self) -> FabricDescriptor {
        FabricDescriptor {
            rows: self.grid.rows,
            cols: self.grid.cols,
            spatial_step: self.grid.spatial_step,
            time_step: self.simulation.time_step,
            coefficients: self.coefficients(),
        }
    }

    pub fn wind_controller(&self) -> WindController {
        WindController::new(self.wind.radius, self.wind.theta, self.wind.phi)
    }
}
