use crate::error::{FabricError, FabricResult};

/// Couples the variable frame time to the fixed simulation step.
///
/// At most one step fires per frame. When it fires the accumulator is reset to
/// zero and any overshoot is dropped, so slow frames make the simulation lag
/// wall-clock time instead of running several steps.
///
/// Frame times are summed in f32 and compared with `>=`, so a split of the step
/// into equal parts can land one ulp short and fire a frame late.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeAccumulator {
    accumulated: f32,
    time_step: f32,
}

impl TimeAccumulator {
    pub fn new(time_step: f32) -> FabricResult<Self> {
        if !time_step.is_finite() || time_step <= 0.0 {
            return Err(FabricError::invalid_parameter("time_step", time_step));
        }
        Ok(Self {
            accumulated: 0.0,
            time_step,
        })
    }

    /// Add frame time; returns whether a step is due
    pub fn accumulate(&mut self, elapsed: f32) -> FabricResult<bool> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return Err(FabricError::InvalidTimeDelta { elapsed });
        }
        self.accumulated += elapsed;
        Ok(self.is_ready())
    }

    pub fn is_ready(&self) -> bool {
        self.accumulated >= self.time_step
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }

    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    pub fn time_step(&self) -> f32 {
        self.time_step
    }
}
