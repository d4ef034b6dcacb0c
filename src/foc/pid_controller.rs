// PID controller with output ramp limiting

use crate::config::PidGains;

const FALLBACK_DT: f32 = 1e-3;

/// PID controller with trapezoidal integration, output clamp and ramp limiter
///
/// The integrator itself is not clamped; only the output is.
#[derive(Debug, Clone, Copy)]
pub struct PidController {
    /// Gains and limits
    gains: PidGains,
    /// Integral accumulator
    integral: f32,
    /// Error seen on the previous update
    prev_error: f32,
    /// Last calculated output
    last_output: f32,
}

impl PidController {
    /// Create a new PID controller
    ///
    /// # Arguments
    /// * `gains` - Proportional, integral and derivative gains, ramp and limit
    pub const fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            prev_error: 0.0,
            last_output: 0.0,
        }
    }

    /// Update the PID controller
    ///
    /// # Arguments
    /// * `error` - Setpoint minus measurement
    /// * `dt` - Time step (seconds); non-positive or non-finite values fall
    ///   back to 1 ms
    ///
    /// # Returns
    /// Controller output (limited to ±limit and to `ramp · dt` per step)
    pub fn update(&mut self, error: f32, dt: f32) -> f32 {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { FALLBACK_DT };

        let p_term = self.gains.p * error;

        // Trapezoidal integration
        self.integral += self.gains.i * dt * 0.5 * (error + self.prev_error);
        let i_term = self.integral;

        let d_term = self.gains.d * (error - self.prev_error) / dt;

        let limit = self.gains.limit;
        let mut output = (p_term + i_term + d_term).clamp(-limit, limit);

        if self.gains.ramp > 0.0 {
            let max_step = self.gains.ramp * dt;
            let step = output - self.last_output;
            if step > max_step {
                output = self.last_output + max_step;
            } else if step < -max_step {
                output = self.last_output - max_step;
            }
        }

        self.prev_error = error;
        self.last_output = output;
        output
    }

    /// Reset integrator and history to zero
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.last_output = 0.0;
    }

    /// Replace gains and limits, keeping the controller state
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Get the current output
    pub fn output(&self) -> f32 {
        self.last_output
    }

    /// Get the current integral term
    pub fn integral(&self) -> f32 {
        self.integral
    }
}
