// First-order low-pass filter for measured velocity and current

/// Gaps longer than this restart the filter at the raw input [s]
const RESET_DT: f32 = 0.3;

const FALLBACK_DT: f32 = 1e-3;

/// Discrete first-order low-pass filter
#[derive(Debug, Clone, Copy)]
pub struct LowPassFilter {
    /// Time constant [s]
    tf: f32,
    y_prev: f32,
}

impl LowPassFilter {
    /// # Arguments
    /// * `tf` - Filter time constant [s]
    pub const fn new(tf: f32) -> Self {
        Self { tf, y_prev: 0.0 }
    }

    /// Filter one sample
    ///
    /// # Arguments
    /// * `x` - Raw input
    /// * `dt` - Time since the previous sample [s]
    ///
    /// # Returns
    /// `α · y_prev + (1 − α) · x` with `α = Tf / (Tf + dt)`
    pub fn update(&mut self, x: f32, dt: f32) -> f32 {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { FALLBACK_DT };

        if dt > RESET_DT {
            self.y_prev = x;
            return x;
        }

        let alpha = self.tf / (self.tf + dt);
        let y = alpha * self.y_prev + (1.0 - alpha) * x;
        self.y_prev = y;
        y
    }

    pub fn output(&self) -> f32 {
        self.y_prev
    }

    pub fn reset(&mut self) {
        self.y_prev = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step() {
        let mut lpf = LowPassFilter::new(0.01);
        // α = 0.01 / 0.011
        let y = lpf.update(11.0, 0.001);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_converges_to_input() {
        let mut lpf = LowPassFilter::new(0.05);
        for _ in 0..2000 {
            lpf.update(3.0, 0.001);
        }
        assert!((lpf.output() - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_long_gap_resets() {
        let mut lpf = LowPassFilter::new(0.01);
        lpf.update(1.0, 0.001);
        assert_eq!(lpf.update(42.0, 0.5), 42.0);
    }

    #[test]
    fn test_zero_time_constant_passes_through() {
        let mut lpf = LowPassFilter::new(0.0);
        assert_eq!(lpf.update(7.0, 0.001), 7.0);
    }
}
