// Coordinate transformations for FOC (Field Oriented Control)
// Inverse transforms drive the inverter, forward transforms feed the current loop.

use core::f32::consts::{PI, TAU};
use libm::{cosf, fmodf, sinf};

const SQRT3: f32 = 1.732_050_8;
const INV_SQRT3: f32 = 0.577_350_3;

/// Sensor-to-rotor rotation sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Cw,
    Ccw,
}

impl Direction {
    pub const fn sign(self) -> f32 {
        match self {
            Direction::Cw => 1.0,
            Direction::Ccw => -1.0,
        }
    }
}

/// Mapping from mechanical shaft angle to electrical angle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ElectricalState {
    /// Electrical angle [rad] measured at the aligned rotor position.
    pub zero_electric_angle: f32,
    pub pole_pairs: u8,
    pub direction: Direction,
}

impl ElectricalState {
    pub const fn new(pole_pairs: u8, direction: Direction) -> Self {
        Self {
            zero_electric_angle: 0.0,
            pole_pairs,
            direction,
        }
    }

    /// Electrical angle [rad] in `[0, 2π)` for a mechanical angle.
    pub fn electrical_angle(&self, mechanical_angle: f32) -> f32 {
        normalize_angle(
            self.pole_pairs as f32 * self.direction.sign() * mechanical_angle
                - self.zero_electric_angle,
        )
    }
}

/// Normalize angle to range [0, 2π)
///
/// # Arguments
/// * `angle` - Angle in radians
///
/// # Returns
/// Normalized angle in range [0, 2π)
pub fn normalize_angle(angle: f32) -> f32 {
    let a = fmodf(angle, TAU);
    let normalized = if a >= 0.0 { a } else { a + TAU };
    // -ε + 2π rounds up to 2π in single precision
    if normalized >= TAU {
        0.0
    } else {
        normalized
    }
}

/// Inverse Park transformation with `Ud = 0` (q → αβ)
///
/// # Arguments
/// * `uq` - q-axis voltage
/// * `theta` - Electrical angle in radians
///
/// # Returns
/// Tuple of (u_alpha, u_beta) in the stationary frame
pub fn inverse_park(uq: f32, theta: f32) -> (f32, f32) {
    let theta = normalize_angle(theta);
    (-uq * sinf(theta), uq * cosf(theta))
}

/// Inverse Clarke transformation (αβ → abc) centred on half the supply
///
/// # Arguments
/// * `u_alpha` - Alpha-axis voltage
/// * `u_beta` - Beta-axis voltage
/// * `supply_voltage` - DC bus voltage
///
/// # Returns
/// Tuple of (u_a, u_b, u_c) phase voltages, each offset by `supply_voltage / 2`
pub fn inverse_clarke(u_alpha: f32, u_beta: f32, supply_voltage: f32) -> (f32, f32, f32) {
    let centre = supply_voltage / 2.0;

    let u_a = u_alpha + centre;
    let u_b = (SQRT3 * u_beta - u_alpha) / 2.0 + centre;
    let u_c = (-u_alpha - SQRT3 * u_beta) / 2.0 + centre;

    (u_a, u_b, u_c)
}

/// Clarke transformation from two measured phase currents (ab → αβ)
///
/// Assumes `i_a + i_b + i_c = 0`.
pub fn clarke(i_a: f32, i_b: f32) -> (f32, f32) {
    (i_a, (i_a + 2.0 * i_b) * INV_SQRT3)
}

/// Park transformation (αβ → dq)
///
/// # Returns
/// Tuple of (d, q) in the rotating frame
///
/// # Implementation
/// Uses idsp::cossin() on the measurement path, ~1e-6 away from libm.
pub fn park(alpha: f32, beta: f32, theta: f32) -> (f32, f32) {
    let (cos_theta, sin_theta) = fast_cossin(theta);

    let d = alpha * cos_theta + beta * sin_theta;
    let q = beta * cos_theta - alpha * sin_theta;

    (d, q)
}

/// q-axis current [A] from phase currents A and B at an electrical angle.
pub fn q_axis_current(i_a: f32, i_b: f32, theta: f32) -> f32 {
    let (alpha, beta) = clarke(i_a, i_b);
    park(alpha, beta, theta).1
}

#[inline]
fn fast_cossin(theta: f32) -> (f32, f32) {
    // idsp phase spans one turn over the full i32 range, centred on 0
    let theta = normalize_angle(theta);
    let centred = if theta > PI { theta - TAU } else { theta };

    const SCALE: f32 = 2147483648.0 / PI;
    let phase = (centred * SCALE) as i32;

    let (cos_i32, sin_i32) = idsp::cossin(phase);

    const I32_TO_F32: f32 = 1.0 / 2147483648.0;
    (cos_i32 as f32 * I32_TO_F32, sin_i32 as f32 * I32_TO_F32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_normalize_angle() {
        assert!(approx_eq(normalize_angle(0.0), 0.0));
        assert!(approx_eq(normalize_angle(7.0), 7.0 - TAU));
        assert!(approx_eq(normalize_angle(-1.0), -1.0 + TAU));
        assert_eq!(normalize_angle(TAU), 0.0);
        assert_eq!(normalize_angle(-1e-9), 0.0);
    }

    #[test]
    fn test_normalize_angle_range() {
        let mut a = -50.0_f32;
        while a < 50.0 {
            let n = normalize_angle(a);
            assert!((0.0..TAU).contains(&n), "angle {} -> {}", a, n);
            a += 0.37;
        }
    }

    #[test]
    fn test_electrical_angle() {
        let mut state = ElectricalState::new(7, Direction::Cw);
        assert!(approx_eq(state.electrical_angle(0.1), 0.7));

        state.zero_electric_angle = 0.2;
        assert!(approx_eq(state.electrical_angle(0.1), 0.5));

        state.direction = Direction::Ccw;
        assert!(approx_eq(state.electrical_angle(0.1), TAU - 0.9));
    }

    #[test]
    fn test_inverse_park_zero_angle() {
        let (u_alpha, u_beta) = inverse_park(2.0, 0.0);
        assert!(approx_eq(u_alpha, 0.0));
        assert!(approx_eq(u_beta, 2.0));
    }

    #[test]
    fn test_inverse_clarke_centre() {
        let (u_a, u_b, u_c) = inverse_clarke(0.0, 0.0, 12.0);
        assert!(approx_eq(u_a, 6.0));
        assert!(approx_eq(u_b, 6.0));
        assert!(approx_eq(u_c, 6.0));
    }

    #[test]
    fn test_inverse_clarke_balanced() {
        let (u_a, u_b, u_c) = inverse_clarke(1.0, 0.5, 12.0);
        // Sum of the AC components is zero
        assert!(approx_eq(u_a + u_b + u_c, 18.0));
    }

    #[test]
    fn test_q_axis_current_aligned() {
        // Pure β current at θ = 0 is pure q
        let i_a = 0.0;
        let i_b = 1.0;
        let (_, beta) = clarke(i_a, i_b);
        let iq = q_axis_current(i_a, i_b, 0.0);
        assert!((iq - beta).abs() < 1e-4);
    }

    #[test]
    fn test_park_matches_libm() {
        let mut theta = 0.0_f32;
        while theta < TAU {
            let (d, q) = park(1.0, 0.5, theta);
            let d_ref = cosf(theta) + 0.5 * sinf(theta);
            let q_ref = 0.5 * cosf(theta) - sinf(theta);
            assert!((d - d_ref).abs() < 1e-3);
            assert!((q - q_ref).abs() < 1e-3);
            theta += 0.1;
        }
    }
}
