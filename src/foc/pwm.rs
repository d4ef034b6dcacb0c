// Sinusoidal PWM duty cycle generation

/// Calculate sinusoidal PWM duty cycles from phase voltages
///
/// Each phase voltage is clamped to the `[0, v_dc]` rail range before it is
/// turned into a duty fraction, so saturation never produces an out-of-range
/// compare value.
///
/// # Arguments
/// * `v_u` - Phase A voltage (already offset by `v_dc / 2`)
/// * `v_v` - Phase B voltage
/// * `v_w` - Phase C voltage
/// * `v_dc` - DC bus voltage
///
/// # Returns
/// Tuple of (duty_u, duty_v, duty_w), each in `[0, 1]`
pub fn calculate_sinusoidal_pwm(v_u: f32, v_v: f32, v_w: f32, v_dc: f32) -> (f32, f32, f32) {
    // Prevent division by zero
    if v_dc <= 0.0 {
        return (0.0, 0.0, 0.0);
    }

    let duty = |v: f32| (v.clamp(0.0, v_dc) / v_dc).clamp(0.0, 1.0);

    (duty(v_u), duty(v_v), duty(v_w))
}

/// Clamp every phase voltage to `[0, v_dc]`.
pub fn clamp_phase_voltages(v_u: f32, v_v: f32, v_w: f32, v_dc: f32) -> (f32, f32, f32) {
    let v_dc = v_dc.max(0.0);
    (
        v_u.clamp(0.0, v_dc),
        v_v.clamp(0.0, v_dc),
        v_w.clamp(0.0, v_dc),
    )
}

/// Convert a duty fraction to a timer compare value (0 to max_duty).
pub fn duty_to_compare(duty: f32, max_duty: u16) -> u16 {
    (duty.clamp(0.0, 1.0) * max_duty as f32) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centred_voltages_give_half_duty() {
        let (u, v, w) = calculate_sinusoidal_pwm(6.3, 6.3, 6.3, 12.6);
        assert!((u - 0.5).abs() < 1e-6);
        assert!((v - 0.5).abs() < 1e-6);
        assert!((w - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_saturated_voltages_are_clamped() {
        let (u, v, w) = calculate_sinusoidal_pwm(-3.0, 20.0, 12.6, 12.6);
        assert_eq!(u, 0.0);
        assert_eq!(v, 1.0);
        assert_eq!(w, 1.0);
    }

    #[test]
    fn test_zero_bus_voltage() {
        assert_eq!(calculate_sinusoidal_pwm(1.0, 2.0, 3.0, 0.0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_clamp_phase_voltages() {
        assert_eq!(clamp_phase_voltages(-1.0, 5.0, 13.0, 12.0), (0.0, 5.0, 12.0));
    }

    #[test]
    fn test_duty_to_compare() {
        assert_eq!(duty_to_compare(0.0, 2832), 0);
        assert_eq!(duty_to_compare(0.5, 2832), 1416);
        assert_eq!(duty_to_compare(1.5, 2832), 2832);
    }
}
