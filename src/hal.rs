//! Hardware seams.
//!
//! The control core never touches peripherals directly. The board crate
//! implements these traits over its ADC, timer and I2C drivers; tests implement
//! them over simulated hardware.

/// Analog input channels carrying the inline shunt amplifier outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChannel {
    PhaseA,
    PhaseB,
    PhaseC,
}

/// Inverter output phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    A,
    B,
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];
}

/// Source of calibrated analog voltages.
pub trait VoltageSource {
    /// Read the voltage [V] currently present on `channel`.
    fn read_voltage(&mut self, channel: AdcChannel) -> f32;
}

/// Sink for per-phase PWM duty cycles.
pub trait DutyCycleSink {
    /// Set the duty cycle of `phase`, a fraction in `[0, 1]`.
    fn write_duty_cycle(&mut self, phase: Phase, duty: f32);
}

/// Absolute single-turn angle sensor.
pub trait AngleSource {
    /// Current raw shaft angle [rad] in `[0, 2π)`.
    fn read_angle(&mut self) -> f32;
}

/// Convert raw 12-bit ADC counts to volts.
///
/// # Arguments
/// * `counts` - Raw conversion result
///
/// # Returns
/// Voltage [V] relative to the 3.3 V reference
pub fn adc_counts_to_volts(counts: u16) -> f32 {
    use crate::config::current_sense::{ADC_FULL_SCALE, ADC_VREF};
    counts as f32 * ADC_VREF / ADC_FULL_SCALE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adc_counts_to_volts() {
        assert_eq!(adc_counts_to_volts(0), 0.0);
        assert!((adc_counts_to_volts(4095) - 3.3).abs() < 1e-6);
        assert!((adc_counts_to_volts(2048) - 1.6504).abs() < 1e-3);
    }
}
