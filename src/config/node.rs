//! Runtime configuration of one node.

use super::params;
use crate::foc::transforms::Direction;

/// Gains and limits of one PID stage.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    /// Maximum output change per second. `0.0` disables the ramp limiter.
    pub ramp: f32,
    /// Symmetric output clamp.
    pub limit: f32,
}

impl PidGains {
    pub const fn new(p: f32, i: f32, d: f32, ramp: f32, limit: f32) -> Self {
        Self { p, i, d, ramp, limit }
    }
}

/// Gains of the three cascaded loops.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerGains {
    pub position: PidGains,
    pub velocity: PidGains,
    pub current: PidGains,
}

impl ControllerGains {
    pub const fn default() -> Self {
        Self {
            position: PidGains::new(
                params::position::DEFAULT_P,
                params::position::DEFAULT_I,
                params::position::DEFAULT_D,
                params::position::DEFAULT_RAMP,
                params::position::DEFAULT_LIMIT,
            ),
            velocity: PidGains::new(
                params::velocity::DEFAULT_P,
                params::velocity::DEFAULT_I,
                params::velocity::DEFAULT_D,
                params::velocity::DEFAULT_RAMP,
                params::velocity::DEFAULT_LIMIT,
            ),
            current: PidGains::new(
                params::current::DEFAULT_P,
                params::current::DEFAULT_I,
                params::current::DEFAULT_D,
                params::current::DEFAULT_RAMP,
                params::current::DEFAULT_LIMIT,
            ),
        }
    }
}

impl Default for ControllerGains {
    fn default() -> Self {
        Self::default()
    }
}

/// Which loop a gain update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopSelect {
    Position,
    Velocity,
    Current,
}

/// Inline current sense front end.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentSenseConfig {
    pub shunt_resistor: f32,
    pub amp_gain: f32,
    /// Whether the phase C shunt is wired to an ADC channel.
    pub phase_c_wired: bool,
    pub calibration_samples: u32,
    pub sample_delay_us: u32,
}

impl CurrentSenseConfig {
    pub const fn default() -> Self {
        Self {
            shunt_resistor: params::current_sense::DEFAULT_SHUNT_RESISTOR,
            amp_gain: params::current_sense::DEFAULT_AMP_GAIN,
            phase_c_wired: false,
            calibration_samples: params::current_sense::DEFAULT_CALIBRATION_SAMPLES,
            sample_delay_us: params::current_sense::DEFAULT_SAMPLE_DELAY_US,
        }
    }

    /// Volts-to-amps gain `1 / (R_shunt · A_amp)`.
    pub fn volts_to_amps(&self) -> f32 {
        1.0 / self.shunt_resistor / self.amp_gain
    }
}

impl Default for CurrentSenseConfig {
    fn default() -> Self {
        Self::default()
    }
}

/// Zero electrical angle alignment parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlignmentConfig {
    pub hold_voltage: f32,
    pub settle_ms: u32,
}

impl AlignmentConfig {
    pub const fn default() -> Self {
        Self {
            hold_voltage: params::alignment::DEFAULT_HOLD_VOLTAGE,
            settle_ms: params::alignment::DEFAULT_SETTLE_MS,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self::default()
    }
}

/// Configuration errors reported by [`NodeConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Supply voltage must be positive.
    InvalidSupplyVoltage,
    /// Pole pair count must be at least one.
    InvalidPolePairs,
    /// Device id must lie in `1..=MAX_DEVICES`.
    InvalidDeviceId,
    /// Gear ratio must be positive.
    InvalidGearRatio,
    /// Fewer than the minimum zero-offset samples.
    TooFewCalibrationSamples,
    /// Shunt resistance and amplifier gain must be positive.
    InvalidCurrentSense,
    /// A loop limit is negative or not finite.
    InvalidGains,
}

/// Everything a node needs to run, set at initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    pub device_id: u8,
    pub supply_voltage: f32,
    pub pole_pairs: u8,
    pub direction: Direction,
    pub gear_ratio: f32,
    pub current_limit: f32,
    pub gains: ControllerGains,
    pub velocity_filter_tf: f32,
    pub current_filter_tf: f32,
    pub current_sense: CurrentSenseConfig,
    pub alignment: AlignmentConfig,
    pub control_period_us: u64,
    pub heartbeat_interval_ms: u64,
}

impl NodeConfig {
    pub const fn default() -> Self {
        Self {
            device_id: params::DEFAULT_DEVICE_ID,
            supply_voltage: params::DEFAULT_SUPPLY_VOLTAGE,
            pole_pairs: params::DEFAULT_POLE_PAIRS,
            direction: Direction::Cw,
            gear_ratio: params::DEFAULT_GEAR_RATIO,
            current_limit: params::DEFAULT_CURRENT_LIMIT,
            gains: ControllerGains::default(),
            velocity_filter_tf: params::filters::DEFAULT_VELOCITY_TF,
            current_filter_tf: params::filters::DEFAULT_CURRENT_TF,
            current_sense: CurrentSenseConfig::default(),
            alignment: AlignmentConfig::default(),
            control_period_us: params::DEFAULT_CONTROL_PERIOD_US,
            heartbeat_interval_ms: params::DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }

    /// Same defaults with a different device id.
    pub const fn with_device_id(device_id: u8) -> Self {
        let mut config = Self::default();
        config.device_id = device_id;
        config
    }

    /// Control period in seconds.
    pub fn control_period_s(&self) -> f32 {
        self.control_period_us as f32 / 1_000_000.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.supply_voltage > 0.0) {
            return Err(ConfigError::InvalidSupplyVoltage);
        }
        if self.pole_pairs == 0 {
            return Err(ConfigError::InvalidPolePairs);
        }
        if self.device_id == 0 || self.device_id > params::protocol::MAX_DEVICES {
            return Err(ConfigError::InvalidDeviceId);
        }
        if !(self.gear_ratio > 0.0) {
            return Err(ConfigError::InvalidGearRatio);
        }
        if self.current_sense.calibration_samples < params::current_sense::MIN_CALIBRATION_SAMPLES
        {
            return Err(ConfigError::TooFewCalibrationSamples);
        }
        if !(self.current_sense.shunt_resistor > 0.0) || !(self.current_sense.amp_gain > 0.0) {
            return Err(ConfigError::InvalidCurrentSense);
        }

        let gains = [self.gains.position, self.gains.velocity, self.gains.current];
        let limits_ok = gains
            .iter()
            .all(|g| g.limit.is_finite() && g.limit >= 0.0 && g.ramp >= 0.0)
            && self.current_limit.is_finite()
            && self.current_limit >= 0.0;
        if !limits_ok {
            return Err(ConfigError::InvalidGains);
        }

        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(NodeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_volts_to_amps_gain() {
        let cs = CurrentSenseConfig::default();
        // 1 / (0.01 Ω × 50) = 2 A/V
        assert!((cs.volts_to_amps() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NodeConfig::with_device_id(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDeviceId));

        config = NodeConfig::with_device_id(21);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDeviceId));

        config = NodeConfig::default();
        config.current_sense.calibration_samples = 499;
        assert_eq!(config.validate(), Err(ConfigError::TooFewCalibrationSamples));

        config = NodeConfig::default();
        config.supply_voltage = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidSupplyVoltage));

        config = NodeConfig::default();
        config.gains.velocity.limit = f32::NAN;
        assert_eq!(config.validate(), Err(ConfigError::InvalidGains));
    }

    #[test]
    fn test_control_period_seconds() {
        let config = NodeConfig::default();
        assert!((config.control_period_s() - 0.001).abs() < 1e-9);
    }
}
