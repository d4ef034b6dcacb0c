//! One control tick: sense, consume setpoint, run the cascade, actuate.
//!
//! [`MotorControl`] owns every piece of the motor path. The caller provides the
//! tick period and the shared setpoint cell; nothing here blocks except
//! [`MotorControl::calibrate`].

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::delay::DelayNs;

use crate::config::{ConfigError, LoopSelect, NodeConfig, PidGains};
use crate::current_sense::{InlineCurrentSense, PhaseCurrents};
use crate::foc::transforms::q_axis_current;
use crate::foc::{
    AngleSensor, CalibrationResult, CascadeController, ControlMode, ElectricalState, Measurements,
    ZeroAngleCalibration,
};
use crate::hal::{AngleSource, DutyCycleSink, VoltageSource};
use crate::motor_driver::MotorDriver;
use crate::setpoint::{SetpointCell, Target, TargetConverter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlError {
    /// [`MotorControl::calibrate`] has not completed; the motor is held off.
    NotCalibrated,
}

/// What one tick measured and commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub target: Target,
    /// Multi-turn shaft angle [rad]
    pub measured_angle: f32,
    /// Filtered shaft velocity
    pub measured_velocity: f32,
    /// Filtered q-axis current [A]
    pub measured_current: f32,
    pub currents: PhaseCurrents,
    pub uq: f32,
    pub electrical_angle: f32,
}

pub struct MotorControl<V, P, S> {
    config: NodeConfig,
    current_sense: InlineCurrentSense<V>,
    driver: MotorDriver<P>,
    sensor: AngleSensor<S>,
    cascade: CascadeController,
    converter: TargetConverter,
    calibration: ZeroAngleCalibration,
    electrical: Option<ElectricalState>,
    target: Target,
}

impl<V, P, S> MotorControl<V, P, S>
where
    V: VoltageSource,
    P: DutyCycleSink,
    S: AngleSource,
{
    /// # Arguments
    /// * `config` - Validated before anything is built
    /// * `adc` - Shunt amplifier voltages
    /// * `pwm` - Phase duty cycle output
    /// * `angle` - Absolute shaft angle sensor
    pub fn new(config: NodeConfig, adc: V, pwm: P, angle: S) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            current_sense: InlineCurrentSense::new(adc, config.current_sense),
            driver: MotorDriver::new(pwm, config.supply_voltage),
            sensor: AngleSensor::new(angle),
            cascade: CascadeController::new(&config),
            converter: TargetConverter::new(config.gear_ratio),
            calibration: ZeroAngleCalibration::new(config.alignment),
            electrical: None,
            target: Target {
                value: 0.0,
                mode: ControlMode::Position,
            },
            config,
        })
    }

    /// Calibrate current sense offsets, then the zero electrical angle
    ///
    /// Runs once; later calls return the stored result. The control loop and
    /// every setpoint writer must stay idle until it returns.
    pub fn calibrate<D: DelayNs>(&mut self, delay: &mut D) -> CalibrationResult {
        if let (Some(result), true) = (self.calibration.result(), self.current_sense.is_calibrated()) {
            return result;
        }

        // Offsets are measured with the motor unpowered
        self.driver.stop();
        self.current_sense.calibrate(delay);

        let result = self.calibration.run(
            &mut self.driver,
            &mut self.sensor,
            self.config.pole_pairs,
            self.config.direction,
            delay,
        );
        self.electrical = Some(result.electrical_state());
        self.cascade.reset();
        result
    }

    pub fn is_calibrated(&self) -> bool {
        self.electrical.is_some()
    }

    /// Run one control tick
    ///
    /// # Arguments
    /// * `dt` - Time since the previous tick [s]
    /// * `setpoint` - Shared setpoint; a pending value is consumed
    pub fn tick<M: RawMutex>(
        &mut self,
        dt: f32,
        setpoint: &SetpointCell<M>,
    ) -> Result<TickReport, ControlError> {
        let Some(electrical) = self.electrical else {
            self.driver.stop();
            return Err(ControlError::NotCalibrated);
        };

        self.sensor.refresh(dt);
        let currents = self.current_sense.sample();

        let electrical_angle = electrical.electrical_angle(self.sensor.mechanical_angle());
        let sign = self.config.direction.sign();
        let measurements = Measurements {
            angle: sign * self.sensor.angle(),
            velocity: sign * self.sensor.velocity(),
            iq: q_axis_current(currents.a, currents.b, electrical_angle),
        };

        if let Some(sp) = setpoint.take() {
            if let Some(target) = self.converter.convert(sp) {
                if target.mode != self.target.mode {
                    debug!("Control mode change: {}", target.mode);
                    self.cascade.reset();
                }
                self.target = target;
            }
        }

        let out = match self.target.mode {
            ControlMode::Position => self.cascade.position_tick(self.target.value, &measurements, dt),
            ControlMode::Velocity => self.cascade.velocity_tick(self.target.value, &measurements, dt),
            ControlMode::Torque => self.cascade.torque_tick(self.target.value, &measurements, dt),
        };

        self.driver.set_torque(out.uq, electrical_angle);

        Ok(TickReport {
            target: self.target,
            measured_angle: measurements.angle,
            measured_velocity: out.filtered_velocity,
            measured_current: out.filtered_current,
            currents,
            uq: out.uq,
            electrical_angle,
        })
    }

    /// Retune one loop between ticks
    pub fn set_gains(&mut self, select: LoopSelect, gains: PidGains) {
        info!("Gains updated: {} p={} i={} d={}", select, gains.p, gains.i, gains.d);
        self.cascade.set_gains(select, gains);
    }

    /// Apply a q-axis voltage directly, bypassing the cascade
    pub fn apply_torque(&mut self, uq: f32, electrical_angle: f32) {
        self.driver.set_torque(uq, electrical_angle);
    }

    /// Zero all phase duties
    pub fn stop(&mut self) {
        self.driver.stop();
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn driver(&self) -> &MotorDriver<P> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut MotorDriver<P> {
        &mut self.driver
    }

    pub fn current_sense_mut(&mut self) -> &mut InlineCurrentSense<V> {
        &mut self.current_sense
    }

    pub fn sensor_mut(&mut self) -> &mut AngleSensor<S> {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{AdcChannel, Phase};
    use crate::setpoint::SetpointUnit;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    struct QuietAdc;

    impl VoltageSource for QuietAdc {
        fn read_voltage(&mut self, _channel: AdcChannel) -> f32 {
            1.65
        }
    }

    #[derive(Default)]
    struct Duties([f32; 3]);

    impl DutyCycleSink for Duties {
        fn write_duty_cycle(&mut self, phase: Phase, duty: f32) {
            self.0[phase as usize] = duty;
        }
    }

    struct Still(f32);

    impl AngleSource for Still {
        fn read_angle(&mut self) -> f32 {
            self.0
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    type TestControl = MotorControl<QuietAdc, Duties, Still>;

    fn control() -> TestControl {
        MotorControl::new(NodeConfig::default(), QuietAdc, Duties::default(), Still(1.0)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = NodeConfig::default();
        config.pole_pairs = 0;
        let result = MotorControl::new(config, QuietAdc, Duties::default(), Still(0.0));
        assert!(matches!(result, Err(ConfigError::InvalidPolePairs)));
    }

    #[test]
    fn test_tick_before_calibration_holds_motor() {
        let cell = SetpointCell::<CriticalSectionRawMutex>::new();
        let mut mc = control();
        cell.store(1.0, SetpointUnit::NativeRadians);

        assert_eq!(mc.tick(0.001, &cell), Err(ControlError::NotCalibrated));
        assert_eq!(mc.driver().last_duties(), (0.0, 0.0, 0.0));
        // Setpoint is left for the first calibrated tick
        assert!(cell.is_dirty());
    }

    #[test]
    fn test_tick_at_target_is_centred() {
        let cell = SetpointCell::<CriticalSectionRawMutex>::new();
        let mut mc = control();
        mc.calibrate(&mut NoDelay);
        assert!(mc.is_calibrated());

        // Hold the current position
        cell.store(1.0, SetpointUnit::NativeRadians);
        let report = mc.tick(0.001, &cell).unwrap();
        assert_eq!(report.target.mode, ControlMode::Position);
        assert!(report.electrical_angle.abs() < 1e-4 || report.electrical_angle > 6.283);
        assert!(report.uq.abs() < 1e-3);
        let (a, b, c) = mc.driver().last_duties();
        assert!((a - 0.5).abs() < 1e-3 && (b - 0.5).abs() < 1e-3 && (c - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_current_setpoint_selects_torque_mode() {
        let cell = SetpointCell::<CriticalSectionRawMutex>::new();
        let mut mc = control();
        mc.calibrate(&mut NoDelay);

        cell.offer(0.5, SetpointUnit::Current);
        let report = mc.tick(0.001, &cell).unwrap();
        assert_eq!(report.target.mode, ControlMode::Torque);
        assert_eq!(report.target.value, 0.5);
        assert!(!cell.is_dirty());
        // P = 1.2 on a 0.5 A error
        assert!((report.uq - 0.6).abs() < 1e-3);
    }

    #[test]
    fn test_apply_zero_torque_centres_duties() {
        let mut mc = control();
        mc.apply_torque(0.0, 2.0);
        assert_eq!(mc.driver().last_duties(), (0.5, 0.5, 0.5));
    }
}
