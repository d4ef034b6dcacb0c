// FOC (Field Oriented Control) module
// Sensor-based cascaded FOC for a single BLDC/PMSM axis

pub mod angle_sensor;
pub mod calibration;
pub mod cascade;
pub mod low_pass_filter;
pub mod pid_controller;
pub mod pwm;
pub mod shaft_position;
pub mod transforms;

// Re-export main types for easier access
pub use angle_sensor::AngleSensor;
pub use calibration::{CalibrationResult, CalibrationState, ZeroAngleCalibration};
pub use cascade::{CascadeController, CascadeOutput, Measurements};
pub use low_pass_filter::LowPassFilter;
pub use pid_controller::PidController;
pub use pwm::{calculate_sinusoidal_pwm, duty_to_compare};
pub use shaft_position::ShaftPosition;
pub use transforms::{normalize_angle, Direction, ElectricalState};

/// Interpretation of the active setpoint by the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    /// Multi-turn shaft angle [rad]
    Position,
    /// Shaft velocity reference
    Velocity,
    /// q-axis current [A]
    Torque,
}
