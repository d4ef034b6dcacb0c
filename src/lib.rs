//! Control core of a wireless-commanded single-axis FOC node.
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`ble_protocol`] | Decodes broadcast command frames into this node's setpoint |
//! | [`setpoint`] | Single-producer/single-consumer setpoint cell and unit conversion |
//! | [`telemetry`] | Acknowledgement and heartbeat text frames |
//! | [`console`] | Line-oriented numeric target input |
//! | [`current_sense`] | Inline shunt current sensing with zero-offset calibration |
//! | [`foc`] | Transforms, PID, filters, cascade and calibration |
//! | [`motor_driver`] | Torque command to three duty cycles |
//! | [`motor_control`] | One control tick: sense, cascade, actuate |
//! | [`hal`] | Traits the board implements (ADC, PWM, angle sensor) |
//! | [`config`] | Default parameters and runtime configuration |

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble_protocol;
pub mod config;
pub mod console;
pub mod current_sense;
pub mod foc;
pub mod hal;
pub mod motor_control;
pub mod motor_driver;
pub mod setpoint;
pub mod telemetry;

pub use ble_protocol::{CommandDecoder, DecodeError, DecodeOutcome};
pub use config::NodeConfig;
pub use motor_control::{ControlError, MotorControl, TickReport};
pub use setpoint::{Setpoint, SetpointCell, SetpointUnit};
pub use telemetry::{HeartbeatTimer, Response, ResponseEmitter};
