//! Cascaded position → velocity → current control.
//!
//! All three loops run at the control rate. Each entry point starts at a
//! different level of the cascade and runs every loop below it.

use super::low_pass_filter::LowPassFilter;
use super::pid_controller::PidController;
use crate::config::{ControllerGains, LoopSelect, NodeConfig};

const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Raw measurements of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurements {
    /// Multi-turn shaft angle [rad]
    pub angle: f32,
    /// Shaft velocity [rad/s] (unfiltered)
    pub velocity: f32,
    /// q-axis current [A] (unfiltered)
    pub iq: f32,
}

/// Intermediate references of one cascade evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CascadeOutput {
    pub velocity_ref: f32,
    pub current_ref: f32,
    /// q-axis voltage [V] for the transform engine
    pub uq: f32,
    pub filtered_velocity: f32,
    pub filtered_current: f32,
}

pub struct CascadeController {
    position: PidController,
    velocity: PidController,
    current: PidController,
    velocity_filter: LowPassFilter,
    current_filter: LowPassFilter,
    current_limit: f32,
}

impl CascadeController {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            position: PidController::new(config.gains.position),
            velocity: PidController::new(config.gains.velocity),
            current: PidController::new(config.gains.current),
            velocity_filter: LowPassFilter::new(config.velocity_filter_tf),
            current_filter: LowPassFilter::new(config.current_filter_tf),
            current_limit: config.current_limit,
        }
    }

    /// Run all three loops toward a multi-turn angle target [rad].
    pub fn position_tick(&mut self, target: f32, m: &Measurements, dt: f32) -> CascadeOutput {
        let error_deg = (target - m.angle) * RAD_TO_DEG;
        let velocity_ref = self.position.update(error_deg, dt);
        self.velocity_stage(velocity_ref, m, dt)
    }

    /// Run the velocity and current loops toward a shaft velocity [rad/s].
    pub fn velocity_tick(&mut self, velocity_ref: f32, m: &Measurements, dt: f32) -> CascadeOutput {
        self.velocity_stage(velocity_ref, m, dt)
    }

    /// Run only the current loop toward a q current reference [A].
    pub fn torque_tick(&mut self, current_ref: f32, m: &Measurements, dt: f32) -> CascadeOutput {
        let filtered_velocity = self.velocity_filter.update(m.velocity, dt);
        let mut out = self.current_stage(current_ref, m, dt);
        out.filtered_velocity = filtered_velocity;
        out
    }

    fn velocity_stage(&mut self, velocity_ref: f32, m: &Measurements, dt: f32) -> CascadeOutput {
        let filtered_velocity = self.velocity_filter.update(m.velocity, dt);
        let raw_ref = self.velocity.update(velocity_ref - filtered_velocity, dt);
        // Independent of the velocity loop's own limit
        let current_ref = raw_ref.clamp(-self.current_limit, self.current_limit);

        let mut out = self.current_stage(current_ref, m, dt);
        out.velocity_ref = velocity_ref;
        out.filtered_velocity = filtered_velocity;
        out
    }

    fn current_stage(&mut self, current_ref: f32, m: &Measurements, dt: f32) -> CascadeOutput {
        let filtered_current = self.current_filter.update(m.iq, dt);
        let uq = self.current.update(current_ref - filtered_current, dt);
        CascadeOutput {
            velocity_ref: 0.0,
            current_ref,
            uq,
            filtered_velocity: 0.0,
            filtered_current,
        }
    }

    /// Retune one loop between ticks; controller state is kept.
    pub fn set_gains(&mut self, select: LoopSelect, gains: crate::config::PidGains) {
        match select {
            LoopSelect::Position => self.position.set_gains(gains),
            LoopSelect::Velocity => self.velocity.set_gains(gains),
            LoopSelect::Current => self.current.set_gains(gains),
        }
    }

    pub fn gains(&self) -> ControllerGains {
        ControllerGains {
            position: self.position.gains(),
            velocity: self.velocity.gains(),
            current: self.current.gains(),
        }
    }

    pub fn reset(&mut self) {
        self.position.reset();
        self.velocity.reset();
        self.current.reset();
        self.velocity_filter.reset();
        self.current_filter.reset();
    }
}
