//! Angle and velocity adapter over an absolute angle source.

use super::shaft_position::ShaftPosition;
use crate::hal::AngleSource;

const FALLBACK_DT: f32 = 1e-3;

/// Mechanical angle, multi-turn angle and velocity of the motor shaft
///
/// Values are sampled by [`AngleSensor::refresh`] and stay constant between
/// refreshes, so every consumer in one control tick sees the same reading.
pub struct AngleSensor<S> {
    source: S,
    shaft: ShaftPosition,
    velocity: f32,
    initialized: bool,
}

impl<S: AngleSource> AngleSensor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            shaft: ShaftPosition::new(),
            velocity: 0.0,
            initialized: false,
        }
    }

    /// Sample the sensor and update velocity
    ///
    /// # Arguments
    /// * `dt` - Time since the previous refresh [s]
    pub fn refresh(&mut self, dt: f32) {
        let raw = self.source.read_angle();

        if !self.initialized {
            self.shaft = ShaftPosition::starting_at(raw);
            self.velocity = 0.0;
            self.initialized = true;
            return;
        }

        let dt = if dt.is_finite() && dt > 0.0 { dt } else { FALLBACK_DT };
        self.shaft.update_shaft_angle(raw);
        self.velocity = self.shaft.delta() / dt;
    }

    /// Single-turn mechanical angle [rad] in `[0, 2π)`
    pub fn mechanical_angle(&self) -> f32 {
        self.shaft.angle
    }

    /// Multi-turn shaft angle [rad]
    pub fn angle(&self) -> f32 {
        self.shaft.position()
    }

    /// Shaft velocity [rad/s]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}
