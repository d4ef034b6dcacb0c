//! Shared motor setpoint.
//!
//! The command decoder and the text console write the setpoint, the control
//! tick reads and clears it. Value, unit and dirty flag live in one cell
//! behind one lock so a reader never sees a half-written command.

use core::cell::Cell;
use core::f32::consts::PI;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::config::params::protocol::{SETPOINT_EPSILON, TARGET_EPSILON};
use crate::foc::ControlMode;

/// Unit the stored value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetpointUnit {
    /// Joint angle in degrees, as sent over the link.
    LinkAngle,
    /// Joint velocity in deg/s, as sent over the link.
    Velocity,
    /// q-axis current in amperes.
    Current,
    /// Motor shaft angle in radians, used as is.
    NativeRadians,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setpoint {
    pub value: f32,
    pub unit: SetpointUnit,
}

impl Setpoint {
    pub const fn new(value: f32, unit: SetpointUnit) -> Self {
        Self { value, unit }
    }
}

#[derive(Debug, Clone, Copy)]
struct SetpointSlot {
    setpoint: Setpoint,
    dirty: bool,
}

/// Result of [`SetpointCell::offer`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Offer {
    /// The value differed from the stored one and is now pending.
    Updated(Setpoint),
    /// Repeat of the stored value; nothing changed.
    Unchanged(Setpoint),
}

impl Offer {
    /// The setpoint stored after the offer.
    pub fn stored(&self) -> Setpoint {
        match *self {
            Offer::Updated(sp) | Offer::Unchanged(sp) => sp,
        }
    }
}

pub struct SetpointCell<M: RawMutex> {
    slot: Mutex<M, Cell<SetpointSlot>>,
}

impl<M: RawMutex> SetpointCell<M> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(Cell::new(SetpointSlot {
                setpoint: Setpoint::new(0.0, SetpointUnit::LinkAngle),
                dirty: false,
            })),
        }
    }

    /// Store `value` only if it differs from the stored value by more than
    /// the de-duplication epsilon or its unit changed. A stale repeat leaves
    /// the dirty flag as it was.
    pub fn offer(&self, value: f32, unit: SetpointUnit) -> Offer {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            let changed = (value - slot.setpoint.value).abs() > SETPOINT_EPSILON
                || unit != slot.setpoint.unit;
            if !changed {
                return Offer::Unchanged(slot.setpoint);
            }
            slot.setpoint = Setpoint::new(value, unit);
            slot.dirty = true;
            cell.set(slot);
            Offer::Updated(slot.setpoint)
        })
    }

    /// Store `value` unconditionally and mark it pending.
    pub fn store(&self, value: f32, unit: SetpointUnit) {
        self.slot.lock(|cell| {
            cell.set(SetpointSlot {
                setpoint: Setpoint::new(value, unit),
                dirty: true,
            })
        })
    }

    /// Read and clear the pending setpoint.
    pub fn take(&self) -> Option<Setpoint> {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            if !slot.dirty {
                return None;
            }
            slot.dirty = false;
            cell.set(slot);
            Some(slot.setpoint)
        })
    }

    pub fn current(&self) -> Setpoint {
        self.slot.lock(|cell| cell.get().setpoint)
    }

    pub fn is_dirty(&self) -> bool {
        self.slot.lock(|cell| cell.get().dirty)
    }
}

impl<M: RawMutex> Default for SetpointCell<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Target for the cascade in pipeline-native units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Target {
    pub value: f32,
    pub mode: ControlMode,
}

/// Converts link-unit setpoints into motor-shaft targets through the gearbox.
pub struct TargetConverter {
    gear_ratio: f32,
    last: Option<Target>,
}

impl TargetConverter {
    pub const fn new(gear_ratio: f32) -> Self {
        Self {
            gear_ratio,
            last: None,
        }
    }

    /// Convert a setpoint
    ///
    /// # Returns
    /// * `Some(target)` when the converted target is new
    /// * `None` when it is within `1e-4` of the previous target in the same
    ///   mode, in which case the previous target stays active
    pub fn convert(&mut self, setpoint: Setpoint) -> Option<Target> {
        let target = match setpoint.unit {
            SetpointUnit::LinkAngle => Target {
                value: setpoint.value * self.gear_ratio * PI / 180.0,
                mode: ControlMode::Position,
            },
            SetpointUnit::Velocity => Target {
                value: setpoint.value * self.gear_ratio * PI / 180.0,
                mode: ControlMode::Velocity,
            },
            SetpointUnit::Current => Target {
                value: setpoint.value,
                mode: ControlMode::Torque,
            },
            SetpointUnit::NativeRadians => Target {
                value: setpoint.value,
                mode: ControlMode::Position,
            },
        };

        if let Some(last) = self.last {
            if last.mode == target.mode && (target.value - last.value).abs() <= TARGET_EPSILON {
                return None;
            }
        }

        self.last = Some(target);
        Some(target)
    }

    /// Last accepted target
    pub fn last(&self) -> Option<Target> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type TestCell = SetpointCell<CriticalSectionRawMutex>;

    #[test]
    fn test_offer_sets_dirty() {
        let cell = TestCell::new();
        assert!(!cell.is_dirty());
        let offer = cell.offer(10.0, SetpointUnit::LinkAngle);
        assert_eq!(offer, Offer::Updated(Setpoint::new(10.0, SetpointUnit::LinkAngle)));
        assert!(cell.is_dirty());
    }

    #[test]
    fn test_stale_repeat_does_not_rearm() {
        let cell = TestCell::new();
        cell.offer(10.0, SetpointUnit::LinkAngle);
        assert!(cell.take().is_some());

        let offer = cell.offer(10.0005, SetpointUnit::LinkAngle);
        assert!(matches!(offer, Offer::Unchanged(_)));
        assert!(!cell.is_dirty());
        assert_eq!(cell.current().value, 10.0);
    }

    #[test]
    fn test_stale_repeat_keeps_pending() {
        let cell = TestCell::new();
        cell.offer(10.0, SetpointUnit::LinkAngle);
        cell.offer(10.0, SetpointUnit::LinkAngle);
        assert!(cell.is_dirty());
    }

    #[test]
    fn test_unit_change_is_new_command() {
        let cell = TestCell::new();
        cell.offer(5.0, SetpointUnit::LinkAngle);
        cell.take();
        assert!(matches!(cell.offer(5.0, SetpointUnit::Current), Offer::Updated(_)));
    }

    #[test]
    fn test_take_clears() {
        let cell = TestCell::new();
        cell.store(1.5, SetpointUnit::NativeRadians);
        assert_eq!(cell.take(), Some(Setpoint::new(1.5, SetpointUnit::NativeRadians)));
        assert_eq!(cell.take(), None);
    }

    #[test]
    fn test_store_is_unconditional() {
        let cell = TestCell::new();
        cell.store(0.0, SetpointUnit::LinkAngle);
        assert!(cell.is_dirty());
    }

    #[test]
    fn test_convert_angle_through_gearbox() {
        let mut conv = TargetConverter::new(225.0);
        let target = conv
            .convert(Setpoint::new(10.0, SetpointUnit::LinkAngle))
            .unwrap();
        assert_eq!(target.mode, ControlMode::Position);
        assert!((target.value - 10.0 * 225.0 * PI / 180.0).abs() < 1e-3);
    }

    #[test]
    fn test_convert_dedups_small_changes() {
        let mut conv = TargetConverter::new(225.0);
        assert!(conv.convert(Setpoint::new(1.0, SetpointUnit::NativeRadians)).is_some());
        assert!(conv.convert(Setpoint::new(1.00005, SetpointUnit::NativeRadians)).is_none());
        assert!(conv.convert(Setpoint::new(1.001, SetpointUnit::NativeRadians)).is_some());
    }

    #[test]
    fn test_convert_velocity_and_current() {
        let mut conv = TargetConverter::new(225.0);
        let v = conv.convert(Setpoint::new(2.0, SetpointUnit::Velocity)).unwrap();
        assert_eq!(v.mode, ControlMode::Velocity);
        // Motor shaft rad/s, same unit as the measured velocity
        assert!((v.value - 2.0 * 225.0 * PI / 180.0).abs() < 1e-3);
        let c = conv.convert(Setpoint::new(0.5, SetpointUnit::Current)).unwrap();
        assert_eq!(c, Target { value: 0.5, mode: ControlMode::Torque });
    }
}
