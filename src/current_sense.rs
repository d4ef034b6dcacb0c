//! Inline shunt current sensing.
//!
//! Phase currents are read as amplified shunt voltages. The amplifier output
//! sits on a bias voltage that is measured once with the motor unpowered and
//! subtracted from every later sample.

use crate::config::CurrentSenseConfig;
use crate::hal::{AdcChannel, VoltageSource};
use embedded_hal::delay::DelayNs;

/// Phase currents [A]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseCurrents {
    pub a: f32,
    pub b: f32,
    /// `0.0` when phase C is not wired
    pub c: f32,
}

/// Per-phase zero-current bias [V]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationOffsets {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

pub struct InlineCurrentSense<V> {
    adc: V,
    config: CurrentSenseConfig,
    gain: f32,
    offsets: CalibrationOffsets,
    calibrated: bool,
    warned_uncalibrated: bool,
}

impl<V: VoltageSource> InlineCurrentSense<V> {
    pub fn new(adc: V, config: CurrentSenseConfig) -> Self {
        Self {
            adc,
            gain: config.volts_to_amps(),
            config,
            offsets: CalibrationOffsets::default(),
            calibrated: false,
            warned_uncalibrated: false,
        }
    }

    /// Measure the zero-current bias of every wired channel
    ///
    /// Must run while the motor is unpowered. Takes
    /// `calibration_samples` readings per channel with `sample_delay_us`
    /// between them and stores their mean.
    pub fn calibrate<D: DelayNs>(&mut self, delay: &mut D) {
        let rounds = self.config.calibration_samples.max(1);
        info!("Current sense: calibrating offsets over {} samples", rounds);

        let mut sum = CalibrationOffsets::default();
        for _ in 0..rounds {
            sum.a += self.adc.read_voltage(AdcChannel::PhaseA);
            sum.b += self.adc.read_voltage(AdcChannel::PhaseB);
            if self.config.phase_c_wired {
                sum.c += self.adc.read_voltage(AdcChannel::PhaseC);
            }
            delay.delay_us(self.config.sample_delay_us);
        }

        let n = rounds as f32;
        self.offsets = CalibrationOffsets {
            a: sum.a / n,
            b: sum.b / n,
            c: sum.c / n,
        };
        self.calibrated = true;

        info!(
            "Current sense offsets: a={} V, b={} V, c={} V",
            self.offsets.a,
            self.offsets.b,
            self.offsets.c
        );
    }

    /// Read the phase currents
    pub fn sample(&mut self) -> PhaseCurrents {
        if !self.calibrated && !self.warned_uncalibrated {
            warn!("Current sense sampled before calibration");
            self.warned_uncalibrated = true;
        }

        let a = (self.adc.read_voltage(AdcChannel::PhaseA) - self.offsets.a) * self.gain;
        let b = (self.adc.read_voltage(AdcChannel::PhaseB) - self.offsets.b) * self.gain;
        let c = if self.config.phase_c_wired {
            (self.adc.read_voltage(AdcChannel::PhaseC) - self.offsets.c) * self.gain
        } else {
            0.0
        };

        PhaseCurrents { a, b, c }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn offsets(&self) -> CalibrationOffsets {
        self.offsets
    }

    pub fn adc_mut(&mut self) -> &mut V {
        &mut self.adc
    }
}
