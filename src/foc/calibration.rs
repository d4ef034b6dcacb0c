//! 電気角ゼロ点キャリブレーション
//!
//! 固定電圧でロータを既知の電気角に引き込み、静定後にセンサーから
//! 電気角を読み取って記録します。リトライなしの1回のみ実行。

use super::angle_sensor::AngleSensor;
use super::transforms::{Direction, ElectricalState};
use crate::config::params::alignment::REFERENCE_ANGLE;
use crate::config::AlignmentConfig;
use crate::hal::{AngleSource, DutyCycleSink};
use crate::motor_driver::MotorDriver;
use embedded_hal::delay::DelayNs;

/// キャリブレーション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationState {
    Idle,
    /// 引き込み電圧を印加中
    Aligning,
    /// 引き込み位置でセンサーを読み取り中
    Measuring,
    /// 引き込み電圧を解除中
    Releasing,
    Completed,
}

/// キャリブレーション結果
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationResult {
    /// 引き込み位置での電気角 [rad] (0 ≤ angle < 2π)
    pub zero_electric_angle: f32,
    pub pole_pairs: u8,
    pub direction: Direction,
}

impl CalibrationResult {
    pub fn electrical_state(&self) -> ElectricalState {
        ElectricalState {
            zero_electric_angle: self.zero_electric_angle,
            pole_pairs: self.pole_pairs,
            direction: self.direction,
        }
    }
}

pub struct ZeroAngleCalibration {
    state: CalibrationState,
    config: AlignmentConfig,
    result: Option<CalibrationResult>,
}

impl ZeroAngleCalibration {
    pub const fn new(config: AlignmentConfig) -> Self {
        Self {
            state: CalibrationState::Idle,
            config,
            result: None,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    pub fn result(&self) -> Option<CalibrationResult> {
        self.result
    }

    /// ゼロ点合わせを1回実行
    ///
    /// # Arguments
    /// * `driver` - ロータの保持と解放に使うモータードライバ
    /// * `sensor` - 角度センサー（引き込み位置で更新）
    /// * `pole_pairs` / `direction` - 電気角の計算に使う極対数と回転方向
    /// * `delay` - 静定待ち用のブロッキングディレイ
    ///
    /// # Returns
    /// 計測したゼロ電気角。完了済みの場合はモーターを動かさず保存済みの結果を返す
    pub fn run<P, S, D>(
        &mut self,
        driver: &mut MotorDriver<P>,
        sensor: &mut AngleSensor<S>,
        pole_pairs: u8,
        direction: Direction,
        delay: &mut D,
    ) -> CalibrationResult
    where
        P: DutyCycleSink,
        S: AngleSource,
        D: DelayNs,
    {
        if let Some(result) = self.result {
            return result;
        }

        self.state = CalibrationState::Aligning;
        info!(
            "Calibration: Aligning ({} V for {} ms)",
            self.config.hold_voltage,
            self.config.settle_ms
        );
        driver.set_torque(self.config.hold_voltage, REFERENCE_ANGLE);
        delay.delay_ms(self.config.settle_ms);

        self.state = CalibrationState::Measuring;
        info!("Calibration: Aligning -> Measuring");
        sensor.refresh(self.config.settle_ms as f32 / 1000.0);
        let unaligned = ElectricalState::new(pole_pairs, direction);
        let zero_electric_angle = unaligned.electrical_angle(sensor.mechanical_angle());

        self.state = CalibrationState::Releasing;
        info!("Calibration: Measuring -> Releasing");
        driver.set_torque(0.0, REFERENCE_ANGLE);

        let result = CalibrationResult {
            zero_electric_angle,
            pole_pairs,
            direction,
        };
        self.result = Some(result);
        self.state = CalibrationState::Completed;
        info!(
            "Calibration completed: zero electric angle {} rad",
            zero_electric_angle
        );

        result
    }
}
