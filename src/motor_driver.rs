//! モータードライバ抽象化レイヤー
//!
//! 電気角とq軸電圧指令から3相デューティを計算し、
//! [`DutyCycleSink`] 経由でPWMハードウェアに渡します。

use crate::foc::pwm::{calculate_sinusoidal_pwm, clamp_phase_voltages};
use crate::foc::transforms::{inverse_clarke, inverse_park};
use crate::hal::{DutyCycleSink, Phase};

/// 3相モータードライバ
pub struct MotorDriver<P> {
    pwm: P,
    supply_voltage: f32,
    phase_voltages: (f32, f32, f32),
    duties: (f32, f32, f32),
}

impl<P: DutyCycleSink> MotorDriver<P> {
    /// # Arguments
    /// * `pwm` - PWM出力
    /// * `supply_voltage` - 電源電圧 [V]
    pub fn new(pwm: P, supply_voltage: f32) -> Self {
        Self {
            pwm,
            supply_voltage,
            phase_voltages: (0.0, 0.0, 0.0),
            duties: (0.0, 0.0, 0.0),
        }
    }

    pub fn supply_voltage(&self) -> f32 {
        self.supply_voltage
    }

    /// 電気角にq軸電圧を印加
    ///
    /// # Arguments
    /// * `uq` - q軸電圧 [V]（±電源電圧/2 に制限）
    /// * `electrical_angle` - 電気角 [rad]（範囲不問）
    pub fn set_torque(&mut self, uq: f32, electrical_angle: f32) {
        let v_dc = self.supply_voltage;
        let half = v_dc / 2.0;
        let uq = if uq.is_finite() { uq.clamp(-half, half) } else { 0.0 };

        let (u_alpha, u_beta) = inverse_park(uq, electrical_angle);
        let (u_a, u_b, u_c) = inverse_clarke(u_alpha, u_beta, v_dc);

        self.phase_voltages = clamp_phase_voltages(u_a, u_b, u_c, v_dc);
        let (v_a, v_b, v_c) = self.phase_voltages;
        let duties = calculate_sinusoidal_pwm(v_a, v_b, v_c, v_dc);
        self.set_duty_abc(duties);
    }

    /// 3相のデューティを設定
    pub fn set_duty_abc(&mut self, duties: (f32, f32, f32)) {
        self.duties = duties;
        self.pwm.write_duty_cycle(Phase::A, duties.0);
        self.pwm.write_duty_cycle(Phase::B, duties.1);
        self.pwm.write_duty_cycle(Phase::C, duties.2);
    }

    /// 全相のデューティを0に設定
    pub fn stop(&mut self) {
        self.phase_voltages = (0.0, 0.0, 0.0);
        self.set_duty_abc((0.0, 0.0, 0.0));
    }

    /// Phase voltages [V] of the last [`MotorDriver::set_torque`]
    pub fn last_phase_voltages(&self) -> (f32, f32, f32) {
        self.phase_voltages
    }

    pub fn last_duties(&self) -> (f32, f32, f32) {
        self.duties
    }

    pub fn pwm_mut(&mut self) -> &mut P {
        &mut self.pwm
    }
}
