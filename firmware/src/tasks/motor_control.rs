//! モーター制御タスク
//!
//! 設定周期で制御ティックを実行し、1秒ごとに状態をログ出力します。

use dfoc_node::{ControlError, MotorControl};
use embassy_stm32::{i2c::I2c, mode::Blocking};
use embassy_time::{Duration, Instant, Ticker};

use crate::hardware::{AdcVoltageSource, As5600, PwmDutySink};
use crate::state::SETPOINT;

pub type NodeControl = MotorControl<AdcVoltageSource, PwmDutySink, As5600<I2c<'static, Blocking>>>;

/// モーター制御タスク（`control` はキャリブレーション済みであること）
#[embassy_executor::task]
pub async fn motor_control_task(mut control: NodeControl) {
    let period_us = control.config().control_period_us;
    let nominal_dt = control.config().control_period_s();
    let ticks_per_log = (1_000_000 / period_us).max(1);

    info!(
        "Motor control task started: {}Hz, pole pairs={}, gear ratio={}",
        1_000_000 / period_us,
        control.config().pole_pairs,
        control.config().gear_ratio
    );

    let mut ticker = Ticker::every(Duration::from_micros(period_us));
    let mut last = Instant::now();
    let mut count = 0u64;
    let mut held_off = false;

    loop {
        ticker.next().await;

        let now = Instant::now();
        let elapsed = (now - last).as_micros() as f32 / 1_000_000.0;
        last = now;
        // 停止明けの最初のティックで巨大なdtを使わない
        let dt = if elapsed > 0.0 && elapsed < 10.0 * nominal_dt {
            elapsed
        } else {
            nominal_dt
        };

        match control.tick(dt, &SETPOINT) {
            Ok(report) => {
                count += 1;
                if count % ticks_per_log == 0 {
                    debug!(
                        "target={} ({}) angle={} vel={} iq={} uq={}",
                        report.target.value,
                        report.target.mode,
                        report.measured_angle,
                        report.measured_velocity,
                        report.measured_current,
                        report.uq
                    );
                }
            }
            Err(ControlError::NotCalibrated) => {
                if !held_off {
                    error!("Control tick without calibration, motor held off");
                    held_off = true;
                }
            }
        }
    }
}
