//! デフォルトパラメータ
//!
//! モーター、制御ループ、通信プロトコルの定数を定義します。

use core::f32::consts::PI;

/// ブロードキャストリンク上のデバイスID
pub const DEFAULT_DEVICE_ID: u8 = 6;

/// 電源電圧 [V]
pub const DEFAULT_SUPPLY_VOLTAGE: f32 = 12.6;

/// モーター極対数
pub const DEFAULT_POLE_PAIRS: u8 = 7;

/// 減速比（モーター軸 : 関節）
pub const DEFAULT_GEAR_RATIO: f32 = 225.0;

/// q軸電流指令の上限 [A]
/// 速度ループ自身のリミットとは別に適用
pub const DEFAULT_CURRENT_LIMIT: f32 = 6.5;

/// 制御周期 [μs] (1 kHz)
pub const DEFAULT_CONTROL_PERIOD_US: u64 = 1_000;

/// 接続中のハートビート間隔 [ms]
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 5_000;

/// 位置ループゲイン（出力: 速度指令 [deg/s]）
pub mod position {
    pub const DEFAULT_P: f32 = 2.0;
    pub const DEFAULT_I: f32 = 0.0;
    pub const DEFAULT_D: f32 = 0.0;
    pub const DEFAULT_RAMP: f32 = 100_000.0;
    pub const DEFAULT_LIMIT: f32 = 100.0;
}

/// 速度ループゲイン（出力: q軸電流指令 [A]）
pub mod velocity {
    pub const DEFAULT_P: f32 = 2.0;
    pub const DEFAULT_I: f32 = 0.0;
    pub const DEFAULT_D: f32 = 0.0;
    pub const DEFAULT_RAMP: f32 = 100_000.0;
    pub const DEFAULT_LIMIT: f32 = super::DEFAULT_SUPPLY_VOLTAGE / 2.0;
}

/// 電流ループゲイン（出力: q軸電圧 [V]）
pub mod current {
    pub const DEFAULT_P: f32 = 1.2;
    pub const DEFAULT_I: f32 = 0.0;
    pub const DEFAULT_D: f32 = 0.0;
    pub const DEFAULT_RAMP: f32 = 100_000.0;
    pub const DEFAULT_LIMIT: f32 = 12.6;
}

/// 計測値ローパスフィルタの時定数 [s]
pub mod filters {
    pub const DEFAULT_VELOCITY_TF: f32 = 0.01;
    pub const DEFAULT_CURRENT_TF: f32 = 0.05;
}

/// インライン電流センス
pub mod current_sense {
    /// シャント抵抗 [Ω]
    pub const DEFAULT_SHUNT_RESISTOR: f32 = 0.01;
    /// 電流センスアンプのゲイン [V/V]
    pub const DEFAULT_AMP_GAIN: f32 = 50.0;
    /// ゼロオフセット算出のサンプル数（チャンネルごと）
    pub const DEFAULT_CALIBRATION_SAMPLES: u32 = 1_000;
    /// 受け付けるサンプル数の下限
    pub const MIN_CALIBRATION_SAMPLES: u32 = 500;
    /// サンプル間の待ち時間 [μs]
    pub const DEFAULT_SAMPLE_DELAY_US: u32 = 1_000;
    /// ADC基準電圧 [V]
    pub const ADC_VREF: f32 = 3.3;
    /// 12bit ADCフルスケール
    pub const ADC_FULL_SCALE: f32 = 4095.0;
}

/// 電気角ゼロ点合わせ
pub mod alignment {
    /// ロータ保持電圧 [V]
    pub const DEFAULT_HOLD_VOLTAGE: f32 = 3.0;
    /// 引き込み先の電気角 [rad]
    pub const REFERENCE_ANGLE: f32 = 3.0 * super::PI / 2.0;
    /// センサー読み取りまでの待ち時間 [ms]
    pub const DEFAULT_SETTLE_MS: u32 = 1_000;
}

/// 無線コマンドプロトコル
pub mod protocol {
    /// MULTIスライスの開始IDの上限
    pub const MAX_DEVICES: u8 = 20;
    /// 角度の固定小数点スケール (0.1°)
    pub const ANGLE_SCALE: f32 = 10.0;
    /// 速度の固定小数点スケール
    pub const VELOCITY_SCALE: f32 = 1.0;
    /// 電流の固定小数点スケール (mA)
    pub const CURRENT_SCALE: f32 = 1000.0;
    /// 新しい指令とみなす目標値の最小変化
    pub const SETPOINT_EPSILON: f32 = 0.001;
    /// 適用する変換後目標値の最小変化 [rad]
    pub const TARGET_EPSILON: f32 = 0.0001;
}

/// PWM出力
pub mod pwm {
    /// スイッチング周波数 [Hz]
    pub const DEFAULT_FREQUENCY_HZ: u32 = 30_000;
    /// デッドタイム（タイマーカウント）
    pub const DEFAULT_DEAD_TIME: u16 = 1;
}
