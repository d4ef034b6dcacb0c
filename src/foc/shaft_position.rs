//! シャフト位置管理モジュール
//!
//! 絶対角センサーの0/2π境界の跨ぎを検出し、
//! 1回転内の角度と符号付き回転数を保持します。

use core::f32::consts::TAU;

/// シャフトの位置を表す構造体
/// 角度（0～2π rad）と回転数（正または負の整数）を保持
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaftPosition {
    /// 現在の角度 [rad] (0 ≤ angle < TAU)
    pub angle: f32,
    /// 回転数（正: 正転、負: 逆転）
    pub rotations: i32,
    prev_angle: f32,
    prev_rotations: i32,
}

impl ShaftPosition {
    /// ゼロ位置
    pub const fn new() -> Self {
        Self {
            angle: 0.0,
            rotations: 0,
            prev_angle: 0.0,
            prev_rotations: 0,
        }
    }

    /// 最初のセンサー値から開始（回転履歴なし）
    pub fn starting_at(sensor_angle: f32) -> Self {
        let angle = super::transforms::normalize_angle(sensor_angle);
        Self {
            angle,
            rotations: 0,
            prev_angle: angle,
            prev_rotations: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// センサー角度から位置を更新
    ///
    /// # Arguments
    /// * `sensor_angle` - センサー角度 [rad]
    pub fn update_shaft_angle(&mut self, sensor_angle: f32) {
        let sensor_angle = super::transforms::normalize_angle(sensor_angle);

        self.prev_angle = self.angle;
        self.prev_rotations = self.rotations;

        // 半回転を超える変化は境界の跨ぎとみなす
        let delta = sensor_angle - self.angle;
        if delta < -TAU / 2.0 {
            self.rotations += 1;
        } else if delta > TAU / 2.0 {
            self.rotations -= 1;
        }

        self.angle = sensor_angle;
    }

    /// 総位置（回転数 × TAU + 角度）[rad]
    pub fn position(&self) -> f32 {
        self.rotations as f32 * TAU + self.angle
    }

    /// 前回更新からの位置変化 [rad]
    pub fn delta(&self) -> f32 {
        (self.rotations - self.prev_rotations) as f32 * TAU + (self.angle - self.prev_angle)
    }
}

impl Default for ShaftPosition {
    fn default() -> Self {
        Self::new()
    }
}
