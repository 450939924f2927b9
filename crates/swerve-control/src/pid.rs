//! PID Controller - 单轴比例-积分-微分控制器
//!
//! ```text
//! output = Kp * e + Ki * ∫e dt + Kd * de/dt + feedforward
//! ```
//!
//! # 特性
//!
//! - **角度环绕**: `set_wrap(period)` 后误差被折叠到 (-period/2, period/2]，总是走最短路径
//! - **积分区间**: 仅在 |e| < izone 时累积积分，防止积分饱和
//! - **稳定判定**: `is_stable` 基于最近一次测量值与当前设定值实时计算误差，
//!   设定值改变后立即反映
//! - **dt 异常处理**: `dt` 为零时只输出前馈，不修改积分项
//!
//! 控制器本身是无单位的（f64），调用方负责传入一致的单位。

use std::time::Duration;

use tracing::warn;

/// PID 增益与稳定阈值
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PidGains {
    /// 比例增益 (Kp)
    pub kp: f64,
    /// 积分增益 (Ki)
    pub ki: f64,
    /// 微分增益 (Kd)
    pub kd: f64,
    /// 积分区间：|e| 超过该值时不累积积分（`None` 表示总是累积）
    pub izone: Option<f64>,
    /// 稳定判定的误差阈值
    pub stable_error: f64,
    /// 稳定判定的误差变化率阈值
    pub stable_derivative: f64,
}

impl PidGains {
    /// 只设置增益，稳定阈值为无穷大
    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            izone: None,
            stable_error: f64::INFINITY,
            stable_derivative: f64::INFINITY,
        }
    }

    pub const fn with_izone(mut self, izone: f64) -> Self {
        self.izone = Some(izone);
        self
    }

    pub const fn with_stability(mut self, stable_error: f64, stable_derivative: f64) -> Self {
        self.stable_error = stable_error;
        self.stable_derivative = stable_derivative;
        self
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// 单轴 PID 控制器
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    setpoint: f64,
    /// 环绕周期（角度控制时为 2π）
    wrap: Option<f64>,
    integral: f64,
    last_error: Option<f64>,
    last_derivative: f64,
    last_measurement: Option<f64>,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            setpoint: 0.0,
            wrap: None,
            integral: 0.0,
            last_error: None,
            last_derivative: 0.0,
            last_measurement: None,
        }
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// 启用误差环绕
    pub fn set_wrap(&mut self, period: f64) {
        self.wrap = Some(period);
    }

    /// 当前积分项累积值
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// 基于最近一次测量值的误差（尚未测量时为 `None`）
    pub fn error(&self) -> Option<f64> {
        self.last_measurement.map(|m| self.wrap_error(self.setpoint - m))
    }

    pub fn calculate(&mut self, measurement: f64, dt: Duration) -> f64 {
        self.calculate_with_feedforward(measurement, dt, 0.0)
    }

    pub fn calculate_with_feedforward(
        &mut self,
        measurement: f64,
        dt: Duration,
        feedforward: f64,
    ) -> f64 {
        let dt_sec = dt.as_secs_f64();
        let error = self.wrap_error(self.setpoint - measurement);
        self.last_measurement = Some(measurement);

        // 防止除零
        if dt_sec <= 0.0 {
            warn!(?dt, "PID controller received zero dt, returning feedforward only");
            return feedforward;
        }

        let within_izone = self.gains.izone.is_none_or(|izone| error.abs() < izone);
        if within_izone {
            self.integral += error * dt_sec;
        }

        let derivative = match self.last_error {
            Some(last) => (error - last) / dt_sec,
            None => 0.0,
        };
        self.last_error = Some(error);
        self.last_derivative = derivative;

        self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative
            + feedforward
    }

    /// 完全重置控制器状态（积分、微分历史、最近测量值）
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
        self.last_derivative = 0.0;
        self.last_measurement = None;
    }

    /// 是否稳定在设定值附近
    ///
    /// `tolerance` 为 `None` 时使用 `stable_error`。尚未测量过时返回 `false`。
    pub fn is_stable(&self, tolerance: Option<f64>) -> bool {
        let threshold = tolerance.unwrap_or(self.gains.stable_error);
        match self.error() {
            Some(error) => {
                error.abs() < threshold && self.last_derivative.abs() < self.gains.stable_derivative
            },
            None => false,
        }
    }

    fn wrap_error(&self, error: f64) -> f64 {
        match self.wrap {
            Some(period) if period > 0.0 => {
                let half = period / 2.0;
                let wrapped = error.rem_euclid(period);
                if wrapped > half { wrapped - period } else { wrapped }
            },
            _ => error,
        }
    }
}
