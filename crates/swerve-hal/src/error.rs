//! 硬件抽象层错误类型定义

use thiserror::Error;

/// 硬件抽象层错误类型
///
/// 只覆盖构造期/配置期的前置条件违例；控制周期内的运算不会失败。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HalError {
    /// 每转脉冲数无效（必须为正）
    #[error("Invalid ticks per revolution: {0} (must be > 0)")]
    InvalidTicksPerRevolution(f64),

    /// 减速比无效（必须为正）
    #[error("Invalid gear reduction: {0} (must be > 0)")]
    InvalidReduction(f64),

    /// 电机参数无效
    #[error("Invalid motor parameter '{param}': {reason}")]
    InvalidMotorParameter {
        /// 参数名
        param: &'static str,
        /// 原因
        reason: String,
    },
}
