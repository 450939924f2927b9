//! 仿真层错误类型定义

use swerve_control::ControlError;
use swerve_hal::HalError;
use thiserror::Error;

/// 仿真层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// 硬件抽象层错误
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// 控制层错误
    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    /// 物理参数无效
    #[error("Invalid simulation parameter '{param}': {reason}")]
    InvalidParameter {
        /// 参数名
        param: &'static str,
        /// 原因
        reason: String,
    },
}
