//! 控制层错误类型定义

use swerve_hal::HalError;
use thiserror::Error;

/// 控制层错误类型
///
/// 全部是构造期或 setter 调用时的前置条件违例，控制周期内不会产生错误。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// 硬件抽象层错误
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    /// 模块索引越界
    #[error("Invalid module index {index} (module count: {count})")]
    InvalidModuleIndex {
        /// 请求的索引
        index: usize,
        /// 模块数量
        count: usize,
    },

    /// 几何参数无效
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// 参数无效
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// 参数名
        param: &'static str,
        /// 原因
        reason: String,
    },
}
