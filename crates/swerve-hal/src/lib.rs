//! # Swerve HAL - 硬件抽象层
//!
//! 控制核心与具体硬件驱动之间的边界。
//!
//! ## 包含模块
//!
//! - `units` - 强类型单位
//! - `encoder` - 旋转传感器（零偏、减速比、仿真来源）
//! - `motor` - 直流电机模型、电压执行器
//! - `gyro` - 航向来源
//! - `telemetry` - 遥测句柄
//!
//! ## Feature Flags
//!
//! - `serde` - 单位与电机模型的序列化支持

pub mod encoder;
pub mod error;
pub mod gyro;
pub mod motor;
pub mod telemetry;
pub mod units;

// 重新导出常用类型
pub use encoder::{RotarySensor, SensorKind, SensorSource, SimSensorHandle, TickSource};
pub use error::HalError;
pub use gyro::{FixedHeading, HeadingSource};
pub use motor::{DcMotor, MotorChannel, VoltageActuator};
pub use telemetry::{MemorySink, NullSink, Telemetry, TelemetrySink, TracingSink};
pub use units::*;
