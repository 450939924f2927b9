//! # Swerve Sim - 底盘物理仿真
//!
//! 在没有真实硬件时，为同一套控制代码闭环。
//!
//! ## 包含模块
//!
//! - `actuator` - 仿真执行器、仿真陀螺仪及其句柄
//! - `simulator` - 显式欧拉积分的底盘动力学
//! - `builder` - 装配 `SwerveDrive` 与仿真器
//!
//! ## 使用示例
//!
//! ```rust
//! use swerve_control::ChassisSpeeds;
//! use swerve_hal::{MetersPerSec, RadPerSec, Telemetry};
//! use swerve_sim::{SimulatedDrivetrain, SimulatedDrivetrainParams};
//!
//! let params = SimulatedDrivetrainParams::default();
//! let (mut drive, mut sim) = SimulatedDrivetrain::build(&params, Telemetry::disabled())?;
//! drive.on_start();
//! drive.set_velocity(ChassisSpeeds::new(MetersPerSec(1.0), MetersPerSec::ZERO, RadPerSec::ZERO));
//! for _ in 0..200 {
//!     drive.on_update(params.period);
//!     sim.update(params.period);
//! }
//! assert!(sim.pose().x().0 > 0.5);
//! # Ok::<(), swerve_sim::SimError>(())
//! ```

pub mod actuator;
pub mod builder;
pub mod error;
pub mod simulator;

pub use actuator::{SimActuator, SimActuatorHandle, SimGyro, SimGyroHandle};
pub use builder::{AxisParams, SimulatedDrivetrain, SimulatedDrivetrainParams};
pub use error::SimError;
pub use simulator::{DrivetrainSimulator, ModuleSimState, SimAxis, SimModule};
