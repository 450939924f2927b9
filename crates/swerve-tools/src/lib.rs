//! # Swerve Tools - 共享配置
//!
//! **依赖原则**: 只依赖核心 crate，不包含任何运行循环
//!
//! ## 包含模块
//!
//! - `profile` - 底盘配置文件（TOML）的加载、保存与校验
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use swerve_hal::Telemetry;
//! use swerve_tools::DrivetrainProfile;
//!
//! let profile = DrivetrainProfile::load_from_file("drivetrain.toml")?;
//! let (drive, sim) = profile.build_simulated(Telemetry::disabled())?;
//! # Ok::<(), swerve_tools::ProfileError>(())
//! ```

pub mod profile;

pub use profile::{
    ChassisProfile, DrivetrainProfile, EstimatorProfile, GainsProfile, LimitsProfile,
    MotorPreset, MotorProfile, ProfileError, SimProfile,
};
