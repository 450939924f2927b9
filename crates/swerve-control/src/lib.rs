//! # Swerve Control - 控制核心
//!
//! 四轮独立转向底盘的运动控制：单模块控制律、底盘模式状态机、运动学与位姿估计。
//!
//! ## 包含模块
//!
//! - `geometry` - 位姿、速度、模块状态等平面几何类型
//! - `pid` - 单轴 PID 控制器
//! - `kinematics` - 逆/正运动学
//! - `estimator` - 轮式里程计与视觉融合位姿估计
//! - `module` - 单个转向模块（控制律与电压限幅）
//! - `drive` - 底盘协调器（模式状态机）
//!
//! ## 执行模型
//!
//! 单线程、周期驱动：宿主在每个固定周期调用一次 [`SwerveDrive::on_update`]，
//! 内部没有线程、阻塞 I/O 或回调。
//!
//! ## Feature Flags
//!
//! - `serde` - 配置类型的序列化支持

pub mod drive;
pub mod error;
pub mod estimator;
pub mod geometry;
pub mod kinematics;
pub mod module;
pub mod pid;

/// 底盘模块数量
pub const MODULE_COUNT: usize = 4;

// 重新导出常用类型
pub use drive::{
    DriveMode, SwerveDrive, SwerveDriveConfig, field_to_chassis, tuning_states, x_wheel_states,
};
pub use error::ControlError;
pub use estimator::{SwerveOdometry, SwervePoseEstimator};
pub use geometry::{
    ChassisSpeeds, FieldRelativeSpeeds, ModulePosition, ModuleState, Pose2d, Rotation2d,
    Transform2d, Translation2d, Twist2d,
};
pub use kinematics::SwerveKinematics;
pub use module::{
    ModuleControlState, ModuleLimits, SwerveModule, SwerveModuleConfig, shortest_path_target,
};
pub use pid::{PidController, PidGains};
