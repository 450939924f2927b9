//! # 底盘配置文件
//!
//! 一个 TOML 文件描述一台底盘：几何、电机、增益、限幅、估计器和仿真参数。
//!
//! ```toml
//! [chassis]
//! mass = 50.0
//! wheel_radius = 0.05
//! period_ms = 5
//!
//! [[chassis.module_positions]]
//! x = 0.3
//! y = 0.3
//! # ... 共四个模块
//!
//! [drive_motor]
//! preset = "neo"
//! count = 1
//! reduction = 6.75
//! ticks_per_revolution = 42.0
//! ```
//!
//! 缺省的字段取 [`DrivetrainProfile::default_config`] 中的值。

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use swerve_control::{MODULE_COUNT, ModuleLimits, PidGains, Pose2d, SwerveDrive, Translation2d};
use swerve_hal::{
    DcMotor, KgMetersSq, Kilograms, Meters, MetersPerSecSq, Telemetry, Volt,
};
use swerve_sim::{AxisParams, DrivetrainSimulator, SimError, SimulatedDrivetrain, SimulatedDrivetrainParams};
use thiserror::Error;
use tracing::info;

/// 配置文件错误
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid profile field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Simulation setup failed: {0}")]
    Sim(#[from] SimError),
}

// ==================== 各配置段 ====================

/// 底盘几何与控制周期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisProfile {
    /// 整车质量
    pub mass: Kilograms,
    /// 车轮半径
    pub wheel_radius: Meters,
    /// 模块相对底盘中心的位置（x 向前，y 向左）
    pub module_positions: [Translation2d; MODULE_COUNT],
    /// 控制周期（毫秒）
    pub period_ms: u64,
}

impl Default for ChassisProfile {
    fn default() -> Self {
        Self {
            mass: Kilograms(50.0),
            wheel_radius: Meters(0.05),
            module_positions: [
                Translation2d::from_meters(0.3, 0.3),
                Translation2d::from_meters(0.3, -0.3),
                Translation2d::from_meters(-0.3, -0.3),
                Translation2d::from_meters(-0.3, 0.3),
            ],
            period_ms: 5,
        }
    }
}

/// 电机型号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorPreset {
    Neo,
    Neo550,
    Falcon500,
    KrakenX60,
}

impl MotorPreset {
    pub fn motor(self) -> DcMotor {
        match self {
            MotorPreset::Neo => DcMotor::neo(),
            MotorPreset::Neo550 => DcMotor::neo550(),
            MotorPreset::Falcon500 => DcMotor::falcon500(),
            MotorPreset::KrakenX60 => DcMotor::kraken_x60(),
        }
    }
}

/// 单个执行轴（驱动或转向）的电机配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorProfile {
    pub preset: MotorPreset,
    /// 并联电机数量
    #[serde(default = "default_motor_count")]
    pub count: u32,
    /// 减速比（电机转数 / 输出轴转数）
    pub reduction: f64,
    /// 电机侧编码器每转脉冲数
    pub ticks_per_revolution: f64,
}

fn default_motor_count() -> u32 {
    1
}

impl MotorProfile {
    fn drive_default() -> Self {
        Self {
            preset: MotorPreset::Neo,
            count: 1,
            reduction: 6.75,
            ticks_per_revolution: 42.0,
        }
    }

    fn steer_default() -> Self {
        Self {
            preset: MotorPreset::Neo,
            count: 1,
            reduction: 12.8,
            ticks_per_revolution: 42.0,
        }
    }

    fn to_axis(self) -> AxisParams {
        AxisParams {
            motor: self.preset.motor(),
            motor_count: self.count,
            reduction: self.reduction,
            ticks_per_revolution: self.ticks_per_revolution,
        }
    }

    fn validate(&self, section: &'static str) -> Result<(), ProfileError> {
        if self.count == 0 {
            return Err(invalid(section, "motor count must be at least 1".to_string()));
        }
        positive(section, "reduction", self.reduction)?;
        positive(section, "ticks_per_revolution", self.ticks_per_revolution)
    }
}

/// PID 增益
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GainsProfile {
    pub steer: PidGains,
    pub velocity: PidGains,
    pub pose_position: PidGains,
    pub pose_heading: PidGains,
}

impl Default for GainsProfile {
    fn default() -> Self {
        Self {
            steer: PidGains::new(4.0, 0.0, 0.0),
            velocity: PidGains::new(2.0, 0.0, 0.0),
            pose_position: PidGains::new(2.0, 0.0, 0.0),
            pose_heading: PidGains::new(3.0, 0.0, 0.0),
        }
    }
}

/// 模块限幅与位姿到达判定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsProfile {
    pub acceleration_limit: MetersPerSecSq,
    pub drive_voltage_limit: Volt,
    pub steer_ceiling: Volt,
    pub drive_ceiling: Volt,
    /// 位置容差（米）
    pub pose_position_tolerance: f64,
    /// 航向容差（弧度）
    pub pose_heading_tolerance: f64,
}

impl Default for LimitsProfile {
    fn default() -> Self {
        let module = ModuleLimits::default();
        Self {
            acceleration_limit: module.acceleration_limit,
            drive_voltage_limit: module.drive_voltage_limit,
            steer_ceiling: module.steer_ceiling,
            drive_ceiling: module.drive_ceiling,
            pose_position_tolerance: 0.05,
            pose_heading_tolerance: 0.05,
        }
    }
}

impl LimitsProfile {
    pub fn module_limits(&self) -> ModuleLimits {
        ModuleLimits {
            acceleration_limit: self.acceleration_limit,
            drive_voltage_limit: self.drive_voltage_limit,
            steer_ceiling: self.steer_ceiling,
            drive_ceiling: self.drive_ceiling,
        }
    }
}

/// 位姿估计器标准差（x, y, θ）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorProfile {
    pub state_std_devs: [f64; 3],
    pub vision_std_devs: [f64; 3],
}

impl Default for EstimatorProfile {
    fn default() -> Self {
        Self {
            state_std_devs: [0.1, 0.1, 0.1],
            vision_std_devs: [0.9, 0.9, 0.9],
        }
    }
}

/// 仿真参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimProfile {
    /// 单个模块转向部分的转动惯量
    pub module_inertia: KgMetersSq,
    pub battery_voltage: Volt,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            module_inertia: KgMetersSq(0.02),
            battery_voltage: Volt(12.0),
        }
    }
}

// ==================== 完整配置 ====================

/// 底盘配置文件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainProfile {
    #[serde(default)]
    pub chassis: ChassisProfile,
    #[serde(default = "MotorProfile::drive_default")]
    pub drive_motor: MotorProfile,
    #[serde(default = "MotorProfile::steer_default")]
    pub steer_motor: MotorProfile,
    #[serde(default)]
    pub gains: GainsProfile,
    #[serde(default)]
    pub limits: LimitsProfile,
    #[serde(default)]
    pub estimator: EstimatorProfile,
    #[serde(default)]
    pub sim: SimProfile,
}

impl Default for DrivetrainProfile {
    fn default() -> Self {
        Self::default_config()
    }
}

impl DrivetrainProfile {
    /// 创建默认配置：NEO 驱动 (6.75:1) + NEO 转向 (12.8:1)，0.6 m 方形底盘，50 kg
    pub fn default_config() -> Self {
        Self {
            chassis: ChassisProfile::default(),
            drive_motor: MotorProfile::drive_default(),
            steer_motor: MotorProfile::steer_default(),
            gains: GainsProfile::default(),
            limits: LimitsProfile::default(),
            estimator: EstimatorProfile::default(),
            sim: SimProfile::default(),
        }
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        let profile: Self = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn to_toml_string(&self) -> Result<String, ProfileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 从文件加载配置（加载后立即校验）
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let profile = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Drivetrain profile loaded");
        Ok(profile)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProfileError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?)?;
        info!(path = %path.display(), "Drivetrain profile saved");
        Ok(())
    }

    /// 控制周期
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.chassis.period_ms)
    }

    /// 校验配置
    ///
    /// 质量、轮半径、减速比、脉冲数、控制周期必须为正；
    /// 四个模块位置必须互不相同。
    pub fn validate(&self) -> Result<(), ProfileError> {
        positive("chassis", "mass", self.chassis.mass.0)?;
        positive("chassis", "wheel_radius", self.chassis.wheel_radius.0)?;
        if self.chassis.period_ms == 0 {
            return Err(invalid("chassis", "period_ms must be positive".to_string()));
        }

        let positions = &self.chassis.module_positions;
        for (i, a) in positions.iter().enumerate() {
            if !(a.x.0.is_finite() && a.y.0.is_finite()) {
                return Err(invalid(
                    "chassis",
                    format!("module {i} position is not finite"),
                ));
            }
            for (j, b) in positions.iter().enumerate().skip(i + 1) {
                if a == b {
                    return Err(invalid(
                        "chassis",
                        format!("modules {i} and {j} share position ({}, {})", a.x.0, a.y.0),
                    ));
                }
            }
        }

        self.drive_motor.validate("drive_motor")?;
        self.steer_motor.validate("steer_motor")?;

        self.limits
            .module_limits()
            .validate()
            .map_err(|e| invalid("limits", e.to_string()))?;
        positive("limits", "pose_position_tolerance", self.limits.pose_position_tolerance)?;
        positive("limits", "pose_heading_tolerance", self.limits.pose_heading_tolerance)?;

        for std_dev in self
            .estimator
            .state_std_devs
            .iter()
            .chain(self.estimator.vision_std_devs.iter())
        {
            if !(*std_dev >= 0.0 && std_dev.is_finite()) {
                return Err(invalid(
                    "estimator",
                    format!("standard deviations must be non-negative, got {std_dev}"),
                ));
            }
        }

        positive("sim", "module_inertia", self.sim.module_inertia.0)?;
        positive("sim", "battery_voltage", self.sim.battery_voltage.0)
    }

    /// 转换为仿真底盘参数（先校验）
    pub fn to_sim_params(&self) -> Result<SimulatedDrivetrainParams, ProfileError> {
        self.validate()?;
        Ok(SimulatedDrivetrainParams {
            module_positions: self.chassis.module_positions,
            wheel_radius: self.chassis.wheel_radius,
            mass: self.chassis.mass,
            drive: self.drive_motor.to_axis(),
            steer: self.steer_motor.to_axis(),
            module_inertia: self.sim.module_inertia,
            battery_voltage: self.sim.battery_voltage,
            steer_gains: self.gains.steer,
            velocity_gains: self.gains.velocity,
            pose_position_gains: self.gains.pose_position,
            pose_heading_gains: self.gains.pose_heading,
            limits: self.limits.module_limits(),
            pose_position_tolerance: self.limits.pose_position_tolerance,
            pose_heading_tolerance: self.limits.pose_heading_tolerance,
            state_std_devs: self.estimator.state_std_devs,
            vision_std_devs: self.estimator.vision_std_devs,
            initial_pose: Pose2d::default(),
            period: self.period(),
        })
    }

    /// 按配置装配仿真底盘
    pub fn build_simulated(
        &self,
        telemetry: Telemetry,
    ) -> Result<(SwerveDrive, DrivetrainSimulator), ProfileError> {
        let params = self.to_sim_params()?;
        Ok(SimulatedDrivetrain::build(&params, telemetry)?)
    }
}

fn invalid(field: &'static str, reason: String) -> ProfileError {
    ProfileError::Invalid { field, reason }
}

fn positive(section: &'static str, name: &str, value: f64) -> Result<(), ProfileError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(section, format!("{name} must be positive, got {value}")))
    }
}
