//! 底盘协调器
//!
//! 持有四个 [`SwerveModule`]、运动学变换、位姿估计器和三个位姿 PID，
//! 在每个周期开头根据当前 [`DriveMode`] 为各模块生成目标，再依次运行
//! 模块控制律和位姿估计。
//!
//! # 模式分层
//!
//! ```text
//! Pose ──pose_layer──► FieldRelativeSpeeds ──field_relative_layer──► ChassisSpeeds ──kinematics──► [ModuleState; 4]
//! ```
//!
//! 每一层是独立的函数，模式之间没有控制流穿透。

use std::f64::consts::TAU;
use std::mem;
use std::time::Duration;

use swerve_hal::{Deg, HeadingSource, MetersPerSec, MetersPerSecSq, Rad, RadPerSec, Telemetry, Volt};
use tracing::{debug, info, trace};

use crate::MODULE_COUNT;
use crate::error::ControlError;
use crate::estimator::SwervePoseEstimator;
use crate::geometry::{
    ChassisSpeeds, FieldRelativeSpeeds, ModulePosition, ModuleState, Pose2d, Translation2d,
};
use crate::kinematics::SwerveKinematics;
use crate::module::{ModuleLimits, SwerveModule, SwerveModuleConfig};
use crate::pid::{PidController, PidGains};

/// 底盘运行模式
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DriveMode {
    /// 所有模块零电压
    #[default]
    Idle,
    /// 所有模块回到零角度、零速度
    Zeroing,
    /// 机器人坐标系速度
    Velocity(ChassisSpeeds),
    /// 场地坐标系速度；`rotate_to_match` 时 omega 由航向 PID 给出
    FieldRelativeVelocity {
        speeds: FieldRelativeSpeeds,
        rotate_to_match: bool,
    },
    /// 场地坐标系平移，航向锁定在 `heading`
    FieldRelativeVelocityWithRotationLock {
        speeds: FieldRelativeSpeeds,
        heading: Rad,
    },
    /// 位姿保持
    Pose(Pose2d),
    /// 所有模块同一角度和速度（台架标定）
    Tuning { angle: Rad, speed: MetersPerSec },
    /// 单个模块的角度和速度（台架标定）
    IndividualTuning {
        module: usize,
        angle: Rad,
        speed: MetersPerSec,
    },
    /// X 形锁定
    XWheels,
}

/// 底盘配置
pub struct SwerveDriveConfig {
    /// 四个模块，顺序与运动学位置一致
    pub modules: [SwerveModuleConfig; MODULE_COUNT],
    pub steer_gains: PidGains,
    pub velocity_gains: PidGains,
    /// x / y 位姿 PID（m → m/s）
    pub pose_position_gains: PidGains,
    /// 航向 PID（rad → rad/s）
    pub pose_heading_gains: PidGains,
    pub limits: ModuleLimits,
    /// `is_at_set_pose` 的位置容差（米）
    pub pose_position_tolerance: f64,
    /// `is_at_set_pose` 的航向容差（弧度）
    pub pose_heading_tolerance: f64,
    /// 里程计标准差 (x, y, heading)
    pub state_std_devs: [f64; 3],
    /// 视觉测量标准差 (x, y, heading)
    pub vision_std_devs: [f64; 3],
    pub gyro: Box<dyn HeadingSource>,
    pub telemetry: Telemetry,
}

impl std::fmt::Debug for SwerveDriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwerveDriveConfig")
            .field("modules", &self.modules)
            .field("limits", &self.limits)
            .field("telemetry", &self.telemetry)
            .finish_non_exhaustive()
    }
}

/// X 形锁定时各模块角度
pub fn x_wheel_states() -> [ModuleState; MODULE_COUNT] {
    [45.0, 135.0, 315.0, 405.0].map(|deg| ModuleState::new(Deg(deg).to_rad(), MetersPerSec::ZERO))
}

/// 台架标定：所有模块同一状态
pub fn tuning_states(angle: Rad, speed: MetersPerSec) -> [ModuleState; MODULE_COUNT] {
    [ModuleState::new(angle, speed); MODULE_COUNT]
}

/// 场地坐标系速度 → 机器人坐标系速度，可选覆盖 omega
pub fn field_to_chassis(
    speeds: FieldRelativeSpeeds,
    heading: Rad,
    omega_override: Option<RadPerSec>,
) -> ChassisSpeeds {
    let mut chassis = speeds.to_chassis_speeds(heading);
    if let Some(omega) = omega_override {
        chassis.omega = omega;
    }
    chassis
}

/// 四轮转向底盘
pub struct SwerveDrive {
    modules: [SwerveModule; MODULE_COUNT],
    kinematics: SwerveKinematics,
    estimator: SwervePoseEstimator,
    x_pid: PidController,
    y_pid: PidController,
    heading_pid: PidController,
    pose_position_tolerance: f64,
    pose_heading_tolerance: f64,
    mode: DriveMode,
    gyro: Box<dyn HeadingSource>,
    clock: Duration,
    telemetry: Telemetry,
}

impl std::fmt::Debug for SwerveDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwerveDrive")
            .field("mode", &self.mode)
            .field("pose", &self.pose())
            .field("clock", &self.clock)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl SwerveDrive {
    /// 创建底盘并以 `initial_pose` 锚定位姿估计
    ///
    /// # 错误
    ///
    /// 模块配置无效或模块位置退化时返回错误。
    pub fn new(config: SwerveDriveConfig, initial_pose: Pose2d) -> Result<Self, ControlError> {
        let SwerveDriveConfig {
            modules,
            steer_gains,
            velocity_gains,
            pose_position_gains,
            pose_heading_gains,
            limits,
            pose_position_tolerance,
            pose_heading_tolerance,
            state_std_devs,
            vision_std_devs,
            gyro,
            telemetry,
        } = config;

        for (param, value) in [
            ("pose_position_tolerance", pose_position_tolerance),
            ("pose_heading_tolerance", pose_heading_tolerance),
        ] {
            if !(value > 0.0) {
                return Err(ControlError::InvalidParameter {
                    param,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }

        let kinematics = SwerveKinematics::new(modules.each_ref().map(|m| m.position))?;

        let mut built = Vec::with_capacity(MODULE_COUNT);
        for (i, module) in modules.into_iter().enumerate() {
            built.push(SwerveModule::new(
                module,
                steer_gains,
                velocity_gains,
                limits,
                telemetry.child(&format!("modules/{}", i + 1)),
            )?);
        }
        let modules: [SwerveModule; MODULE_COUNT] =
            built.try_into().map_err(|_| ControlError::InvalidGeometry(format!(
                "expected {MODULE_COUNT} modules"
            )))?;

        let positions = modules.each_ref().map(SwerveModule::position);
        let estimator = SwervePoseEstimator::new(
            kinematics.clone(),
            gyro.heading(),
            positions,
            initial_pose,
            state_std_devs,
            vision_std_devs,
        );

        let mut heading_pid = PidController::new(pose_heading_gains);
        heading_pid.set_wrap(TAU);

        let mut drive = Self {
            modules,
            kinematics,
            estimator,
            x_pid: PidController::new(pose_position_gains),
            y_pid: PidController::new(pose_position_gains),
            heading_pid,
            pose_position_tolerance,
            pose_heading_tolerance,
            mode: DriveMode::Idle,
            gyro,
            clock: Duration::ZERO,
            telemetry,
        };
        drive.reset_pose(initial_pose);
        Ok(drive)
    }

    /// 会话开始：清空全部 PID 历史
    pub fn on_start(&mut self) {
        self.x_pid.reset();
        self.y_pid.reset();
        self.heading_pid.reset();
        for module in &mut self.modules {
            module.on_start();
        }
        info!("Swerve drive started");
    }

    /// 执行一个控制周期
    pub fn on_update(&mut self, dt: Duration) {
        self.apply_mode(dt);

        for module in &mut self.modules {
            module.on_update(dt);
        }

        self.clock += dt;
        let heading = self.gyro.heading();
        let positions = self.module_positions();
        let pose = self.estimator.update_with_time(self.clock, heading, positions);
        trace!(x = pose.x().0, y = pose.y().0, heading = pose.heading().0, "pose estimate");

        let table = self.telemetry.child("estimatedPose");
        table.publish("x", pose.x().0);
        table.publish("y", pose.y().0);
        table.publish("heading", pose.heading().to_deg().0);
        self.telemetry
            .child("config")
            .publish("mass", self.modules[0].config().robot_mass.0);
    }

    fn apply_mode(&mut self, dt: Duration) {
        match self.mode {
            DriveMode::Idle => {
                for module in &mut self.modules {
                    module.set_idle();
                }
            },
            DriveMode::Zeroing => {
                for module in &mut self.modules {
                    module.set_zero();
                }
                for index in 0..MODULE_COUNT {
                    self.kinematics.set_last_angle(index, Rad::ZERO);
                }
            },
            DriveMode::Velocity(speeds) => self.velocity_layer(speeds),
            DriveMode::FieldRelativeVelocity {
                speeds,
                rotate_to_match,
            } => {
                let chassis = self.field_relative_layer(speeds, rotate_to_match, dt);
                self.velocity_layer(chassis);
            },
            DriveMode::FieldRelativeVelocityWithRotationLock { speeds, heading } => {
                self.heading_pid.set_setpoint(heading.0);
                let chassis = self.field_relative_layer(speeds, true, dt);
                self.velocity_layer(chassis);
            },
            DriveMode::Pose(target) => {
                let speeds = self.pose_layer(target, dt);
                let chassis = self.field_relative_layer(speeds, false, dt);
                self.velocity_layer(chassis);
            },
            DriveMode::Tuning { angle, speed } => {
                self.apply_states(&tuning_states(angle, speed));
            },
            DriveMode::IndividualTuning {
                module,
                angle,
                speed,
            } => {
                if let Some(target) = self.modules.get_mut(module) {
                    target.set_target(angle, speed);
                    self.kinematics.set_last_angle(module, angle);
                }
            },
            DriveMode::XWheels => self.apply_states(&x_wheel_states()),
        }
    }

    /// 位姿误差 → 场地坐标系速度
    fn pose_layer(&mut self, target: Pose2d, dt: Duration) -> FieldRelativeSpeeds {
        self.sync_pose_setpoints(target);
        let pose = self.pose();
        FieldRelativeSpeeds::new(
            MetersPerSec(self.x_pid.calculate(pose.x().0, dt)),
            MetersPerSec(self.y_pid.calculate(pose.y().0, dt)),
            RadPerSec(self.heading_pid.calculate(pose.heading().0, dt)),
        )
    }

    /// 场地坐标系速度 → 机器人坐标系速度
    fn field_relative_layer(
        &mut self,
        speeds: FieldRelativeSpeeds,
        rotate_to_match: bool,
        dt: Duration,
    ) -> ChassisSpeeds {
        let heading = self.pose().heading();
        let omega_override =
            rotate_to_match.then(|| RadPerSec(self.heading_pid.calculate(heading.0, dt)));
        field_to_chassis(speeds, heading, omega_override)
    }

    /// 机器人坐标系速度 → 各模块目标
    fn velocity_layer(&mut self, speeds: ChassisSpeeds) {
        let states = self.kinematics.to_module_states(speeds);
        self.apply_states(&states);
    }

    /// 下发各模块目标，并记录转向角供零速度指令保持
    fn apply_states(&mut self, states: &[ModuleState; MODULE_COUNT]) {
        for (index, (module, state)) in self.modules.iter_mut().zip(states).enumerate() {
            module.set_target(state.angle, state.speed);
            self.kinematics.set_last_angle(index, state.angle);
        }
    }

    fn sync_pose_setpoints(&mut self, target: Pose2d) {
        self.x_pid.set_setpoint(target.x().0);
        self.y_pid.set_setpoint(target.y().0);
        self.heading_pid.set_setpoint(target.heading().normalize().0);
    }

    fn set_mode(&mut self, mode: DriveMode) {
        if mem::discriminant(&self.mode) != mem::discriminant(&mode) {
            info!(from = ?self.mode, to = ?mode, "Drive mode changed");
        }
        self.mode = mode;
    }

    // ==================== 模式设置 ====================

    pub fn set_idle(&mut self) {
        self.set_mode(DriveMode::Idle);
    }

    pub fn set_zero(&mut self) {
        self.set_mode(DriveMode::Zeroing);
    }

    pub fn set_velocity(&mut self, speeds: ChassisSpeeds) {
        self.set_mode(DriveMode::Velocity(speeds));
    }

    pub fn set_field_relative_velocity(&mut self, speeds: FieldRelativeSpeeds) {
        self.set_mode(DriveMode::FieldRelativeVelocity {
            speeds,
            rotate_to_match: false,
        });
    }

    /// 场地坐标系平移，同时由航向 PID 转向 `heading`
    pub fn rotate_match_joystick(&mut self, heading: Rad, speeds: FieldRelativeSpeeds) {
        self.heading_pid.set_setpoint(heading.normalize().0);
        self.set_mode(DriveMode::FieldRelativeVelocity {
            speeds,
            rotate_to_match: true,
        });
    }

    /// 场地坐标系平移，航向锁定在 `heading`
    ///
    /// 平移分量取自 `speeds`，`speeds.omega` 被航向 PID 输出替代。
    pub fn set_field_relative_velocity_with_rotation_lock(
        &mut self,
        speeds: FieldRelativeSpeeds,
        heading: Rad,
    ) {
        let heading = heading.normalize();
        self.set_mode(DriveMode::FieldRelativeVelocityWithRotationLock { speeds, heading });
    }

    /// 保持在目标位姿
    pub fn set_pose(&mut self, target: Pose2d) {
        self.sync_pose_setpoints(target);
        self.set_mode(DriveMode::Pose(target));
    }

    pub fn set_tuning(&mut self, angle: Rad, speed: MetersPerSec) {
        self.set_mode(DriveMode::Tuning { angle, speed });
    }

    /// 只驱动一个模块，其余模块保持上一次目标
    pub fn set_individual_tuning(
        &mut self,
        module: usize,
        angle: Rad,
        speed: MetersPerSec,
    ) -> Result<(), ControlError> {
        if module >= MODULE_COUNT {
            return Err(ControlError::InvalidModuleIndex {
                index: module,
                count: MODULE_COUNT,
            });
        }
        self.set_mode(DriveMode::IndividualTuning {
            module,
            angle,
            speed,
        });
        Ok(())
    }

    pub fn set_x_wheels(&mut self) {
        self.set_mode(DriveMode::XWheels);
    }

    /// 设置所有模块的加速度限制
    ///
    /// # 错误
    ///
    /// 非正或非有限值返回 [`ControlError::InvalidParameter`]，模块限幅保持不变。
    pub fn set_acceleration_limit(&mut self, limit: MetersPerSecSq) -> Result<(), ControlError> {
        for module in &mut self.modules {
            module.set_acceleration_limit(limit)?;
        }
        Ok(())
    }

    /// 设置所有模块的驱动电压上限
    ///
    /// # 错误
    ///
    /// 非正或非有限值返回 [`ControlError::InvalidParameter`]，模块限幅保持不变。
    pub fn set_voltage_limit(&mut self, limit: Volt) -> Result<(), ControlError> {
        for module in &mut self.modules {
            module.set_voltage_limit(limit)?;
        }
        Ok(())
    }

    // ==================== 位姿 ====================

    /// 当前估计位姿
    pub fn pose(&self) -> Pose2d {
        self.estimator.estimated_pose()
    }

    /// 以当前模块里程计和陀螺仪读数重新锚定位姿
    pub fn reset_pose(&mut self, pose: Pose2d) {
        let heading = self.gyro.heading();
        let positions = self.module_positions();
        self.estimator.reset_position(heading, positions, pose);
        info!(x = pose.x().0, y = pose.y().0, heading = pose.heading().0, "Pose reset");
    }

    /// 注入视觉位姿，`timestamp` 与 [`SwerveDrive::now`] 同一时基
    pub fn add_vision_measurement(&mut self, pose: Pose2d, timestamp: Duration) {
        debug!(?timestamp, x = pose.x().0, y = pose.y().0, "vision measurement received");
        self.estimator.add_vision_measurement(pose, timestamp);
    }

    pub fn set_vision_std_devs(&mut self, std_devs: [f64; 3]) {
        self.estimator.set_vision_std_devs(std_devs);
    }

    /// 三个位姿轴是否都在容差内
    pub fn is_at_set_pose(&self) -> bool {
        self.x_pid.is_stable(Some(self.pose_position_tolerance))
            && self.y_pid.is_stable(Some(self.pose_position_tolerance))
            && self.heading_pid.is_stable(Some(self.pose_heading_tolerance))
    }

    // ==================== 查询 ====================

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    /// 会话时钟：`on_update` 累计的 dt
    pub fn now(&self) -> Duration {
        self.clock
    }

    pub fn module(&self, index: usize) -> Option<&SwerveModule> {
        self.modules.get(index)
    }

    pub fn modules(&self) -> &[SwerveModule; MODULE_COUNT] {
        &self.modules
    }

    pub fn module_positions(&self) -> [ModulePosition; MODULE_COUNT] {
        self.modules.each_ref().map(SwerveModule::position)
    }

    pub fn module_states(&self) -> [ModuleState; MODULE_COUNT] {
        self.modules.each_ref().map(SwerveModule::state)
    }

    /// 由实测模块状态得到的机器人坐标系速度
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(&self.module_states())
    }

    pub fn kinematics(&self) -> &SwerveKinematics {
        &self.kinematics
    }

    /// 模块安装位置
    pub fn module_translations(&self) -> &[Translation2d; MODULE_COUNT] {
        self.kinematics.positions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use swerve_hal::{
        DcMotor, FixedHeading, Kilograms, Meters, MotorChannel, RotarySensor, SensorSource,
        SimSensorHandle, VoltageActuator,
    };

    const DT: Duration = Duration::from_millis(20);

    #[derive(Clone, Default)]
    struct RecordingActuator(Arc<Mutex<Volt>>);

    impl VoltageActuator for RecordingActuator {
        fn set_voltage(&mut self, voltage: Volt) {
            *self.0.lock() = voltage;
        }

        fn estimated_applied_voltage(&self) -> Volt {
            *self.0.lock()
        }
    }

    fn channel(reduction: f64) -> MotorChannel {
        MotorChannel::new(
            DcMotor::neo().with_reduction(reduction),
            Box::new(RecordingActuator::default()),
            RotarySensor::integrated_neo(SensorSource::Simulated(SimSensorHandle::new()), reduction)
                .unwrap(),
        )
    }

    fn config() -> SwerveDriveConfig {
        let positions = [(0.3, 0.3), (0.3, -0.3), (-0.3, -0.3), (-0.3, 0.3)];
        SwerveDriveConfig {
            modules: positions.map(|(x, y)| SwerveModuleConfig {
                position: Translation2d::from_meters(x, y),
                wheel_radius: Meters(0.05),
                robot_mass: Kilograms(50.0),
                drive: channel(6.75),
                steer: channel(12.8),
            }),
            steer_gains: PidGains::new(4.0, 0.0, 0.0),
            velocity_gains: PidGains::new(2.0, 0.0, 0.0),
            pose_position_gains: PidGains::new(1.0, 0.0, 0.0),
            pose_heading_gains: PidGains::new(1.0, 0.0, 0.0),
            limits: ModuleLimits::default(),
            pose_position_tolerance: 0.05,
            pose_heading_tolerance: 0.05,
            state_std_devs: [0.1, 0.1, 0.1],
            vision_std_devs: [0.9, 0.9, 0.9],
            gyro: Box::new(FixedHeading(Rad::ZERO)),
            telemetry: Telemetry::disabled(),
        }
    }

    fn drive() -> SwerveDrive {
        SwerveDrive::new(config(), Pose2d::default()).unwrap()
    }

    fn assert_equivalent(module: &SwerveModule, expected: &ModuleState) {
        // 设定值可能翻转 180°，此时速度取反
        let diff = (module.steer_setpoint() - expected.angle).normalize();
        if diff.abs().0 < 1e-9 {
            assert_abs_diff_eq!(module.velocity_setpoint().0, expected.speed.0, epsilon = 1e-9);
        } else {
            assert_abs_diff_eq!(diff.abs().0, std::f64::consts::PI, epsilon = 1e-9);
            assert_abs_diff_eq!(module.velocity_setpoint().0, -expected.speed.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_x_wheel_states() {
        let states = x_wheel_states();
        let expected = [45.0, 135.0, 315.0, 405.0];
        for (state, deg) in states.iter().zip(expected) {
            assert_abs_diff_eq!(state.angle.to_deg().0, deg, epsilon = 1e-9);
            assert_eq!(state.speed, MetersPerSec::ZERO);
        }
    }

    #[test]
    fn test_x_wheels_regardless_of_prior_mode() {
        let mut d = drive();
        d.set_velocity(ChassisSpeeds::new(MetersPerSec(1.0), MetersPerSec(0.5), RadPerSec(0.3)));
        d.on_update(DT);
        d.set_x_wheels();
        d.on_update(DT);
        for (module, expected) in d.modules().iter().zip(x_wheel_states().iter()) {
            assert_equivalent(module, expected);
        }
        assert_eq!(d.mode(), DriveMode::XWheels);
    }

    #[test]
    fn test_velocity_mode_targets() {
        let mut d = drive();
        d.set_velocity(ChassisSpeeds::new(MetersPerSec(1.0), MetersPerSec::ZERO, RadPerSec::ZERO));
        d.on_update(DT);
        for module in d.modules() {
            assert_abs_diff_eq!(module.steer_setpoint().0, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(module.velocity_setpoint().0, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_field_relative_uses_heading() {
        let mut cfg = config();
        cfg.gyro = Box::new(FixedHeading(Rad(std::f64::consts::FRAC_PI_2)));
        // 估计器以陀螺仪读数对齐初始航向
        let mut d = SwerveDrive::new(
            cfg,
            Pose2d::new(Meters(0.0), Meters(0.0), Rad(std::f64::consts::FRAC_PI_2)),
        )
        .unwrap();
        d.set_field_relative_velocity(FieldRelativeSpeeds::new(
            MetersPerSec(1.0),
            MetersPerSec::ZERO,
            RadPerSec::ZERO,
        ));
        d.on_update(DT);
        // 场地 +x 对朝向 +y 的机器人是 -y：-90°
        let expected = ModuleState::new(Rad(-std::f64::consts::FRAC_PI_2), MetersPerSec(1.0));
        for module in d.modules() {
            assert_equivalent(module, &expected);
        }
    }

    #[test]
    fn test_field_to_chassis_override() {
        let speeds = FieldRelativeSpeeds::new(MetersPerSec(1.0), MetersPerSec(0.0), RadPerSec(2.0));
        let chassis = field_to_chassis(speeds, Rad::ZERO, Some(RadPerSec(0.5)));
        assert_eq!(chassis.omega, RadPerSec(0.5));
        assert_eq!(chassis.vx, MetersPerSec(1.0));
        let chassis = field_to_chassis(speeds, Rad::ZERO, None);
        assert_eq!(chassis.omega, RadPerSec(2.0));
    }

    #[test]
    fn test_rotation_lock_replaces_omega() {
        let mut d = drive();
        d.set_field_relative_velocity_with_rotation_lock(
            FieldRelativeSpeeds::new(MetersPerSec::ZERO, MetersPerSec::ZERO, RadPerSec(5.0)),
            Rad(0.5),
        );
        d.on_update(DT);
        // 航向 PID：kp=1，误差 0.5 → omega 0.5，而不是请求的 5.0
        let chassis = d.kinematics().to_chassis_speeds(
            &d.modules().each_ref().map(|m| ModuleState::new(m.steer_setpoint(), m.velocity_setpoint())),
        );
        assert_abs_diff_eq!(chassis.omega.0, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_lock_follows_its_own_heading() {
        let mut d = drive();
        let still = FieldRelativeSpeeds::new(MetersPerSec::ZERO, MetersPerSec::ZERO, RadPerSec::ZERO);
        d.rotate_match_joystick(Rad(-1.0), still);
        d.on_update(DT);
        d.set_field_relative_velocity_with_rotation_lock(still, Rad(0.5));
        d.on_update(DT);
        let chassis = d.kinematics().to_chassis_speeds(
            &d.modules().each_ref().map(|m| ModuleState::new(m.steer_setpoint(), m.velocity_setpoint())),
        );
        assert_abs_diff_eq!(chassis.omega.0, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_pose_mode_returns_to_target_after_joystick() {
        let mut d = drive();
        let target = Pose2d::new(Meters(1.0), Meters(0.0), Rad(0.4));
        d.set_pose(target);
        d.on_update(DT);
        d.rotate_match_joystick(Rad(-1.0), FieldRelativeSpeeds::default());
        d.on_update(DT);
        d.set_pose(target);
        d.on_update(DT);
        let chassis = d.kinematics().to_chassis_speeds(
            &d.modules().each_ref().map(|m| ModuleState::new(m.steer_setpoint(), m.velocity_setpoint())),
        );
        assert_abs_diff_eq!(chassis.vx.0, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(chassis.omega.0, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_x_wheels_held_by_zero_velocity() {
        let mut d = drive();
        d.set_x_wheels();
        d.on_update(DT);
        d.set_velocity(ChassisSpeeds::ZERO);
        d.on_update(DT);
        for (module, expected) in d.modules().iter().zip(x_wheel_states().iter()) {
            assert_equivalent(module, expected);
        }
    }

    #[test]
    fn test_individual_tuning_angle_held_by_zero_velocity() {
        let mut d = drive();
        d.set_individual_tuning(1, Rad(0.7), MetersPerSec::ZERO).unwrap();
        d.on_update(DT);
        d.set_velocity(ChassisSpeeds::ZERO);
        d.on_update(DT);
        assert_abs_diff_eq!(d.module(1).unwrap().steer_setpoint().0, 0.7, epsilon = 1e-9);
        assert_abs_diff_eq!(d.module(0).unwrap().steer_setpoint().0, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pose_mode_drives_toward_target() {
        let mut d = drive();
        d.set_pose(Pose2d::new(Meters(1.0), Meters(0.0), Rad::ZERO));
        d.on_update(DT);
        let chassis = d.kinematics().to_chassis_speeds(
            &d.modules().each_ref().map(|m| ModuleState::new(m.steer_setpoint(), m.velocity_setpoint())),
        );
        assert_abs_diff_eq!(chassis.vx.0, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(chassis.vy.0, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_on_start_clears_pose_integrators() {
        let mut cfg = config();
        cfg.pose_position_gains = PidGains::new(0.0, 1.0, 0.0);
        cfg.pose_heading_gains = PidGains::new(0.0, 0.0, 0.0);
        let mut d = SwerveDrive::new(cfg, Pose2d::default()).unwrap();
        let commanded_vx = |d: &SwerveDrive| {
            d.kinematics()
                .to_chassis_speeds(&d.modules().each_ref().map(|m| {
                    ModuleState::new(m.steer_setpoint(), m.velocity_setpoint())
                }))
                .vx
                .0
        };

        d.set_pose(Pose2d::new(Meters(1.0), Meters(0.0), Rad::ZERO));
        for _ in 0..5 {
            d.on_update(DT);
        }
        // 位姿不变，x 误差恒为 1：积分 = 5 · dt
        assert_abs_diff_eq!(commanded_vx(&d), 0.1, epsilon = 1e-9);

        d.on_start();
        d.on_update(DT);
        assert_abs_diff_eq!(commanded_vx(&d), DT.as_secs_f64(), epsilon = 1e-9);
    }

    #[test]
    fn test_is_at_set_pose() {
        let mut d = drive();
        assert!(!d.is_at_set_pose());
        d.set_pose(Pose2d::default());
        d.on_update(DT);
        assert!(d.is_at_set_pose());
        // 新目标立即反映
        d.set_pose(Pose2d::new(Meters(1.0), Meters(0.0), Rad::ZERO));
        assert!(!d.is_at_set_pose());
    }

    #[test]
    fn test_individual_tuning() {
        let mut d = drive();
        assert_eq!(
            d.set_individual_tuning(4, Rad::ZERO, MetersPerSec::ZERO).unwrap_err(),
            ControlError::InvalidModuleIndex { index: 4, count: 4 }
        );
        d.set_individual_tuning(2, Rad(0.4), MetersPerSec(0.3)).unwrap();
        d.on_update(DT);
        assert_abs_diff_eq!(d.module(2).unwrap().steer_setpoint().0, 0.4, epsilon = 1e-12);
        assert_eq!(d.module(0).unwrap().velocity_setpoint(), MetersPerSec::ZERO);
    }

    #[test]
    fn test_tuning_and_zeroing() {
        let mut d = drive();
        d.set_tuning(Rad(0.2), MetersPerSec(0.5));
        d.on_update(DT);
        for module in d.modules() {
            assert_abs_diff_eq!(module.steer_setpoint().0, 0.2, epsilon = 1e-12);
        }
        d.set_zero();
        d.on_update(DT);
        for module in d.modules() {
            assert_abs_diff_eq!(module.steer_setpoint().0, 0.0, epsilon = 1e-12);
            assert_eq!(module.velocity_setpoint(), MetersPerSec::ZERO);
        }
    }

    #[test]
    fn test_limits_propagate_to_modules() {
        let mut d = drive();
        d.set_voltage_limit(Volt(3.0)).unwrap();
        d.set_acceleration_limit(MetersPerSecSq(2.0)).unwrap();
        for module in d.modules() {
            assert_eq!(module.limits().drive_voltage_limit, Volt(3.0));
            assert_eq!(module.limits().acceleration_limit, MetersPerSecSq(2.0));
        }
    }

    #[test]
    fn test_invalid_limits_rejected_and_kept() {
        let mut d = drive();
        d.set_acceleration_limit(MetersPerSecSq(2.0)).unwrap();
        for bad in [0.0, -3.0, f64::NAN] {
            assert!(d.set_acceleration_limit(MetersPerSecSq(bad)).is_err());
            assert!(d.set_voltage_limit(Volt(bad)).is_err());
        }
        for module in d.modules() {
            assert_eq!(module.limits().acceleration_limit, MetersPerSecSq(2.0));
            assert_eq!(module.limits().drive_voltage_limit, ModuleLimits::default().drive_voltage_limit);
        }
    }

    #[test]
    fn test_clock_accumulates() {
        let mut d = drive();
        d.on_update(DT);
        d.on_update(DT);
        assert_eq!(d.now(), DT * 2);
    }

    #[test]
    fn test_idle_by_default() {
        let mut d = drive();
        assert_eq!(d.mode(), DriveMode::Idle);
        d.on_update(DT);
        for module in d.modules() {
            assert_eq!(module.applied_voltages(), (Volt::ZERO, Volt::ZERO));
        }
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let mut cfg = config();
        cfg.pose_position_tolerance = 0.0;
        assert!(matches!(
            SwerveDrive::new(cfg, Pose2d::default()),
            Err(ControlError::InvalidParameter { param: "pose_position_tolerance", .. })
        ));
    }
}
