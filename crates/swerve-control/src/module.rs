//! 单个转向模块
//!
//! 每个模块有两个执行轴：转向（steer）和驱动（drive）。
//!
//! # 控制律
//!
//! ```text
//! steer = PID_steer(steer_position)                       // 2π 环绕
//! drive = PID_velocity(speed) + motor.voltage(0, v_sp / r) // 零力矩前馈
//! ```
//!
//! # 限幅（每个周期，按顺序）
//!
//! 1. 力矩限幅：`τ = (m / 4) · r · a_max`，在当前实测轮速下换算为驱动电压区间
//! 2. 转向电压绝对上限 `steer_ceiling`
//! 3. 驱动电压绝对上限 `drive_voltage_limit`
//! 4. 转向/驱动共享供电预算：`steer_cap = steer_ceiling - |drive| · steer_ceiling / drive_ceiling`
//!
//! Idle 状态两轴输出零电压，不经过限幅。

use std::f64::consts::TAU;
use std::time::Duration;

use swerve_hal::{
    DcMotor, Kilograms, Meters, MetersPerSec, MetersPerSecSq, MotorChannel, NewtonMeter, Rad,
    RadPerSec, Telemetry, Volt,
};
use tracing::{debug, trace};

use crate::MODULE_COUNT;
use crate::error::ControlError;
use crate::geometry::{ModulePosition, ModuleState, Translation2d};
use crate::pid::{PidController, PidGains};

// ==================== 配置 ====================

/// 模块硬件配置
#[derive(Debug)]
pub struct SwerveModuleConfig {
    /// 相对机器人中心的安装位置
    pub position: Translation2d,
    /// 车轮半径
    pub wheel_radius: Meters,
    /// 整车质量（用于力矩限幅）
    pub robot_mass: Kilograms,
    /// 驱动轴
    pub drive: MotorChannel,
    /// 转向轴
    pub steer: MotorChannel,
}

/// 模块电压限幅参数
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleLimits {
    /// 最大线加速度
    pub acceleration_limit: MetersPerSecSq,
    /// 驱动电压绝对上限
    pub drive_voltage_limit: Volt,
    /// 转向电压上限
    pub steer_ceiling: Volt,
    /// 共享预算中驱动电压的满量程
    pub drive_ceiling: Volt,
}

impl Default for ModuleLimits {
    fn default() -> Self {
        Self {
            acceleration_limit: MetersPerSecSq(6.0),
            drive_voltage_limit: Volt(10.0),
            steer_ceiling: Volt(7.0),
            drive_ceiling: Volt(10.0),
        }
    }
}

impl ModuleLimits {
    /// 检查所有参数为正
    pub fn validate(&self) -> Result<(), ControlError> {
        let checks = [
            ("acceleration_limit", self.acceleration_limit.0),
            ("drive_voltage_limit", self.drive_voltage_limit.0),
            ("steer_ceiling", self.steer_ceiling.0),
            ("drive_ceiling", self.drive_ceiling.0),
        ];
        for (param, value) in checks {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ControlError::InvalidParameter {
                    param,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// 单个车轮允许的最大力矩
    pub fn torque_limit(&self, robot_mass: Kilograms, wheel_radius: Meters) -> NewtonMeter {
        NewtonMeter(robot_mass.0 / MODULE_COUNT as f64 * wheel_radius.0 * self.acceleration_limit.0)
    }

    /// 在当前轮速下，力矩限幅对应的驱动电压区间 `(min, max)`
    pub fn drive_voltage_band(
        &self,
        motor: &DcMotor,
        torque_limit: NewtonMeter,
        wheel_speed: RadPerSec,
    ) -> (Volt, Volt) {
        let low = motor.voltage(-torque_limit, wheel_speed);
        let high = motor.voltage(torque_limit, wheel_speed);
        (low.min(high), low.max(high))
    }

    /// 给定驱动电压时剩余的转向电压预算
    pub fn steer_cap(&self, drive: Volt) -> Volt {
        let share = self.steer_ceiling.0 / self.drive_ceiling.0;
        Volt((self.steer_ceiling.0 - drive.0.abs() * share).max(0.0))
    }

    /// 依次应用四级限幅，返回 `(drive, steer)`
    pub fn apply(&self, band: (Volt, Volt), drive: Volt, steer: Volt) -> (Volt, Volt) {
        let (low, high) = band;
        let drive = drive.min(high).max(low);

        let ceiling = self.steer_ceiling.abs();
        let steer = steer.min(ceiling).max(-ceiling);

        let limit = self.drive_voltage_limit.abs();
        let drive = drive.min(limit).max(-limit);

        let cap = self.steer_cap(drive);
        let steer = steer.min(cap).max(-cap);

        (drive, steer)
    }
}

// ==================== 最短路径 ====================

/// 转向最短路径决策
///
/// 比较新目标角与**当前转向设定值**（而非实测角）之差。差值绝对值不小于 90° 时
/// 反转轮速并将目标角加 180°，轮子以更小的转动到达等效朝向。
/// 返回的角度归一化到 (-π, π]。
pub fn shortest_path_target(
    current_setpoint: Rad,
    angle: Rad,
    speed: MetersPerSec,
) -> (Rad, MetersPerSec) {
    let diff = (angle - current_setpoint).normalize();
    if diff.abs() >= Rad::FRAC_PI_2 {
        ((angle + Rad::PI).normalize(), -speed)
    } else {
        (angle.normalize(), speed)
    }
}

// ==================== 模块 ====================

/// 模块控制状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleControlState {
    /// 两轴零电压
    #[default]
    Idle,
    /// 级联 PID
    Pid,
}

/// 转向模块
#[derive(Debug)]
pub struct SwerveModule {
    config: SwerveModuleConfig,
    limits: ModuleLimits,
    steer_pid: PidController,
    velocity_pid: PidController,
    state: ModuleControlState,
    applied: (Volt, Volt),
    telemetry: Telemetry,
}

impl SwerveModule {
    /// 创建模块
    ///
    /// # 错误
    ///
    /// 车轮半径、整车质量或限幅参数不为正时返回错误。
    pub fn new(
        config: SwerveModuleConfig,
        steer_gains: PidGains,
        velocity_gains: PidGains,
        limits: ModuleLimits,
        telemetry: Telemetry,
    ) -> Result<Self, ControlError> {
        if !(config.wheel_radius.0 > 0.0 && config.wheel_radius.0.is_finite()) {
            return Err(ControlError::InvalidParameter {
                param: "wheel_radius",
                reason: format!("must be positive, got {}", config.wheel_radius.0),
            });
        }
        if !(config.robot_mass.0 > 0.0 && config.robot_mass.0.is_finite()) {
            return Err(ControlError::InvalidParameter {
                param: "robot_mass",
                reason: format!("must be positive, got {}", config.robot_mass.0),
            });
        }
        limits.validate()?;

        let mut steer_pid = PidController::new(steer_gains);
        steer_pid.set_wrap(TAU);

        Ok(Self {
            config,
            limits,
            steer_pid,
            velocity_pid: PidController::new(velocity_gains),
            state: ModuleControlState::Idle,
            applied: (Volt::ZERO, Volt::ZERO),
            telemetry,
        })
    }

    /// 会话开始：清空两个 PID 的历史
    pub fn on_start(&mut self) {
        self.steer_pid.reset();
        self.velocity_pid.reset();
    }

    /// 执行一个控制周期
    pub fn on_update(&mut self, dt: Duration) {
        let (drive, steer) = match self.state {
            ModuleControlState::Idle => (Volt::ZERO, Volt::ZERO),
            ModuleControlState::Pid => {
                let wheel_speed = RadPerSec(self.velocity_pid.setpoint() / self.config.wheel_radius.0);
                let feedforward = self.config.drive.motor.voltage(NewtonMeter::ZERO, wheel_speed);
                let drive = self.velocity_pid.calculate_with_feedforward(
                    self.speed().0,
                    dt,
                    feedforward.0,
                );
                let steer = self.steer_pid.calculate(self.angle().0, dt);

                let torque_limit =
                    self.limits.torque_limit(self.config.robot_mass, self.config.wheel_radius);
                let band = self.limits.drive_voltage_band(
                    &self.config.drive.motor,
                    torque_limit,
                    self.config.drive.sensor.velocity(),
                );
                self.limits.apply(band, Volt(drive), Volt(steer))
            },
        };

        self.config.drive.set_voltage(drive);
        self.config.steer.set_voltage(steer);
        self.applied = (drive, steer);
        trace!(drive = drive.0, steer = steer.0, "module voltages");

        self.publish_telemetry();
    }

    fn publish_telemetry(&self) {
        let t = &self.telemetry;
        t.publish("speed", self.speed().0);
        t.publish("angle", self.angle().to_deg().0);
        t.publish("driveVoltage", self.applied.0.0);
        t.publish("steerVoltage", self.applied.1.0);

        let config = t.child("config");
        config.child("position").publish("x", self.config.position.x.0);
        config.child("position").publish("y", self.config.position.y.0);
        config.publish("wheelRadius", self.config.wheel_radius.0);
    }

    pub fn set_idle(&mut self) {
        self.state = ModuleControlState::Idle;
    }

    /// 转向回到零角度，轮速为零（PID 驱动，不是传感器清零）
    pub fn set_zero(&mut self) {
        self.set_target(Rad::ZERO, MetersPerSec::ZERO);
    }

    /// 设置目标转向角和轮速，必要时走最短路径
    pub fn set_target(&mut self, angle: Rad, speed: MetersPerSec) {
        self.state = ModuleControlState::Pid;
        let requested = angle;
        let (angle, speed) = shortest_path_target(self.steer_setpoint(), angle, speed);
        if (angle - requested).normalize().abs() > Rad::FRAC_PI_2 {
            debug!(requested = requested.0, commanded = angle.0, "module target flipped");
        }
        self.steer_pid.set_setpoint(angle.0);
        self.velocity_pid.set_setpoint(speed.0);
    }

    /// 设置加速度限制，非正或非有限值返回错误且不修改当前限幅
    pub fn set_acceleration_limit(&mut self, limit: MetersPerSecSq) -> Result<(), ControlError> {
        let limits = ModuleLimits {
            acceleration_limit: limit,
            ..self.limits
        };
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    /// 设置驱动电压上限，非正或非有限值返回错误且不修改当前限幅
    pub fn set_voltage_limit(&mut self, limit: Volt) -> Result<(), ControlError> {
        let limits = ModuleLimits {
            drive_voltage_limit: limit,
            ..self.limits
        };
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    /// 设置两个 PID 的增益
    pub fn set_gains(&mut self, steer: PidGains, velocity: PidGains) {
        self.steer_pid.set_gains(steer);
        self.velocity_pid.set_gains(velocity);
    }

    /// 轮速 = 驱动轴角速度 × 车轮半径
    pub fn speed(&self) -> MetersPerSec {
        self.config.drive.sensor.velocity() * self.config.wheel_radius
    }

    /// 行驶距离 = 驱动轴角位置 × 车轮半径
    pub fn distance(&self) -> Meters {
        self.config.drive.sensor.distance(self.config.wheel_radius)
    }

    /// 实测转向角
    pub fn angle(&self) -> Rad {
        self.config.steer.sensor.position()
    }

    /// 里程计形式的模块位置
    pub fn position(&self) -> ModulePosition {
        ModulePosition::new(self.distance(), self.angle())
    }

    /// 实测模块状态
    pub fn state(&self) -> ModuleState {
        ModuleState::new(self.angle(), self.speed())
    }

    pub fn control_state(&self) -> ModuleControlState {
        self.state
    }

    pub fn steer_setpoint(&self) -> Rad {
        Rad(self.steer_pid.setpoint())
    }

    pub fn velocity_setpoint(&self) -> MetersPerSec {
        MetersPerSec(self.velocity_pid.setpoint())
    }

    /// 最近一个周期输出的 `(drive, steer)` 电压
    pub fn applied_voltages(&self) -> (Volt, Volt) {
        self.applied
    }

    pub fn limits(&self) -> &ModuleLimits {
        &self.limits
    }

    pub fn config(&self) -> &SwerveModuleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use parking_lot::Mutex;
    use std::f64::consts::{FRAC_PI_2, PI};
    use std::sync::Arc;
    use swerve_hal::{MemorySink, RotarySensor, SensorSource, SimSensorHandle, VoltageActuator};

    const DT: Duration = Duration::from_millis(5);

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

    struct Rig {
        module: SwerveModule,
        drive_out: RecordingActuator,
        steer_out: RecordingActuator,
        drive_sensor: SimSensorHandle,
        steer_sensor: SimSensorHandle,
        sink: Arc<MemorySink>,
    }

    fn rig(steer_gains: PidGains, velocity_gains: PidGains) -> Rig {
        let drive_out = RecordingActuator::default();
        let steer_out = RecordingActuator::default();
        let drive_sensor = SimSensorHandle::new();
        let steer_sensor = SimSensorHandle::new();
        let sink = Arc::new(MemorySink::new());

        let config = SwerveModuleConfig {
            position: Translation2d::from_meters(0.3, 0.3),
            wheel_radius: Meters(0.05),
            robot_mass: Kilograms(50.0),
            drive: MotorChannel::new(
                DcMotor::neo().with_reduction(6.75),
                Box::new(drive_out.clone()),
                RotarySensor::integrated_neo(SensorSource::Simulated(drive_sensor.clone()), 6.75)
                    .unwrap(),
            ),
            steer: MotorChannel::new(
                DcMotor::neo().with_reduction(12.8),
                Box::new(steer_out.clone()),
                RotarySensor::integrated_neo(SensorSource::Simulated(steer_sensor.clone()), 12.8)
                    .unwrap(),
            ),
        };
        let module = SwerveModule::new(
            config,
            steer_gains,
            velocity_gains,
            ModuleLimits::default(),
            Telemetry::new(sink.clone(), "modules/1"),
        )
        .unwrap();
        Rig {
            module,
            drive_out,
            steer_out,
            drive_sensor,
            steer_sensor,
            sink,
        }
    }

    #[test]
    fn test_shortest_path_flip() {
        let (angle, speed) = shortest_path_target(Rad(0.0), Rad(PI * 0.75), MetersPerSec(1.0));
        assert_abs_diff_eq!(angle.0, -PI * 0.25, epsilon = 1e-12);
        assert_eq!(speed, MetersPerSec(-1.0));

        // 正好 90° 也翻转
        let (angle, speed) = shortest_path_target(Rad(0.0), Rad(FRAC_PI_2), MetersPerSec(1.0));
        assert_abs_diff_eq!(angle.0, -FRAC_PI_2, epsilon = 1e-12);
        assert_eq!(speed, MetersPerSec(-1.0));

        let (angle, speed) = shortest_path_target(Rad(0.0), Rad(0.5), MetersPerSec(1.0));
        assert_abs_diff_eq!(angle.0, 0.5, epsilon = 1e-12);
        assert_eq!(speed, MetersPerSec(1.0));
    }

    #[test]
    fn test_shortest_path_uses_setpoint_not_measurement() {
        let mut r = rig(PidGains::new(1.0, 0.0, 0.0), PidGains::new(0.0, 0.0, 0.0));
        r.module.set_target(Rad(PI * 0.75), MetersPerSec(1.0));
        // 已翻转到 -45°
        assert_abs_diff_eq!(r.module.steer_setpoint().0, -PI * 0.25, epsilon = 1e-12);
        // 实测仍为 0，但相对设定值 -45° 只差 90° 以内
        r.module.set_target(Rad(-PI * 0.6), MetersPerSec(1.0));
        assert_abs_diff_eq!(r.module.steer_setpoint().0, -PI * 0.6, epsilon = 1e-12);
        assert_eq!(r.module.velocity_setpoint(), MetersPerSec(1.0));
    }

    #[test]
    fn test_idle_outputs_zero() {
        let mut r = rig(PidGains::new(5.0, 0.0, 0.0), PidGains::new(5.0, 0.0, 0.0));
        r.steer_sensor.set_turns(0.1);
        r.module.set_idle();
        r.module.on_update(DT);
        assert_eq!(*r.drive_out.0.lock(), Volt::ZERO);
        assert_eq!(*r.steer_out.0.lock(), Volt::ZERO);
        assert_eq!(r.module.control_state(), ModuleControlState::Idle);
    }

    #[test]
    fn test_steer_voltage_respects_ceiling() {
        let mut r = rig(PidGains::new(100.0, 0.0, 0.0), PidGains::new(0.0, 0.0, 0.0));
        r.module.set_target(Rad(1.0), MetersPerSec::ZERO);
        r.module.on_update(DT);
        let (drive, steer) = r.module.applied_voltages();
        assert_eq!(drive, Volt::ZERO);
        assert_abs_diff_eq!(steer.0, 7.0, epsilon = 1e-12);
        assert_eq!(*r.steer_out.0.lock(), steer);
    }

    #[test]
    fn test_drive_voltage_torque_limited() {
        let mut r = rig(PidGains::new(0.0, 0.0, 0.0), PidGains::new(100.0, 0.0, 0.0));
        r.module.set_target(Rad::ZERO, MetersPerSec(3.0));
        r.module.on_update(DT);

        let motor = DcMotor::neo().with_reduction(6.75);
        let torque = ModuleLimits::default().torque_limit(Kilograms(50.0), Meters(0.05));
        let max = motor.voltage(torque, RadPerSec::ZERO);
        let (drive, steer) = r.module.applied_voltages();
        assert_abs_diff_eq!(drive.0, max.0, epsilon = 1e-9);
        // 驱动占用了部分预算
        assert!(steer.abs() <= ModuleLimits::default().steer_cap(drive));
    }

    #[test]
    fn test_feedforward_at_steady_speed() {
        let mut r = rig(PidGains::new(0.0, 0.0, 0.0), PidGains::new(0.0, 0.0, 0.0));
        // 轮子已在 1 m/s 转动：20 rad/s
        r.drive_sensor.set_turn_velocity(20.0 / TAU);
        r.module.set_target(Rad::ZERO, MetersPerSec(1.0));
        r.module.on_update(DT);
        let motor = DcMotor::neo().with_reduction(6.75);
        let expected = motor.voltage(NewtonMeter::ZERO, RadPerSec(20.0));
        assert_abs_diff_eq!(r.module.applied_voltages().0.0, expected.0, epsilon = 1e-9);
    }

    #[test]
    fn test_voltage_limit_setter() {
        let mut r = rig(PidGains::new(0.0, 0.0, 0.0), PidGains::new(100.0, 0.0, 0.0));
        r.module.set_voltage_limit(Volt(1.0)).unwrap();
        r.module.set_target(Rad::ZERO, MetersPerSec(3.0));
        r.module.on_update(DT);
        assert_abs_diff_eq!(r.module.applied_voltages().0.0, 1.0, epsilon = 1e-12);
        assert_eq!(r.module.limits().drive_voltage_limit, Volt(1.0));
    }

    #[test]
    fn test_on_start_clears_integral() {
        let mut r = rig(PidGains::new(0.0, 1.0, 0.0), PidGains::default());
        r.module.set_target(Rad(0.5), MetersPerSec::ZERO);
        for _ in 0..10 {
            r.module.on_update(DT);
        }
        // 积分 = 10 · 0.5 · dt
        assert_abs_diff_eq!(r.module.applied_voltages().1.0, 0.025, epsilon = 1e-12);

        r.module.on_start();
        r.module.on_update(DT);
        assert_abs_diff_eq!(r.module.applied_voltages().1.0, 0.5 * DT.as_secs_f64(), epsilon = 1e-12);
        assert_eq!(r.module.applied_voltages().0, Volt::ZERO);
    }

    #[test]
    fn test_limit_setters_reject_invalid_values() {
        let mut r = rig(PidGains::default(), PidGains::default());
        let before = *r.module.limits();
        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                r.module.set_acceleration_limit(MetersPerSecSq(bad)),
                Err(ControlError::InvalidParameter { param: "acceleration_limit", .. })
            ));
            assert!(matches!(
                r.module.set_voltage_limit(Volt(bad)),
                Err(ControlError::InvalidParameter { param: "drive_voltage_limit", .. })
            ));
        }
        assert_eq!(*r.module.limits(), before);

        r.module.set_acceleration_limit(MetersPerSecSq(2.0)).unwrap();
        assert_eq!(r.module.limits().acceleration_limit, MetersPerSecSq(2.0));
    }

    #[test]
    fn test_reported_quantities() {
        let r = rig(PidGains::default(), PidGains::default());
        r.drive_sensor.set_turns(2.0);
        r.drive_sensor.set_turn_velocity(1.0);
        r.steer_sensor.set_turns(0.25);
        assert_abs_diff_eq!(r.module.distance().0, 2.0 * TAU * 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(r.module.speed().0, TAU * 0.05, epsilon = 1e-12);
        let position = r.module.position();
        assert_abs_diff_eq!(position.angle.0, FRAC_PI_2, epsilon = 1e-12);
        assert_eq!(position.distance, r.module.distance());
    }

    #[test]
    fn test_telemetry_published() {
        let mut r = rig(PidGains::default(), PidGains::default());
        r.steer_sensor.set_turns(0.5);
        r.module.on_update(DT);
        assert_abs_diff_eq!(r.sink.get("modules/1/angle").unwrap(), 180.0, epsilon = 1e-9);
        assert_eq!(r.sink.get("modules/1/config/wheelRadius"), Some(0.05));
        assert_eq!(r.sink.get("modules/1/config/position/x"), Some(0.3));
        assert_eq!(r.sink.get("modules/1/driveVoltage"), Some(0.0));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let sensor = || {
            RotarySensor::integrated_neo(SensorSource::Simulated(SimSensorHandle::new()), 1.0)
                .unwrap()
        };
        let config = SwerveModuleConfig {
            position: Translation2d::ZERO,
            wheel_radius: Meters(0.0),
            robot_mass: Kilograms(50.0),
            drive: MotorChannel::new(DcMotor::neo(), Box::new(RecordingActuator::default()), sensor()),
            steer: MotorChannel::new(DcMotor::neo(), Box::new(RecordingActuator::default()), sensor()),
        };
        let err = SwerveModule::new(
            config,
            PidGains::default(),
            PidGains::default(),
            ModuleLimits::default(),
            Telemetry::disabled(),
        )
        .unwrap_err();
        assert!(matches!(err, ControlError::InvalidParameter { param: "wheel_radius", .. }));
    }

    #[test]
    fn test_steer_cap_shrinks_with_drive() {
        let limits = ModuleLimits::default();
        assert_eq!(limits.steer_cap(Volt(0.0)), Volt(7.0));
        assert_abs_diff_eq!(limits.steer_cap(Volt(5.0)).0, 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(limits.steer_cap(Volt(-5.0)).0, 3.5, epsilon = 1e-12);
        assert_eq!(limits.steer_cap(Volt(12.0)), Volt(0.0));
    }
}
