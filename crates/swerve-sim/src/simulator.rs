//! 底盘物理仿真
//!
//! 固定步长显式欧拉积分，每个周期：
//!
//! ```text
//! 驱动轴: I = motor.current(ω, V)   F = τ(I) / r   v += F / (m/4) · dt   θ += v / r · dt
//! 转向轴: I = motor.current(ω, V)   ω += τ(I) / J · dt                  φ += ω · dt
//! 底盘:   (vx, vy, ω) = FK(v_i, φ_i)   heading += ω · dt   (x, y) += R(heading) · (vx, vy) · dt
//! ```
//!
//! 不考虑车轮打滑与摩擦，正确性依赖调用方给出足够小且均匀的 `dt`。
//! 结果通过 [`SimSensorHandle`] / [`SimGyroHandle`] 推送给控制代码。

use std::f64::consts::TAU;
use std::time::Duration;

use swerve_control::{
    ChassisSpeeds, MODULE_COUNT, ModuleState, Pose2d, SwerveKinematics, Translation2d,
};
use swerve_hal::{
    Amp, DcMotor, KgMetersSq, Kilograms, Meters, MetersPerSec, NewtonMeter, Rad, RadPerSec,
    SimSensorHandle, Telemetry,
};
use tracing::trace;

use crate::actuator::{SimActuatorHandle, SimGyroHandle};
use crate::error::SimError;

/// 仿真器持有的单轴连接
#[derive(Debug, Clone)]
pub struct SimAxis {
    /// 折算到输出轴的电机模型
    pub motor: DcMotor,
    pub actuator: SimActuatorHandle,
    pub sensor: SimSensorHandle,
}

/// 仿真器持有的单个模块连接
#[derive(Debug, Clone)]
pub struct SimModule {
    pub position: Translation2d,
    pub wheel_radius: Meters,
    pub drive: SimAxis,
    pub steer: SimAxis,
}

/// 单个模块的仿真状态
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModuleSimState {
    /// 车轮线速度
    pub drive_velocity: MetersPerSec,
    /// 车轮累计转角
    pub drive_angle: Rad,
    pub drive_current: Amp,
    /// 转向角速度
    pub steer_speed: RadPerSec,
    /// 转向角
    pub steer_angle: Rad,
    pub steer_current: Amp,
    pub steer_torque: NewtonMeter,
}

/// 底盘物理仿真器
#[derive(Debug)]
pub struct DrivetrainSimulator {
    modules: [SimModule; MODULE_COUNT],
    states: [ModuleSimState; MODULE_COUNT],
    kinematics: SwerveKinematics,
    mass: Kilograms,
    module_inertia: KgMetersSq,
    gyro: SimGyroHandle,
    pose: Pose2d,
    chassis: ChassisSpeeds,
    total_current: Amp,
    telemetry: Telemetry,
}

impl DrivetrainSimulator {
    /// 创建仿真器，地面真值从 `initial_pose` 开始
    ///
    /// # 错误
    ///
    /// 质量、转动惯量或车轮半径不为正，或模块位置退化时返回错误。
    pub fn new(
        modules: [SimModule; MODULE_COUNT],
        mass: Kilograms,
        module_inertia: KgMetersSq,
        gyro: SimGyroHandle,
        initial_pose: Pose2d,
        telemetry: Telemetry,
    ) -> Result<Self, SimError> {
        positive("mass", mass.0)?;
        positive("module_inertia", module_inertia.0)?;
        for module in &modules {
            positive("wheel_radius", module.wheel_radius.0)?;
        }
        let kinematics = SwerveKinematics::new(modules.each_ref().map(|m| m.position))?;

        let states = modules.each_ref().map(|m| ModuleSimState {
            drive_angle: Rad::from_turns(m.drive.sensor.turns()),
            steer_angle: Rad::from_turns(m.steer.sensor.turns()),
            ..ModuleSimState::default()
        });
        gyro.set_heading(initial_pose.heading());

        Ok(Self {
            modules,
            states,
            kinematics,
            mass,
            module_inertia,
            gyro,
            pose: initial_pose,
            chassis: ChassisSpeeds::ZERO,
            total_current: Amp::ZERO,
            telemetry,
        })
    }

    /// 推进一个步长
    pub fn update(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        let module_mass = self.mass.0 / MODULE_COUNT as f64;
        let mut total_current = 0.0;

        for (i, (module, state)) in self.modules.iter().zip(self.states.iter_mut()).enumerate() {
            let r = module.wheel_radius.0;

            // 驱动轴
            let wheel_speed = RadPerSec(state.drive_velocity.0 / r);
            let drive_current = module
                .drive
                .motor
                .current(wheel_speed, module.drive.actuator.applied_voltage());
            let force = module.drive.motor.torque(drive_current).0 / r;
            state.drive_velocity += MetersPerSec(force / module_mass * dt);
            let wheel_speed = state.drive_velocity.0 / r;
            state.drive_angle += Rad(wheel_speed * dt);
            state.drive_current = drive_current;
            module.drive.sensor.set_turn_velocity(wheel_speed / TAU);
            module.drive.sensor.set_turns(state.drive_angle.to_turns());

            // 转向轴，无损耗
            let steer_current = module
                .steer
                .motor
                .current(state.steer_speed, module.steer.actuator.applied_voltage());
            let steer_torque = module.steer.motor.torque(steer_current);
            state.steer_speed += RadPerSec(steer_torque.0 / self.module_inertia.0 * dt);
            state.steer_angle += Rad(state.steer_speed.0 * dt);
            state.steer_current = steer_current;
            state.steer_torque = steer_torque;
            module.steer.sensor.set_turn_velocity(state.steer_speed.0 / TAU);
            module.steer.sensor.set_turns(state.steer_angle.to_turns());

            total_current += drive_current.0.abs() + steer_current.0.abs();
            self.telemetry
                .child(&format!("modules/{i}"))
                .publish("turnTorque", steer_torque.0);
        }
        self.total_current = Amp(total_current);

        let measured = self
            .states
            .map(|s| ModuleState::new(s.steer_angle, s.drive_velocity));
        self.chassis = self.kinematics.to_chassis_speeds(&measured);

        let heading = self.pose.heading() + Rad(self.chassis.omega.0 * dt);
        let (sin, cos) = heading.0.sin_cos();
        let (vx, vy) = (self.chassis.vx.0, self.chassis.vy.0);
        let x = self.pose.x() + Meters((vx * cos - vy * sin) * dt);
        let y = self.pose.y() + Meters((vx * sin + vy * cos) * dt);
        self.pose = Pose2d::new(x, y, heading);
        self.gyro.set_heading(heading);

        trace!(x = x.0, y = y.0, heading = heading.0, "simulated ground truth");
        self.publish_telemetry();
    }

    fn publish_telemetry(&self) {
        let t = &self.telemetry;
        t.publish("vx", self.chassis.vx.0);
        t.publish("vy", self.chassis.vy.0);
        t.publish("angle", self.pose.heading().to_deg().0);
        t.publish("angularVelocity", self.chassis.omega.0.to_degrees());
        t.publish("x", self.pose.x().0);
        t.publish("y", self.pose.y().0);
        t.publish("totalCurrent", self.total_current.0);
    }

    /// 地面真值位姿
    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// 机器人坐标系速度（地面真值）
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.chassis
    }

    /// 所有电机电流幅值之和
    pub fn total_current(&self) -> Amp {
        self.total_current
    }

    /// 各模块 `(drive, steer)` 电流
    pub fn module_currents(&self) -> [(Amp, Amp); MODULE_COUNT] {
        self.states.map(|s| (s.drive_current, s.steer_current))
    }

    pub fn module_states(&self) -> &[ModuleSimState; MODULE_COUNT] {
        &self.states
    }

    pub fn modules(&self) -> &[SimModule; MODULE_COUNT] {
        &self.modules
    }
}

fn positive(param: &'static str, value: f64) -> Result<(), SimError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidParameter {
            param,
            reason: format!("must be positive, got {value}"),
        })
    }
}
