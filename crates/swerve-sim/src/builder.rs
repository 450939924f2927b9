//! 仿真底盘装配
//!
//! [`SimulatedDrivetrain::build`] 为每个轴创建仿真执行器和传感器，
//! 把控制端交给 [`SwerveDrive`]，把句柄端交给 [`DrivetrainSimulator`]。

use std::time::Duration;

use swerve_control::{
    MODULE_COUNT, ModuleLimits, PidGains, Pose2d, SwerveDrive, SwerveDriveConfig,
    SwerveModuleConfig, Translation2d,
};
use swerve_hal::{
    DcMotor, KgMetersSq, Kilograms, Meters, MotorChannel, RotarySensor, SensorKind, SensorSource,
    SimSensorHandle, Telemetry, Volt,
};
use tracing::info;

use crate::actuator::{SimActuator, SimGyro};
use crate::error::SimError;
use crate::simulator::{DrivetrainSimulator, SimAxis, SimModule};

/// 单个执行轴的硬件参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisParams {
    /// 电机模型（未折算减速箱）
    pub motor: DcMotor,
    /// 并联电机数量
    pub motor_count: u32,
    /// 减速比
    pub reduction: f64,
    /// 电机侧编码器每转脉冲数
    pub ticks_per_revolution: f64,
}

impl AxisParams {
    /// 折算到输出轴的电机模型
    pub fn output_motor(&self) -> DcMotor {
        self.motor.with_motors(self.motor_count).with_reduction(self.reduction)
    }
}

/// 仿真底盘参数
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedDrivetrainParams {
    pub module_positions: [Translation2d; MODULE_COUNT],
    pub wheel_radius: Meters,
    pub mass: Kilograms,
    pub drive: AxisParams,
    pub steer: AxisParams,
    /// 单个模块转向部分的转动惯量
    pub module_inertia: KgMetersSq,
    pub battery_voltage: Volt,
    pub steer_gains: PidGains,
    pub velocity_gains: PidGains,
    pub pose_position_gains: PidGains,
    pub pose_heading_gains: PidGains,
    pub limits: ModuleLimits,
    pub pose_position_tolerance: f64,
    pub pose_heading_tolerance: f64,
    pub state_std_devs: [f64; 3],
    pub vision_std_devs: [f64; 3],
    pub initial_pose: Pose2d,
    /// 控制周期
    pub period: Duration,
}

impl Default for SimulatedDrivetrainParams {
    /// NEO 驱动 (6.75:1) + NEO 转向 (12.8:1)，0.6 m 方形底盘，50 kg
    fn default() -> Self {
        Self {
            module_positions: [
                Translation2d::from_meters(0.3, 0.3),
                Translation2d::from_meters(0.3, -0.3),
                Translation2d::from_meters(-0.3, -0.3),
                Translation2d::from_meters(-0.3, 0.3),
            ],
            wheel_radius: Meters(0.05),
            mass: Kilograms(50.0),
            drive: AxisParams {
                motor: DcMotor::neo(),
                motor_count: 1,
                reduction: 6.75,
                ticks_per_revolution: 42.0,
            },
            steer: AxisParams {
                motor: DcMotor::neo(),
                motor_count: 1,
                reduction: 12.8,
                ticks_per_revolution: 42.0,
            },
            module_inertia: KgMetersSq(0.02),
            battery_voltage: Volt(12.0),
            steer_gains: PidGains::new(4.0, 0.0, 0.0),
            velocity_gains: PidGains::new(2.0, 0.0, 0.0),
            pose_position_gains: PidGains::new(2.0, 0.0, 0.0),
            pose_heading_gains: PidGains::new(3.0, 0.0, 0.0),
            limits: ModuleLimits::default(),
            pose_position_tolerance: 0.05,
            pose_heading_tolerance: 0.05,
            state_std_devs: [0.1, 0.1, 0.1],
            vision_std_devs: [0.9, 0.9, 0.9],
            initial_pose: Pose2d::default(),
            period: Duration::from_millis(5),
        }
    }
}

/// 仿真底盘
pub struct SimulatedDrivetrain;

impl SimulatedDrivetrain {
    /// 装配控制端和仿真端
    ///
    /// 两端只共享执行器电压、传感器读数和陀螺仪航向。
    pub fn build(
        params: &SimulatedDrivetrainParams,
        telemetry: Telemetry,
    ) -> Result<(SwerveDrive, DrivetrainSimulator), SimError> {
        let drive_motor = params.drive.output_motor();
        let steer_motor = params.steer.output_motor();

        let mut module_configs = Vec::with_capacity(MODULE_COUNT);
        let mut sim_modules = Vec::with_capacity(MODULE_COUNT);
        for position in params.module_positions {
            let (drive_channel, drive_axis) =
                sim_channel(&params.drive, drive_motor, params.battery_voltage)?;
            let (steer_channel, steer_axis) =
                sim_channel(&params.steer, steer_motor, params.battery_voltage)?;

            module_configs.push(SwerveModuleConfig {
                position,
                wheel_radius: params.wheel_radius,
                robot_mass: params.mass,
                drive: drive_channel,
                steer: steer_channel,
            });
            sim_modules.push(SimModule {
                position,
                wheel_radius: params.wheel_radius,
                drive: drive_axis,
                steer: steer_axis,
            });
        }

        let (gyro, gyro_handle) = SimGyro::new(params.initial_pose.heading());

        let modules: [SwerveModuleConfig; MODULE_COUNT] = into_array(module_configs)?;
        let sim_modules: [SimModule; MODULE_COUNT] = into_array(sim_modules)?;

        let simulator = DrivetrainSimulator::new(
            sim_modules,
            params.mass,
            params.module_inertia,
            gyro_handle,
            params.initial_pose,
            telemetry.child("sim"),
        )?;

        let drive = SwerveDrive::new(
            SwerveDriveConfig {
                modules,
                steer_gains: params.steer_gains,
                velocity_gains: params.velocity_gains,
                pose_position_gains: params.pose_position_gains,
                pose_heading_gains: params.pose_heading_gains,
                limits: params.limits,
                pose_position_tolerance: params.pose_position_tolerance,
                pose_heading_tolerance: params.pose_heading_tolerance,
                state_std_devs: params.state_std_devs,
                vision_std_devs: params.vision_std_devs,
                gyro: Box::new(gyro),
                telemetry: telemetry.child("drivetrain"),
            },
            params.initial_pose,
        )?;

        info!(
            mass = params.mass.0,
            wheel_radius = params.wheel_radius.0,
            "Simulated drivetrain built"
        );
        Ok((drive, simulator))
    }
}

fn sim_channel(
    axis: &AxisParams,
    motor: DcMotor,
    battery: Volt,
) -> Result<(MotorChannel, SimAxis), SimError> {
    let (actuator, actuator_handle) = SimActuator::new(battery);
    let sensor_handle = SimSensorHandle::new();
    let sensor = RotarySensor::new(
        SensorSource::Simulated(sensor_handle.clone()),
        SensorKind::Incremental,
        axis.ticks_per_revolution,
        axis.reduction,
    )?;
    Ok((
        MotorChannel::new(motor, Box::new(actuator), sensor),
        SimAxis {
            motor,
            actuator: actuator_handle,
            sensor: sensor_handle,
        },
    ))
}

fn into_array<T>(items: Vec<T>) -> Result<[T; MODULE_COUNT], SimError> {
    let len = items.len();
    items.try_into().map_err(|_| SimError::InvalidParameter {
        param: "module_positions",
        reason: format!("expected {MODULE_COUNT} modules, got {len}"),
    })
}
