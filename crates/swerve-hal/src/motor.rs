//! 直流电机模型与执行器抽象
//!
//! 稳态直流电机模型：
//!
//! ```text
//! I = (V - ω / Kv) / R
//! τ = Kt · I
//! V = τ / Kt · R + ω / Kv
//! ```
//!
//! 其中 `R = V_nominal / I_stall`，`Kv = ω_free / (V_nominal - R · I_free)`，
//! `Kt = τ_stall / I_stall`。减速箱通过 [`DcMotor::with_reduction`] 折算到输出轴。

use std::fmt;

use crate::encoder::RotarySensor;
use crate::error::HalError;
use crate::units::{Amp, NewtonMeter, RadPerSec, Volt};

const RPM_TO_RAD_PER_SEC: f64 = std::f64::consts::TAU / 60.0;

/// 直流电机模型（可含减速箱）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DcMotor {
    /// 额定电压
    pub nominal_voltage: Volt,
    /// 堵转力矩
    pub stall_torque: NewtonMeter,
    /// 堵转电流
    pub stall_current: Amp,
    /// 空载电流
    pub free_current: Amp,
    /// 空载转速
    pub free_speed: RadPerSec,
}

impl DcMotor {
    /// 创建电机模型
    ///
    /// # 错误
    ///
    /// 任一参数非正（空载电流允许为零）或空载电流不小于堵转电流时返回错误。
    pub fn new(
        nominal_voltage: Volt,
        stall_torque: NewtonMeter,
        stall_current: Amp,
        free_current: Amp,
        free_speed: RadPerSec,
    ) -> Result<Self, HalError> {
        positive("nominal_voltage", nominal_voltage.0)?;
        positive("stall_torque", stall_torque.0)?;
        positive("stall_current", stall_current.0)?;
        positive("free_speed", free_speed.0)?;
        if free_current.0 < 0.0 || free_current.0 >= stall_current.0 {
            return Err(HalError::InvalidMotorParameter {
                param: "free_current",
                reason: format!(
                    "must be in [0, stall_current), got {} (stall {})",
                    free_current.0, stall_current.0
                ),
            });
        }
        Ok(Self {
            nominal_voltage,
            stall_torque,
            stall_current,
            free_current,
            free_speed,
        })
    }

    const fn preset(stall_torque: f64, stall_current: f64, free_current: f64, free_rpm: f64) -> Self {
        Self {
            nominal_voltage: Volt(12.0),
            stall_torque: NewtonMeter(stall_torque),
            stall_current: Amp(stall_current),
            free_current: Amp(free_current),
            free_speed: RadPerSec(free_rpm * RPM_TO_RAD_PER_SEC),
        }
    }

    /// REV NEO
    pub const fn neo() -> Self {
        Self::preset(2.6, 105.0, 1.8, 5676.0)
    }

    /// REV NEO 550
    pub const fn neo550() -> Self {
        Self::preset(0.97, 100.0, 1.4, 11000.0)
    }

    /// VEX Falcon 500
    pub const fn falcon500() -> Self {
        Self::preset(4.69, 257.0, 1.5, 6380.0)
    }

    /// WCP Kraken X60
    pub const fn kraken_x60() -> Self {
        Self::preset(7.09, 366.0, 2.0, 6000.0)
    }

    /// 多个电机并联驱动同一输出
    pub fn with_motors(self, count: u32) -> Self {
        let n = f64::from(count.max(1));
        Self {
            stall_torque: self.stall_torque * n,
            stall_current: self.stall_current * n,
            free_current: self.free_current * n,
            ..self
        }
    }

    /// 折算减速箱：力矩 ×G，转速 ÷G
    pub fn with_reduction(self, reduction: f64) -> Self {
        Self {
            stall_torque: self.stall_torque * reduction,
            free_speed: self.free_speed / reduction,
            ..self
        }
    }

    /// 绕组电阻（Ω）
    pub fn resistance(&self) -> f64 {
        self.nominal_voltage.0 / self.stall_current.0
    }

    /// 速度常数（rad/s per V）
    pub fn kv(&self) -> f64 {
        self.free_speed.0 / (self.nominal_voltage.0 - self.resistance() * self.free_current.0)
    }

    /// 力矩常数（N·m per A）
    pub fn kt(&self) -> f64 {
        self.stall_torque.0 / self.stall_current.0
    }

    /// 给定转速和施加电压时的电流
    pub fn current(&self, speed: RadPerSec, voltage: Volt) -> Amp {
        Amp((voltage.0 - speed.0 / self.kv()) / self.resistance())
    }

    /// 给定电流时的力矩
    pub fn torque(&self, current: Amp) -> NewtonMeter {
        NewtonMeter(self.kt() * current.0)
    }

    /// 在给定转速下产生指定力矩所需的电压
    pub fn voltage(&self, torque: NewtonMeter, speed: RadPerSec) -> Volt {
        Volt(torque.0 / self.kt() * self.resistance() + speed.0 / self.kv())
    }
}

fn positive(param: &'static str, value: f64) -> Result<(), HalError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(HalError::InvalidMotorParameter {
            param,
            reason: format!("must be positive, got {value}"),
        })
    }
}

/// 电压执行器
///
/// 由电机控制器驱动实现。`set_voltage` 不得阻塞；总线故障时应保持上一次输出或输出零。
pub trait VoltageActuator: Send {
    /// 设置输出电压
    fn set_voltage(&mut self, voltage: Volt);

    /// 估计的实际施加电压（仿真使用）
    fn estimated_applied_voltage(&self) -> Volt;
}

/// 一个执行轴：电机模型 + 执行器 + 传感器
pub struct MotorChannel {
    /// 折算到输出轴的电机模型
    pub motor: DcMotor,
    /// 执行器
    pub actuator: Box<dyn VoltageActuator>,
    /// 输出轴传感器
    pub sensor: RotarySensor,
}

impl MotorChannel {
    pub fn new(motor: DcMotor, actuator: Box<dyn VoltageActuator>, sensor: RotarySensor) -> Self {
        Self {
            motor,
            actuator,
            sensor,
        }
    }

    pub fn set_voltage(&mut self, voltage: Volt) {
        self.actuator.set_voltage(voltage);
    }
}

impl fmt::Debug for MotorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorChannel")
            .field("motor", &self.motor)
            .field("sensor", &self.sensor)
            .finish_non_exhaustive()
    }
}
