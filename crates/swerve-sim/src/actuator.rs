//! 仿真执行器与陀螺仪
//!
//! 控制代码持有实现了 [`VoltageActuator`] / [`HeadingSource`] 的一端，
//! 仿真器持有对应的句柄：
//!
//! - [`SimActuator`] 写入电压，[`SimActuatorHandle`] 读取实际施加电压
//! - [`SimGyroHandle`] 写入航向，[`SimGyro`] 读取
//!
//! 双方只通过共享的最新值交换数据，互不持有对方的引用。

use std::sync::Arc;

use parking_lot::Mutex;
use swerve_hal::{HeadingSource, Rad, VoltageActuator, Volt};

/// 仿真电压执行器
///
/// 输出被限制在电池电压范围内。
#[derive(Debug)]
pub struct SimActuator {
    voltage: Arc<Mutex<Volt>>,
    battery: Volt,
}

/// 仿真器一侧的执行器句柄
#[derive(Debug, Clone)]
pub struct SimActuatorHandle {
    voltage: Arc<Mutex<Volt>>,
}

impl SimActuator {
    /// 创建执行器及其句柄
    pub fn new(battery: Volt) -> (Self, SimActuatorHandle) {
        let voltage = Arc::new(Mutex::new(Volt::ZERO));
        let handle = SimActuatorHandle {
            voltage: Arc::clone(&voltage),
        };
        (
            Self {
                voltage,
                battery: battery.abs(),
            },
            handle,
        )
    }
}

impl VoltageActuator for SimActuator {
    fn set_voltage(&mut self, voltage: Volt) {
        *self.voltage.lock() = voltage.min(self.battery).max(-self.battery);
    }

    fn estimated_applied_voltage(&self) -> Volt {
        *self.voltage.lock()
    }
}

impl SimActuatorHandle {
    /// 当前施加在电机上的电压
    pub fn applied_voltage(&self) -> Volt {
        *self.voltage.lock()
    }
}

/// 仿真陀螺仪（逆时针为正）
#[derive(Debug)]
pub struct SimGyro {
    heading: Arc<Mutex<Rad>>,
}

/// 仿真器一侧的陀螺仪句柄
#[derive(Debug, Clone)]
pub struct SimGyroHandle {
    heading: Arc<Mutex<Rad>>,
}

impl SimGyro {
    pub fn new(initial: Rad) -> (Self, SimGyroHandle) {
        let heading = Arc::new(Mutex::new(initial));
        let handle = SimGyroHandle {
            heading: Arc::clone(&heading),
        };
        (Self { heading }, handle)
    }
}

impl HeadingSource for SimGyro {
    fn heading(&self) -> Rad {
        *self.heading.lock()
    }
}

impl SimGyroHandle {
    pub fn set_heading(&self, heading: Rad) {
        *self.heading.lock() = heading;
    }

    pub fn heading(&self) -> Rad {
        *self.heading.lock()
    }
}
