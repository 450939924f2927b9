//! 旋转传感器抽象
//!
//! 将不同物理传感器（电机内置编码器、绝对值编码器、仿真）的原始脉冲
//! 统一换算为角位置与角速度。
//!
//! # 换算
//!
//! ```text
//! raw_angle = raw_ticks / (ticks_per_revolution * reduction) * 2π
//! position  = raw_angle - offset
//! velocity  = raw_tick_rate / (ticks_per_revolution * reduction) * 2π
//! ```
//!
//! 绝对值传感器只知道自己在一圈内的位置，`raw_angle` 会被折叠到 [0, 2π)。
//!
//! # 数据来源
//!
//! 来源是一个封闭的变体 [`SensorSource`]：
//! - `Device`：硬件驱动实现 [`TickSource`]，只需提供原始脉冲和脉冲速率
//! - `Simulated`：仿真器通过 [`SimSensorHandle`] 写入输出轴圈数和转速
//!
//! 换算逻辑只在 [`RotarySensor`] 中实现一次。

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::HalError;
use crate::units::{Meters, Rad, RadPerSec};

/// 硬件脉冲来源
///
/// 由具体的设备驱动实现。读取失败时应返回最后一次有效值，而不是阻塞控制周期。
pub trait TickSource: Send {
    /// 原始脉冲数
    fn raw_ticks(&self) -> f64;

    /// 原始脉冲速率（ticks/s）
    fn raw_tick_rate(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
struct SimSensorState {
    turns: f64,
    turns_per_sec: f64,
}

/// 仿真传感器句柄
///
/// 仿真器持有一份克隆，通过 `set_turns` / `set_turn_velocity` 推送输出轴状态；
/// [`RotarySensor`] 持有另一份，读取时按当前减速比换算为脉冲。
#[derive(Debug, Clone, Default)]
pub struct SimSensorHandle {
    state: Arc<Mutex<SimSensorState>>,
}

impl SimSensorHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置输出轴累计圈数
    pub fn set_turns(&self, turns: f64) {
        self.state.lock().turns = turns;
    }

    /// 设置输出轴转速（圈/秒）
    pub fn set_turn_velocity(&self, turns_per_sec: f64) {
        self.state.lock().turns_per_sec = turns_per_sec;
    }

    pub fn turns(&self) -> f64 {
        self.state.lock().turns
    }

    pub fn turn_velocity(&self) -> f64 {
        self.state.lock().turns_per_sec
    }
}

/// 传感器数据来源
pub enum SensorSource {
    /// 真实硬件
    Device(Box<dyn TickSource>),
    /// 仿真
    Simulated(SimSensorHandle),
}

impl fmt::Debug for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorSource::Device(_) => f.write_str("Device(..)"),
            SensorSource::Simulated(handle) => f.debug_tuple("Simulated").field(handle).finish(),
        }
    }
}

/// 传感器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// 增量式：上电归零，位置持续累加
    Incremental,
    /// 绝对式：只报告一圈内的位置
    Absolute,
}

/// 旋转传感器
///
/// 启动时绑定到一个物理通道，整个控制会话内不销毁。
/// 零偏只通过 `zero` / `set_position` / `set_offset` 修改。
#[derive(Debug)]
pub struct RotarySensor {
    ticks_per_revolution: f64,
    reduction: f64,
    offset: Rad,
    kind: SensorKind,
    source: SensorSource,
}

impl RotarySensor {
    /// 创建传感器
    ///
    /// # 错误
    ///
    /// `ticks_per_revolution` 或 `reduction` 不为正时返回错误。
    pub fn new(
        source: SensorSource,
        kind: SensorKind,
        ticks_per_revolution: f64,
        reduction: f64,
    ) -> Result<Self, HalError> {
        if !(ticks_per_revolution > 0.0) || !ticks_per_revolution.is_finite() {
            return Err(HalError::InvalidTicksPerRevolution(ticks_per_revolution));
        }
        validate_reduction(reduction)?;
        Ok(Self {
            ticks_per_revolution,
            reduction,
            offset: Rad::ZERO,
            kind,
            source,
        })
    }

    /// Falcon 500 / TalonFX 内置编码器（2048 ticks/rev）
    pub fn integrated_falcon(source: SensorSource, reduction: f64) -> Result<Self, HalError> {
        Self::new(source, SensorKind::Incremental, 2048.0, reduction)
    }

    /// NEO / SparkMax 内置霍尔编码器（42 ticks/rev）
    pub fn integrated_neo(source: SensorSource, reduction: f64) -> Result<Self, HalError> {
        Self::new(source, SensorKind::Incremental, 42.0, reduction)
    }

    /// CANCoder 类绝对值编码器（4096 ticks/rev，安装在输出轴）
    pub fn absolute_cancoder(source: SensorSource) -> Result<Self, HalError> {
        Self::new(source, SensorKind::Absolute, 4096.0, 1.0)
    }

    /// 原始脉冲数
    pub fn raw_ticks(&self) -> f64 {
        match &self.source {
            SensorSource::Device(device) => device.raw_ticks(),
            SensorSource::Simulated(sim) => sim.turns() * self.ticks_per_output_revolution(),
        }
    }

    /// 原始脉冲速率（ticks/s）
    pub fn raw_tick_rate(&self) -> f64 {
        match &self.source {
            SensorSource::Device(device) => device.raw_tick_rate(),
            SensorSource::Simulated(sim) => {
                sim.turn_velocity() * self.ticks_per_output_revolution()
            },
        }
    }

    /// 输出轴每转脉冲数（考虑减速比）
    pub fn ticks_per_output_revolution(&self) -> f64 {
        self.ticks_per_revolution * self.reduction
    }

    pub fn ticks_per_revolution(&self) -> f64 {
        self.ticks_per_revolution
    }

    /// 未扣除零偏的角度
    pub fn raw_angle(&self) -> Rad {
        let turns = self.raw_ticks() / self.ticks_per_output_revolution();
        match self.kind {
            SensorKind::Incremental => Rad::from_turns(turns),
            SensorKind::Absolute => {
                // rem_euclid 可能因舍入返回一整圈
                let angle = turns.rem_euclid(1.0) * TAU;
                Rad(if angle >= TAU { 0.0 } else { angle })
            },
        }
    }

    /// 角位置（扣除零偏）
    pub fn position(&self) -> Rad {
        self.raw_angle() - self.offset
    }

    /// 角速度，与零偏无关
    pub fn velocity(&self) -> RadPerSec {
        RadPerSec(self.raw_tick_rate() / self.ticks_per_output_revolution() * TAU)
    }

    /// 以指定半径换算弧长
    pub fn distance(&self, radius: Meters) -> Meters {
        self.position() * radius
    }

    /// 将当前物理位置设为零点
    pub fn zero(&mut self) {
        self.offset = self.raw_angle();
        debug!(offset = self.offset.0, "rotary sensor zeroed");
    }

    /// 设置零偏，使 `position()` 随后等于 `position`
    pub fn set_position(&mut self, position: Rad) {
        self.offset = self.raw_angle() - position;
    }

    /// 直接设置零偏
    pub fn set_offset(&mut self, offset: Rad) {
        self.offset = offset;
    }

    pub fn offset(&self) -> Rad {
        self.offset
    }

    /// 修改减速比
    ///
    /// 只影响之后的换算，不会重新缩放已有零偏。
    pub fn set_reduction(&mut self, reduction: f64) -> Result<(), HalError> {
        validate_reduction(reduction)?;
        self.reduction = reduction;
        Ok(())
    }

    pub fn reduction(&self) -> f64 {
        self.reduction
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// 仿真句柄（仅仿真来源）
    pub fn sim_handle(&self) -> Option<&SimSensorHandle> {
        match &self.source {
            SensorSource::Simulated(handle) => Some(handle),
            SensorSource::Device(_) => None,
        }
    }
}

fn validate_reduction(reduction: f64) -> Result<(), HalError> {
    if reduction > 0.0 && reduction.is_finite() {
        Ok(())
    } else {
        Err(HalError::InvalidReduction(reduction))
    }
}
