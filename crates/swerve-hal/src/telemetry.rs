//! 遥测输出
//!
//! 只写的键值发布通道，与日志分离。控制逻辑不会从遥测读取任何值。
//!
//! 组件在构造时接收一个 [`Telemetry`] 句柄（sink + 键前缀），
//! 通过 [`Telemetry::child`] 派生子表：
//!
//! ```rust
//! use std::sync::Arc;
//! use swerve_hal::telemetry::{MemorySink, Telemetry};
//!
//! let sink = Arc::new(MemorySink::new());
//! let table = Telemetry::new(sink.clone(), "drivetrain");
//! table.child("modules/1").publish("speed", 1.5);
//! assert_eq!(sink.get("drivetrain/modules/1/speed"), Some(1.5));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// 遥测接收端
pub trait TelemetrySink: Send + Sync {
    /// 发布一个标量（fire-and-forget）
    fn publish(&self, key: &str, value: f64);
}

/// 丢弃所有数据
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn publish(&self, _key: &str, _value: f64) {}
}

/// 以 `trace!` 事件输出
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn publish(&self, key: &str, value: f64) {
        tracing::trace!(target: "swerve::telemetry", key, value);
    }
}

/// 保存每个键的最新值
#[derive(Debug, Default)]
pub struct MemorySink {
    values: Mutex<BTreeMap<String, f64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.lock().get(key).copied()
    }

    /// 当前所有键值的快照
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.values.lock().clone()
    }
}

impl TelemetrySink for MemorySink {
    fn publish(&self, key: &str, value: f64) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// 遥测句柄
#[derive(Clone)]
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    prefix: String,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>, prefix: impl Into<String>) -> Self {
        Self {
            sink,
            prefix: prefix.into(),
        }
    }

    /// 不输出任何数据的句柄
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullSink), "")
    }

    /// 派生子表
    pub fn child(&self, name: &str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            prefix: self.key(name),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn publish(&self, key: &str, value: f64) {
        self.sink.publish(&self.key(key), value);
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").field("prefix", &self.prefix).finish()
    }
}
