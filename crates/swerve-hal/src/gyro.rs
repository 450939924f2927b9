//! 航向来源

use crate::units::Rad;

/// 航向来源（陀螺仪）
///
/// 逆时针为正。读数故障时应返回最后一次有效值。
pub trait HeadingSource: Send {
    fn heading(&self) -> Rad;
}

/// 固定航向，用于无陀螺仪的台架调试
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedHeading(pub Rad);

impl HeadingSource for FixedHeading {
    fn heading(&self) -> Rad {
        self.0
    }
}
