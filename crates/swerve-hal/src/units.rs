//! 强类型单位系统
//!
//! 使用 NewType 模式防止单位混淆，在编译期保证类型安全。
//!
//! # 设计目标
//!
//! - **编译期类型安全**: 防止 `Rad` 与 `Deg`、`Volt` 与 `Amp` 混用
//! - **零开销抽象**: NewType 编译后与原始类型性能相同
//! - **符合人体工程学**: 支持运算符重载
//!
//! # 示例
//!
//! ```rust
//! use swerve_hal::units::{Deg, Rad};
//!
//! let angle_rad = Rad(std::f64::consts::PI);
//! let angle_deg = angle_rad.to_deg();
//! assert!((angle_deg.0 - 180.0).abs() < 1e-6);
//!
//! // 类型安全：以下代码无法编译
//! // let _ = Rad(1.0) + Deg(1.0);  // ❌ 类型不匹配
//! ```

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// 为标量单位生成公共方法和运算符
macro_rules! scalar_unit {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub f64);

        impl $name {
            /// 零值常量
            pub const ZERO: Self = $name(0.0);

            /// 创建新值
            #[inline]
            pub const fn new(value: f64) -> Self {
                $name(value)
            }

            /// 获取原始值
            #[inline]
            pub fn value(self) -> f64 {
                self.0
            }

            /// 取绝对值
            #[inline]
            pub fn abs(self) -> Self {
                $name(self.0.abs())
            }

            /// 限制范围
            #[inline]
            pub fn clamp(self, min: Self, max: Self) -> Self {
                $name(self.0.clamp(min.0, max.0))
            }

            /// 取较小值
            #[inline]
            pub fn min(self, other: Self) -> Self {
                $name(self.0.min(other.0))
            }

            /// 取较大值
            #[inline]
            pub fn max(self, other: Self) -> Self {
                $name(self.0.max(other.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.4} {}", self.0, $suffix)
            }
        }

        impl Add for $name {
            type Output = Self;
            #[inline]
            fn add(self, rhs: Self) -> Self {
                $name(self.0 + rhs.0)
            }
        }

        impl Sub for $name {
            type Output = Self;
            #[inline]
            fn sub(self, rhs: Self) -> Self {
                $name(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $name {
            type Output = Self;
            #[inline]
            fn mul(self, rhs: f64) -> Self {
                $name(self.0 * rhs)
            }
        }

        impl Mul<$name> for f64 {
            type Output = $name;
            #[inline]
            fn mul(self, rhs: $name) -> $name {
                $name(self * rhs.0)
            }
        }

        impl Div<f64> for $name {
            type Output = Self;
            #[inline]
            fn div(self, rhs: f64) -> Self {
                $name(self.0 / rhs)
            }
        }

        impl Div<$name> for $name {
            type Output = f64;
            #[inline]
            fn div(self, rhs: $name) -> f64 {
                self.0 / rhs.0
            }
        }

        impl Neg for $name {
            type Output = Self;
            #[inline]
            fn neg(self) -> Self {
                $name(-self.0)
            }
        }

        impl AddAssign for $name {
            #[inline]
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl SubAssign for $name {
            #[inline]
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }
    };
}

scalar_unit!(
    /// 弧度（NewType）
    ///
    /// 表示角度的弧度值。使用 NewType 模式防止与角度值混淆。
    Rad,
    "rad"
);

scalar_unit!(
    /// 角度（NewType）
    Deg,
    "°"
);

scalar_unit!(
    /// 角速度（rad/s）
    RadPerSec,
    "rad/s"
);

scalar_unit!(
    /// 距离（米）
    Meters,
    "m"
);

scalar_unit!(
    /// 线速度（m/s）
    MetersPerSec,
    "m/s"
);

scalar_unit!(
    /// 线加速度（m/s²）
    MetersPerSecSq,
    "m/s²"
);

scalar_unit!(
    /// 电压（伏特）
    Volt,
    "V"
);

scalar_unit!(
    /// 电流（安培）
    Amp,
    "A"
);

scalar_unit!(
    /// 牛顿·米（力矩单位）
    NewtonMeter,
    "N·m"
);

scalar_unit!(
    /// 质量（千克）
    Kilograms,
    "kg"
);

scalar_unit!(
    /// 转动惯量（kg·m²）
    KgMetersSq,
    "kg·m²"
);

impl Rad {
    /// π 弧度（180度）
    pub const PI: Self = Rad(PI);

    /// 2π 弧度（360度）
    pub const TAU: Self = Rad(TAU);

    /// π/2 弧度（90度）
    pub const FRAC_PI_2: Self = Rad(std::f64::consts::FRAC_PI_2);

    /// 转换为角度
    #[inline]
    pub fn to_deg(self) -> Deg {
        Deg(self.0.to_degrees())
    }

    /// 转换为圈数
    #[inline]
    pub fn to_turns(self) -> f64 {
        self.0 / TAU
    }

    /// 从圈数创建
    #[inline]
    pub fn from_turns(turns: f64) -> Self {
        Rad(turns * TAU)
    }

    #[inline]
    pub fn sin(self) -> f64 {
        self.0.sin()
    }

    #[inline]
    pub fn cos(self) -> f64 {
        self.0.cos()
    }

    /// 归一化到 (-π, π] 范围
    pub fn normalize(self) -> Self {
        let mut angle = self.0.rem_euclid(TAU);
        if angle > PI {
            angle -= TAU;
        }
        Rad(angle)
    }
}

impl Deg {
    /// 转换为弧度
    #[inline]
    pub fn to_rad(self) -> Rad {
        Rad(self.0.to_radians())
    }

    /// 归一化到 (-180, 180] 范围
    pub fn normalize(self) -> Self {
        let mut angle = self.0.rem_euclid(360.0);
        if angle > 180.0 {
            angle -= 360.0;
        }
        Deg(angle)
    }
}

impl From<Deg> for Rad {
    fn from(deg: Deg) -> Self {
        deg.to_rad()
    }
}

impl From<Rad> for Deg {
    fn from(rad: Rad) -> Self {
        rad.to_deg()
    }
}

// ==================== 跨单位运算 ====================

/// 角速度 × 半径 = 线速度
impl Mul<Meters> for RadPerSec {
    type Output = MetersPerSec;
    #[inline]
    fn mul(self, rhs: Meters) -> MetersPerSec {
        MetersPerSec(self.0 * rhs.0)
    }
}

/// 线速度 ÷ 半径 = 角速度
impl Div<Meters> for MetersPerSec {
    type Output = RadPerSec;
    #[inline]
    fn div(self, rhs: Meters) -> RadPerSec {
        RadPerSec(self.0 / rhs.0)
    }
}

/// 角度 × 半径 = 弧长
impl Mul<Meters> for Rad {
    type Output = Meters;
    #[inline]
    fn mul(self, rhs: Meters) -> Meters {
        Meters(self.0 * rhs.0)
    }
}
