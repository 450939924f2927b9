//! 平面几何与运动学数据类型
//!
//! 坐标约定：x 向前，y 向左，角度逆时针为正。
//!
//! - [`Pose2d`] 由位置和航向组成
//! - [`Twist2d`] 是沿恒定曲率圆弧的位移，[`Pose2d::exp`] / [`Pose2d::log`] 互为逆运算
//! - [`ChassisSpeeds`] 在机器人坐标系，[`FieldRelativeSpeeds`] 在场地坐标系

use std::ops::{Add, Mul, Neg, Sub};

use swerve_hal::{Meters, MetersPerSec, Rad, RadPerSec};

/// 平面位移
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Translation2d {
    pub x: Meters,
    pub y: Meters,
}

impl Translation2d {
    pub const ZERO: Self = Translation2d {
        x: Meters::ZERO,
        y: Meters::ZERO,
    };

    pub const fn new(x: Meters, y: Meters) -> Self {
        Self { x, y }
    }

    /// 以米为单位创建
    pub const fn from_meters(x: f64, y: f64) -> Self {
        Self {
            x: Meters(x),
            y: Meters(y),
        }
    }

    /// 到原点的距离
    pub fn norm(&self) -> Meters {
        Meters(self.x.0.hypot(self.y.0))
    }

    pub fn distance(&self, other: &Translation2d) -> Meters {
        (*other - *self).norm()
    }

    /// 绕原点旋转
    pub fn rotate_by(&self, rotation: Rotation2d) -> Self {
        let (sin, cos) = rotation.radians().0.sin_cos();
        Self::from_meters(self.x.0 * cos - self.y.0 * sin, self.x.0 * sin + self.y.0 * cos)
    }

    /// 从原点指向该点的方向
    pub fn angle(&self) -> Rotation2d {
        Rotation2d::from_components(self.x.0, self.y.0)
    }
}

impl Add for Translation2d {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Translation2d {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Translation2d {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Translation2d {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// 平面旋转
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rotation2d(Rad);

impl Rotation2d {
    pub const ZERO: Self = Rotation2d(Rad::ZERO);

    /// 保留原始角度值（不归一化）
    pub const fn new(angle: Rad) -> Self {
        Self(angle)
    }

    /// 由方向向量创建
    pub fn from_components(x: f64, y: f64) -> Self {
        Self(Rad(y.atan2(x)))
    }

    pub fn radians(&self) -> Rad {
        self.0
    }

    pub fn cos(&self) -> f64 {
        self.0.cos()
    }

    pub fn sin(&self) -> f64 {
        self.0.sin()
    }

    /// 组合旋转，结果归一化到 (-π, π]
    pub fn rotate_by(&self, other: Rotation2d) -> Self {
        Self((self.0 + other.0).normalize())
    }

    /// 与另一旋转之差，结果归一化到 (-π, π]
    pub fn minus(&self, other: Rotation2d) -> Self {
        Self((self.0 - other.0).normalize())
    }

    pub fn inverse(&self) -> Self {
        Self(-self.0)
    }
}

impl From<Rad> for Rotation2d {
    fn from(angle: Rad) -> Self {
        Self(angle)
    }
}

/// 两个位姿之间的相对变换
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Transform2d {
    /// 从 `initial` 到 `last` 的变换（在 `initial` 坐标系中表示）
    pub fn between(initial: &Pose2d, last: &Pose2d) -> Self {
        Self {
            translation: (last.translation - initial.translation)
                .rotate_by(initial.rotation.inverse()),
            rotation: last.rotation.minus(initial.rotation),
        }
    }
}

/// 沿恒定曲率圆弧的位移（dx, dy 单位米，dtheta 单位弧度）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub fn scaled(&self, kx: f64, ky: f64, ktheta: f64) -> Self {
        Self {
            dx: self.dx * kx,
            dy: self.dy * ky,
            dtheta: self.dtheta * ktheta,
        }
    }
}

/// 平面位姿
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub const fn new(x: Meters, y: Meters, heading: Rad) -> Self {
        Self {
            translation: Translation2d::new(x, y),
            rotation: Rotation2d::new(heading),
        }
    }

    pub fn x(&self) -> Meters {
        self.translation.x
    }

    pub fn y(&self) -> Meters {
        self.translation.y
    }

    pub fn heading(&self) -> Rad {
        self.rotation.radians()
    }

    /// 在自身坐标系中应用变换
    pub fn transform_by(&self, transform: &Transform2d) -> Self {
        Self {
            translation: self.translation + transform.translation.rotate_by(self.rotation),
            rotation: self.rotation.rotate_by(transform.rotation),
        }
    }

    /// 自身相对 `other` 的位姿
    pub fn relative_to(&self, other: &Pose2d) -> Self {
        let transform = Transform2d::between(other, self);
        Self {
            translation: transform.translation,
            rotation: transform.rotation,
        }
    }

    /// 沿圆弧积分 twist
    pub fn exp(&self, twist: &Twist2d) -> Self {
        let Twist2d { dx, dy, dtheta } = *twist;
        let (sin_theta, cos_theta) = dtheta.sin_cos();
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };
        let transform = Transform2d {
            translation: Translation2d::from_meters(dx * s - dy * c, dx * c + dy * s),
            rotation: Rotation2d::from_components(cos_theta, sin_theta),
        };
        self.transform_by(&transform)
    }

    /// 从自身到 `end` 的 twist，满足 `self.exp(self.log(end)) == end`
    pub fn log(&self, end: &Pose2d) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.rotation.radians().0;
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        let translation = transform
            .translation
            .rotate_by(Rotation2d::from_components(half_theta_by_tan, -half_dtheta))
            * half_theta_by_tan.hypot(half_dtheta);

        Twist2d {
            dx: translation.x.0,
            dy: translation.y.0,
            dtheta,
        }
    }

    /// 沿 twist 在两位姿间插值，`t` 被限制到 [0, 1]
    pub fn interpolate(&self, end: &Pose2d, t: f64) -> Self {
        if t <= 0.0 {
            *self
        } else if t >= 1.0 {
            *end
        } else {
            let twist = self.log(end);
            self.exp(&twist.scaled(t, t, t))
        }
    }
}

/// 机器人坐标系速度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChassisSpeeds {
    pub vx: MetersPerSec,
    pub vy: MetersPerSec,
    pub omega: RadPerSec,
}

impl ChassisSpeeds {
    pub const ZERO: Self = ChassisSpeeds {
        vx: MetersPerSec::ZERO,
        vy: MetersPerSec::ZERO,
        omega: RadPerSec::ZERO,
    };

    pub const fn new(vx: MetersPerSec, vy: MetersPerSec, omega: RadPerSec) -> Self {
        Self { vx, vy, omega }
    }

    pub fn is_zero(&self) -> bool {
        self.vx.0 == 0.0 && self.vy.0 == 0.0 && self.omega.0 == 0.0
    }

    /// 转换为场地坐标系
    pub fn to_field_relative(&self, heading: Rad) -> FieldRelativeSpeeds {
        let (vx, vy) = rotate(self.vx.0, self.vy.0, heading.0);
        FieldRelativeSpeeds::new(MetersPerSec(vx), MetersPerSec(vy), self.omega)
    }
}

/// 场地坐标系速度
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FieldRelativeSpeeds {
    pub vx: MetersPerSec,
    pub vy: MetersPerSec,
    pub omega: RadPerSec,
}

impl FieldRelativeSpeeds {
    pub const ZERO: Self = FieldRelativeSpeeds {
        vx: MetersPerSec::ZERO,
        vy: MetersPerSec::ZERO,
        omega: RadPerSec::ZERO,
    };

    pub const fn new(vx: MetersPerSec, vy: MetersPerSec, omega: RadPerSec) -> Self {
        Self { vx, vy, omega }
    }

    /// 按当前航向转换为机器人坐标系速度
    pub fn to_chassis_speeds(&self, heading: Rad) -> ChassisSpeeds {
        let (vx, vy) = rotate(self.vx.0, self.vy.0, -heading.0);
        ChassisSpeeds::new(MetersPerSec(vx), MetersPerSec(vy), self.omega)
    }
}

fn rotate(x: f64, y: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// 模块状态：转向角 + 带符号轮速
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModuleState {
    pub angle: Rad,
    pub speed: MetersPerSec,
}

impl ModuleState {
    pub const fn new(angle: Rad, speed: MetersPerSec) -> Self {
        Self { angle, speed }
    }
}

/// 模块里程计状态：累计行驶距离 + 转向角
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModulePosition {
    pub distance: Meters,
    pub angle: Rad,
}

impl ModulePosition {
    pub const fn new(distance: Meters, angle: Rad) -> Self {
        Self { distance, angle }
    }
}
