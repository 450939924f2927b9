//! 四轮转向运动学
//!
//! 逆运动学矩阵（8×3），每个模块 i 位于 (x_i, y_i)：
//!
//! ```text
//! | vx_i |   | 1  0  -y_i |   | vx    |
//! | vy_i | = | 0  1   x_i | * | vy    |
//!                             | omega |
//! ```
//!
//! 正运动学使用其最小二乘伪逆 `(MᵀM)⁻¹Mᵀ`，构造时计算一次。

use nalgebra::{SMatrix, SVector, Vector3};
use swerve_hal::{Meters, MetersPerSec, Rad, RadPerSec};

use crate::MODULE_COUNT;
use crate::error::ControlError;
use crate::geometry::{ChassisSpeeds, ModulePosition, ModuleState, Translation2d, Twist2d};

type InverseMatrix = SMatrix<f64, 8, 3>;
type ForwardMatrix = SMatrix<f64, 3, 8>;

/// 四轮转向运动学变换
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    positions: [Translation2d; MODULE_COUNT],
    inverse: InverseMatrix,
    forward: ForwardMatrix,
    /// 零速度指令时保持的上一次转向角
    last_angles: [Rad; MODULE_COUNT],
}

impl SwerveKinematics {
    /// 由四个模块相对机器人中心的位置构造
    ///
    /// # 错误
    ///
    /// 模块位置重合（矩阵退化）时返回 [`ControlError::InvalidGeometry`]。
    pub fn new(positions: [Translation2d; MODULE_COUNT]) -> Result<Self, ControlError> {
        for (i, a) in positions.iter().enumerate() {
            if !a.x.0.is_finite() || !a.y.0.is_finite() {
                return Err(ControlError::InvalidGeometry(format!(
                    "module {i} position is not finite"
                )));
            }
            for (j, b) in positions.iter().enumerate().skip(i + 1) {
                if a.distance(b).0 < 1e-9 {
                    return Err(ControlError::InvalidGeometry(format!(
                        "modules {i} and {j} share the same position"
                    )));
                }
            }
        }

        let mut inverse = InverseMatrix::zeros();
        for (i, p) in positions.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -p.y.0;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = p.x.0;
        }

        let normal = inverse.transpose() * inverse;
        let normal_inv = normal.try_inverse().ok_or_else(|| {
            ControlError::InvalidGeometry("kinematics matrix is singular".to_string())
        })?;
        let forward = normal_inv * inverse.transpose();

        Ok(Self {
            positions,
            inverse,
            forward,
            last_angles: [Rad::ZERO; MODULE_COUNT],
        })
    }

    pub fn positions(&self) -> &[Translation2d; MODULE_COUNT] {
        &self.positions
    }

    /// 底盘速度 → 各模块状态
    ///
    /// 指令全为零时保留上一次的转向角，避免模块无意义地回正。
    pub fn to_module_states(&mut self, speeds: ChassisSpeeds) -> [ModuleState; MODULE_COUNT] {
        if speeds.is_zero() {
            return self.last_angles.map(|angle| ModuleState::new(angle, MetersPerSec::ZERO));
        }

        let chassis = Vector3::new(speeds.vx.0, speeds.vy.0, speeds.omega.0);
        let module_vectors = self.inverse * chassis;

        std::array::from_fn(|i| {
            let x = module_vectors[2 * i];
            let y = module_vectors[2 * i + 1];
            let angle = Rad(y.atan2(x));
            self.last_angles[i] = angle;
            ModuleState::new(angle, MetersPerSec(x.hypot(y)))
        })
    }

    /// 零速度指令时保持的转向角
    pub fn last_angles(&self) -> &[Rad; MODULE_COUNT] {
        &self.last_angles
    }

    /// 记录绕过运动学直接下发给模块的转向角
    pub fn set_last_angle(&mut self, module: usize, angle: Rad) {
        if let Some(last) = self.last_angles.get_mut(module) {
            *last = angle;
        }
    }

    /// 各模块状态 → 底盘速度（最小二乘）
    pub fn to_chassis_speeds(&self, states: &[ModuleState; MODULE_COUNT]) -> ChassisSpeeds {
        let solved = self.solve(states.map(|s| (s.speed.0, s.angle)));
        ChassisSpeeds::new(MetersPerSec(solved[0]), MetersPerSec(solved[1]), RadPerSec(solved[2]))
    }

    /// 各模块位移增量 → 底盘 twist
    pub fn to_twist(&self, deltas: &[ModulePosition; MODULE_COUNT]) -> Twist2d {
        let solved = self.solve(deltas.map(|d| (d.distance.0, d.angle)));
        Twist2d {
            dx: solved[0],
            dy: solved[1],
            dtheta: solved[2],
        }
    }

    fn solve(&self, magnitudes: [(f64, Rad); MODULE_COUNT]) -> Vector3<f64> {
        let mut module_vectors = SVector::<f64, 8>::zeros();
        for (i, (magnitude, angle)) in magnitudes.iter().enumerate() {
            module_vectors[2 * i] = magnitude * angle.cos();
            module_vectors[2 * i + 1] = magnitude * angle.sin();
        }
        self.forward * module_vectors
    }

    /// 按比例缩放所有模块速度，使最大值不超过 `max_speed`
    pub fn desaturate(states: &mut [ModuleState; MODULE_COUNT], max_speed: MetersPerSec) {
        let fastest = states.iter().map(|s| s.speed.0.abs()).fold(0.0, f64::max);
        if fastest > max_speed.0 && fastest > 0.0 {
            let scale = max_speed.0 / fastest;
            for state in states.iter_mut() {
                state.speed = state.speed * scale;
            }
        }
    }

    /// 模块到旋转中心的距离
    pub fn radius(&self, module: usize) -> Option<Meters> {
        self.positions.get(module).map(Translation2d::norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn square(half: f64) -> SwerveKinematics {
        SwerveKinematics::new([
            Translation2d::from_meters(half, half),
            Translation2d::from_meters(half, -half),
            Translation2d::from_meters(-half, -half),
            Translation2d::from_meters(-half, half),
        ])
        .unwrap()
    }

    #[test]
    fn test_pure_translation() {
        let mut k = square(0.3);
        let states = k.to_module_states(ChassisSpeeds::new(
            MetersPerSec(1.0),
            MetersPerSec::ZERO,
            RadPerSec::ZERO,
        ));
        for s in states {
            assert_abs_diff_eq!(s.angle.0, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(s.speed.0, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pure_rotation() {
        let mut k = square(0.3);
        let states = k.to_module_states(ChassisSpeeds::new(
            MetersPerSec::ZERO,
            MetersPerSec::ZERO,
            RadPerSec(1.0),
        ));
        // (0.3, 0.3) 处模块垂直于半径方向：135°
        assert_abs_diff_eq!(states[0].angle.to_deg().0, 135.0, epsilon = 1e-9);
        assert_abs_diff_eq!(states[0].speed.0, (0.3f64 * 0.3 * 2.0).sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(states[2].angle.to_deg().0, -45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_speeds_keep_last_angles() {
        let mut k = square(0.3);
        k.to_module_states(ChassisSpeeds::new(
            MetersPerSec::ZERO,
            MetersPerSec(1.0),
            RadPerSec::ZERO,
        ));
        let states = k.to_module_states(ChassisSpeeds::ZERO);
        for s in states {
            assert_abs_diff_eq!(s.angle.0, PI / 2.0, epsilon = 1e-12);
            assert_eq!(s.speed, MetersPerSec::ZERO);
        }
    }

    #[test]
    fn test_recorded_angle_held_at_zero_speed() {
        let mut k = square(0.3);
        k.set_last_angle(1, Rad(0.7));
        k.set_last_angle(MODULE_COUNT, Rad(1.0));
        let states = k.to_module_states(ChassisSpeeds::ZERO);
        assert_eq!(states[1].angle, Rad(0.7));
        assert_eq!(states[0].angle, Rad::ZERO);
        assert_eq!(k.last_angles()[1], Rad(0.7));
    }

    #[test]
    fn test_forward_inverts_inverse() {
        let mut k = square(0.25);
        let speeds = ChassisSpeeds::new(MetersPerSec(0.7), MetersPerSec(-0.4), RadPerSec(1.3));
        let states = k.to_module_states(speeds);
        let back = k.to_chassis_speeds(&states);
        assert_abs_diff_eq!(back.vx.0, 0.7, epsilon = 1e-9);
        assert_abs_diff_eq!(back.vy.0, -0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(back.omega.0, 1.3, epsilon = 1e-9);
    }

    #[test]
    fn test_to_twist_straight() {
        let k = square(0.3);
        let deltas = [ModulePosition::new(Meters(0.1), Rad(0.0)); MODULE_COUNT];
        let twist = k.to_twist(&deltas);
        assert_abs_diff_eq!(twist.dx, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(twist.dy, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(twist.dtheta, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_desaturate() {
        let mut states = [
            ModuleState::new(Rad(0.0), MetersPerSec(5.0)),
            ModuleState::new(Rad(0.0), MetersPerSec(-2.5)),
            ModuleState::new(Rad(0.0), MetersPerSec(1.0)),
            ModuleState::new(Rad(0.0), MetersPerSec(0.0)),
        ];
        SwerveKinematics::desaturate(&mut states, MetersPerSec(4.0));
        assert_abs_diff_eq!(states[0].speed.0, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(states[1].speed.0, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_coincident_modules() {
        let p = Translation2d::from_meters(0.3, 0.3);
        let err = SwerveKinematics::new([p, p, Translation2d::ZERO, Translation2d::from_meters(1.0, 0.0)])
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidGeometry(_)));
    }
}
