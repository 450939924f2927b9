//! 模块控制律与运动学的属性测试

use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use swerve_control::{
    ChassisSpeeds, ModuleLimits, SwerveKinematics, Translation2d, shortest_path_target,
};
use swerve_hal::{DcMotor, Kilograms, Meters, MetersPerSec, MetersPerSecSq, Rad, RadPerSec, Volt};

fn square_kinematics() -> SwerveKinematics {
    SwerveKinematics::new([
        Translation2d::from_meters(0.3, 0.3),
        Translation2d::from_meters(0.3, -0.3),
        Translation2d::from_meters(-0.3, -0.3),
        Translation2d::from_meters(-0.3, 0.3),
    ])
    .unwrap()
}

proptest! {
    /// 最短路径决策：转动量不超过 90°，且物理上等效
    #[test]
    fn steering_decision_within_quarter_turn(
        setpoint in -PI..PI,
        angle in -4.0 * PI..4.0 * PI,
        speed in -5.0..5.0f64,
    ) {
        let (commanded, commanded_speed) =
            shortest_path_target(Rad(setpoint), Rad(angle), MetersPerSec(speed));

        let delta = (commanded - Rad(setpoint)).normalize();
        prop_assert!(delta.0.abs() <= FRAC_PI_2 + 1e-9);

        let raw = (Rad(angle) - Rad(setpoint)).normalize();
        if raw.0.abs() >= FRAC_PI_2 {
            prop_assert_eq!(commanded_speed.0, -speed);
        } else {
            prop_assert_eq!(commanded_speed.0, speed);
        }

        // 速度矢量相同
        let (cx, cy) = (commanded_speed.0 * commanded.cos(), commanded_speed.0 * commanded.sin());
        let (ex, ey) = (speed * angle.cos(), speed * angle.sin());
        prop_assert!((cx - ex).abs() < 1e-9 && (cy - ey).abs() < 1e-9);
    }

    /// 在驱动电压上限以内时，驱动电压总在力矩限幅区间内
    #[test]
    fn drive_voltage_within_torque_band(
        pid_output in -100.0..100.0f64,
        steer in -100.0..100.0f64,
        wheel_speed in -40.0..40.0f64,
        accel in 0.5..8.0f64,
    ) {
        let limits = ModuleLimits {
            acceleration_limit: MetersPerSecSq(accel),
            ..ModuleLimits::default()
        };
        let motor = DcMotor::neo().with_reduction(6.75);
        let torque = limits.torque_limit(Kilograms(50.0), Meters(0.05));
        let band = limits.drive_voltage_band(&motor, torque, RadPerSec(wheel_speed));

        let (drive, steer) = limits.apply(band, Volt(pid_output), Volt(steer));
        let limit = limits.drive_voltage_limit;
        prop_assert!(drive >= band.0.max(-limit) - Volt(1e-12));
        prop_assert!(drive <= band.1.min(limit) + Volt(1e-12));
        prop_assert!(steer.abs() <= limits.steer_ceiling);
        prop_assert!(steer.abs() <= limits.steer_cap(drive) + Volt(1e-12));
    }

    /// 转向预算随驱动电压幅值单调减小，且不超过上限
    #[test]
    fn steer_cap_monotonic(a in 0.0..15.0f64, b in 0.0..15.0f64, sign in prop::bool::ANY) {
        let limits = ModuleLimits::default();
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let s = if sign { 1.0 } else { -1.0 };
        let cap_low = limits.steer_cap(Volt(s * low));
        let cap_high = limits.steer_cap(Volt(s * high));
        prop_assert!(cap_high <= cap_low);
        prop_assert!(cap_low <= limits.steer_ceiling);
        prop_assert!(cap_high >= Volt::ZERO);
    }

    /// 逆运动学后再正运动学得到原速度
    #[test]
    fn kinematics_round_trip(
        vx in -4.0..4.0f64,
        vy in -4.0..4.0f64,
        omega in -6.0..6.0f64,
    ) {
        let mut kinematics = square_kinematics();
        let speeds = ChassisSpeeds::new(MetersPerSec(vx), MetersPerSec(vy), RadPerSec(omega));
        let states = kinematics.to_module_states(speeds);
        let back = kinematics.to_chassis_speeds(&states);
        prop_assert!((back.vx.0 - vx).abs() < 1e-9);
        prop_assert!((back.vy.0 - vy).abs() < 1e-9);
        prop_assert!((back.omega.0 - omega).abs() < 1e-9);
    }
}

#[test]
fn forward_command_points_all_wheels_ahead() {
    let mut kinematics = square_kinematics();
    let states = kinematics.to_module_states(ChassisSpeeds::new(
        MetersPerSec(1.0),
        MetersPerSec::ZERO,
        RadPerSec::ZERO,
    ));
    for state in states {
        assert_abs_diff_eq!(state.angle.to_deg().0, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(state.speed.0, 1.0, epsilon = 1e-12);
    }
}

#[test]
fn spin_command_is_perpendicular_to_radius() {
    let mut kinematics = square_kinematics();
    let states = kinematics.to_module_states(ChassisSpeeds::new(
        MetersPerSec::ZERO,
        MetersPerSec::ZERO,
        RadPerSec(1.0),
    ));
    assert_abs_diff_eq!(states[0].angle.to_deg().0, 135.0, epsilon = 1e-9);
    assert_abs_diff_eq!(states[0].speed.0, (0.3f64.powi(2) * 2.0).sqrt(), epsilon = 1e-12);
    for state in states {
        assert_abs_diff_eq!(state.speed.0, (0.18f64).sqrt(), epsilon = 1e-12);
    }
}
