//! 位姿估计
//!
//! - [`SwerveOdometry`]：由模块行驶距离增量和陀螺仪航向积分得到里程计位姿
//! - [`SwervePoseEstimator`]：在里程计之上融合带时间戳的视觉位姿
//!
//! # 视觉融合
//!
//! 估计器保存最近 1.5 秒的里程计位姿。收到时间戳 `t` 的视觉位姿后：
//!
//! 1. 在历史中插值得到 `t` 时刻的里程计位姿，并按已有的视觉修正换算为该时刻的估计位姿
//! 2. 计算估计位姿到视觉位姿的 twist，各分量乘以卡尔曼增益 `k = q / (q + sqrt(q·r))`
//! 3. 记录修正后的位姿；当前估计 = 修正位姿 + 此后的里程计增量
//!
//! 超出历史窗口的视觉样本直接丢弃，时效性由调用方保证。

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use swerve_hal::Rad;
use tracing::debug;

use crate::MODULE_COUNT;
use crate::geometry::{ModulePosition, Pose2d, Rotation2d, Transform2d};
use crate::kinematics::SwerveKinematics;

/// 里程计历史窗口
pub const POSE_BUFFER_DURATION: Duration = Duration::from_millis(1500);

/// 纯轮式里程计
#[derive(Debug, Clone)]
pub struct SwerveOdometry {
    pose: Pose2d,
    gyro_offset: Rad,
    previous_angle: Rad,
    previous_positions: [ModulePosition; MODULE_COUNT],
}

impl SwerveOdometry {
    pub fn new(
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
        initial_pose: Pose2d,
    ) -> Self {
        Self {
            pose: initial_pose,
            gyro_offset: initial_pose.heading() - gyro_angle,
            previous_angle: initial_pose.heading(),
            previous_positions: positions,
        }
    }

    /// 重新锚定里程计
    pub fn reset_position(
        &mut self,
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
        pose: Pose2d,
    ) {
        *self = Self::new(gyro_angle, positions, pose);
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    /// 以最新的陀螺仪读数和模块位置更新位姿
    pub fn update(
        &mut self,
        kinematics: &SwerveKinematics,
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
    ) -> Pose2d {
        let angle = gyro_angle + self.gyro_offset;

        let deltas: [ModulePosition; MODULE_COUNT] = std::array::from_fn(|i| {
            ModulePosition::new(
                positions[i].distance - self.previous_positions[i].distance,
                positions[i].angle,
            )
        });

        let mut twist = kinematics.to_twist(&deltas);
        twist.dtheta = (angle - self.previous_angle).normalize().0;

        let moved = self.pose.exp(&twist);
        self.pose = Pose2d {
            translation: moved.translation,
            rotation: Rotation2d::new(angle),
        };
        self.previous_angle = angle;
        self.previous_positions = positions;
        self.pose
    }
}

#[derive(Debug, Clone, Copy)]
struct VisionUpdate {
    vision_pose: Pose2d,
    odometry_pose: Pose2d,
}

impl VisionUpdate {
    /// 将某一时刻的里程计位姿换算为估计位姿
    fn compensate(&self, pose: &Pose2d) -> Pose2d {
        let delta = Transform2d::between(&self.odometry_pose, pose);
        self.vision_pose.transform_by(&delta)
    }
}

/// 融合视觉的位姿估计器
#[derive(Debug, Clone)]
pub struct SwervePoseEstimator {
    kinematics: SwerveKinematics,
    odometry: SwerveOdometry,
    q: [f64; 3],
    vision_k: [f64; 3],
    odometry_buffer: VecDeque<(Duration, Pose2d)>,
    vision_updates: BTreeMap<Duration, VisionUpdate>,
    estimate: Pose2d,
}

impl SwervePoseEstimator {
    /// 创建估计器
    ///
    /// `state_std_devs` 与 `vision_std_devs` 分别为 (x 米, y 米, 航向 弧度) 的标准差。
    pub fn new(
        kinematics: SwerveKinematics,
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
        initial_pose: Pose2d,
        state_std_devs: [f64; 3],
        vision_std_devs: [f64; 3],
    ) -> Self {
        let mut estimator = Self {
            kinematics,
            odometry: SwerveOdometry::new(gyro_angle, positions, initial_pose),
            q: state_std_devs.map(|s| s * s),
            vision_k: [0.0; 3],
            odometry_buffer: VecDeque::new(),
            vision_updates: BTreeMap::new(),
            estimate: initial_pose,
        };
        estimator.set_vision_std_devs(vision_std_devs);
        estimator
    }

    /// 更新视觉测量标准差
    pub fn set_vision_std_devs(&mut self, vision_std_devs: [f64; 3]) {
        let r = vision_std_devs.map(|s| s * s);
        self.vision_k = std::array::from_fn(|i| {
            let q = self.q[i];
            if q == 0.0 { 0.0 } else { q / (q + (q * r[i]).sqrt()) }
        });
    }

    /// 当前卡尔曼增益 (x, y, 航向)
    pub fn vision_gains(&self) -> [f64; 3] {
        self.vision_k
    }

    /// 重新锚定，清空历史和视觉修正
    pub fn reset_position(
        &mut self,
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
        pose: Pose2d,
    ) {
        self.odometry.reset_position(gyro_angle, positions, pose);
        self.odometry_buffer.clear();
        self.vision_updates.clear();
        self.estimate = pose;
    }

    pub fn estimated_pose(&self) -> Pose2d {
        self.estimate
    }

    /// 纯里程计位姿（不含视觉修正）
    pub fn odometry_pose(&self) -> Pose2d {
        self.odometry.pose()
    }

    /// 在时刻 `now` 更新里程计并返回当前估计
    pub fn update_with_time(
        &mut self,
        now: Duration,
        gyro_angle: Rad,
        positions: [ModulePosition; MODULE_COUNT],
    ) -> Pose2d {
        let odometry_pose = self.odometry.update(&self.kinematics, gyro_angle, positions);

        if self
            .odometry_buffer
            .back()
            .is_some_and(|(last, _)| *last >= now)
        {
            // 同一时刻重复更新只保留最新值
            self.odometry_buffer.pop_back();
        }
        self.odometry_buffer.push_back((now, odometry_pose));
        while self
            .odometry_buffer
            .front()
            .is_some_and(|(t, _)| now.saturating_sub(*t) > POSE_BUFFER_DURATION)
        {
            self.odometry_buffer.pop_front();
        }

        self.estimate = match self.vision_updates.values().next_back() {
            Some(update) => update.compensate(&odometry_pose),
            None => odometry_pose,
        };
        self.estimate
    }

    /// 融合一个视觉位姿
    pub fn add_vision_measurement(&mut self, vision_pose: Pose2d, timestamp: Duration) {
        let (Some((oldest, _)), Some((newest, _))) =
            (self.odometry_buffer.front(), self.odometry_buffer.back())
        else {
            debug!("vision measurement ignored: no odometry history yet");
            return;
        };
        if timestamp < *oldest || timestamp > *newest {
            debug!(
                ?timestamp,
                oldest = ?oldest,
                newest = ?newest,
                "vision measurement outside pose buffer, ignored"
            );
            return;
        }

        self.clean_up_vision_updates();

        let Some(odometry_sample) = self.sample_odometry(timestamp) else {
            return;
        };

        let estimate_at_time = match self.vision_updates.range(..=timestamp).next_back() {
            Some((_, update)) => update.compensate(&odometry_sample),
            None => odometry_sample,
        };

        let twist = estimate_at_time.log(&vision_pose);
        let [kx, ky, ktheta] = self.vision_k;
        let corrected = estimate_at_time.exp(&twist.scaled(kx, ky, ktheta));

        // 晚于该时刻的修正基于旧估计，作废
        let _stale = self.vision_updates.split_off(&timestamp);
        self.vision_updates.insert(
            timestamp,
            VisionUpdate {
                vision_pose: corrected,
                odometry_pose: odometry_sample,
            },
        );

        let odometry_now = self.odometry.pose();
        if let Some(update) = self.vision_updates.values().next_back() {
            self.estimate = update.compensate(&odometry_now);
        }
        debug!(
            x = self.estimate.x().0,
            y = self.estimate.y().0,
            heading = self.estimate.heading().0,
            "vision measurement fused"
        );
    }

    /// 在历史中插值得到里程计位姿
    fn sample_odometry(&self, timestamp: Duration) -> Option<Pose2d> {
        let after = self.odometry_buffer.iter().position(|(t, _)| *t >= timestamp);
        match after {
            None => self.odometry_buffer.back().map(|(_, pose)| *pose),
            Some(0) => self.odometry_buffer.front().map(|(_, pose)| *pose),
            Some(index) => {
                let (t0, p0) = self.odometry_buffer[index - 1];
                let (t1, p1) = self.odometry_buffer[index];
                let span = (t1 - t0).as_secs_f64();
                let ratio = if span > 0.0 {
                    (timestamp - t0).as_secs_f64() / span
                } else {
                    1.0
                };
                Some(p0.interpolate(&p1, ratio))
            },
        }
    }

    /// 删除窗口之外的视觉修正，但保留窗口起点之前最近的一条
    fn clean_up_vision_updates(&mut self) {
        let Some((oldest, _)) = self.odometry_buffer.front().copied() else {
            return;
        };
        let Some(&keep_from) = self.vision_updates.range(..=oldest).next_back().map(|(t, _)| t)
        else {
            return;
        };
        self.vision_updates = self.vision_updates.split_off(&keep_from);
    }
}
