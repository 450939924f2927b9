//! 仿真会话
//!
//! 按配置装配控制端与仿真端，以固定周期交替调用 `on_update` / `update`。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use swerve_control::{Pose2d, SwerveDrive};
use swerve_hal::{Telemetry, TracingSink};
use swerve_sim::DrivetrainSimulator;
use swerve_tools::DrivetrainProfile;
use tracing::info;

/// 配置文件参数（所有运行类命令共用）
#[derive(Args, Debug, Clone, Default)]
pub struct ProfileArg {
    /// 底盘配置文件（TOML），缺省时使用内置默认配置
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

impl ProfileArg {
    pub fn load(&self) -> Result<DrivetrainProfile> {
        match &self.profile {
            Some(path) => DrivetrainProfile::load_from_file(path)
                .with_context(|| format!("加载配置文件失败: {}", path.display())),
            None => Ok(DrivetrainProfile::default_config()),
        }
    }
}

/// 一次仿真运行
pub struct SimSession {
    pub drive: SwerveDrive,
    pub sim: DrivetrainSimulator,
    period: Duration,
}

impl SimSession {
    pub fn new(profile: &DrivetrainProfile) -> Result<Self> {
        // 遥测以 trace 事件输出，RUST_LOG=swerve::telemetry=trace 可见
        let (mut drive, sim) = profile
            .build_simulated(Telemetry::new(Arc::new(TracingSink), ""))
            .context("装配仿真底盘失败")?;
        drive.on_start();
        Ok(Self {
            drive,
            sim,
            period: profile.period(),
        })
    }

    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        let arg = ProfileArg {
            profile: path.map(Path::to_path_buf),
        };
        Self::new(&arg.load()?)
    }

    pub fn step(&mut self) {
        self.drive.on_update(self.period);
        self.sim.update(self.period);
    }

    /// 运行固定时长
    pub fn run_for(&mut self, duration: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.step();
            elapsed += self.period;
        }
    }

    /// 运行直到条件满足或超时，返回条件是否满足
    pub fn run_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&SwerveDrive) -> bool,
    ) -> bool {
        let mut elapsed = Duration::ZERO;
        while elapsed < timeout {
            if done(&self.drive) {
                info!(elapsed_ms = elapsed.as_millis() as u64, "Condition reached");
                return true;
            }
            self.step();
            elapsed += self.period;
        }
        done(&self.drive)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            elapsed: self.drive.now(),
            truth: self.sim.pose(),
            estimate: self.drive.pose(),
            total_current: self.sim.total_current().0,
        }
    }
}

/// 运行结果
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub elapsed: Duration,
    pub truth: Pose2d,
    pub estimate: Pose2d,
    pub total_current: f64,
}

impl Summary {
    pub fn print(&self) {
        println!("elapsed        : {:.3} s", self.elapsed.as_secs_f64());
        println!("ground truth   : {}", format_pose(&self.truth));
        println!("estimated pose : {}", format_pose(&self.estimate));
        println!("total current  : {:.2} A", self.total_current);
    }
}

fn format_pose(pose: &Pose2d) -> String {
    format!(
        "x = {:+.3} m, y = {:+.3} m, heading = {:+.1}°",
        pose.x().0,
        pose.y().0,
        pose.heading().to_deg().0
    )
}

/// 解析以秒为单位的时长
pub fn seconds(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("无效的 {name}: {value}"))
}
