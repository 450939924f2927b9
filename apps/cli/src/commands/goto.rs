//! 位姿保持命令

use anyhow::Result;
use clap::Args;
use swerve_control::Pose2d;
use swerve_hal::{Deg, Meters};
use tracing::{info, warn};

use crate::session::{ProfileArg, SimSession, seconds};

/// 目标位姿参数
#[derive(Args, Debug, Clone)]
pub struct GotoCommand {
    #[command(flatten)]
    pub profile: ProfileArg,

    /// 目标 x（米）
    #[arg(long, allow_hyphen_values = true)]
    pub x: f64,

    /// 目标 y（米）
    #[arg(long, allow_hyphen_values = true)]
    pub y: f64,

    /// 目标航向（度）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub heading: f64,

    /// 超时（秒）
    #[arg(short, long, default_value_t = 10.0)]
    pub timeout: f64,
}

impl GotoCommand {
    pub fn target(&self) -> Pose2d {
        Pose2d::new(Meters(self.x), Meters(self.y), Deg(self.heading).to_rad().normalize())
    }

    pub fn execute(self) -> Result<()> {
        let timeout = seconds(self.timeout, "timeout")?;
        let mut session = SimSession::new(&self.profile.load()?)?;
        let target = self.target();

        info!(x = self.x, y = self.y, heading_deg = self.heading, "Holding pose");
        session.drive.set_pose(target);
        if session.run_until(timeout, |drive| drive.is_at_set_pose()) {
            println!("✅ 已到达目标位姿");
        } else {
            warn!(timeout_s = self.timeout, "Target pose not reached");
            println!("⚠️  超时，未到达目标位姿");
        }
        session.summary().print();
        Ok(())
    }
}
