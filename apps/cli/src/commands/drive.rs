//! 恒速行驶命令

use anyhow::Result;
use clap::Args;
use swerve_control::{ChassisSpeeds, FieldRelativeSpeeds};
use swerve_hal::{Deg, MetersPerSec, RadPerSec};
use tracing::info;

use crate::session::{ProfileArg, SimSession, seconds};

/// 行驶命令参数
#[derive(Args, Debug, Clone)]
pub struct DriveCommand {
    #[command(flatten)]
    pub profile: ProfileArg,

    /// x 方向速度（m/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vx: f64,

    /// y 方向速度（m/s）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub vy: f64,

    /// 角速度（度/秒，逆时针为正）
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub omega: f64,

    /// 速度以场地坐标系表示
    #[arg(long)]
    pub field_relative: bool,

    /// 运行时长（秒）
    #[arg(short, long, default_value_t = 2.0)]
    pub duration: f64,
}

impl DriveCommand {
    pub fn execute(self) -> Result<()> {
        let duration = seconds(self.duration, "duration")?;
        let mut session = SimSession::new(&self.profile.load()?)?;
        self.command(&mut session);

        info!(
            vx = self.vx,
            vy = self.vy,
            omega_deg = self.omega,
            field_relative = self.field_relative,
            "Driving"
        );
        session.run_for(duration);
        session.summary().print();
        Ok(())
    }

    fn command(&self, session: &mut SimSession) {
        let vx = MetersPerSec(self.vx);
        let vy = MetersPerSec(self.vy);
        let omega = RadPerSec(Deg(self.omega).to_rad().0);
        if self.field_relative {
            session
                .drive
                .set_field_relative_velocity(FieldRelativeSpeeds::new(vx, vy, omega));
        } else {
            session.drive.set_velocity(ChassisSpeeds::new(vx, vy, omega));
        }
    }
}
