//! X 字锁轮命令

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::session::{ProfileArg, SimSession, seconds};

#[derive(Args, Debug, Clone)]
pub struct XlockCommand {
    #[command(flatten)]
    pub profile: ProfileArg,

    /// 保持时长（秒）
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,
}

impl XlockCommand {
    pub fn execute(self) -> Result<()> {
        let duration = seconds(self.duration, "duration")?;
        let mut session = SimSession::new(&self.profile.load()?)?;
        info!("Locking wheels in X stance");
        session.drive.set_x_wheels();
        session.run_for(duration);

        for (i, module) in session.drive.modules().iter().enumerate() {
            println!("module {}: angle = {:+.1}°", i + 1, module.angle().to_deg().0);
        }
        session.summary().print();
        Ok(())
    }
}
