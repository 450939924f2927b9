//! 配置文件命令

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use swerve_tools::DrivetrainProfile;

/// 配置文件命令
#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// 写入默认配置
    Init {
        /// 输出路径
        path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 加载并校验配置
    Check {
        /// 配置文件路径
        path: PathBuf,
    },
}

impl ProfileCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ProfileCommand::Init { path, force } => {
                if path.exists() && !force {
                    anyhow::bail!("{} 已存在（使用 --force 覆盖）", path.display());
                }
                DrivetrainProfile::default_config()
                    .save_to_file(&path)
                    .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
                println!("✅ 默认配置已写入 {}", path.display());
                Ok(())
            },
            ProfileCommand::Check { path } => {
                let profile = DrivetrainProfile::load_from_file(&path)
                    .with_context(|| format!("配置文件无效: {}", path.display()))?;
                println!("✅ {} 有效", path.display());
                println!(
                    "   mass = {} kg, wheel radius = {} m, period = {} ms",
                    profile.chassis.mass.0, profile.chassis.wheel_radius.0, profile.chassis.period_ms
                );
                println!(
                    "   drive = {:?} x{} ({}:1), steer = {:?} x{} ({}:1)",
                    profile.drive_motor.preset,
                    profile.drive_motor.count,
                    profile.drive_motor.reduction,
                    profile.steer_motor.preset,
                    profile.steer_motor.count,
                    profile.steer_motor.reduction
                );
                Ok(())
            },
        }
    }
}
