//! # Swerve CLI
//!
//! 在仿真底盘上运行控制代码的命令行工具。
//!
//! ```bash
//! # 生成默认底盘配置
//! swerve-cli profile init drivetrain.toml
//!
//! # 以 1 m/s 前进 2 秒
//! swerve-cli drive --profile drivetrain.toml --vx 1.0 --duration 2.0
//!
//! # 闭环移动到目标位姿
//! swerve-cli goto --x 1.0 --y 0.5 --heading 90
//! ```
//!
//! 日志级别通过 `RUST_LOG` 调整，默认 `swerve_cli=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod session;

use commands::{DriveCommand, GotoCommand, ProfileCommand, XlockCommand};

/// Swerve CLI - 底盘仿真命令行工具
#[derive(Parser, Debug)]
#[command(name = "swerve-cli")]
#[command(about = "Run swerve drivetrain control against the physics simulator", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 底盘配置文件管理
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// 以恒定速度行驶
    Drive {
        #[command(flatten)]
        args: DriveCommand,
    },

    /// 闭环移动到目标位姿
    Goto {
        #[command(flatten)]
        args: GotoCommand,
    },

    /// X 字锁轮
    Xlock {
        #[command(flatten)]
        args: XlockCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("swerve_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Profile(cmd) => cmd.execute(),
        Commands::Drive { args } => args.execute(),
        Commands::Goto { args } => args.execute(),
        Commands::Xlock { args } => args.execute(),
    }
}
