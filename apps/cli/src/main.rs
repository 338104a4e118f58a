//! # Steer CLI
//!
//! 转向电机控制命令行工具，所有命令都在仿真台架上运行。
//!
//! ```bash
//! # 写入默认配置
//! steer-cli config init
//!
//! # 定点旋转：90° → 150°
//! steer-cli rotate --start 90 --target 150
//!
//! # 连续跟踪（标准输入给出目标）
//! steer-cli track --dropout 0.05
//!
//! # 分发 JSON 命令
//! echo '{"command": "left"}' | steer-cli dispatch --wait
//!
//! # 录制手柄轨迹并回放
//! steer-cli record -o drive.json
//! steer-cli replay -i drive.json --speed 2.0
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod bench;
mod commands;
mod validation;

use commands::{
    ConfigCommand, DispatchCommand, RecordCommand, ReplayCommand, RotateCommand, TrackCommand,
};

/// Steer CLI - 转向控制命令行工具
#[derive(Parser, Debug)]
#[command(name = "steer-cli")]
#[command(about = "Command-line interface for steering-motor control", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 定点旋转到目标角度
    Rotate {
        #[command(flatten)]
        args: RotateCommand,
    },

    /// 连续跟踪标准输入给出的目标
    Track {
        #[command(flatten)]
        args: TrackCommand,
    },

    /// 分发 JSON 命令（每行一条）
    Dispatch {
        #[command(flatten)]
        args: DispatchCommand,
    },

    /// 录制手柄驾驶轨迹
    Record {
        #[command(flatten)]
        args: RecordCommand,
    },

    /// 回放轨迹文件
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志（输出到 stderr，stdout 留给结果）
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("steer_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Rotate { args } => args.execute(),
        Commands::Track { args } => args.execute(),
        Commands::Dispatch { args } => args.execute(),
        Commands::Record { args } => args.execute(),
        Commands::Replay { args } => args.execute(),
    }
}
