//! 配置管理命令
//!
//! 管理 TOML 转向配置文件（PID 增益、频率、齿轮比等）

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;
use steer_sdk::tools::SteeringProfile;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 写入默认配置文件
    Init {
        /// 配置文件路径（默认使用用户配置目录）
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },

    /// 显示当前生效的配置
    Show {
        /// 配置文件路径（默认使用用户配置目录）
        #[arg(short, long)]
        path: Option<PathBuf>,
    },

    /// 显示默认配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Init { path, force } => Self::init_(path, force),
            ConfigCommand::Show { path } => Self::show_(path),
            ConfigCommand::Path => Self::path_(),
        }
    }

    fn resolve(path: Option<PathBuf>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path),
            None => SteeringProfile::default_path().context("无法确定配置目录"),
        }
    }

    fn init_(path: Option<PathBuf>, force: bool) -> Result<()> {
        let path = Self::resolve(path)?;

        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }

        SteeringProfile::default()
            .save_to_file(&path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;

        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }

    fn show_(path: Option<PathBuf>) -> Result<()> {
        let profile = crate::bench::load_profile(path.as_deref())?;
        print!("{}", render(&profile)?);
        Ok(())
    }

    fn path_() -> Result<()> {
        let path = Self::resolve(None)?;
        println!("{}", path.display());
        if !path.is_file() {
            println!("(未创建，使用默认配置)");
        }
        Ok(())
    }
}

fn render(profile: &SteeringProfile) -> Result<String> {
    profile.to_toml_string().context("序列化配置失败")
}
