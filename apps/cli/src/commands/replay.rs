//! replay 命令
//!
//! 在仿真整车上按录制节奏回放轨迹文件

use crate::bench;
use crate::validation::{AngleValidator, validate_step};
use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use steer_sdk::prelude::*;
use steer_sdk::replay::MAX_SPEED_FACTOR;
use steer_sdk::sim::SimulatedRig;
use steer_sdk::tools::trajectory::TRAJECTORY_FILE;

/// 超过该倍数时提示注意安全
const RECOMMENDED_SPEED_FACTOR: f64 = 2.0;

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 轨迹文件路径
    #[arg(short, long, default_value = TRAJECTORY_FILE)]
    pub input: PathBuf,

    /// 回放速度倍数（1.0 = 原始速度，最大 5.0）
    #[arg(short, long, default_value_t = 1.0)]
    pub speed: f64,

    /// 仿真起始角度（度）
    #[arg(long, default_value_t = 150.0)]
    pub start: f64,

    /// 仿真每次读数移动的角度（度）
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    /// 跳过回放前确认
    #[arg(long)]
    pub confirm: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

impl ReplayCommand {
    pub fn validate(&self) -> Result<()> {
        AngleValidator::travel().validate("start", self.start)?;
        validate_step(self.step)?;
        if !(self.speed > 0.0) {
            anyhow::bail!("❌ 速度倍数必须为正数，当前: {:.2}", self.speed);
        }
        if self.speed > MAX_SPEED_FACTOR {
            anyhow::bail!("❌ 速度倍数超出最大值: {:.2} > {}", self.speed, MAX_SPEED_FACTOR);
        }
        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        self.validate()?;
        if !self.input.exists() {
            anyhow::bail!("❌ 轨迹文件不存在: {}", self.input.display());
        }
        let trajectory = Trajectory::load_from_file(&self.input)
            .with_context(|| format!("加载轨迹失败: {}", self.input.display()))?;
        let profile = bench::load_profile(self.profile.as_deref())?;

        println!("📁 文件: {}", self.input.display());
        println!(
            "🎞️ 帧数: {}，时长: {:.1}s",
            trajectory.len(),
            trajectory.duration().unwrap_or_default().as_secs_f64()
        );
        println!("⚡ 速度: {:.2}x", self.speed);
        if self.speed > RECOMMENDED_SPEED_FACTOR {
            println!("⚠️  警告: 速度超过推荐值 ({:.1}x)", RECOMMENDED_SPEED_FACTOR);
        }

        if !self.confirm && !confirm_replay()? {
            println!("❌ 操作已取消");
            return Ok(());
        }

        let rig = SimulatedRig::new(Deg(self.start), self.step, profile.continuous.convention);
        let vehicle = bench::teleop_vehicle(&rig, &profile)?;

        let token = CancellationToken::new();
        let canceller = token.clone();
        ctrlc::set_handler(move || {
            println!("\n🛑 收到停止信号，正在停车...");
            canceller.cancel();
        })
        .context("设置 Ctrl-C 处理失败")?;

        let replayer = TrajectoryReplayer::new(
            &vehicle,
            ReplayConfig {
                speed: self.speed,
                ..Default::default()
            },
        )?;
        println!("💡 提示: 按 Ctrl-C 可随时停止回放");

        let report = replayer.play(&trajectory, &token).context("回放失败")?;
        vehicle.shutdown().context("关闭整车失败")?;

        match report.outcome {
            ReplayOutcome::Completed => println!(
                "✅ 回放完成: {}/{} 帧，用时 {:.2}s",
                report.frames_played,
                report.total_frames,
                report.elapsed.as_secs_f64()
            ),
            ReplayOutcome::Cancelled => println!(
                "⚠️ 回放被用户中断: {}/{} 帧",
                report.frames_played, report.total_frames
            ),
        }
        println!("  最终角度 {}", rig.angle());
        Ok(())
    }
}

fn confirm_replay() -> Result<bool> {
    print!("即将开始回放，确定要继续吗？[y/N] ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_lowercase().starts_with('y'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(speed: f64) -> ReplayCommand {
        ReplayCommand {
            input: PathBuf::from(TRAJECTORY_FILE),
            speed,
            start: 150.0,
            step: 1.0,
            confirm: true,
            profile: None,
        }
    }

    #[test]
    fn test_validate_speed() {
        assert!(command(1.0).validate().is_ok());
        assert!(command(5.0).validate().is_ok());
        assert!(command(0.0).validate().is_err());
        assert!(command(5.5).validate().is_err());
        assert!(command(f64::NAN).validate().is_err());
    }
}
