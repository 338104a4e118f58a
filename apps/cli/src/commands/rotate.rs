//! rotate 命令
//!
//! 在仿真台架上执行一次定点旋转，到位、超时或取消后输出结果

use crate::bench;
use crate::validation::{AngleValidator, validate_step};
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use steer_sdk::prelude::*;
use steer_sdk::sim::SimulatedRig;

/// 定点旋转命令参数
#[derive(Args, Debug)]
pub struct RotateCommand {
    /// 仿真起始角度（度）
    #[arg(long, default_value_t = 90.0)]
    pub start: f64,

    /// 目标角度（度）
    #[arg(short, long)]
    pub target: f64,

    /// 到位容差（度，覆盖配置）
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// 超时时间（毫秒，覆盖配置）
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// 仿真每次读数移动的角度（度）
    #[arg(long, default_value_t = 5.0)]
    pub step: f64,

    /// 配置文件路径
    #[arg(short, long)]
    pub profile: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,
}

impl RotateCommand {
    /// 检查参数
    pub fn validate(&self) -> Result<()> {
        let validator = AngleValidator::travel();
        validator.validate("start", self.start)?;
        validator.validate("target", self.target)?;
        validate_step(self.step)?;
        if let Some(tolerance) = self.tolerance
            && !(tolerance >= 0.0)
        {
            anyhow::bail!("容差必须 >= 0，得到 {}", tolerance);
        }
        if self.timeout_ms == Some(0) {
            anyhow::bail!("超时时间必须 > 0");
        }
        Ok(())
    }

    /// 合并命令行覆盖项后的协调器配置
    fn coordinator_config(&self, profile: &SteeringProfile) -> CoordinatorConfig {
        let mut config = profile.coordinator.clone();
        if let Some(tolerance) = self.tolerance {
            config.tolerance = tolerance;
        }
        if let Some(ms) = self.timeout_ms {
            config.max_duration = Duration::from_millis(ms);
        }
        config
    }

    pub fn execute(&self) -> Result<()> {
        self.validate()?;
        let profile = bench::load_profile(self.profile.as_deref())?;

        let rig = SimulatedRig::new(Deg(self.start), self.step, profile.rotation.convention);
        let coordinator = SteeringCoordinator::new(
            bench::steering_motor(&rig),
            rig.sensor(),
            self.coordinator_config(&profile),
            profile.rotation.clone(),
        )
        .context("创建协调器失败")?;

        if !self.json {
            println!("🎯 {} → {}", Deg(self.start), Deg(self.target));
        }
        coordinator.turn_to(Deg(self.target)).context("启动旋转失败")?;
        let report = coordinator
            .wait()?
            .ok_or_else(|| anyhow::anyhow!("旋转任务未返回结果"))?;

        if self.json {
            let value = serde_json::json!({
                "outcome": report.outcome.to_string(),
                "target": report.target.0,
                "final_angle": report.final_angle.map(|a| a.0),
                "elapsed_ms": report.elapsed.as_millis() as u64,
                "ticks": report.ticks,
                "sensor_misses": report.sensor_misses,
            });
            println!("{}", value);
        } else {
            let icon = if report.is_converged() { "✅" } else { "⚠️" };
            println!("{} 结果: {}", icon, report.outcome);
            if let Some(angle) = report.final_angle {
                println!("  最终角度: {}", angle);
            }
            println!("  耗时: {:?}，周期数: {}", report.elapsed, report.ticks);
        }

        if !report.is_converged() {
            anyhow::bail!("旋转未到位: {}", report.outcome);
        }
        Ok(())
    }
}
