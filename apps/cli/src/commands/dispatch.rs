//! dispatch 命令
//!
//! 从标准输入逐行读取 JSON 命令，分发给仿真整车：
//!
//! ```text
//! {"command": "forward", "speed": 40}
//! {"command": "left", "turning_angle": 30}
//! {"command": "stop"}
//! ```

use crate::bench;
use crate::validation::{AngleValidator, validate_step};
use anyhow::{Context, Result};
use clap::Args;
use std::io::BufRead;
use std::path::PathBuf;
use steer_sdk::prelude::*;
use steer_sdk::sim::{RecordingPort, SimulatedRig};
use tracing::warn;

/// 命令分发参数
#[derive(Args, Debug)]
pub struct DispatchCommand {
    /// 仿真起始角度（度）
    #[arg(long, default_value_t = 150.0)]
    pub start: f64,

    /// 仿真每次读数移动的角度（度）
    #[arg(long, default_value_t = 2.0)]
    pub step: f64,

    /// 每条转向命令都等待旋转结束
    #[arg(long)]
    pub wait: bool,

    /// 配置文件路径
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

/// 分发统计
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DispatchSummary {
    pub accepted: usize,
    pub rejected: usize,
}

impl DispatchCommand {
    pub fn validate(&self) -> Result<()> {
        AngleValidator::travel().validate("start", self.start)?;
        validate_step(self.step)
    }

    pub fn execute(&self) -> Result<()> {
        self.validate()?;
        let profile = bench::load_profile(self.profile.as_deref())?;

        let rig = SimulatedRig::new(Deg(self.start), self.step, profile.rotation.convention);
        let drive_port = RecordingPort::new();
        let vehicle = Vehicle::new(
            SharedMotor::from_port("drive", drive_port),
            bench::steering_motor(&rig),
            rig.sensor(),
            &profile,
        )
        .context("创建整车失败")?;

        let stdin = std::io::stdin();
        let summary = self.run(&vehicle, stdin.lock())?;

        if let Some(report) = vehicle.coordinator().wait()? {
            println!("  最后一次转向: {}（{}）", report.outcome, report.target);
        }
        vehicle.shutdown().context("关闭整车失败")?;

        println!(
            "📋 已执行 {} 条，拒绝 {} 条；最终角度 {}",
            summary.accepted,
            summary.rejected,
            rig.angle()
        );
        Ok(())
    }

    /// 逐行分发，单条失败不会中止
    pub fn run(&self, vehicle: &Vehicle, input: impl BufRead) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();

        for line in input.lines() {
            let line = line.context("读取标准输入失败")?;
            if line.trim().is_empty() {
                continue;
            }

            let result = DriveCommand::parse(&line)
                .map_err(anyhow::Error::from)
                .and_then(|command| {
                    vehicle.dispatch(&command)?;
                    Ok(command)
                });

            match result {
                Ok(command) => {
                    summary.accepted += 1;
                    println!("✅ {}", command);
                    if self.wait
                        && let Some(report) = vehicle.coordinator().wait()?
                    {
                        println!("  {} → {}", report.outcome, report.target);
                    }
                },
                Err(e) => {
                    summary.rejected += 1;
                    warn!("Command rejected: {}", e);
                    println!("❌ {}", e);
                },
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_run_counts_accepted_and_rejected() {
        let cmd = DispatchCommand {
            start: 150.0,
            step: 2.0,
            wait: true,
            profile: None,
        };
        let rig = SimulatedRig::new(Deg(150.0), 2.0, DirectionConvention::default());
        let vehicle = Vehicle::new(
            SharedMotor::from_port("drive", RecordingPort::new()),
            bench::steering_motor(&rig),
            rig.sensor(),
            &SteeringProfile::default(),
        )
        .unwrap();

        let input = Cursor::new(
            "{\"command\": \"forward\"}\n\nnot json\n{\"command\": \"right\", \"turning_angle\": 15}\n{\"command\": \"stop\"}\n",
        );
        let summary = cmd.run(&vehicle, input).unwrap();

        assert_eq!(
            summary,
            DispatchSummary {
                accepted: 3,
                rejected: 1
            }
        );
        assert!((rig.angle().0 - 160.0).abs() <= 2.0);
        assert!(vehicle.drive_state().is_stopped());
    }
}
