//! track 命令
//!
//! 在仿真台架上运行连续转向控制，从标准输入读取目标：
//!
//! ```text
//! 180          # 目标角度（度）
//! axis -0.5    # 手柄轴值 [-1, 1]
//! status       # 打印遥测
//! quit
//! ```
//!
//! Ctrl-C 或输入结束时停止控制循环。

use crate::bench;
use crate::validation::{AngleValidator, validate_probability, validate_step};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use steer_sdk::prelude::*;
use steer_sdk::sim::SimulatedRig;
use tracing::{debug, warn};

/// 连续跟踪命令参数
#[derive(Args, Debug)]
pub struct TrackCommand {
    /// 仿真起始角度（度）
    #[arg(long, default_value_t = 150.0)]
    pub start: f64,

    /// 仿真每次读数移动的角度（度）
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    /// 传感器丢包概率 [0, 1)
    #[arg(long, default_value_t = 0.0)]
    pub dropout: f64,

    /// 配置文件路径
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

/// 标准输入中的一行
#[derive(Debug, Clone, PartialEq)]
pub enum TrackInput {
    /// 目标角度
    Target(Deg),
    /// 手柄轴值
    Axis(f64),
    /// 打印遥测
    Status,
    /// 退出
    Quit,
}

impl TrackInput {
    /// 解析一行输入，空行返回 `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(None);
        };

        let input = match head {
            "quit" | "exit" => TrackInput::Quit,
            "status" => TrackInput::Status,
            "axis" => {
                let value = parts
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("axis 需要一个数值"))?
                    .parse::<f64>()
                    .context("解析轴值失败")?;
                TrackInput::Axis(value)
            },
            angle => TrackInput::Target(Deg(angle.parse::<f64>().context("解析目标角度失败")?)),
        };
        Ok(Some(input))
    }
}

impl TrackCommand {
    pub fn validate(&self) -> Result<()> {
        AngleValidator::travel().validate("start", self.start)?;
        validate_step(self.step)?;
        validate_probability("dropout", self.dropout)
    }

    pub fn execute(&self) -> Result<()> {
        self.validate()?;
        let profile = bench::load_profile(self.profile.as_deref())?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
            println!("\n收到退出信号，正在停止...");
        })
        .context("设置 Ctrl-C 处理失败")?;

        let rig = SimulatedRig::new(Deg(self.start), self.step, profile.continuous.convention);
        let steering = ContinuousSteeringLoop::new(
            bench::steering_motor(&rig),
            bench::lossy_sensor(&rig, self.dropout),
            profile.continuous.clone(),
        )
        .context("创建连续转向失败")?;
        let mapper = SteeringAxisMapper::from_settings(&profile.teleop);
        let mut filter = AxisFilter::new(profile.teleop.change_sensitivity);

        steering.start().context("启动连续转向失败")?;
        println!("🔁 连续转向已启动（{:.0} Hz），输入目标角度或 `axis <v>`，Ctrl-C 退出", profile.continuous.frequency_hz);

        let lines = bench::stdin_lines();
        while running.load(Ordering::SeqCst) {
            let line = match lines.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match TrackInput::parse(&line) {
                Ok(None) => {},
                Ok(Some(TrackInput::Quit)) => break,
                Ok(Some(TrackInput::Status)) => print_status(&steering, &rig),
                Ok(Some(TrackInput::Target(angle))) => {
                    let target = steering.set_target(angle);
                    println!("→ 目标 {}", target);
                },
                Ok(Some(TrackInput::Axis(value))) => match filter.accept(value) {
                    Some(value) => {
                        let target = steering.set_target(mapper.map(value));
                        println!("→ 轴 {:.2} → 目标 {}", value, target);
                    },
                    None => debug!("Axis change {:.3} below sensitivity, ignored", value),
                },
                Err(e) => {
                    warn!("Invalid input '{}': {}", line.trim(), e);
                    println!("⚠️ {}", e);
                },
            }
        }

        steering.stop().context("停止连续转向失败")?;
        print_status(&steering, &rig);
        println!("✅ 已停止");
        Ok(())
    }
}

fn print_status(steering: &ContinuousSteeringLoop, rig: &SimulatedRig) {
    let telemetry = steering.telemetry();
    println!("📊 角度 {}，目标 {}", rig.angle(), steering.target());
    println!(
        "  周期数: {}，跳过: {}，超时: {}",
        telemetry.ticks, telemetry.skipped_ticks, telemetry.overruns
    );
    if let Some(command) = telemetry.last_command {
        println!("  最近命令: {}", command);
    }
    if let Some(fault) = telemetry.last_fault.as_ref() {
        println!("  最近故障: {}", fault);
    }
}
