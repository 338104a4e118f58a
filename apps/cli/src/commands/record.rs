//! record 命令
//!
//! 在仿真整车上手柄驾驶并录制轨迹，标准输入每行给出一组轴值：
//!
//! ```text
//! 0.5 -0.2     # 油门 转向，范围 [-1, 1]
//! quit
//! ```
//!
//! Ctrl-C 或输入结束时停止录制并保存。

use crate::bench;
use crate::validation::{AngleValidator, validate_step};
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use steer_sdk::prelude::*;
use steer_sdk::sim::SimulatedRig;
use steer_sdk::tools::trajectory::TRAJECTORY_FILE;
use tracing::warn;

/// 录制命令参数
#[derive(Args, Debug)]
pub struct RecordCommand {
    /// 输出文件路径
    #[arg(short, long, default_value = TRAJECTORY_FILE)]
    pub output: PathBuf,

    /// 采样间隔（毫秒）
    #[arg(long, default_value_t = 200)]
    pub interval_ms: u64,

    /// 仿真起始角度（度）
    #[arg(long, default_value_t = 150.0)]
    pub start: f64,

    /// 仿真每次读数移动的角度（度）
    #[arg(long, default_value_t = 1.0)]
    pub step: f64,

    /// 配置文件路径
    #[arg(short, long)]
    pub profile: Option<PathBuf>,
}

/// 解析一行 `<油门> <转向>`，空行返回 `None`
pub fn parse_axes(line: &str) -> Result<Option<JoystickSample>> {
    let mut parts = line.split_whitespace();
    let Some(throttle) = parts.next() else {
        return Ok(None);
    };
    let steering = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("需要两个轴值：<油门> <转向>"))?;

    Ok(Some(JoystickSample {
        throttle: throttle.parse().context("解析油门失败")?,
        steering: steering.parse().context("解析转向失败")?,
    }))
}

impl RecordCommand {
    pub fn validate(&self) -> Result<()> {
        AngleValidator::travel().validate("start", self.start)?;
        validate_step(self.step)?;
        if self.interval_ms == 0 {
            anyhow::bail!("interval-ms 必须大于 0");
        }
        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        self.validate()?;
        let profile = bench::load_profile(self.profile.as_deref())?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            r.store(false, Ordering::SeqCst);
            println!("\n收到退出信号，正在停止录制...");
        })
        .context("设置 Ctrl-C 处理失败")?;

        let rig = SimulatedRig::new(Deg(self.start), self.step, profile.continuous.convention);
        let vehicle = bench::teleop_vehicle(&rig, &profile)?;
        if let Some(steering) = vehicle.continuous() {
            steering.start().context("启动连续转向失败")?;
        }

        let recorder = Arc::new(TrajectoryRecorder::new(rig.sensor()));
        let token = CancellationToken::new();
        let sampler = recorder
            .spawn_sampler(Duration::from_millis(self.interval_ms), token.clone())
            .context("启动采样线程失败")?;

        println!("🔴 开始录制（每 {}ms 采样），输入 `<油门> <转向>`，Ctrl-C 结束", self.interval_ms);

        let lines = bench::stdin_lines();
        while running.load(Ordering::SeqCst) {
            let line = match lines.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if matches!(line.trim(), "quit" | "exit") {
                break;
            }

            match parse_axes(&line) {
                Ok(None) => {},
                Ok(Some(sample)) => {
                    recorder.set_throttle(sample.throttle);
                    recorder.set_steering(sample.steering);
                    match vehicle.apply_drive_axis(sample.throttle) {
                        Ok(action) => println!("→ {:?}", action),
                        Err(e) => warn!("Drive axis rejected: {}", e),
                    }
                    if let Some(target) = vehicle.apply_steering_axis(sample.steering) {
                        println!("→ 目标 {}", target);
                    }
                    // 输入变化时立即记录，不等下一次采样
                    recorder.sample();
                },
                Err(e) => {
                    warn!("Invalid input '{}': {}", line.trim(), e);
                    println!("⚠️ {}", e);
                },
            }
        }

        token.cancel();
        if sampler.join().is_err() {
            warn!("Recorder thread panicked");
        }
        recorder.sample();
        vehicle.shutdown().context("关闭整车失败")?;

        let trajectory = recorder.take();
        if trajectory.is_empty() {
            anyhow::bail!("没有录制到任何帧（传感器无读数）");
        }
        println!("✅ 录制完成: {} 帧", trajectory.len());

        println!("💾 保存到: {}", self.output.display());
        trajectory
            .save_to_file(&self.output)
            .with_context(|| format!("保存轨迹失败: {}", self.output.display()))?;
        println!("✅ 保存完成");
        Ok(())
    }
}
