//! 仿真台架装配
//!
//! 所有子命令都在 `SimulatedRig` 上运行：电机端口与角度传感器耦合，
//! 不需要真实硬件。

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use rand::Rng;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use steer_sdk::prelude::*;
use steer_sdk::sim::{RecordingPort, SimulatedRig};

/// 加载配置文件
///
/// 指定路径时必须存在；否则使用默认路径，文件不存在时返回默认配置。
pub fn load_profile(path: Option<&Path>) -> Result<SteeringProfile> {
    match path {
        Some(path) => SteeringProfile::load_from_file(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display())),
        None => {
            let path = SteeringProfile::default_path().context("无法确定配置目录")?;
            SteeringProfile::load_or_default(&path)
                .with_context(|| format!("加载配置文件失败: {}", path.display()))
        },
    }
}

/// 带随机丢包的传感器
///
/// `dropout` 为每次读数返回 `None` 的概率。
pub fn lossy_sensor(rig: &SimulatedRig, dropout: f64) -> Arc<dyn AngleSource> {
    let inner = rig.sensor();
    if dropout <= 0.0 {
        return inner;
    }
    Arc::new(move || {
        if rand::thread_rng().gen_bool(dropout) {
            None
        } else {
            inner.read()
        }
    })
}

/// 仿真转向电机
pub fn steering_motor(rig: &SimulatedRig) -> SharedMotor {
    SharedMotor::from_port("steering", rig.port())
}

/// 手柄模式整车：仿真驱动电机 + 附加连续转向
pub fn teleop_vehicle(rig: &SimulatedRig, profile: &SteeringProfile) -> Result<Vehicle> {
    Vehicle::new(
        SharedMotor::from_port("drive", RecordingPort::new()),
        steering_motor(rig),
        rig.sensor(),
        profile,
    )
    .and_then(|vehicle| vehicle.with_continuous(rig.sensor(), profile))
    .context("创建整车失败")
}

/// 专用线程阻塞读取标准输入
///
/// 输入结束时通道断开。
pub fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossy_sensor_without_dropout_passes_through() {
        let rig = SimulatedRig::new(Deg(42.0), 1.0, DirectionConvention::default());
        let sensor = lossy_sensor(&rig, 0.0);
        assert_eq!(sensor.read(), Some(Deg(42.0)));
    }

    #[test]
    fn test_teleop_vehicle_has_continuous_steering() {
        let rig = SimulatedRig::new(Deg(150.0), 1.0, DirectionConvention::default());
        let vehicle = teleop_vehicle(&rig, &SteeringProfile::default()).unwrap();
        assert!(vehicle.continuous().is_some());
        vehicle.shutdown().unwrap();
    }

    #[test]
    fn test_load_profile_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");

        assert!(load_profile(Some(&path)).is_err());

        SteeringProfile::default().save_to_file(&path).unwrap();
        let profile = load_profile(Some(&path)).unwrap();
        assert_eq!(profile, SteeringProfile::default());
    }
}
