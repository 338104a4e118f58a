//! # Steer Tools - 共享配置与命令协议
//!
//! **依赖原则**: 只依赖配置结构（`steer-control` / `steer-driver` 的 serde feature），
//! 不启动任何控制线程。
//!
//! ## 包含模块
//!
//! - `profile` - TOML 配置文件（所有可调参数）
//! - `command` - 远程驾驶命令的 JSON 负载
//! - `trajectory` - 手柄驾驶轨迹的录制文件

pub mod command;
pub mod profile;
pub mod trajectory;

pub use command::{CommandError, CommandKind, DriveCommand};
pub use profile::{ConfigError, DriveSettings, SteeringProfile, TeleopSettings};
pub use trajectory::{JoystickSample, Trajectory, TrajectoryError, TrajectoryFrame};
