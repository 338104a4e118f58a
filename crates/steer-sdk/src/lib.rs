//! Steer SDK - 转向电机控制 Rust SDK
//!
//! 用电机 + 角度传感器控制车辆航向，提供两种互斥的控制方式：
//!
//! - **连续跟踪** (`ContinuousSteeringLoop`): 50Hz 跟踪外部目标（手柄）
//! - **定点旋转** (`SteeringCoordinator`): 转到/转过指定角度，到位、超时或取消后结束
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **驱动层** (`driver`): H 桥执行器端口、电机状态机、所有权租约
//! - **控制层** (`control`): PID、连续跟踪、定点旋转、协调器
//! - **工具层** (`tools`): TOML 配置文件、远程命令协议、轨迹文件
//! - **组合层** (`vehicle`, `teleop`): 整车组合与手柄映射
//! - **轨迹** (`recorder`, `replay`): 手柄驾驶的录制与按原节奏回放
//!
//! # 快速开始
//!
//! ```rust,ignore
//! use steer_sdk::prelude::*;
//!
//! let profile = SteeringProfile::load_or_default(SteeringProfile::default_path()?)?;
//! let vehicle = Vehicle::new(drive_motor, steering_motor, sensor, &profile)?;
//! vehicle.dispatch(&DriveCommand::parse(r#"{"command": "left"}"#)?)?;
//! ```

pub mod logging;
pub mod prelude;
pub mod recorder;
pub mod replay;
#[cfg(feature = "mock")]
pub mod sim;
pub mod teleop;
pub mod vehicle;

/// 驱动层（高级用户使用）
pub mod driver {
    pub use steer_driver::*;
}

/// 控制层
pub mod control {
    pub use steer_control::*;
}

/// 配置文件与命令协议
pub mod tools {
    pub use steer_tools::*;
}

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

pub use steer_control::{
    AngleSource, ContinuousSteeringLoop, ControlError, Deg, PidController, RotationOutcome,
    RotationReport, SteeringCoordinator,
};
pub use steer_driver::{ActuatorPort, DriverError, MotorDriver, SharedMotor};
pub use steer_tools::{DriveCommand, SteeringProfile};

pub use logging::init_logging;
pub use recorder::TrajectoryRecorder;
pub use replay::{ReplayConfig, ReplayOutcome, ReplayReport, TrajectoryReplayer};
pub use vehicle::Vehicle;
