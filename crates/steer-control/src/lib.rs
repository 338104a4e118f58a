//! 转向控制层
//!
//! 本 crate 在 `steer-driver` 之上实现角度闭环：
//! - `PidController`: 离散 PID
//! - `ContinuousSteeringLoop`: 50Hz 连续跟踪外部目标（手柄）
//! - `run_rotation`: 有界的定点旋转（到位 / 超时 / 取消 / 传感器丢失）
//! - `SteeringCoordinator`: 相对/绝对转向入口，保证同一时刻最多一个旋转任务
//!
//! 连续跟踪与定点旋转共用一台电机，互斥由 `MotorLease` 保证：
//! 一方持有租约时，另一方的启动返回 `DriverError::MotorBusy`。

pub mod angle;
pub mod config;
pub mod continuous;
pub mod coordinator;
mod error;
pub mod pid;
pub mod rotation;
mod worker;

pub use angle::{AngleSource, CachedAngleSource, Deg, adc_to_degrees};
pub use config::{ContinuousConfig, CoordinatorConfig, DirectionConvention, PidGains, RotationConfig};
pub use continuous::{ContinuousSteeringLoop, LoopTelemetry, SteeringTarget};
pub use coordinator::SteeringCoordinator;
pub use error::ControlError;
pub use pid::PidController;
pub use rotation::{RotationOutcome, RotationReport, RotationRequest, run_rotation};
