//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use steer_sdk::prelude::*;
//! ```

// 组合层（推荐使用）
pub use crate::teleop::{AxisFilter, DriveAction, DriveAxisMapper, SteeringAxisMapper};
pub use crate::recorder::TrajectoryRecorder;
pub use crate::replay::{ReplayConfig, ReplayOutcome, ReplayReport, TrajectoryReplayer};
pub use crate::vehicle::Vehicle;

// 控制层
pub use steer_control::{
    AngleSource, ContinuousConfig, ContinuousSteeringLoop, CoordinatorConfig, Deg,
    DirectionConvention, PidController, PidGains, RotationConfig, RotationOutcome, RotationReport,
    SteeringCoordinator,
};

// 驱动层
pub use steer_driver::{
    ActuatorPort, CancellationToken, Direction, Duty, GracefulStopConfig, MotorDriver, MotorState,
    PwmChannel, SharedMotor,
};

// 配置与命令
pub use steer_tools::{CommandKind, DriveCommand, JoystickSample, SteeringProfile, Trajectory, TrajectoryFrame};

// 错误类型
pub use steer_control::ControlError;
pub use steer_driver::{ActuatorFault, ActuatorOp, DriverError};
pub use steer_tools::{CommandError, ConfigError, TrajectoryError};
