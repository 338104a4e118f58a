//! 驱动层模块
//!
//! 本模块提供转向电机（H 桥，双 PWM + 双使能）的驱动功能，包括：
//! - `ActuatorPort` 硬件抽象（设置通道占空比 / 断电）
//! - `MotorDriver` 电机状态机（前进、后退、左转、右转、停止、减速斜坡）
//! - `SharedMotor` / `MotorLease` 所有权令牌（同一时刻只允许一个控制会话驱动电机）
//! - `CancellationToken` 可取消等待（替代阻塞式 sleep）
//!
//! # 使用场景
//!
//! 控制层（`steer-control`）通过 `MotorLease` 驱动电机；
//! 急停路径（`SharedMotor::stop_immediately`）无需租约，任何线程都可以调用。

mod cancel;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod motor;
pub mod port;
mod shared;
pub mod state;

pub use cancel::CancellationToken;
pub use error::{ActuatorFault, ActuatorOp, DriverError};
pub use motor::{GracefulStopConfig, MotorDriver};
pub use port::{ActuatorPort, Duty, PwmChannel};
pub use shared::{MotorLease, SharedMotor, TimedTurn};
pub use state::{Direction, MotorState};
