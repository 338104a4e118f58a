//! 共享电机与所有权租约
//!
//! 连续转向与定点旋转共用一台电机，但同一时刻只能有一个会话驱动它。
//! `SharedMotor` 记录当前挂载的会话，`try_acquire()` 返回的 `MotorLease`
//! 是驱动电机的唯一途径；租约 drop 时自动归还。
//!
//! 急停（`stop_immediately`）和状态读取不需要租约。

use crate::cancel::CancellationToken;
use crate::error::DriverError;
use crate::motor::{GracefulStopConfig, MotorDriver};
use crate::port::{ActuatorPort, Duty};
use crate::state::{Direction, MotorState};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct Inner {
    driver: Mutex<MotorDriver>,
    /// 当前持有租约的会话名
    holder: Mutex<Option<String>>,
}

/// 线程间共享的电机
///
/// Clone 共享同一台电机。
#[derive(Clone)]
pub struct SharedMotor {
    inner: Arc<Inner>,
}

impl SharedMotor {
    /// 包装已有的驱动
    pub fn new(driver: MotorDriver) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver: Mutex::new(driver),
                holder: Mutex::new(None),
            }),
        }
    }

    /// 直接从端口创建
    pub fn from_port(name: impl Into<String>, port: impl ActuatorPort + 'static) -> Self {
        Self::new(MotorDriver::new(name, port))
    }

    /// 电机名称
    pub fn name(&self) -> String {
        self.inner.driver.lock().name().to_string()
    }

    /// 当前状态
    pub fn state(&self) -> MotorState {
        self.inner.driver.lock().state()
    }

    /// 立即停止（无需租约）
    pub fn stop_immediately(&self) -> Result<(), DriverError> {
        self.inner.driver.lock().stop_immediately()
    }

    /// 减速停止（无需租约，阻塞）
    ///
    /// 斜坡期间持有电机锁，其他会话的驱动命令会等到斜坡结束。
    pub fn graceful_stop(&self, config: &GracefulStopConfig) -> Result<(), DriverError> {
        self.inner.driver.lock().graceful_stop(config)
    }

    /// 释放执行器端口
    pub fn cleanup(&self) -> Result<(), DriverError> {
        self.inner.driver.lock().cleanup()
    }

    /// 当前租约持有者
    pub fn holder(&self) -> Option<String> {
        self.inner.holder.lock().clone()
    }

    /// 是否有会话挂载
    pub fn is_attached(&self) -> bool {
        self.inner.holder.lock().is_some()
    }

    /// 尝试获取驱动租约
    ///
    /// # 错误
    ///
    /// - `DriverError::MotorBusy`: 已有其他会话持有租约
    /// - `DriverError::Released`: 电机已释放
    pub fn try_acquire(&self, owner: impl Into<String>) -> Result<MotorLease, DriverError> {
        let owner = owner.into();
        let mut holder = self.inner.holder.lock();

        if let Some(current) = holder.as_ref() {
            warn!(
                "Motor lease for '{}' rejected: held by '{}'",
                owner, current
            );
            return Err(DriverError::MotorBusy {
                holder: current.clone(),
            });
        }
        if self.inner.driver.lock().is_released() {
            return Err(DriverError::Released);
        }

        *holder = Some(owner.clone());
        debug!("Motor lease acquired by '{}'", owner);

        Ok(MotorLease {
            owner,
            motor: self.clone(),
        })
    }
}

impl std::fmt::Debug for SharedMotor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMotor")
            .field("state", &self.state())
            .field("holder", &self.holder())
            .finish()
    }
}

/// 定时转向结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedTurn {
    /// 保持满 `duration` 后停止
    Completed,
    /// 等待期间被取消，已提前停止
    Cancelled,
}

/// 电机驱动租约
///
/// 持有期间其他会话的 `try_acquire()` 返回 `MotorBusy`。
pub struct MotorLease {
    owner: String,
    motor: SharedMotor,
}

impl MotorLease {
    /// 租约持有者
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 所属电机
    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }

    /// 锁定驱动
    ///
    /// 控制循环需要在持锁状态下检查停止令牌再驱动，保证 `stop()` 之后不会再有输出。
    pub fn lock(&self) -> MutexGuard<'_, MotorDriver> {
        self.motor.inner.driver.lock()
    }

    /// 驱动电机
    pub fn drive(&self, direction: Direction, duty: Duty) -> Result<(), DriverError> {
        self.lock().drive(direction, duty)
    }

    /// 立即停止
    pub fn stop_immediately(&self) -> Result<(), DriverError> {
        self.lock().stop_immediately()
    }

    /// 定时转向
    ///
    /// 以 `duty` 向 `direction`（仅 Left/Right）转动 `duration`，然后立即停止。
    /// 保持期间不持有电机锁，`token` 取消会立刻唤醒并停止。
    pub fn drive_for(
        &self,
        direction: Direction,
        duty: Duty,
        duration: Duration,
        token: &CancellationToken,
    ) -> Result<TimedTurn, DriverError> {
        if !direction.is_turn() {
            return Err(DriverError::InvalidInput(format!(
                "timed turn requires left or right, got {}",
                direction
            )));
        }

        self.drive(direction, duty)?;

        let outcome = if token.wait_timeout(duration) {
            info!(
                "Timed {} turn for '{}' cancelled before {:?}",
                direction, self.owner, duration
            );
            TimedTurn::Cancelled
        } else {
            TimedTurn::Completed
        };

        self.stop_immediately()?;
        Ok(outcome)
    }
}

impl Drop for MotorLease {
    fn drop(&mut self) {
        let mut holder = self.motor.inner.holder.lock();
        if holder.as_deref() == Some(self.owner.as_str()) {
            *holder = None;
            debug!("Motor lease released by '{}'", self.owner);
        }
    }
}

impl std::fmt::Debug for MotorLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorLease")
            .field("owner", &self.owner)
            .finish()
    }
}
