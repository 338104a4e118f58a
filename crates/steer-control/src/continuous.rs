//! 连续转向控制
//!
//! 以固定频率（默认 50Hz）跟踪外部给定的目标角度（如手柄）。
//!
//! # 状态
//!
//! ```text
//! Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!                         │
//!                         └── 执行器故障超过容忍次数 ──▶ Stopped（错误由 stop() 返回）
//! ```
//!
//! # 停止保证
//!
//! 控制线程在**持有电机锁**时检查停止令牌再驱动；`stop()` 先取消令牌，
//! 再获取同一把锁执行 `stop_immediately`。因此 `stop()` 返回后不会再有驱动输出，
//! 即使线程没有在 join 超时内退出。

use crate::angle::{AngleSource, Deg};
use crate::config::ContinuousConfig;
use crate::error::ControlError;
use crate::pid::PidController;
use crate::worker::Worker;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use steer_driver::{CancellationToken, DriverError, MotorLease, MotorState, SharedMotor};
use tracing::{debug, error, info, trace, warn};

/// 连续转向会话在电机上登记的持有者名
pub const CONTINUOUS_OWNER: &str = "continuous-steering";

/// 共享目标角度
///
/// 以 `f64` 位模式存放在 `AtomicU64` 中。写入时钳位到 [0, 300]，后写覆盖先写。
#[derive(Debug)]
pub struct SteeringTarget {
    bits: AtomicU64,
}

impl SteeringTarget {
    pub fn new(initial: Deg) -> Self {
        Self {
            bits: AtomicU64::new(initial.clamp_to_travel().0.to_bits()),
        }
    }

    /// 写入目标，返回钳位后的值
    pub fn set(&self, angle: Deg) -> Deg {
        let clamped = angle.clamp_to_travel();
        self.bits.store(clamped.0.to_bits(), Ordering::Release);
        clamped
    }

    /// 读取目标
    pub fn get(&self) -> Deg {
        Deg(f64::from_bits(self.bits.load(Ordering::Acquire)))
    }
}

/// 连续转向遥测快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopTelemetry {
    /// 控制线程是否在运行
    pub running: bool,
    /// 本次会话的周期数
    pub ticks: u64,
    /// 因传感器无读数跳过的周期数
    pub skipped_ticks: u64,
    /// 周期超时次数（处理耗时超过周期）
    pub overruns: u64,
    /// 最近一次读数
    pub last_reading: Option<Deg>,
    /// 最近一次 PID 输出
    pub last_signal: Option<f64>,
    /// 最近一次成功下发的驱动命令
    pub last_command: Option<MotorState>,
    /// 最近一次执行器故障
    pub last_fault: Option<DriverError>,
}

struct Session {
    token: CancellationToken,
    worker: Worker<Result<(), ControlError>>,
}

/// 连续转向控制循环
///
/// 通过 `&self` 操作，可以放进 `Arc` 在手柄线程和主线程之间共享。
pub struct ContinuousSteeringLoop {
    motor: SharedMotor,
    sensor: Arc<dyn AngleSource>,
    config: ContinuousConfig,
    target: Arc<SteeringTarget>,
    telemetry: Arc<ArcSwap<LoopTelemetry>>,
    session: Mutex<Option<Session>>,
}

impl ContinuousSteeringLoop {
    /// 创建控制循环（不启动）
    pub fn new(
        motor: SharedMotor,
        sensor: Arc<dyn AngleSource>,
        config: ContinuousConfig,
    ) -> Result<Self, ControlError> {
        config.validate()?;
        let target = Arc::new(SteeringTarget::new(config.initial_target));
        Ok(Self {
            motor,
            sensor,
            config,
            target,
            telemetry: Arc::new(ArcSwap::from_pointee(LoopTelemetry::default())),
            session: Mutex::new(None),
        })
    }

    /// 配置
    pub fn config(&self) -> &ContinuousConfig {
        &self.config
    }

    /// 启动控制线程
    ///
    /// 已在运行时仅记录警告并返回 `Ok(())`。
    ///
    /// # 错误
    ///
    /// - `ControlError::Driver(DriverError::MotorBusy)`: 电机正被定点旋转占用
    pub fn start(&self) -> Result<(), ControlError> {
        let mut session = self.session.lock();

        if let Some(current) = session.as_ref() {
            if !current.worker.is_finished() {
                warn!("Continuous steering already running, ignoring start()");
                return Ok(());
            }
            // 上一次会话已自行结束（执行器故障），回收结果
            if let Some(previous) = session.take() {
                match previous.worker.join() {
                    Ok(Err(e)) => warn!("Previous continuous session ended with error: {}", e),
                    Err(_) => error!("Previous continuous session panicked"),
                    Ok(Ok(())) => {},
                }
            }
        }

        let lease = self.motor.try_acquire(CONTINUOUS_OWNER)?;
        let token = CancellationToken::new();

        self.telemetry.store(Arc::new(LoopTelemetry {
            running: true,
            ..Default::default()
        }));

        let ctx = LoopContext {
            lease,
            sensor: self.sensor.clone(),
            config: self.config.clone(),
            target: self.target.clone(),
            telemetry: self.telemetry.clone(),
            token: token.clone(),
        };
        let worker = Worker::spawn("steer-continuous", move || ctx.run())?;

        info!(
            "Continuous steering started at {:.0} Hz, target {}",
            self.config.frequency_hz,
            self.target.get()
        );
        *session = Some(Session { token, worker });
        Ok(())
    }

    /// 停止控制线程
    ///
    /// 取消令牌、在电机锁内立即停止电机，然后限时等待线程退出。
    /// 返回本次会话的结果（终止会话的执行器故障在这里返回）。
    /// 未运行时返回 `Ok(())`。
    pub fn stop(&self) -> Result<(), ControlError> {
        let Some(session) = self.session.lock().take() else {
            return Ok(());
        };

        session.token.cancel();
        if let Err(e) = self.motor.stop_immediately() {
            error!("Failed to stop steering motor: {}", e);
        }

        let timeout = self.config.join_timeout;
        let name = session.worker.name().to_string();
        match session.worker.join_timeout(timeout) {
            Ok(result) => {
                info!("Continuous steering stopped");
                result
            },
            Err(e) => {
                error!(
                    "Continuous steering thread panicked or failed to shut down within {:?}",
                    timeout
                );
                Err(e.into_control_error(&name, timeout))
            },
        }
    }

    /// 控制线程是否在运行
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.worker.is_finished())
    }

    /// 更新目标角度（钳位到 [0, 300]），下一周期生效
    ///
    /// 返回钳位后的目标。
    pub fn set_target(&self, angle: Deg) -> Deg {
        let clamped = self.target.set(angle);
        trace!("Steering target set to {}", clamped);
        clamped
    }

    /// 当前目标角度
    pub fn target(&self) -> Deg {
        self.target.get()
    }

    /// 共享目标句柄
    pub fn target_handle(&self) -> Arc<SteeringTarget> {
        self.target.clone()
    }

    /// 遥测快照（无锁读取）
    pub fn telemetry(&self) -> Arc<LoopTelemetry> {
        self.telemetry.load_full()
    }
}

impl Drop for ContinuousSteeringLoop {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Continuous steering shutdown failed: {}", e);
        }
    }
}

/// 控制线程持有的全部状态
struct LoopContext {
    lease: MotorLease,
    sensor: Arc<dyn AngleSource>,
    config: ContinuousConfig,
    target: Arc<SteeringTarget>,
    telemetry: Arc<ArcSwap<LoopTelemetry>>,
    token: CancellationToken,
}

impl LoopContext {
    fn run(self) -> Result<(), ControlError> {
        let period = self.config.period();
        let mut pid = PidController::from_gains(&self.config.pid, self.target.get().0);
        let mut snapshot = LoopTelemetry {
            running: true,
            ..Default::default()
        };
        let mut fault_count = 0u32;
        let mut next_tick = Instant::now();

        let result = loop {
            if self.token.is_cancelled() {
                break Ok(());
            }

            next_tick += period;
            snapshot.ticks += 1;

            match self.sensor.read() {
                None => {
                    snapshot.skipped_ticks += 1;
                    snapshot.last_reading = None;
                    trace!("No steering reading, skipping tick {}", snapshot.ticks);
                },
                Some(measured) => {
                    pid.set_setpoint(self.target.get().0);
                    let signal = pid.compute(measured.0);
                    let (direction, duty) = self.config.convention.command(signal, self.config.min_duty);

                    snapshot.last_reading = Some(measured);
                    snapshot.last_signal = Some(signal);

                    let drive_result = {
                        let mut motor = self.lease.lock();
                        // 持锁检查：stop() 取消后不允许再驱动
                        if self.token.is_cancelled() {
                            break Ok(());
                        }
                        motor.drive(direction, duty)
                    };

                    match drive_result {
                        Ok(()) => {
                            fault_count = 0;
                            snapshot.last_command = Some(MotorState { direction, duty });
                        },
                        Err(e) => {
                            fault_count += 1;
                            snapshot.last_fault = Some(e.clone());
                            if fault_count > self.config.max_actuator_faults {
                                error!(
                                    "Actuator faults ({}): {}. Terminating continuous steering.",
                                    fault_count, e
                                );
                                break Err(ControlError::Actuator {
                                    count: fault_count,
                                    last_error: Box::new(e),
                                });
                            }
                            warn!("Transient actuator fault ({}): {}, skipping tick", fault_count, e);
                        },
                    }
                },
            }

            self.telemetry.store(Arc::new(snapshot.clone()));

            // 锚点调度：睡到下一个绝对时间点，可被取消唤醒
            let now = Instant::now();
            if next_tick > now {
                if self.token.wait_until(next_tick) {
                    break Ok(());
                }
            } else {
                snapshot.overruns += 1;
                debug!(
                    "Continuous steering overrun: tick took {:?} (period {:?})",
                    now.duration_since(next_tick - period),
                    period
                );
                next_tick = now;
            }
        };

        if let Err(e) = self.lease.stop_immediately() {
            error!("Failed to stop steering motor on loop exit: {}", e);
        }

        snapshot.running = false;
        self.telemetry.store(Arc::new(snapshot));
        debug!("Continuous steering thread exiting");
        result
    }
}
