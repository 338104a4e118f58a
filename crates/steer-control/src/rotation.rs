//! 定点旋转任务
//!
//! 把转向转到固定目标角度，在以下任一条件下结束：
//! - 到位（`|target - measured| ≤ tolerance`）
//! - 超时（超过 `max_duration`，不会提前）
//! - 取消（令牌被取消）
//! - 传感器连续丢失超过 `max_sensor_misses`
//!
//! 每条退出路径都恰好调用一次 `stop_immediately`。

use crate::angle::{AngleSource, Deg};
use crate::config::RotationConfig;
use crate::error::ControlError;
use crate::pid::PidController;
use std::fmt;
use std::time::{Duration, Instant};
use steer_driver::{CancellationToken, MotorLease};
use tracing::{error, info, trace, warn};

/// 旋转请求
#[derive(Debug, Clone, PartialEq)]
pub struct RotationRequest {
    /// 目标角度（已钳位到行程内）
    pub target: Deg,
    /// 到位容差（度）
    pub tolerance: f64,
    /// 最长执行时间
    pub max_duration: Duration,
}

impl RotationRequest {
    /// 创建请求，目标角度钳位到 [0, 300]
    pub fn new(target: Deg, tolerance: f64, max_duration: Duration) -> Self {
        Self {
            target: target.clamp_to_travel(),
            tolerance,
            max_duration,
        }
    }

    pub fn validate(&self) -> Result<(), ControlError> {
        if !(self.tolerance >= 0.0) {
            return Err(ControlError::invalid(
                "tolerance",
                format!("must be >= 0, got {}", self.tolerance),
            ));
        }
        if self.max_duration.is_zero() {
            return Err(ControlError::invalid("max_duration", "must be > 0"));
        }
        Ok(())
    }
}

/// 旋转结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// 到位
    Converged,
    /// 超时
    TimedOut,
    /// 被取消
    Cancelled,
    /// 传感器连续丢失
    SensorLost,
}

impl fmt::Display for RotationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationOutcome::Converged => "converged",
            RotationOutcome::TimedOut => "timed out",
            RotationOutcome::Cancelled => "cancelled",
            RotationOutcome::SensorLost => "sensor lost",
        };
        write!(f, "{}", name)
    }
}

/// 旋转报告
#[derive(Debug, Clone, PartialEq)]
pub struct RotationReport {
    pub outcome: RotationOutcome,
    /// 目标角度
    pub target: Deg,
    /// 最后一次有效读数
    pub final_angle: Option<Deg>,
    /// 实际耗时
    pub elapsed: Duration,
    /// 执行的周期数
    pub ticks: u64,
    /// 结束时的连续传感器丢失次数
    pub sensor_misses: u32,
}

impl RotationReport {
    /// 是否到位
    pub fn is_converged(&self) -> bool {
        self.outcome == RotationOutcome::Converged
    }

    /// 非到位结果转换为错误
    pub fn into_result(self) -> Result<RotationReport, ControlError> {
        match self.outcome {
            RotationOutcome::Converged => Ok(self),
            RotationOutcome::TimedOut => Err(ControlError::TimedOut {
                elapsed_ms: self.elapsed.as_millis() as u64,
            }),
            RotationOutcome::Cancelled => Err(ControlError::Cancelled),
            RotationOutcome::SensorLost => Err(ControlError::SensorLost {
                misses: self.sensor_misses,
            }),
        }
    }
}

/// 执行一次定点旋转（阻塞）
///
/// 每次调用新建 PID 控制器，积分不跨任务保留。
/// 只有租约持有者才能调用；结束时电机处于停止状态。
///
/// # 错误
///
/// - `ControlError::InvalidParameter`: 配置或请求无效（不会驱动电机）
/// - `ControlError::Actuator`: 执行器故障超过容忍次数（已断电）
/// - `ControlError::Driver`: 结束时的断电失败
pub fn run_rotation(
    lease: &MotorLease,
    sensor: &dyn AngleSource,
    request: &RotationRequest,
    config: &RotationConfig,
    token: &CancellationToken,
) -> Result<RotationReport, ControlError> {
    config.validate()?;
    request.validate()?;

    let period = config.period();
    let target = request.target;
    let mut pid = PidController::from_gains(&config.pid, target.0);

    let mut misses = 0u32;
    let mut fault_count = 0u32;
    let mut ticks = 0u64;
    let mut final_angle = None;

    info!(
        "Rotation to {} started (tolerance {:.1}°, timeout {:?})",
        target, request.tolerance, request.max_duration
    );

    let start = Instant::now();
    let mut next_tick = start;

    let result = loop {
        // 1. 取消
        if token.is_cancelled() {
            break Ok(RotationOutcome::Cancelled);
        }
        // 2. 超时（严格大于，不会提前）
        if start.elapsed() > request.max_duration {
            break Ok(RotationOutcome::TimedOut);
        }

        ticks += 1;
        next_tick += period;

        // 3. 读取传感器
        match sensor.read() {
            None => {
                misses += 1;
                if misses > config.max_sensor_misses {
                    warn!(
                        "Rotation to {} aborted: {} consecutive sensor misses",
                        target, misses
                    );
                    break Ok(RotationOutcome::SensorLost);
                }
                trace!("Sensor miss ({}) during rotation", misses);
            },
            Some(measured) => {
                misses = 0;
                final_angle = Some(measured);

                // 4. PID 与到位判断
                let signal = pid.compute(measured.0);
                if (target - measured).abs().0 <= request.tolerance {
                    break Ok(RotationOutcome::Converged);
                }

                // 5. 驱动
                let (direction, duty) = config.convention.command(signal, config.min_duty);
                trace!(
                    "Rotation tick {}: measured {}, signal {:.2}, {} @ {}",
                    ticks, measured, signal, direction, duty
                );
                match lease.drive(direction, duty) {
                    Ok(()) => fault_count = 0,
                    Err(e) => {
                        fault_count += 1;
                        if fault_count > config.max_actuator_faults {
                            error!(
                                "Actuator faults ({}): {}. Aborting rotation.",
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

        // 6. 可取消等待
        let now = Instant::now();
        if next_tick > now {
            if token.wait_until(next_tick) {
                break Ok(RotationOutcome::Cancelled);
            }
        } else {
            next_tick = now;
        }
    };

    let stop_result = lease.stop_immediately();
    let elapsed = start.elapsed();

    let outcome = match (result, stop_result) {
        (Ok(outcome), Ok(())) => outcome,
        (Ok(_), Err(e)) => {
            error!("Failed to stop motor after rotation: {}", e);
            return Err(e.into());
        },
        (Err(e), stop) => {
            if let Err(stop_err) = stop {
                error!("Failed to stop motor after actuator fault: {}", stop_err);
            }
            return Err(e);
        },
    };

    match outcome {
        RotationOutcome::Converged => info!(
            "Rotation converged at {:?} (target {}) after {:?}",
            final_angle, target, elapsed
        ),
        other => warn!("Rotation to {} {} after {:?}", target, other, elapsed),
    }

    Ok(RotationReport {
        outcome,
        target,
        final_angle,
        elapsed,
        ticks,
        sensor_misses: misses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use steer_driver::SharedMotor;
    use steer_driver::mock::{PortCommand, RecordingPort};

    fn fast_config() -> RotationConfig {
        RotationConfig {
            frequency_hz: 500.0,
            ..Default::default()
        }
    }

    fn cut_count(port: &RecordingPort) -> usize {
        port.commands()
            .iter()
            .filter(|c| matches!(c, PortCommand::Cut))
            .count()
    }

    #[test]
    fn test_already_in_tolerance_converges_immediately() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || Some(Deg(149.0));

        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_secs(1));
        let report = run_rotation(
            &lease,
            &sensor,
            &request,
            &fast_config(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert!(report.is_converged());
        assert_eq!(report.ticks, 1);
        assert_eq!(report.final_angle, Some(Deg(149.0)));
        assert_eq!(port.commands(), vec![PortCommand::Cut]);
    }

    #[test]
    fn test_frozen_sensor_times_out_not_before_deadline() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || Some(Deg(90.0));

        let max_duration = Duration::from_millis(100);
        let request = RotationRequest::new(Deg(150.0), 2.0, max_duration);
        let report = run_rotation(
            &lease,
            &sensor,
            &request,
            &fast_config(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.outcome, RotationOutcome::TimedOut);
        assert!(report.elapsed >= max_duration);
        assert_eq!(cut_count(&port), 1);
        assert!(motor.state().is_stopped());

        assert!(matches!(
            report.into_result(),
            Err(ControlError::TimedOut { .. })
        ));
    }

    #[test]
    fn test_sensor_lost_after_consecutive_misses() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || None::<Deg>;

        let config = RotationConfig {
            max_sensor_misses: 3,
            ..fast_config()
        };
        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_secs(5));
        let report =
            run_rotation(&lease, &sensor, &request, &config, &CancellationToken::new()).unwrap();

        assert_eq!(report.outcome, RotationOutcome::SensorLost);
        assert_eq!(report.sensor_misses, 4);
        assert_eq!(report.ticks, 4);
        assert_eq!(port.commands(), vec![PortCommand::Cut]);
        assert_eq!(
            report.into_result(),
            Err(ControlError::SensorLost { misses: 4 })
        );
    }

    #[test]
    fn test_cancel_stops_within_a_tick() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor: Arc<dyn AngleSource> = Arc::new(|| Some(Deg(90.0)));

        let token = CancellationToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            canceller.cancel();
            Instant::now()
        });

        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_secs(30));
        let config = RotationConfig::default();
        let report = run_rotation(&lease, sensor.as_ref(), &request, &config, &token).unwrap();
        let exited = Instant::now();
        let cancelled_at = handle.join().unwrap();

        assert_eq!(report.outcome, RotationOutcome::Cancelled);
        assert!(exited.duration_since(cancelled_at) <= config.period() + Duration::from_millis(20));
        assert!(motor.state().is_stopped());
        assert_eq!(cut_count(&port), 1);
    }

    #[test]
    fn test_actuator_fault_aborts_after_cutoff() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || Some(Deg(90.0));

        port.inject_faults(1);
        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_secs(5));
        let err = run_rotation(
            &lease,
            &sensor,
            &request,
            &fast_config(),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, ControlError::Actuator { count: 1, .. }));
        assert_eq!(port.last(), Some(PortCommand::Cut));
    }

    #[test]
    fn test_fresh_pid_per_rotation() {
        // 两次相同的旋转产生相同的第一条驱动命令：积分不跨任务泄漏
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || Some(Deg(140.0));
        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_millis(20));
        let config = RotationConfig {
            min_duty: 0.0,
            ..fast_config()
        };

        let first_set = |port: &RecordingPort| {
            port.commands()
                .into_iter()
                .find(|c| matches!(c, PortCommand::Set { .. }))
        };

        run_rotation(&lease, &sensor, &request, &config, &CancellationToken::new()).unwrap();
        let first = first_set(&port);
        port.clear();
        run_rotation(&lease, &sensor, &request, &config, &CancellationToken::new()).unwrap();

        assert!(first.is_some());
        assert_eq!(first, first_set(&port));
    }

    #[test]
    fn test_invalid_request_does_not_drive() {
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let sensor = || Some(Deg(140.0));

        let request = RotationRequest::new(Deg(150.0), -1.0, Duration::from_secs(1));
        let err = run_rotation(&lease, &sensor, &request, &fast_config(), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ControlError::InvalidParameter { .. }));
        assert!(port.commands().is_empty());
    }

    #[test]
    fn test_request_target_is_clamped() {
        let request = RotationRequest::new(Deg(400.0), 2.0, Duration::from_secs(1));
        assert_eq!(request.target, Deg(300.0));
    }

    #[test]
    fn test_converges_on_moving_sensor() {
        // 传感器每次读取向目标移动 5°
        let port = RecordingPort::new();
        let motor = SharedMotor::from_port("steering", port.clone());
        let lease = motor.try_acquire("test").unwrap();
        let angle = Mutex::new(90.0f64);
        let sensor = move || {
            let mut a = angle.lock();
            let current = *a;
            *a = (current + 5.0).min(150.0);
            Some(Deg(current))
        };

        let request = RotationRequest::new(Deg(150.0), 2.0, Duration::from_secs(5));
        let report = run_rotation(
            &lease,
            &sensor,
            &request,
            &fast_config(),
            &CancellationToken::new(),
        )
        .unwrap();

        assert!(report.is_converged());
        assert_eq!(report.final_angle, Some(Deg(150.0)));
    }
}
