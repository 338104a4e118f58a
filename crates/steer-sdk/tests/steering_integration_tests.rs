//! 转向控制集成测试
//!
//! 在仿真台架上验证两种控制方式的端到端行为：
//! - 定点旋转：到位、超时、取消
//! - 连续跟踪：目标跟踪与方向约定
//! - 两种方式对同一电机的互斥
//!
//! 运行方式：`cargo test -p steer-sdk --features mock --test steering_integration_tests`

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use steer_sdk::prelude::*;
use steer_sdk::sim::{FixedAngleSource, PortCommand, RecordingPort, SimulatedRig};

fn rotation_config(convention: DirectionConvention) -> RotationConfig {
    RotationConfig {
        convention,
        ..Default::default()
    }
}

fn coordinator_config(max_duration: Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        max_duration,
        ..Default::default()
    }
}

fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// 90° → 150°，每周期 5°，容差 2°
#[test]
fn test_rotation_converges_on_simulated_rig() {
    let rig = SimulatedRig::new(Deg(90.0), 5.0, DirectionConvention::PositiveIsLeft);
    let motor = SharedMotor::from_port("steering", rig.port());
    let coordinator = SteeringCoordinator::new(
        motor.clone(),
        rig.sensor(),
        coordinator_config(Duration::from_secs(30)),
        rotation_config(DirectionConvention::PositiveIsLeft),
    )
    .unwrap();

    let target = coordinator.turn_to(Deg(150.0)).unwrap();
    assert_eq!(target, Deg(150.0));

    let report = coordinator.wait().unwrap().expect("rotation report");
    assert_eq!(report.outcome, RotationOutcome::Converged);
    let final_angle = report.final_angle.expect("final angle");
    assert!((final_angle.0 - 150.0).abs() <= 2.0, "final angle {}", final_angle);
    assert!(report.elapsed < Duration::from_secs(5));

    // 结束时电机停止，租约已归还
    assert!(motor.state().is_stopped());
    assert!(!motor.is_attached());
    assert_eq!(rig.recorder().last(), Some(PortCommand::Cut));
    assert!(
        rig.recorder()
            .commands()
            .iter()
            .all(|cmd| !matches!(cmd, PortCommand::Set { channel: PwmChannel::Right, .. })),
        "rotation towards a larger angle must only use the positive channel"
    );
}

/// 读数冻结：不会提前超时
#[test]
fn test_frozen_sensor_times_out_not_before_deadline() {
    let max_duration = Duration::from_millis(300);
    let port = RecordingPort::new();
    let motor = SharedMotor::from_port("steering", port.clone());
    let sensor = Arc::new(FixedAngleSource::new(Deg(100.0)));
    let coordinator = SteeringCoordinator::new(
        motor.clone(),
        sensor,
        coordinator_config(max_duration),
        RotationConfig::default(),
    )
    .unwrap();

    let start = Instant::now();
    coordinator.turn_to(Deg(200.0)).unwrap();
    let report = coordinator.wait().unwrap().expect("rotation report");

    assert_eq!(report.outcome, RotationOutcome::TimedOut);
    assert!(report.elapsed > max_duration);
    assert!(start.elapsed() >= max_duration);
    assert!(report.ticks > 1);
    assert!(motor.state().is_stopped());
    assert_eq!(port.last(), Some(PortCommand::Cut));
}

/// 100ms 后取消：及时退出并停机
#[test]
fn test_cancel_stops_rotation_promptly() {
    let port = RecordingPort::new();
    let motor = SharedMotor::from_port("steering", port.clone());
    let coordinator = SteeringCoordinator::new(
        motor.clone(),
        Arc::new(FixedAngleSource::new(Deg(100.0))),
        coordinator_config(Duration::from_secs(30)),
        RotationConfig::default(),
    )
    .unwrap();

    coordinator.turn_to(Deg(250.0)).unwrap();
    assert!(coordinator.is_busy());
    thread::sleep(Duration::from_millis(100));

    let cancelled_at = Instant::now();
    let report = coordinator.stop().unwrap().expect("rotation report");

    assert_eq!(report.outcome, RotationOutcome::Cancelled);
    assert!(cancelled_at.elapsed() < Duration::from_millis(200));
    assert!(!coordinator.is_busy());
    assert!(motor.state().is_stopped());
    assert_eq!(port.last(), Some(PortCommand::Cut));
}

/// 连续跟踪与定点旋转互斥，定点旋转之间互斥
#[test]
fn test_steering_regimes_are_mutually_exclusive() {
    let port = RecordingPort::new();
    let motor = SharedMotor::from_port("steering", port.clone());
    let sensor: Arc<dyn AngleSource> = Arc::new(FixedAngleSource::new(Deg(100.0)));

    let continuous =
        ContinuousSteeringLoop::new(motor.clone(), sensor.clone(), ContinuousConfig::default()).unwrap();
    let coordinator = SteeringCoordinator::new(
        motor.clone(),
        sensor,
        coordinator_config(Duration::from_secs(30)),
        RotationConfig::default(),
    )
    .unwrap();

    // 连续跟踪运行时，定点旋转被拒绝
    continuous.start().unwrap();
    let err = coordinator.turn_to(Deg(200.0)).unwrap_err();
    assert!(matches!(err, ControlError::Driver(DriverError::MotorBusy { .. })), "{err}");
    continuous.stop().unwrap();

    // 定点旋转运行时，第二个请求被拒绝，连续跟踪也无法启动
    coordinator.turn_to(Deg(200.0)).unwrap();
    let err = coordinator.turn_to(Deg(50.0)).unwrap_err();
    assert!(matches!(err, ControlError::ConcurrentOperationRejected { .. }), "{err}");
    assert_eq!(coordinator.active_target(), Some(Deg(200.0)));

    let err = continuous.start().unwrap_err();
    assert!(matches!(err, ControlError::Driver(DriverError::MotorBusy { .. })), "{err}");

    coordinator.stop().unwrap();
    assert!(!motor.is_attached());

    // 释放后连续跟踪可以启动
    continuous.start().unwrap();
    assert!(continuous.is_running());
    continuous.stop().unwrap();
}

/// 被拒绝的第二个请求不影响第一个任务：目标不变，照常到位
#[test]
fn test_rejected_rotation_leaves_active_task_running() {
    let rig = SimulatedRig::new(Deg(90.0), 5.0, DirectionConvention::PositiveIsLeft);
    let coordinator = SteeringCoordinator::new(
        SharedMotor::from_port("steering", rig.port()),
        rig.sensor(),
        coordinator_config(Duration::from_secs(30)),
        rotation_config(DirectionConvention::PositiveIsLeft),
    )
    .unwrap();

    coordinator.turn_to(Deg(150.0)).unwrap();
    let err = coordinator.turn_to(Deg(50.0)).unwrap_err();
    assert_eq!(
        err,
        ControlError::ConcurrentOperationRejected {
            active_target: Deg(150.0)
        }
    );
    assert_eq!(coordinator.active_target(), Some(Deg(150.0)));

    let report = coordinator.wait().unwrap().expect("rotation report");
    assert_eq!(report.outcome, RotationOutcome::Converged);
    assert_eq!(report.target, Deg(150.0));
    assert!((rig.angle().0 - 150.0).abs() <= 2.0, "angle {}", rig.angle());
}

/// 读数在目标上：零占空比；目标改变后沿正方向驱动
#[test]
fn test_continuous_tracking_end_to_end() {
    let port = RecordingPort::new();
    let motor = SharedMotor::from_port("steering", port.clone());
    let sensor = Arc::new(FixedAngleSource::new(Deg(150.0)));
    let steering = ContinuousSteeringLoop::new(
        motor.clone(),
        sensor,
        ContinuousConfig {
            frequency_hz: 200.0,
            ..Default::default()
        },
    )
    .unwrap();

    steering.start().unwrap();
    assert!(wait_until(|| steering.telemetry().ticks >= 3, Duration::from_secs(2)));
    let (_, duty) = port.last_set().expect("loop drove the motor");
    assert!(duty.is_zero());

    assert_eq!(steering.set_target(Deg(210.0)), Deg(210.0));
    assert!(wait_until(
        || port.last_set().is_some_and(|(_, duty)| !duty.is_zero()),
        Duration::from_secs(2)
    ));
    let (channel, duty) = port.last_set().unwrap();
    assert_eq!(channel, PwmChannel::Left);
    assert!(duty.value() >= 20.0);

    assert!(wait_until(
        || steering.telemetry().last_signal.is_some_and(|s| s > 0.0),
        Duration::from_secs(2)
    ));
    assert_eq!(steering.telemetry().last_reading, Some(Deg(150.0)));

    steering.stop().unwrap();
    assert!(motor.state().is_stopped());
    assert_eq!(port.last(), Some(PortCommand::Cut));
}

/// 方向约定：正误差驱动约定的正方向
#[test]
fn test_direction_convention_both_ways() {
    for (convention, expected) in [
        (DirectionConvention::PositiveIsLeft, PwmChannel::Left),
        (DirectionConvention::PositiveIsRight, PwmChannel::Right),
    ] {
        let rig = SimulatedRig::new(Deg(120.0), 5.0, convention);
        let motor = SharedMotor::from_port("steering", rig.port());
        let coordinator = SteeringCoordinator::new(
            motor,
            rig.sensor(),
            coordinator_config(Duration::from_secs(30)),
            rotation_config(convention),
        )
        .unwrap();

        coordinator.turn_to(Deg(150.0)).unwrap();
        let report = coordinator.wait().unwrap().expect("rotation report");

        assert_eq!(report.outcome, RotationOutcome::Converged, "{convention:?}");
        let first_set = rig
            .recorder()
            .commands()
            .into_iter()
            .find_map(|cmd| match cmd {
                PortCommand::Set { channel, .. } => Some(channel),
                _ => None,
            });
        assert_eq!(first_set, Some(expected), "{convention:?}");
    }
}

/// 旋转途中传感器丢失
#[test]
fn test_sensor_loss_aborts_rotation() {
    let port = RecordingPort::new();
    let motor = SharedMotor::from_port("steering", port.clone());
    let coordinator = SteeringCoordinator::new(
        motor.clone(),
        Arc::new(FixedAngleSource::offline()),
        coordinator_config(Duration::from_secs(30)),
        RotationConfig {
            frequency_hz: 200.0,
            max_sensor_misses: 5,
            ..Default::default()
        },
    )
    .unwrap();

    coordinator.turn_to(Deg(200.0)).unwrap();
    let report = coordinator.wait().unwrap().expect("rotation report");

    assert_eq!(report.outcome, RotationOutcome::SensorLost);
    assert_eq!(report.final_angle, None);
    assert!(report.sensor_misses > 5);
    assert!(motor.state().is_stopped());
}
