//! 整车命令分发测试
//!
//! 远程命令（JSON）和手柄轴输入经 `Vehicle` 到达两台仿真电机。
//!
//! 运行方式：`cargo test -p steer-sdk --features mock --test vehicle_dispatch_tests`

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use steer_sdk::prelude::*;
use steer_sdk::sim::{PortCommand, RecordingPort, SimulatedRig};

struct Bench {
    vehicle: Vehicle,
    drive_port: RecordingPort,
    rig: SimulatedRig,
}

fn bench(initial: f64) -> Bench {
    let profile = SteeringProfile::default();
    let rig = SimulatedRig::new(Deg(initial), 1.0, profile.rotation.convention);
    let drive_port = RecordingPort::new();

    let drive = SharedMotor::from_port("drive", drive_port.clone());
    let steering = SharedMotor::from_port("steering", rig.port());
    let vehicle = Vehicle::new(drive, steering, rig.sensor(), &profile).unwrap();

    Bench {
        vehicle,
        drive_port,
        rig,
    }
}

#[test]
fn test_json_forward_and_stop() {
    let bench = bench(150.0);

    let forward = DriveCommand::parse(r#"{"command": "forward", "speed": 40}"#).unwrap();
    bench.vehicle.dispatch(&forward).unwrap();
    assert_eq!(
        bench.drive_port.last(),
        Some(PortCommand::Set {
            channel: PwmChannel::Right,
            duty: Duty::new(40.0)
        })
    );

    // 缺省命令为 stop
    let stop = DriveCommand::parse("{}").unwrap();
    assert_eq!(stop.command, CommandKind::Stop);
    bench.vehicle.dispatch(&stop).unwrap();
    assert!(bench.vehicle.drive_state().is_stopped());
    assert_eq!(bench.drive_port.last(), Some(PortCommand::Cut));
}

#[test]
fn test_left_turn_uses_gear_ratio() {
    let bench = bench(150.0);

    // 默认转角 15°，齿轮比 1.5 → 电机侧 10°
    let left = DriveCommand::parse(r#"{"command": "left"}"#).unwrap();
    bench.vehicle.dispatch(&left).unwrap();
    assert_eq!(bench.vehicle.coordinator().active_target(), Some(Deg(140.0)));

    let report = bench.vehicle.coordinator().wait().unwrap().expect("rotation report");
    assert_eq!(report.outcome, RotationOutcome::Converged);
    assert!((bench.rig.angle().0 - 140.0).abs() <= 2.0);

    // 转向不影响驱动电机
    assert!(bench.drive_port.commands().is_empty());
}

#[test]
fn test_right_turn_with_explicit_angle() {
    let bench = bench(150.0);

    let right = DriveCommand::new(CommandKind::Right).with_turning_angle(30.0);
    bench.vehicle.dispatch(&right).unwrap();
    assert_eq!(bench.vehicle.coordinator().active_target(), Some(Deg(170.0)));
    bench.vehicle.coordinator().wait().unwrap();
}

#[test]
fn test_turn_while_rotating_is_rejected() {
    let bench = bench(150.0);

    bench
        .vehicle
        .dispatch(&DriveCommand::new(CommandKind::Right).with_turning_angle(90.0))
        .unwrap();
    let err = bench
        .vehicle
        .dispatch(&DriveCommand::new(CommandKind::Left))
        .unwrap_err();
    assert!(matches!(err, ControlError::ConcurrentOperationRejected { .. }), "{err}");

    // stop 取消转向任务
    bench.vehicle.dispatch(&DriveCommand::new(CommandKind::Stop)).unwrap();
    assert!(!bench.vehicle.coordinator().is_busy());
    assert!(bench.vehicle.steering_state().is_stopped());
}

#[test]
fn test_stop_cancels_rotation_when_drive_faults() {
    let bench = bench(150.0);

    bench
        .vehicle
        .dispatch(&DriveCommand::new(CommandKind::Right).with_turning_angle(90.0))
        .unwrap();
    assert!(bench.vehicle.coordinator().is_busy());

    bench.drive_port.fail_all(true);
    let err = bench
        .vehicle
        .dispatch(&DriveCommand::new(CommandKind::Stop))
        .unwrap_err();
    assert!(
        matches!(
            err,
            ControlError::Driver(DriverError::Actuator(ActuatorFault {
                op: ActuatorOp::Cut,
                ..
            }))
        ),
        "{err}"
    );

    // 驱动电机故障不影响转向任务的取消
    assert!(!bench.vehicle.coordinator().is_busy());
    assert!(bench.vehicle.steering_state().is_stopped());
    assert_eq!(bench.rig.recorder().last(), Some(PortCommand::Cut));
    bench.drive_port.fail_all(false);
}

#[test]
fn test_center_command() {
    let bench = bench(120.0);
    bench.vehicle.dispatch(&DriveCommand::new(CommandKind::Center)).unwrap();
    let report = bench.vehicle.coordinator().wait().unwrap().expect("rotation report");
    assert_eq!(report.target, Deg(150.0));
    assert!(report.is_converged());
}

#[test]
fn test_teleop_axes_drive_continuous_loop() {
    let profile = SteeringProfile::default();
    let rig = SimulatedRig::new(Deg(150.0), 1.0, profile.continuous.convention);
    let drive_port = RecordingPort::new();
    let drive = SharedMotor::from_port("drive", drive_port.clone());
    let steering = SharedMotor::from_port("steering", rig.port());
    let sensor: Arc<dyn AngleSource> = rig.sensor();

    let vehicle = Vehicle::new(drive, steering, sensor.clone(), &profile)
        .unwrap()
        .with_continuous(sensor, &profile)
        .unwrap();
    let continuous = vehicle.continuous().expect("continuous loop attached");
    continuous.start().unwrap();

    let mut filter = AxisFilter::new(profile.teleop.change_sensitivity);
    let value = filter.accept(0.5).expect("significant change");
    assert_eq!(vehicle.apply_steering_axis(value), Some(Deg(180.0)));

    let deadline = Instant::now() + Duration::from_secs(5);
    while (rig.angle().0 - 180.0).abs() > 3.0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!((rig.angle().0 - 180.0).abs() <= 3.0, "angle {}", rig.angle());

    // 协调器在连续跟踪期间无法获取电机
    let err = vehicle.dispatch(&DriveCommand::new(CommandKind::Left)).unwrap_err();
    assert!(matches!(err, ControlError::Driver(DriverError::MotorBusy { .. })), "{err}");

    assert_eq!(
        vehicle.apply_drive_axis(0.5).unwrap(),
        DriveAction::Run {
            direction: Direction::Forward,
            duty: Duty::new(35.0)
        }
    );

    vehicle.shutdown().unwrap();
    assert!(!continuous_running(&vehicle));
    assert_eq!(drive_port.last(), Some(PortCommand::Release));
    assert_eq!(rig.recorder().last(), Some(PortCommand::Release));

    // 关闭后手柄输入不再改变目标
    assert_eq!(vehicle.apply_steering_axis(-1.0), None);
    assert_eq!(vehicle.continuous().map(|c| c.target()), Some(Deg(180.0)));
    assert!(vehicle.apply_drive_axis(0.5).is_err());
}

fn continuous_running(vehicle: &Vehicle) -> bool {
    vehicle.continuous().is_some_and(|c| c.is_running())
}

#[test]
fn test_malformed_payload_is_rejected() {
    assert!(DriveCommand::parse("not json").is_err());
    assert!(DriveCommand::parse(r#"{"command": "jump"}"#).is_err());
}
