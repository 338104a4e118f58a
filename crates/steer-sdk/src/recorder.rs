//! 轨迹录制
//!
//! 手柄输入线程更新最新的油门/转向轴值，采样线程按固定间隔
//! （默认 200ms）把轴值连同转向角度读数追加为一帧。
//! 角度读数缺失的周期不记录。

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use steer_control::{AngleSource, ControlError};
use steer_driver::CancellationToken;
use steer_tools::{JoystickSample, Trajectory, TrajectoryFrame};
use tracing::{debug, info, trace};

/// 默认采样间隔
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

/// 轨迹录制器
///
/// 通过 `&self` 操作，用 `Arc` 在输入线程和采样线程之间共享。
pub struct TrajectoryRecorder {
    sensor: Arc<dyn AngleSource>,
    latest: Mutex<JoystickSample>,
    trajectory: Mutex<Trajectory>,
}

impl TrajectoryRecorder {
    pub fn new(sensor: Arc<dyn AngleSource>) -> Self {
        Self {
            sensor,
            latest: Mutex::new(JoystickSample::default()),
            trajectory: Mutex::new(Trajectory::new()),
        }
    }

    /// 更新油门轴值（钳位到 [-1, 1]，NaN 视为 0）
    pub fn set_throttle(&self, value: f64) {
        self.latest.lock().throttle = normalize(value);
    }

    /// 更新转向轴值（钳位到 [-1, 1]，NaN 视为 0）
    pub fn set_steering(&self, value: f64) {
        self.latest.lock().steering = normalize(value);
    }

    /// 最新轴值
    pub fn latest(&self) -> JoystickSample {
        *self.latest.lock()
    }

    /// 以当前时间采样一帧
    pub fn sample(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        self.sample_at(now)
    }

    /// 以给定时间戳（秒）采样一帧
    ///
    /// 角度读数缺失时不记录，返回 `false`。
    pub fn sample_at(&self, timestamp: f64) -> bool {
        let Some(angle) = self.sensor.read() else {
            trace!("No angle reading, sample skipped");
            return false;
        };
        let frame = TrajectoryFrame::new(timestamp, self.latest()).with_heading(angle.0);
        self.trajectory.lock().push(frame);
        true
    }

    /// 已记录的帧数
    pub fn len(&self) -> usize {
        self.trajectory.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取出已记录的轨迹（录制器清空，可继续录制）
    pub fn take(&self) -> Trajectory {
        std::mem::take(&mut *self.trajectory.lock())
    }

    /// 启动采样线程，令牌取消后退出
    pub fn spawn_sampler(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> Result<JoinHandle<()>, ControlError> {
        let recorder = Arc::clone(self);
        info!("Recording trajectory every {:?}", interval);
        thread::Builder::new()
            .name("steer-recorder".to_string())
            .spawn(move || {
                while !token.wait_timeout(interval) {
                    recorder.sample();
                }
                debug!("Recorder stopped after {} frames", recorder.len());
            })
            .map_err(|e| ControlError::Spawn(e.to_string()))
    }
}

fn normalize(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}
