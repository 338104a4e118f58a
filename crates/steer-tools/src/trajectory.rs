//! # 行驶轨迹文件
//!
//! 手柄驾驶时按固定间隔采样的油门/转向轴值，以 JSON 数组保存，供回放使用：
//!
//! ```json
//! [
//!   {"timestamp": 1718000000.0, "heading_angle": 150.2,
//!    "joystick": {"throttle": 0.5, "steering": -0.2}},
//!   {"timestamp": 1718000000.2, "heading_angle": 148.9,
//!    "joystick": {"throttle": 0.5, "steering": -0.3}}
//! ]
//! ```
//!
//! 时间戳单位为秒（Unix 时间），回放只使用相邻帧的差值。
//! 文件中的其它字段（如 GPS 坐标）解析时忽略。

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// 默认轨迹文件名
pub const TRAJECTORY_FILE: &str = "recorded_drive.json";

/// 轨迹文件错误
#[derive(Error, Debug)]
pub enum TrajectoryError {
    /// 文件读写失败
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON 解析或序列化失败
    #[error("Malformed trajectory: {0}")]
    Json(#[from] serde_json::Error),

    /// 没有任何帧
    #[error("Trajectory has no frames")]
    Empty,

    /// 时间戳无效或倒退
    #[error("Frame {index}: timestamp {timestamp} is not finite or goes backwards")]
    Timestamp { index: usize, timestamp: f64 },

    /// 轴值超出 [-1, 1]
    #[error("Frame {index}: axis '{axis}' must be within [-1, 1], got {value}")]
    AxisOutOfRange {
        index: usize,
        axis: &'static str,
        value: f64,
    },
}

/// 一次采样的手柄轴值（归一化到 [-1, 1]）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JoystickSample {
    /// 油门：正值前进，负值后退
    pub throttle: f64,
    /// 转向：正值向大角度偏转
    pub steering: f64,
}

/// 轨迹帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryFrame {
    /// 采样时间（秒）
    pub timestamp: f64,
    /// 采样时的转向角度读数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_angle: Option<f64>,
    pub joystick: JoystickSample,
}

impl TrajectoryFrame {
    pub fn new(timestamp: f64, joystick: JoystickSample) -> Self {
        Self {
            timestamp,
            heading_angle: None,
            joystick,
        }
    }

    pub fn with_heading(mut self, angle: f64) -> Self {
        self.heading_angle = Some(angle);
        self
    }
}

/// 行驶轨迹
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    frames: Vec<TrajectoryFrame>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一帧
    pub fn push(&mut self, frame: TrajectoryFrame) {
        self.frames.push(frame);
    }

    pub fn frames(&self) -> &[TrajectoryFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 首帧到末帧的时间跨度
    pub fn duration(&self) -> Option<Duration> {
        let first = self.frames.first()?.timestamp;
        let last = self.frames.last()?.timestamp;
        Duration::try_from_secs_f64(last - first).ok()
    }

    /// 第 `index` 帧与下一帧之间的间隔（末帧返回 `None`）
    pub fn gap_after(&self, index: usize) -> Option<Duration> {
        let current = self.frames.get(index)?.timestamp;
        let next = self.frames.get(index + 1)?.timestamp;
        Some(Duration::try_from_secs_f64(next - current).unwrap_or(Duration::ZERO))
    }

    /// 校验：至少一帧，时间戳有限且不倒退，轴值在 [-1, 1]
    pub fn validate(&self) -> Result<(), TrajectoryError> {
        if self.frames.is_empty() {
            return Err(TrajectoryError::Empty);
        }

        let mut previous = f64::NEG_INFINITY;
        for (index, frame) in self.frames.iter().enumerate() {
            if !frame.timestamp.is_finite() || frame.timestamp < previous {
                return Err(TrajectoryError::Timestamp {
                    index,
                    timestamp: frame.timestamp,
                });
            }
            previous = frame.timestamp;

            for (axis, value) in [
                ("throttle", frame.joystick.throttle),
                ("steering", frame.joystick.steering),
            ] {
                if !(-1.0..=1.0).contains(&value) {
                    return Err(TrajectoryError::AxisOutOfRange { index, axis, value });
                }
            }
        }
        Ok(())
    }

    /// 从 JSON 字符串解析并校验
    pub fn from_json_str(content: &str) -> Result<Self, TrajectoryError> {
        let trajectory: Trajectory = serde_json::from_str(content)?;
        trajectory.validate()?;
        Ok(trajectory)
    }

    /// 序列化为 JSON（缩进格式）
    pub fn to_json_string(&self) -> Result<String, TrajectoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 从文件加载
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrajectoryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// 保存到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TrajectoryError> {
        let path = path.as_ref();
        let io_err = |source| TrajectoryError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_json_string()?).map_err(io_err)
    }
}

impl FromIterator<TrajectoryFrame> for Trajectory {
    fn from_iter<I: IntoIterator<Item = TrajectoryFrame>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}
