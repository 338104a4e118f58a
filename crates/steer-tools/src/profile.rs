//! # 转向配置文件
//!
//! 汇总所有可调参数，以 TOML 保存。
//!
//! 默认路径：
//! - Linux: `~/.config/steer/profile.toml`
//! - macOS: `~/Library/Application Support/steer/profile.toml`
//! - Windows: `%APPDATA%\steer\profile.toml`
//!
//! ```toml
//! [continuous]
//! frequency_hz = 50.0
//! min_duty = 20.0
//! convention = "positive_is_left"
//!
//! [continuous.pid]
//! kp = 0.8
//! ki = 0.001
//! kd = 0.05
//!
//! [coordinator]
//! gear_ratio = 1.5
//! ```
//!
//! 缺失的字段使用默认值。

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use steer_control::{ContinuousConfig, ControlError, CoordinatorConfig, Deg, RotationConfig};
use steer_driver::GracefulStopConfig;
use thiserror::Error;

/// 配置目录名
pub const APP_DIR: &str = "steer";

/// 配置文件名
pub const PROFILE_FILE: &str = "profile.toml";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读写失败
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// TOML 解析失败
    #[error("Failed to parse profile: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败
    #[error("Failed to serialize profile: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 参数无效
    #[error("Invalid profile: {0}")]
    Invalid(#[from] ControlError),

    /// 参数无效（非控制层参数）
    #[error("Invalid profile value '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// 平台没有配置目录
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// 驱动电机设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    /// 命令未给出速度时的默认占空比
    pub default_speed: f64,
    /// 手柄推满时的占空比
    pub max_duty: f64,
    /// 减速停止参数
    pub graceful_stop: GracefulStopConfig,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            default_speed: 50.0,
            max_duty: 70.0,
            graceful_stop: GracefulStopConfig::default(),
        }
    }
}

/// 手柄映射设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleopSettings {
    /// 死区（归一化轴值）
    pub deadzone: f64,
    /// 摇杆居中时的转向角度
    pub center: Deg,
    /// 摇杆推满时相对中位的最大偏转
    pub max_delta: f64,
    /// 轴值变化小于该阈值时不转发
    pub change_sensitivity: f64,
}

impl Default for TeleopSettings {
    fn default() -> Self {
        Self {
            deadzone: 0.1,
            center: Deg::CENTER,
            max_delta: 60.0,
            change_sensitivity: 0.1,
        }
    }
}

/// 转向配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringProfile {
    /// 连续转向
    pub continuous: ContinuousConfig,
    /// 定点旋转
    pub rotation: RotationConfig,
    /// 协调器
    pub coordinator: CoordinatorConfig,
    /// 驱动电机
    pub drive: DriveSettings,
    /// 手柄映射
    pub teleop: TeleopSettings,
}

impl SteeringProfile {
    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(PROFILE_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let profile: SteeringProfile = toml::from_str(content)?;
        profile.validate()?;
        Ok(profile)
    }

    /// 序列化为 TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 加载配置，文件不存在时返回默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// 保存配置到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, self.to_toml_string()?).map_err(io_err)
    }

    /// 校验所有参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.continuous.validate()?;
        self.rotation.validate()?;
        self.coordinator.validate()?;

        for (name, value) in [
            ("drive.default_speed", self.drive.default_speed),
            ("drive.max_duty", self.drive.max_duty),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: format!("must be within [0, 100], got {}", value),
                });
            }
        }
        if !(self.drive.graceful_stop.step > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "drive.graceful_stop.step",
                reason: format!("must be > 0, got {}", self.drive.graceful_stop.step),
            });
        }
        if !(0.0..1.0).contains(&self.teleop.deadzone) {
            return Err(ConfigError::InvalidValue {
                name: "teleop.deadzone",
                reason: format!("must be within [0, 1), got {}", self.teleop.deadzone),
            });
        }
        if !(self.teleop.max_delta >= 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "teleop.max_delta",
                reason: format!("must be >= 0, got {}", self.teleop.max_delta),
            });
        }
        if !(self.teleop.change_sensitivity >= 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "teleop.change_sensitivity",
                reason: format!("must be >= 0, got {}", self.teleop.change_sensitivity),
            });
        }
        Ok(())
    }
}
