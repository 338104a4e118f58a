//! # 驾驶命令协议
//!
//! 远程端（MQTT 等）下发的 JSON 负载：
//!
//! ```json
//! {"command": "left", "turning_angle": 20}
//! {"command": "forward", "speed": 60}
//! ```
//!
//! - `command` 缺失时视为 `stop`
//! - `speed` 缺失时为 50
//! - `turning_angle` 缺失时为 15°
//!
//! 传输层不在本模块范围内，这里只负责解析和校验。

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 默认速度（占空比百分比）
pub const DEFAULT_SPEED: f64 = 50.0;

/// 默认转向角度（度）
pub const DEFAULT_TURNING_ANGLE: f64 = 15.0;

/// 命令解析错误
#[derive(Error, Debug)]
pub enum CommandError {
    /// JSON 格式错误或未知命令
    #[error("Malformed command payload: {0}")]
    Json(#[from] serde_json::Error),

    /// 速度超出范围
    #[error("Speed must be within [0, 100], got {0}")]
    InvalidSpeed(f64),

    /// 转向角度无效
    #[error("Turning angle must be finite and non-negative, got {0}")]
    InvalidTurningAngle(f64),
}

/// 命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// 驱动电机前进
    Forward,
    /// 驱动电机后退
    Backward,
    /// 相对左转
    Left,
    /// 相对右转
    Right,
    /// 回中
    Center,
    /// 停车（驱动电机与转向）
    #[default]
    Stop,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Forward => "forward",
            CommandKind::Backward => "backward",
            CommandKind::Left => "left",
            CommandKind::Right => "right",
            CommandKind::Center => "center",
            CommandKind::Stop => "stop",
        };
        write!(f, "{}", name)
    }
}

/// 驾驶命令
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    #[serde(default)]
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turning_angle: Option<f64>,
}

impl DriveCommand {
    pub fn new(command: CommandKind) -> Self {
        Self {
            command,
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_turning_angle(mut self, angle: f64) -> Self {
        self.turning_angle = Some(angle);
        self
    }

    /// 解析并校验 JSON 负载
    pub fn parse(payload: &str) -> Result<Self, CommandError> {
        let command: DriveCommand = serde_json::from_str(payload.trim())?;
        command.validate()?;
        Ok(command)
    }

    /// 序列化为 JSON
    pub fn to_json(&self) -> Result<String, CommandError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), CommandError> {
        if let Some(speed) = self.speed
            && !(0.0..=100.0).contains(&speed)
        {
            return Err(CommandError::InvalidSpeed(speed));
        }
        if let Some(angle) = self.turning_angle
            && !(angle.is_finite() && angle >= 0.0)
        {
            return Err(CommandError::InvalidTurningAngle(angle));
        }
        Ok(())
    }

    /// 速度（缺失时为 `DEFAULT_SPEED`）
    pub fn speed_or_default(&self) -> f64 {
        self.speed.unwrap_or(DEFAULT_SPEED)
    }

    /// 转向角度（缺失时为 `DEFAULT_TURNING_ANGLE`）
    pub fn turning_angle_or_default(&self) -> f64 {
        self.turning_angle.unwrap_or(DEFAULT_TURNING_ANGLE)
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command {
            CommandKind::Forward | CommandKind::Backward => {
                write!(f, "{} @ {:.0}%", self.command, self.speed_or_default())
            },
            CommandKind::Left | CommandKind::Right => {
                write!(f, "{} by {:.1}°", self.command, self.turning_angle_or_default())
            },
            CommandKind::Center | CommandKind::Stop => write!(f, "{}", self.command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let cmd = DriveCommand::parse(r#"{"command": "forward", "speed": 60}"#).unwrap();
        assert_eq!(cmd.command, CommandKind::Forward);
        assert_eq!(cmd.speed_or_default(), 60.0);

        let cmd = DriveCommand::parse(r#"{"command": "left", "turning_angle": 20.5}"#).unwrap();
        assert_eq!(cmd.command, CommandKind::Left);
        assert_eq!(cmd.turning_angle_or_default(), 20.5);
    }

    #[test]
    fn test_defaults() {
        // command 缺失 → stop
        let cmd = DriveCommand::parse("{}").unwrap();
        assert_eq!(cmd.command, CommandKind::Stop);

        let cmd = DriveCommand::parse(r#"{"command": "backward"}"#).unwrap();
        assert_eq!(cmd.speed_or_default(), DEFAULT_SPEED);

        let cmd = DriveCommand::parse("  {\"command\": \"right\"}\n").unwrap();
        assert_eq!(cmd.turning_angle_or_default(), DEFAULT_TURNING_ANGLE);
    }

    #[test]
    fn test_rejects_invalid_payloads() {
        assert!(matches!(
            DriveCommand::parse(r#"{"command": "jump"}"#),
            Err(CommandError::Json(_))
        ));
        assert!(matches!(
            DriveCommand::parse("not json"),
            Err(CommandError::Json(_))
        ));
        assert!(matches!(
            DriveCommand::parse(r#"{"command": "forward", "speed": 120}"#),
            Err(CommandError::InvalidSpeed(s)) if s == 120.0
        ));
        assert!(matches!(
            DriveCommand::parse(r#"{"command": "left", "turning_angle": -5}"#),
            Err(CommandError::InvalidTurningAngle(_))
        ));
    }

    #[test]
    fn test_to_json_omits_missing_fields() {
        let json = DriveCommand::new(CommandKind::Center).to_json().unwrap();
        assert_eq!(json, r#"{"command":"center"}"#);

        let cmd = DriveCommand::new(CommandKind::Right).with_turning_angle(30.0);
        assert_eq!(DriveCommand::parse(&cmd.to_json().unwrap()).unwrap(), cmd);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DriveCommand::new(CommandKind::Forward).to_string(),
            "forward @ 50%"
        );
        assert_eq!(
            DriveCommand::new(CommandKind::Left).with_turning_angle(20.0).to_string(),
            "left by 20.0°"
        );
        assert_eq!(DriveCommand::default().to_string(), "stop");
    }
}
