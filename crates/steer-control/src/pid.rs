//! PID Controller - 比例-积分-微分控制器
//!
//! 转向角度闭环使用的离散 PID。
//!
//! # 算法
//!
//! ```text
//! error      = setpoint - measured
//! integral  += error            （不乘 dt，调用方以固定周期调用）
//! derivative = error - last_error
//! output     = clamp(Kp * error + Ki * integral + Kd * derivative, min, max)
//! ```
//!
//! # 积分饱和
//!
//! 默认不限制积分项（现场整定的参数依赖这一行为）。
//! 需要时通过 `with_integral_limit()` 开启钳位。
//!
//! # 示例
//!
//! ```rust
//! use steer_control::PidController;
//!
//! let mut pid = PidController::new(0.8, 0.001, 0.05, 150.0)
//!     .with_output_limits(-100.0, 100.0);
//!
//! let signal = pid.compute(140.0);
//! assert!(signal > 0.0);
//! ```

use crate::config::PidGains;

/// PID 控制器
///
/// 每个控制会话一个实例：连续转向持有一个长期实例，
/// 每次定点旋转新建实例，积分不会跨任务泄漏。
#[derive(Debug, Clone)]
pub struct PidController {
    /// 比例增益 (Kp)
    kp: f64,

    /// 积分增益 (Ki)
    ki: f64,

    /// 微分增益 (Kd)
    kd: f64,

    /// 目标值
    setpoint: f64,

    /// 积分项累积值
    integral: f64,

    /// 上一次的误差（用于计算微分）
    last_error: f64,

    /// 输出下限
    output_min: f64,

    /// 输出上限
    output_max: f64,

    /// 积分项限制（`None` 表示不限制）
    integral_limit: Option<f64>,
}

impl PidController {
    /// 创建新的 PID 控制器
    ///
    /// # 默认参数
    ///
    /// - 输出限制 = [-100, 100]
    /// - 积分不限制
    pub fn new(kp: f64, ki: f64, kd: f64, setpoint: f64) -> Self {
        PidController {
            kp,
            ki,
            kd,
            setpoint,
            integral: 0.0,
            last_error: 0.0,
            output_min: -100.0,
            output_max: 100.0,
            integral_limit: None,
        }
    }

    /// 从增益配置创建
    pub fn from_gains(gains: &PidGains, setpoint: f64) -> Self {
        let pid = Self::new(gains.kp, gains.ki, gains.kd, setpoint)
            .with_output_limits(gains.output_min, gains.output_max);
        match gains.integral_limit {
            Some(limit) => pid.with_integral_limit(limit),
            None => pid,
        }
    }

    /// 设置输出限制
    ///
    /// `min > max` 时两者交换。
    pub fn with_output_limits(mut self, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.output_min = min;
        self.output_max = max;
        self
    }

    /// 设置积分项限制
    ///
    /// 开启后 `|integral| ≤ limit`。
    pub fn with_integral_limit(mut self, limit: f64) -> Self {
        self.integral_limit = Some(limit.abs());
        self
    }

    /// 计算控制输出
    ///
    /// 每次调用都会累积积分并更新 `last_error`。
    pub fn compute(&mut self, measured: f64) -> f64 {
        let error = self.setpoint - measured;

        self.integral += error;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        let derivative = error - self.last_error;
        self.last_error = error;

        let output = self.kp * error + self.ki * self.integral + self.kd * derivative;

        // NaN 输入不应驱动电机
        if output.is_nan() {
            return 0.0;
        }
        output.clamp(self.output_min, self.output_max)
    }

    /// 更新目标值
    ///
    /// 不会清零积分项和上一次误差。
    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    /// 当前目标值
    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// 当前积分项
    ///
    /// 用于调试和监控。
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// 上一次误差
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    /// 输出范围
    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    /// 完全重置控制器状态
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }
}

impl Default for PidController {
    fn default() -> Self {
        Self::from_gains(&PidGains::default(), 0.0)
    }
}
