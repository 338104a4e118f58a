//! 输入验证模块
//!
//! 命令行参数在进入控制层之前先在这里检查，错误信息面向终端用户。

use anyhow::Result;

/// 角度参数验证器
pub struct AngleValidator {
    /// 最小角度（度）
    min_angle: f64,
    /// 最大角度（度）
    max_angle: f64,
}

impl AngleValidator {
    /// 创建新的角度验证器
    ///
    /// # 参数
    /// * `min_angle` - 最小角度（度），默认 0
    /// * `max_angle` - 最大角度（度），默认 300
    pub fn new(min_angle: Option<f64>, max_angle: Option<f64>) -> Self {
        Self {
            min_angle: min_angle.unwrap_or(0.0),
            max_angle: max_angle.unwrap_or(300.0),
        }
    }

    /// 机构行程 [0, 300]
    pub fn travel() -> Self {
        Self::new(None, None)
    }

    /// 验证单个角度
    pub fn validate(&self, name: &str, angle: f64) -> Result<()> {
        if !angle.is_finite() {
            anyhow::bail!("{} 角度无效: {}", name, angle);
        }
        if angle < self.min_angle || angle > self.max_angle {
            anyhow::bail!(
                "{} 角度 {:.2}° 超出范围 [{:.0}, {:.0}]",
                name,
                angle,
                self.min_angle,
                self.max_angle
            );
        }
        Ok(())
    }
}

/// 仿真步长必须为正
pub fn validate_step(step: f64) -> Result<()> {
    if !(step.is_finite() && step > 0.0) {
        anyhow::bail!("仿真步长必须大于 0，得到 {}", step);
    }
    Ok(())
}

/// 丢包概率 ∈ [0, 1)
pub fn validate_probability(name: &str, p: f64) -> Result<()> {
    if !(0.0..1.0).contains(&p) {
        anyhow::bail!("{} 必须在 [0, 1) 内，得到 {}", name, p);
    }
    Ok(())
}
