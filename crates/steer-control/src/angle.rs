//! 角度类型与角度传感器抽象
//!
//! 转向机构的行程为 [0, 300] 度，150 度为中位。
//! 传感器读取失败用 `None` 表示，由控制循环按周期吸收。

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Add, Sub};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 行程下限（度）
pub const TRAVEL_MIN: Deg = Deg(0.0);

/// 行程上限（度）
pub const TRAVEL_MAX: Deg = Deg(300.0);

/// 12 位 ADC 满量程
pub const ADC_FULL_SCALE_12BIT: u16 = 4095;

/// 角度（NewType）
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Deg(pub f64);

impl Deg {
    /// 零角度
    pub const ZERO: Self = Deg(0.0);

    /// 中位（150 度）
    pub const CENTER: Self = Deg(150.0);

    #[inline]
    pub const fn new(value: f64) -> Self {
        Deg(value)
    }

    /// 获取原始值
    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }

    /// 取绝对值
    #[inline]
    pub fn abs(self) -> Self {
        Deg(self.0.abs())
    }

    /// 限制范围
    #[inline]
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Deg(self.0.clamp(min.0, max.0))
    }

    /// 钳位到机构行程 [0, 300]
    ///
    /// NaN 视为中位，避免把非法值送入控制器。
    #[inline]
    pub fn clamp_to_travel(self) -> Self {
        if self.0.is_nan() {
            return Deg::CENTER;
        }
        self.clamp(TRAVEL_MIN, TRAVEL_MAX)
    }
}

impl fmt::Display for Deg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}°", self.0)
    }
}

impl Add for Deg {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Deg(self.0 + rhs.0)
    }
}

impl Sub for Deg {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Deg(self.0 - rhs.0)
    }
}

/// 角度传感器
///
/// 实现者负责原始采集与解码（ADC、NMEA 等）。`read()` 必须在有限时间内返回；
/// 读取失败返回 `None`，不要阻塞等待下一次采样。
pub trait AngleSource: Send + Sync {
    fn read(&self) -> Option<Deg>;
}

impl<F> AngleSource for F
where
    F: Fn() -> Option<Deg> + Send + Sync,
{
    fn read(&self) -> Option<Deg> {
        self()
    }
}

/// ADC 原始值转换为角度
///
/// `raw / full_scale × 300`，超过满量程按满量程处理。`full_scale == 0` 返回 `None`。
pub fn adc_to_degrees(raw: u16, full_scale: u16) -> Option<Deg> {
    if full_scale == 0 {
        return None;
    }
    let ratio = f64::from(raw.min(full_scale)) / f64::from(full_scale);
    Some(Deg(ratio * TRAVEL_MAX.0))
}

/// 带缓存的角度源
///
/// 底层读取失败时，在 `max_age` 内返回最后一次有效读数；超过后返回 `None`。
pub struct CachedAngleSource {
    inner: Arc<dyn AngleSource>,
    max_age: Duration,
    last_good: Mutex<Option<(Deg, Instant)>>,
}

impl CachedAngleSource {
    pub fn new(inner: Arc<dyn AngleSource>, max_age: Duration) -> Self {
        Self {
            inner,
            max_age,
            last_good: Mutex::new(None),
        }
    }

    /// 最后一次有效读数及其年龄
    pub fn last_good(&self) -> Option<(Deg, Duration)> {
        self.last_good.lock().map(|(deg, at)| (deg, at.elapsed()))
    }
}

impl AngleSource for CachedAngleSource {
    fn read(&self) -> Option<Deg> {
        let mut last_good = self.last_good.lock();

        if let Some(deg) = self.inner.read() {
            *last_good = Some((deg, Instant::now()));
            return Some(deg);
        }

        match *last_good {
            Some((deg, at)) if at.elapsed() <= self.max_age => {
                trace!("Sensor miss, using cached reading {} ({:?} old)", deg, at.elapsed());
                Some(deg)
            },
            Some((_, at)) => {
                debug!("Cached reading expired ({:?} old)", at.elapsed());
                None
            },
            None => None,
        }
    }
}
