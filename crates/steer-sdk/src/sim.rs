//! 仿真台架（`mock` feature）
//!
//! - `FixedAngleSource`: 可随时修改的固定读数
//! - `ScriptedAngleSource`: 按脚本依次返回读数，用尽后重复最后一个
//! - `SimulatedRig`: 电机与传感器耦合，正方向通道输出时每次读数前进 `step` 度
//!
//! 测试和 CLI 演示均在此之上运行，不需要真实硬件。

pub use steer_driver::mock::{PortCommand, RecordingPort};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use steer_control::{AngleSource, Deg, DirectionConvention};
use steer_driver::{ActuatorFault, ActuatorPort, Duty, PwmChannel};
use tracing::trace;

/// 固定读数传感器
#[derive(Debug, Default)]
pub struct FixedAngleSource {
    angle: Mutex<Option<Deg>>,
}

impl FixedAngleSource {
    pub fn new(angle: Deg) -> Self {
        Self {
            angle: Mutex::new(Some(angle)),
        }
    }

    /// 始终无读数
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn set(&self, angle: Option<Deg>) {
        *self.angle.lock() = angle;
    }
}

impl AngleSource for FixedAngleSource {
    fn read(&self) -> Option<Deg> {
        *self.angle.lock()
    }
}

/// 脚本化传感器
#[derive(Debug)]
pub struct ScriptedAngleSource {
    script: Mutex<VecDeque<Option<Deg>>>,
    last: Mutex<Option<Deg>>,
}

impl ScriptedAngleSource {
    pub fn new(readings: impl IntoIterator<Item = Option<Deg>>) -> Self {
        Self {
            script: Mutex::new(readings.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    /// 剩余脚本条数
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl AngleSource for ScriptedAngleSource {
    fn read(&self) -> Option<Deg> {
        let mut last = self.last.lock();
        if let Some(next) = self.script.lock().pop_front() {
            *last = next;
        }
        *last
    }
}

#[derive(Debug)]
struct RigState {
    angle: f64,
    output: Option<PwmChannel>,
}

/// 电机-传感器耦合仿真
///
/// 角度按通道移动：`convention` 的正方向通道使角度增大，另一通道使其减小。
/// 占空比为 0 或使能拉低时停止运动。角度保持在 [0, 300] 内。
#[derive(Clone)]
pub struct SimulatedRig {
    state: Arc<Mutex<RigState>>,
    step: f64,
    increasing: PwmChannel,
    recorder: RecordingPort,
}

impl SimulatedRig {
    pub fn new(initial: Deg, step: f64, convention: DirectionConvention) -> Self {
        let increasing = convention
            .positive()
            .channel()
            .unwrap_or(PwmChannel::Left);
        Self {
            state: Arc::new(Mutex::new(RigState {
                angle: initial.0,
                output: None,
            })),
            step,
            increasing,
            recorder: RecordingPort::new(),
        }
    }

    /// 当前角度（不推进仿真）
    pub fn angle(&self) -> Deg {
        Deg(self.state.lock().angle)
    }

    /// 直接设置角度
    pub fn set_angle(&self, angle: Deg) {
        self.state.lock().angle = angle.clamp_to_travel().0;
    }

    /// 当前输出通道（停止时为 `None`）
    pub fn output(&self) -> Option<PwmChannel> {
        self.state.lock().output
    }

    /// 执行器端口，交给 `MotorDriver`
    pub fn port(&self) -> SimPort {
        SimPort { rig: self.clone() }
    }

    /// 角度传感器
    pub fn sensor(&self) -> Arc<dyn AngleSource> {
        Arc::new(self.clone())
    }

    /// 端口命令记录
    pub fn recorder(&self) -> RecordingPort {
        self.recorder.clone()
    }
}

impl AngleSource for SimulatedRig {
    fn read(&self) -> Option<Deg> {
        let mut state = self.state.lock();
        if let Some(channel) = state.output {
            let delta = if channel == self.increasing {
                self.step
            } else {
                -self.step
            };
            state.angle = (state.angle + delta).clamp(0.0, 300.0);
            trace!("Rig moved to {:.2}", state.angle);
        }
        Some(Deg(state.angle))
    }
}

/// 仿真端口：记录命令并驱动仿真角度
pub struct SimPort {
    rig: SimulatedRig,
}

impl ActuatorPort for SimPort {
    fn set(&mut self, channel: PwmChannel, duty: Duty) -> Result<(), ActuatorFault> {
        self.rig.recorder.clone().set(channel, duty)?;
        self.rig.state.lock().output = (!duty.is_zero()).then_some(channel);
        Ok(())
    }

    fn cut(&mut self) -> Result<(), ActuatorFault> {
        self.rig.recorder.clone().cut()?;
        self.rig.state.lock().output = None;
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorFault> {
        self.rig.recorder.clone().release()?;
        self.rig.state.lock().output = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_source_repeats_last() {
        let source = ScriptedAngleSource::new([Some(Deg(10.0)), None, Some(Deg(20.0))]);
        assert_eq!(source.read(), Some(Deg(10.0)));
        assert_eq!(source.read(), None);
        assert_eq!(source.read(), Some(Deg(20.0)));
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.read(), Some(Deg(20.0)));
    }

    #[test]
    fn test_rig_moves_with_positive_channel() {
        let rig = SimulatedRig::new(Deg(100.0), 5.0, DirectionConvention::PositiveIsLeft);
        let mut port = rig.port();

        // 静止时读数不变
        assert_eq!(rig.read(), Some(Deg(100.0)));

        port.set(PwmChannel::Left, Duty::new(30.0)).unwrap();
        assert_eq!(rig.read(), Some(Deg(105.0)));

        port.set(PwmChannel::Right, Duty::new(30.0)).unwrap();
        assert_eq!(rig.read(), Some(Deg(100.0)));

        port.cut().unwrap();
        assert_eq!(rig.read(), Some(Deg(100.0)));
        assert_eq!(rig.recorder().commands().len(), 3);
    }

    #[test]
    fn test_rig_positive_is_right() {
        let rig = SimulatedRig::new(Deg(298.0), 5.0, DirectionConvention::PositiveIsRight);
        let mut port = rig.port();

        port.set(PwmChannel::Right, Duty::new(50.0)).unwrap();
        assert_eq!(rig.read(), Some(Deg(300.0)));

        // 零占空比不运动
        port.set(PwmChannel::Left, Duty::ZERO).unwrap();
        assert_eq!(rig.output(), None);
        assert_eq!(rig.read(), Some(Deg(300.0)));
    }
}
