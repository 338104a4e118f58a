//! Mock 执行器端口
//!
//! 仅在测试或 `mock` feature 下编译。`RecordingPort` 记录所有写入，
//! 并支持注入故障，用于驱动层和控制层的单元/集成测试。

use crate::error::{ActuatorFault, ActuatorOp};
use crate::port::{ActuatorPort, Duty, PwmChannel};
use parking_lot::Mutex;
use std::sync::Arc;

/// 记录的端口命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortCommand {
    /// `set(channel, duty)`
    Set { channel: PwmChannel, duty: Duty },
    /// `cut()`
    Cut,
    /// `release()`
    Release,
}

impl PortCommand {
    /// 命令的占空比（`Cut` / `Release` 为 0）
    pub fn duty(&self) -> Duty {
        match self {
            PortCommand::Set { duty, .. } => *duty,
            PortCommand::Cut | PortCommand::Release => Duty::ZERO,
        }
    }
}

#[derive(Default)]
struct Recorder {
    commands: Vec<PortCommand>,
    /// 剩余注入故障次数
    pending_faults: usize,
    /// 所有操作失败
    fail_all: bool,
}

/// 记录型执行器端口
///
/// Clone 共享同一份记录，测试代码保留一份克隆用于断言。
#[derive(Clone, Default)]
pub struct RecordingPort {
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有成功执行的命令
    pub fn commands(&self) -> Vec<PortCommand> {
        self.recorder.lock().commands.clone()
    }

    /// 最后一条命令
    pub fn last(&self) -> Option<PortCommand> {
        self.recorder.lock().commands.last().copied()
    }

    /// 最后一条 `Set` 命令
    pub fn last_set(&self) -> Option<(PwmChannel, Duty)> {
        self.recorder
            .lock()
            .commands
            .iter()
            .rev()
            .find_map(|cmd| match cmd {
                PortCommand::Set { channel, duty } => Some((*channel, *duty)),
                _ => None,
            })
    }

    /// 清空记录
    pub fn clear(&self) {
        self.recorder.lock().commands.clear();
    }

    /// 让接下来的 `n` 次操作失败
    pub fn inject_faults(&self, n: usize) {
        self.recorder.lock().pending_faults = n;
    }

    /// 让所有操作失败（直到关闭）
    pub fn fail_all(&self, enabled: bool) {
        self.recorder.lock().fail_all = enabled;
    }

    fn record(&self, op: ActuatorOp, command: PortCommand) -> Result<(), ActuatorFault> {
        let mut recorder = self.recorder.lock();
        if recorder.fail_all {
            return Err(ActuatorFault::new(op, "injected permanent fault"));
        }
        if recorder.pending_faults > 0 {
            recorder.pending_faults -= 1;
            return Err(ActuatorFault::new(op, "injected fault"));
        }
        recorder.commands.push(command);
        Ok(())
    }
}

impl ActuatorPort for RecordingPort {
    fn set(&mut self, channel: PwmChannel, duty: Duty) -> Result<(), ActuatorFault> {
        self.record(ActuatorOp::Set, PortCommand::Set { channel, duty })
    }

    fn cut(&mut self) -> Result<(), ActuatorFault> {
        self.record(ActuatorOp::Cut, PortCommand::Cut)
    }

    fn release(&mut self) -> Result<(), ActuatorFault> {
        self.record(ActuatorOp::Release, PortCommand::Release)
    }
}

impl std::fmt::Debug for RecordingPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPort")
            .field("commands", &self.recorder.lock().commands.len())
            .finish()
    }
}
