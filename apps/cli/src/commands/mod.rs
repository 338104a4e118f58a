//! 命令定义和实现

pub mod config;
pub mod dispatch;
pub mod record;
pub mod replay;
pub mod rotate;
pub mod track;

pub use config::ConfigCommand;
pub use dispatch::DispatchCommand;
pub use record::RecordCommand;
pub use replay::ReplayCommand;
pub use rotate::RotateCommand;
pub use track::TrackCommand;
