//! 命令定义和实现

pub mod config;
pub mod observe;
pub mod stop;

pub use config::ConfigCommand;
pub use observe::ObserveCommand;
pub use stop::StopCommand;
