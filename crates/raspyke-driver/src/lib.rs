//! 驱动层模块
//!
//! 本模块管理 RasPike 串口会话，包括：
//! - 接收线程：帧同步、解码、校验，写入共享遥测状态
//! - 定周期调度：在调用线程上按墙钟对齐的间隔执行用户回调
//! - 命令发送：回调线程同步写出命令帧
//! - 会话结束：等待接收线程退出，发送电机失效保护命令
//!
//! 大多数用户应该使用 `raspyke-client` 提供的设备接口。

mod builder;
mod connection;
pub mod dispatch;
mod error;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod sync;

pub use builder::ConnectionBuilder;
pub use connection::{Connection, DEFAULT_FEEDBACK_TIMEOUT, Link, ShutdownHandle};
pub use dispatch::{
    CadenceDispatcher, Clock, DispatchConfig, DispatchExit, Flow, Handler, SystemClock,
};
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, RxShared, rx_loop};
pub use state::{LinkFlags, Observation, Telemetry};
pub use sync::FrameSynchronizer;

pub use raspyke_serial::SerialConfig;
