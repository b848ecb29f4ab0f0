//! Builder 模式实现
//!
//! 提供链式构造 `Connection` 的便捷方式。

use crate::connection::{Connection, ConnectionGuard, DEFAULT_FEEDBACK_TIMEOUT, validate};
use crate::dispatch::DispatchConfig;
use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use raspyke_serial::{SerialConfig, SerialPortAdapter, SplittablePort};
use std::time::Duration;

/// Connection Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use raspyke_driver::{ConnectionBuilder, Flow};
/// use std::time::Duration;
///
/// let conn = ConnectionBuilder::new()
///     .port("/dev/ttyAMA1")
///     .interval(Duration::from_millis(40))
///     .open()
///     .unwrap();
///
/// let telemetry = conn.link();
/// conn.run(move || {
///     println!("hub time: {}", telemetry.telemetry().time_ms());
///     Ok::<_, std::io::Error>(Flow::Continue)
/// })
/// .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    serial: SerialConfig,
    dispatch: DispatchConfig,
    pipeline: PipelineConfig,
    feedback_timeout: Duration,
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionBuilder {
    pub fn new() -> Self {
        Self {
            serial: SerialConfig::default(),
            dispatch: DispatchConfig::default(),
            pipeline: PipelineConfig::default(),
            feedback_timeout: DEFAULT_FEEDBACK_TIMEOUT,
        }
    }

    /// 串口设备路径（默认 `/dev/USB_SPIKE`）
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.serial.port = port.into();
        self
    }

    /// 波特率（默认 115200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.serial.baud_rate = baud_rate;
        self
    }

    /// 串口读超时（默认 500ms）；超时即视为链路断开
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.serial.timeout = timeout;
        self
    }

    /// 回调间隔（默认 10ms）
    pub fn interval(mut self, interval: Duration) -> Self {
        self.dispatch.interval = interval;
        self
    }

    pub fn serial_config(mut self, config: SerialConfig) -> Self {
        self.serial = config;
        self
    }

    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline = config;
        self
    }

    /// 超过该时长没有有效观测，`is_receiving()` 返回 false
    pub fn feedback_timeout(mut self, timeout: Duration) -> Self {
        self.feedback_timeout = timeout;
        self
    }

    /// 打开串口并启动接收线程
    ///
    /// # Errors
    /// - `DriverError::AlreadyConnected`: 进程内已有连接
    /// - `DriverError::Config`: 配置无效
    /// - `DriverError::Serial`: 串口打开失败
    pub fn open(self) -> Result<Connection, DriverError> {
        let guard = ConnectionGuard::acquire()?;
        validate(&self.dispatch, &self.pipeline)?;
        let port = SerialPortAdapter::open(&self.serial)?;
        Connection::start(
            guard,
            port,
            self.serial.port,
            self.dispatch,
            self.pipeline,
            self.feedback_timeout,
        )
    }

    /// 使用已打开的端口（测试时传入 Mock 端口）
    ///
    /// 串口参数（路径、波特率、超时）由调用方负责，这里只记录路径用于日志。
    pub fn open_with<P>(self, port: P) -> Result<Connection, DriverError>
    where
        P: SplittablePort,
        P::Rx: Send + 'static,
        P::Tx: Send + 'static,
    {
        let guard = ConnectionGuard::acquire()?;
        validate(&self.dispatch, &self.pipeline)?;
        Connection::start(
            guard,
            port,
            self.serial.port,
            self.dispatch,
            self.pipeline,
            self.feedback_timeout,
        )
    }
}
