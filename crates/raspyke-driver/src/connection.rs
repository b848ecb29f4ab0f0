//! 连接会话
//!
//! `Connection` 持有接收线程和命令发送端。生命周期：
//!
//! 1. `open` / `from_port`：获取进程级连接锁，分离串口，启动接收线程
//! 2. `run`：在调用线程上运行定周期调度，直到回调停止、中断或链路断开
//! 3. 退出：等待接收线程结束，向所有电机发送停止命令，释放连接锁

use crate::dispatch::{CadenceDispatcher, Clock, DispatchConfig, DispatchExit, Handler, SystemClock};
use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::metrics::{LinkMetrics, MetricsSnapshot};
use crate::pipeline::{PipelineConfig, RxShared, rx_loop};
use crate::state::{LinkFlags, Observation, Telemetry};
use parking_lot::Mutex;
use raspyke_protocol::{Command, CommandFrame, REPORT_MARKER};
use raspyke_serial::{SerialConfig, SerialError, SerialPortAdapter, SplittablePort, TxPort};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 进程内是否已有活动连接
static CONNECTED: AtomicBool = AtomicBool::new(false);

/// 进程级连接锁（RAII）
pub(crate) struct ConnectionGuard {
    _private: (),
}

impl ConnectionGuard {
    pub(crate) fn acquire() -> Result<Self, DriverError> {
        CONNECTED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self { _private: () })
            .map_err(|_| DriverError::AlreadyConnected)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        CONNECTED.store(false, Ordering::Release);
    }
}

/// 默认反馈超时（用于 `is_receiving`）
pub const DEFAULT_FEEDBACK_TIMEOUT: Duration = Duration::from_millis(200);

/// 两个线程共享的链路状态
///
/// 设备层通过 `Arc<Link>` 读取观测值、发送命令。
pub struct Link {
    telemetry: Telemetry,
    flags: LinkFlags,
    metrics: LinkMetrics,
    monitor: ConnectionMonitor,
    tx: Mutex<Box<dyn TxPort + Send>>,
}

impl Link {
    fn new(tx: Box<dyn TxPort + Send>, feedback_timeout: Duration) -> Self {
        Self {
            telemetry: Telemetry::new(),
            flags: LinkFlags::new(),
            metrics: LinkMetrics::new(),
            monitor: ConnectionMonitor::new(feedback_timeout),
            tx: Mutex::new(tx),
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn flags(&self) -> &LinkFlags {
        &self.flags
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 编码并同步写出一条命令（不等待应答）
    pub fn send(&self, command: Command) -> Result<(), DriverError> {
        let frame = CommandFrame::encode(command);
        let result = self.tx.lock().write_all(frame.as_bytes());
        match result {
            Ok(()) => {
                self.metrics.tx_commands.fetch_add(1, Ordering::Relaxed);
                trace!("TX: {:?} -> {:02X?}", command, frame.as_bytes());
                Ok(())
            },
            Err(e) => {
                self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                Err(e.into())
            },
        }
    }

    /// 所有电机功率置 0；逐条发送，单条失败不影响其余
    fn failsafe(&self) {
        for command in Command::failsafe_stop() {
            if let Err(e) = self.send(command) {
                warn!("Failsafe stop {:?} failed: {}", command.code, e);
            }
        }
    }
}

/// 中断句柄
///
/// 可以跨线程克隆，常用于 Ctrl-C 处理函数。
#[derive(Clone)]
pub struct ShutdownHandle {
    link: Arc<Link>,
}

impl ShutdownHandle {
    /// 请求会话结束（清除 `running`）
    pub fn request(&self) {
        info!("Shutdown requested");
        self.link.flags.request_stop();
    }

    pub fn is_running(&self) -> bool {
        self.link.flags.is_running()
    }
}

/// 一个活动的串口会话
pub struct Connection {
    link: Arc<Link>,
    rx_thread: Option<JoinHandle<Result<(), SerialError>>>,
    dispatch: DispatchConfig,
    port_name: String,
    closed: bool,
    // 最后释放
    _guard: ConnectionGuard,
}

impl Connection {
    /// 打开串口并启动接收线程
    ///
    /// # Errors
    /// - `DriverError::AlreadyConnected`: 进程内已有连接（在打开串口之前检查）
    /// - `DriverError::Serial`: 串口打开失败
    pub fn open(
        serial: &SerialConfig,
        dispatch: DispatchConfig,
        pipeline: PipelineConfig,
    ) -> Result<Self, DriverError> {
        let guard = ConnectionGuard::acquire()?;
        validate(&dispatch, &pipeline)?;
        let port = SerialPortAdapter::open(serial)?;
        Self::start(guard, port, serial.port.clone(), dispatch, pipeline, DEFAULT_FEEDBACK_TIMEOUT)
    }

    /// 使用已打开的端口（任意 [`SplittablePort`] 实现）
    pub fn from_port<P>(
        port: P,
        port_name: impl Into<String>,
        dispatch: DispatchConfig,
        pipeline: PipelineConfig,
    ) -> Result<Self, DriverError>
    where
        P: SplittablePort,
        P::Rx: Send + 'static,
        P::Tx: Send + 'static,
    {
        let guard = ConnectionGuard::acquire()?;
        validate(&dispatch, &pipeline)?;
        Self::start(guard, port, port_name.into(), dispatch, pipeline, DEFAULT_FEEDBACK_TIMEOUT)
    }

    pub(crate) fn start<P>(
        guard: ConnectionGuard,
        port: P,
        port_name: String,
        dispatch: DispatchConfig,
        pipeline: PipelineConfig,
        feedback_timeout: Duration,
    ) -> Result<Self, DriverError>
    where
        P: SplittablePort,
        P::Rx: Send + 'static,
        P::Tx: Send + 'static,
    {
        let (rx, tx) = port.split()?;
        let link = Arc::new(Link::new(Box::new(tx), feedback_timeout));

        let rx_link = Arc::clone(&link);
        let rx_thread = std::thread::Builder::new()
            .name("raspyke-rx".to_string())
            .spawn(move || {
                rx_loop(
                    rx,
                    RxShared {
                        telemetry: &rx_link.telemetry,
                        flags: &rx_link.flags,
                        metrics: &rx_link.metrics,
                        monitor: &rx_link.monitor,
                    },
                    &pipeline,
                )
            })
            .map_err(|e| DriverError::IoThread(format!("failed to spawn RX thread: {}", e)))?;

        info!("Connected to {}", port_name);

        Ok(Self {
            link,
            rx_thread: Some(rx_thread),
            dispatch,
            port_name,
            closed: false,
            _guard: guard,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// 设备层使用的共享链路
    pub fn link(&self) -> Arc<Link> {
        Arc::clone(&self.link)
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.link.telemetry
    }

    pub fn snapshot(&self) -> Observation {
        self.link.telemetry.snapshot()
    }

    pub fn send_command(&self, command: Command) -> Result<(), DriverError> {
        self.link.send(command)
    }

    pub fn is_running(&self) -> bool {
        self.link.flags.is_running()
    }

    /// 是否已经收到过有效观测
    pub fn is_ready(&self) -> bool {
        self.link.flags.is_ready()
    }

    /// 最近一段时间内是否收到过有效观测
    pub fn is_receiving(&self) -> bool {
        self.link.monitor.check_connection()
    }

    pub fn feedback_age(&self) -> Duration {
        self.link.monitor.time_since_last_feedback()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.link.metrics.snapshot()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            link: Arc::clone(&self.link),
        }
    }

    /// 在当前线程运行定周期调度
    ///
    /// 回调每个周期最多执行一次，第一帧有效观测到达之前不执行。
    /// 返回之前一定会等待接收线程退出并发送电机停止命令。
    ///
    /// # Errors
    /// - `DriverError::Handler`: 回调返回错误
    /// - `DriverError::Serial`: 接收线程因读超时或 IO 错误退出（链路断开）
    pub fn run<H>(self, handler: H) -> Result<DispatchExit, DriverError>
    where
        H: Handler,
        H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        self.run_with_clock(SystemClock::default(), handler)
    }

    /// 同 [`run`](Self::run)，使用自定义时钟
    pub fn run_with_clock<C, H>(
        mut self,
        clock: C,
        mut handler: H,
    ) -> Result<DispatchExit, DriverError>
    where
        C: Clock,
        H: Handler,
        H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let dispatcher = CadenceDispatcher::with_clock(&self.dispatch, clock)?;
        let outcome = dispatcher.run(&self.link.flags, &mut handler);
        let rx_result = self.close();

        match (outcome, rx_result) {
            (Err(e), _) => Err(DriverError::Handler(e.into())),
            (Ok(_), Err(e)) => Err(e),
            (Ok(exit), Ok(())) => {
                debug!("Session on {} ended: {:?}", self.port_name, exit);
                Ok(exit)
            },
        }
    }

    /// 不运行调度，直接结束会话
    ///
    /// 等待接收线程退出并发送电机停止命令；之后 drop 不会重复发送。
    /// 通过 [`link`](Self::link) 取得的链路仍可继续写命令。
    ///
    /// # Errors
    /// - `DriverError::Serial`: 接收线程因读超时或 IO 错误退出
    pub fn disconnect(mut self) -> Result<(), DriverError> {
        self.close()
    }

    /// 停止接收线程并发送失效保护命令（只执行一次）
    fn close(&mut self) -> Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.link.flags.request_stop();

        let rx_result = match self.rx_thread.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result.map_err(DriverError::from),
                Err(_) => {
                    error!("RX thread panicked");
                    Err(DriverError::IoThread("RX thread panicked".to_string()))
                },
            },
            None => Ok(()),
        };

        self.link.flags.clear();
        self.link.failsafe();
        info!("Disconnected from {}", self.port_name);
        rx_result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Connection closed with error: {}", e);
        }
    }
}

pub(crate) fn validate(
    dispatch: &DispatchConfig,
    pipeline: &PipelineConfig,
) -> Result<(), DriverError> {
    dispatch.interval_ms()?;
    if pipeline.frame_capacity < REPORT_MARKER.len() {
        return Err(DriverError::Config(format!(
            "frame capacity {} is shorter than the frame marker",
            pipeline.frame_capacity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raspyke_serial::MockPort;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_second_connection_rejected() {
        let first = Connection::from_port(
            MockPort::new(),
            "mock0",
            DispatchConfig::default(),
            PipelineConfig::default(),
        )
        .unwrap();

        let second = Connection::from_port(
            MockPort::new(),
            "mock1",
            DispatchConfig::default(),
            PipelineConfig::default(),
        );
        assert!(matches!(second, Err(DriverError::AlreadyConnected)));

        drop(first);
        let third = Connection::from_port(
            MockPort::new(),
            "mock2",
            DispatchConfig::default(),
            PipelineConfig::default(),
        );
        assert!(third.is_ok());
    }

    #[test]
    #[serial]
    fn test_invalid_config_releases_guard() {
        let result = Connection::from_port(
            MockPort::new(),
            "mock0",
            DispatchConfig {
                interval: Duration::ZERO,
            },
            PipelineConfig::default(),
        );
        assert!(matches!(result, Err(DriverError::Config(_))));
        assert!(!CONNECTED.load(Ordering::Acquire));
    }

    #[test]
    #[serial]
    fn test_drop_sends_failsafe() {
        let port = MockPort::new();
        let observer = port.clone();
        let conn = Connection::from_port(
            port,
            "mock0",
            DispatchConfig::default(),
            PipelineConfig::default(),
        )
        .unwrap();
        conn.send_command(Command::led(5)).unwrap();
        drop(conn);

        let written = observer.written();
        assert_eq!(written.len(), 4);
        let codes: Vec<u8> = written[1..].iter().map(|frame| frame[2]).collect();
        assert_eq!(codes, vec![0x11, 0x21, 0x31]);
    }

    #[test]
    #[serial]
    fn test_disconnect_sends_failsafe_once() {
        let port = MockPort::new();
        let observer = port.clone();
        let conn = Connection::from_port(
            port,
            "mock0",
            DispatchConfig::default(),
            PipelineConfig::default(),
        )
        .unwrap();
        let link = conn.link();

        // 空端口：接收线程以读超时退出
        let _ = conn.disconnect();
        assert!(!CONNECTED.load(Ordering::Acquire));

        link.send(Command::led(5)).unwrap();
        let codes: Vec<u8> = observer.written().iter().map(|frame| frame[2]).collect();
        assert_eq!(codes, vec![0x11, 0x21, 0x31, 0x03]);
    }

    #[test]
    #[serial]
    fn test_write_error_is_counted() {
        let port = MockPort::new();
        port.set_fail_writes(true);
        let conn = Connection::from_port(
            port,
            "mock0",
            DispatchConfig::default(),
            PipelineConfig::default(),
        )
        .unwrap();

        assert!(matches!(
            conn.send_command(Command::gyro_reset()),
            Err(DriverError::Serial(SerialError::Closed))
        ));
        assert_eq!(conn.metrics().tx_errors, 1);
    }
}
