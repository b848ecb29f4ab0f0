//! # RasPike Serial Adapter Layer
//!
//! 串口硬件抽象层，提供统一的读写接口。
//!
//! 读操作的语义与常见串口库的 `read(n)` 一致：阻塞直到读满 `n` 字节或端口超时，
//! 返回实际读取的字节数。是否把"读不满"视为错误由上层决定。

use std::io::{ErrorKind, Read};
use std::time::Duration;
use thiserror::Error;

mod native;

#[cfg(feature = "mock")]
pub mod mock;

pub use native::{SerialPortAdapter, SerialRx, SerialTx};

#[cfg(feature = "mock")]
pub use mock::MockPort;

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Read timeout: expected {expected} bytes, got {actual}")]
    Timeout { expected: usize, actual: usize },
    #[error("Port closed")]
    Closed,
}

/// 串口参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径（如 "/dev/USB_SPIKE"、"/dev/ttyAMA0"）
    pub port: String,
    /// 波特率
    pub baud_rate: u32,
    /// 读超时
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/USB_SPIKE".to_string(),
            baud_rate: 115_200,
            timeout: Duration::from_millis(500),
        }
    }
}

pub trait SerialAdapter {
    /// 读取直到填满 `buf` 或端口超时，返回实际读取的字节数
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError>;
}

pub trait RxPort {
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}

pub trait TxPort {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError>;
}

pub trait SplittablePort: SerialAdapter {
    type Rx: RxPort;
    type Tx: TxPort;
    fn split(self) -> Result<(Self::Rx, Self::Tx), SerialError>;
}

/// 从 `Read` 读取直到填满或超时
///
/// `ErrorKind::TimedOut` 和 `Ok(0)` 都视为"没有更多数据"，返回已读字节数。
pub fn read_until_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, SerialError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                break;
            },
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(SerialError::Io(e)),
        }
    }
    Ok(filled)
}
