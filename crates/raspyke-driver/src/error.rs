//! 驱动层错误类型定义

use raspyke_protocol::ProtocolError;
use raspyke_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误（包括读超时，即链路断开）
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 进程内已经存在一个活动连接
    #[error("A connection is already open in this process")]
    AlreadyConnected,

    /// 用户回调返回错误
    #[error("Handler failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use raspyke_protocol::ProtocolError;
    use raspyke_serial::SerialError;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::Serial(SerialError::Timeout {
            expected: 32,
            actual: 0,
        });
        let msg = format!("{}", err);
        assert!(msg.contains("Read timeout"), "Serial error message: {}", msg);

        let err = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 24,
            actual: 3,
        });
        assert!(format!("{}", err).contains("Protocol error"));

        assert_eq!(
            format!("{}", DriverError::AlreadyConnected),
            "A connection is already open in this process"
        );

        let err = DriverError::IoThread("rx panicked".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("IO thread") && msg.contains("rx panicked"));
    }

    #[test]
    fn test_from_serial_error() {
        let err: DriverError = SerialError::Closed.into();
        assert!(matches!(err, DriverError::Serial(SerialError::Closed)));
    }

    #[test]
    fn test_handler_error_keeps_source() {
        let inner = std::io::Error::other("boom");
        let err = DriverError::Handler(Box::new(inner));
        assert!(std::error::Error::source(&err).is_some());
        assert!(format!("{}", err).contains("boom"));
    }
}
