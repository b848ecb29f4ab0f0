//! 设备层错误类型

use raspyke_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    /// 命令发送失败等底层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_driver_error() {
        let err: DeviceError = DriverError::AlreadyConnected.into();
        assert!(matches!(err, DeviceError::Driver(DriverError::AlreadyConnected)));
        assert!(format!("{}", err).starts_with("Driver error"));
    }
}
