//! `serialport` 后端
//!
//! 打开真实串口设备。分离 RX/TX 时通过 `try_clone()` 复制句柄，
//! 两个句柄共享同一个底层文件描述符，可以在不同线程中同时读写。

use crate::{RxPort, SerialAdapter, SerialConfig, SerialError, SplittablePort, TxPort};
use serialport::SerialPort;
use std::io::Write;
use tracing::{debug, trace};

/// 串口适配器（未分离）
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialPortAdapter {
    /// 按配置打开串口
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.timeout)
            .open()
            .map_err(|source| SerialError::Open {
                port: config.port.clone(),
                source,
            })?;

        debug!(
            "Opened serial port {} at {} baud (timeout {:?})",
            config.port, config.baud_rate, config.timeout
        );

        Ok(Self {
            port,
            name: config.port.clone(),
        })
    }

    /// 设备路径
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        crate::read_until_full(&mut self.port, buf)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        trace!("{}: write {} bytes", self.name, data.len());
        self.port.write_all(data)?;
        Ok(())
    }
}

impl SplittablePort for SerialPortAdapter {
    type Rx = SerialRx;
    type Tx = SerialTx;

    fn split(self) -> Result<(SerialRx, SerialTx), SerialError> {
        let tx_port = self.port.try_clone()?;
        Ok((
            SerialRx { port: self.port },
            SerialTx {
                port: tx_port,
                name: self.name,
            },
        ))
    }
}

/// 只读串口句柄（RX 线程独占）
pub struct SerialRx {
    port: Box<dyn SerialPort>,
}

impl RxPort for SerialRx {
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        crate::read_until_full(&mut self.port, buf)
    }
}

/// 只写串口句柄（命令发送）
pub struct SerialTx {
    port: Box<dyn SerialPort>,
    name: String,
}

impl TxPort for SerialTx {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SerialError> {
        trace!("{}: write {} bytes", self.name, data.len());
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }
}
