//! # RasPike Protocol
//!
//! RasPike 串口链路协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧长度、魔数、字段偏移
//! - `control`: 命令帧构建（主机 → Hub，二进制 7 字节）
//! - `feedback`: 观测帧解析（Hub → 主机，Base64 文本）
//!
//! ## 字节序
//!
//! 所有多字节整数均为大端字节序（高位在前）。
//! 本模块提供了 24-bit 整数的读取工具函数，协议中的时间和电机计数都是 3 字节字段。
//!
//! ## 校验
//!
//! 两个方向的校验方式不同：
//! - 观测帧：对 `[2..]` 做 XOR，再折叠为 4 bit，与第 1 字节低 4 位比较
//! - 命令帧：对 `[2..7)` 做 XOR，保留完整 8 bit
//!
//! 这种不对称与 Hub 固件保持一致，不要合并为同一种算法。

pub mod constants;
pub mod control;
pub mod feedback;

// 重新导出常用类型
pub use constants::*;
pub use control::*;
pub use feedback::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid frame length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Base64 decode error: {0}")]
    Decode(String),

    #[error("Parity mismatch: expected 0x{expected:X}, got 0x{actual:X}")]
    ParityMismatch { expected: u8, actual: u8 },

    #[error("Invalid magic byte: 0x{0:02X}")]
    InvalidMagic(u8),

    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),
}

/// 大端 3 字节转无符号整数
pub fn read_u24_be(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// 大端 3 字节转有符号整数（24-bit 补码）
pub fn read_i24_be(bytes: [u8; 3]) -> i32 {
    // 先放到高 24 位，再算术右移完成符号扩展
    i32::from_be_bytes([bytes[0], bytes[1], bytes[2], 0]) >> 8
}

/// 有符号整数转大端 3 字节（截断到 24-bit）
pub fn write_i24_be(value: i32) -> [u8; 3] {
    let bytes = value.to_be_bytes();
    [bytes[1], bytes[2], bytes[3]]
}

/// 大端 2 字节转 u16
pub fn read_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u24_be() {
        assert_eq!(read_u24_be([0x01, 0x02, 0x03]), 0x010203);
        assert_eq!(read_u24_be([0xFF, 0xFF, 0xFF]), 0xFFFFFF);
    }

    #[test]
    fn test_read_i24_be_positive() {
        assert_eq!(read_i24_be([0x00, 0x01, 0x00]), 256);
        assert_eq!(read_i24_be([0x7F, 0xFF, 0xFF]), 0x7FFFFF);
    }

    #[test]
    fn test_read_i24_be_negative() {
        assert_eq!(read_i24_be([0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(read_i24_be([0x80, 0x00, 0x00]), -0x800000);
        assert_eq!(read_i24_be([0xFF, 0xFF, 0xCE]), -50);
    }

    #[test]
    fn test_write_i24_be() {
        assert_eq!(write_i24_be(-1), [0xFF, 0xFF, 0xFF]);
        assert_eq!(write_i24_be(720), [0x00, 0x02, 0xD0]);
        assert_eq!(read_i24_be(write_i24_be(-123_456)), -123_456);
    }

    #[test]
    fn test_read_u16_be() {
        assert_eq!(read_u16_be([0x1F, 0x40]), 8000);
    }

    #[test]
    fn test_error_display() {
        let e = ProtocolError::ParityMismatch {
            expected: 0x3,
            actual: 0xA,
        };
        assert_eq!(format!("{}", e), "Parity mismatch: expected 0x3, got 0xA");

        let e = ProtocolError::InvalidLength {
            expected: 24,
            actual: 18,
        };
        assert!(format!("{}", e).contains("Invalid frame length"));
    }
}
