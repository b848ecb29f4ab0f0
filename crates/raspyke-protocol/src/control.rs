//! 命令帧定义
//!
//! 主机 → Hub 方向的二进制命令帧（7 字节，不做 Base64 编码）：
//!
//! ```text
//! ┌────────┬────────┬─────────┬──────────────────────┐
//! │ Magic  │ Parity │ Command │ Value (i32 BE)       │
//! │ 0x7F   │ 1B     │ 1B      │ 4B                   │
//! └────────┴────────┴─────────┴──────────────────────┘
//! ```
//!
//! 校验字节是 `[2..7)` 的完整 8-bit XOR，与观测帧的 4-bit 校验不同。

use crate::ProtocolError;
use crate::constants::{COMMAND_LEN, FRAME_MAGIC, MOTOR_POWER_MAX, MOTOR_POWER_MIN};

// ============================================================================
// 枚举类型定义
// ============================================================================

/// 命令码
///
/// 电机相关命令码由端口计算：`(port + 1) * 16 + {1: power, 2: brake, 3: reset}`。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandCode {
    /// 休眠（ms）
    Sleep = 0x00,
    /// 蜂鸣：高 16 bit 频率（Hz），低 16 bit 时长（ms）
    Tone = 0x01,
    /// 音量（0-10）
    Volume = 0x02,
    /// LED 颜色编号（0-20）
    Led = 0x03,
    MotorAPower = 0x11,
    MotorABrake = 0x12,
    MotorAReset = 0x13,
    MotorBPower = 0x21,
    MotorBBrake = 0x22,
    MotorBReset = 0x23,
    MotorCPower = 0x31,
    MotorCBrake = 0x32,
    MotorCReset = 0x33,
    /// 颜色传感器模式（见 [`ColorMode`]）
    ColorSensorMode = 0x41,
    /// 陀螺仪复位
    GyroReset = 0x51,
}

/// 电机端口
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MotorPort {
    A = 0,
    B = 1,
    C = 2,
}

impl MotorPort {
    /// 全部电机端口（用于失效保护）
    pub const ALL: [MotorPort; 3] = [MotorPort::A, MotorPort::B, MotorPort::C];

    /// 端口下标（0-2）
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// 电机命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorAction {
    Power,
    Brake,
    Reset,
}

impl CommandCode {
    /// 计算电机命令码：`(port + 1) * 16 + action`
    pub fn motor(port: MotorPort, action: MotorAction) -> Self {
        match (port, action) {
            (MotorPort::A, MotorAction::Power) => CommandCode::MotorAPower,
            (MotorPort::A, MotorAction::Brake) => CommandCode::MotorABrake,
            (MotorPort::A, MotorAction::Reset) => CommandCode::MotorAReset,
            (MotorPort::B, MotorAction::Power) => CommandCode::MotorBPower,
            (MotorPort::B, MotorAction::Brake) => CommandCode::MotorBBrake,
            (MotorPort::B, MotorAction::Reset) => CommandCode::MotorBReset,
            (MotorPort::C, MotorAction::Power) => CommandCode::MotorCPower,
            (MotorPort::C, MotorAction::Brake) => CommandCode::MotorCBrake,
            (MotorPort::C, MotorAction::Reset) => CommandCode::MotorCReset,
        }
    }
}

/// 颜色传感器模式
///
/// 固件在观测帧 `[14..17)` 中按当前模式填充数据：
/// - Ambient / Color / Reflect：`[value, 0, mode]`
/// - Rgb：`[r + 1, g + 1, b + 1]`（每个通道都不为 0）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ColorMode {
    #[default]
    Ambient = 0,
    Color = 1,
    Reflect = 2,
    Rgb = 3,
}

// ============================================================================
// 命令
// ============================================================================

/// 一条主机命令（命令码 + 32-bit 值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Command {
    pub code: CommandCode,
    pub value: i32,
}

impl Command {
    pub fn new(code: CommandCode, value: i32) -> Self {
        Self { code, value }
    }

    /// 休眠指定毫秒
    pub fn sleep(duration_ms: u32) -> Self {
        Self::new(CommandCode::Sleep, duration_ms as i32)
    }

    /// 播放蜂鸣：频率与时长各占 16 bit
    pub fn tone(frequency_hz: u16, duration_ms: u16) -> Self {
        let value = (u32::from(frequency_hz) << 16) | u32::from(duration_ms);
        Self::new(CommandCode::Tone, value as i32)
    }

    pub fn volume(volume: u8) -> Self {
        Self::new(CommandCode::Volume, i32::from(volume))
    }

    pub fn led(color_code: u8) -> Self {
        Self::new(CommandCode::Led, i32::from(color_code))
    }

    /// 电机功率（钳位到 `-128..=127`）
    pub fn motor_power(port: MotorPort, power: i32) -> Self {
        let power = power.clamp(MOTOR_POWER_MIN, MOTOR_POWER_MAX);
        Self::new(CommandCode::motor(port, MotorAction::Power), power)
    }

    pub fn motor_brake(port: MotorPort, brake: bool) -> Self {
        Self::new(
            CommandCode::motor(port, MotorAction::Brake),
            i32::from(brake),
        )
    }

    pub fn motor_reset(port: MotorPort) -> Self {
        Self::new(CommandCode::motor(port, MotorAction::Reset), 0)
    }

    pub fn color_mode(mode: ColorMode) -> Self {
        Self::new(CommandCode::ColorSensorMode, i32::from(u8::from(mode)))
    }

    pub fn gyro_reset() -> Self {
        Self::new(CommandCode::GyroReset, 0)
    }

    /// 失效保护：所有电机功率置 0
    pub fn failsafe_stop() -> [Command; 3] {
        MotorPort::ALL.map(|port| Command::motor_power(port, 0))
    }
}

// ============================================================================
// 命令帧
// ============================================================================

/// 命令帧校验：对负载逐字节 XOR（完整 8 bit）
pub fn command_parity(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// 已编码的命令帧（7 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: [u8; COMMAND_LEN],
}

impl CommandFrame {
    /// 编码命令
    pub fn encode(command: Command) -> Self {
        let mut bytes = [0u8; COMMAND_LEN];
        bytes[0] = FRAME_MAGIC;
        bytes[2] = command.code.into();
        // i32 的大端字节就是 `value & 0xFFFF_FFFF` 的无符号表示，固件按有符号解释
        bytes[3..7].copy_from_slice(&command.value.to_be_bytes());
        bytes[1] = command_parity(&bytes[2..]);
        Self { bytes }
    }

    /// 获取帧字节（写入串口）
    pub fn as_bytes(&self) -> &[u8; COMMAND_LEN] {
        &self.bytes
    }

    /// 解码命令帧（参考解码器，固件侧行为）
    pub fn decode(bytes: &[u8]) -> Result<Command, ProtocolError> {
        if bytes.len() != COMMAND_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: COMMAND_LEN,
                actual: bytes.len(),
            });
        }

        if bytes[0] != FRAME_MAGIC {
            return Err(ProtocolError::InvalidMagic(bytes[0]));
        }

        let expected = command_parity(&bytes[2..]);
        if bytes[1] != expected {
            return Err(ProtocolError::ParityMismatch {
                expected,
                actual: bytes[1],
            });
        }

        let code = CommandCode::try_from(bytes[2])
            .map_err(|_| ProtocolError::UnknownCommand(bytes[2]))?;
        let value = i32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);

        Ok(Command { code, value })
    }
}

impl From<Command> for CommandFrame {
    fn from(command: Command) -> Self {
        Self::encode(command)
    }
}
