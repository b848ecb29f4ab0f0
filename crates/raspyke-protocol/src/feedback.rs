//! 观测帧结构体定义
//!
//! Hub 以固定周期发送观测帧：24 字节原始数据经 Base64 编码为 32 个字符。
//! 本模块提供从编码文本解析 [`Report`] 的方法，以及反向编码（用于测试和回放）。

use crate::constants::*;
use crate::{ProtocolError, read_i24_be, read_u16_be, read_u24_be, write_i24_be};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bilge::prelude::*;

// ============================================================================
// 校验
// ============================================================================

/// 观测帧校验：对负载逐字节 XOR，再把高低 4 bit 折叠为 1 个 nibble
pub fn parity_nibble(payload: &[u8]) -> u8 {
    let parity = payload.iter().fold(0u8, |acc, &b| acc ^ b);
    (parity ^ (parity >> 4)) & 0x0F
}

/// 校验解码后的观测帧（第 1 字节低 4 bit 与 `[2..]` 的折叠 XOR 比较）
pub fn verify_report_parity(raw: &[u8]) -> Result<(), ProtocolError> {
    if raw.len() < OFFSET_TIME {
        return Err(ProtocolError::InvalidLength {
            expected: REPORT_LEN,
            actual: raw.len(),
        });
    }

    let expected = parity_nibble(&raw[OFFSET_TIME..]);
    let actual = raw[OFFSET_PARITY] & 0x0F;
    if expected != actual {
        return Err(ProtocolError::ParityMismatch { expected, actual });
    }
    Ok(())
}

// ============================================================================
// 按键位域
// ============================================================================

/// 按键状态位域（系统信息槽 0）
///
/// - Bit 0: Hub 已连接
/// - Bit 1: 左键
/// - Bit 2: 右键
/// - Bit 3: 中键
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy)]
pub struct ButtonState {
    pub connected: bool, // Bit 0
    pub left: bool,      // Bit 1
    pub right: bool,     // Bit 2
    pub center: bool,    // Bit 3
    pub reserved: u12,   // Bit 4-15: 保留
}

impl ButtonState {
    /// 从原始位掩码构造
    pub fn from_raw(raw: u16) -> Self {
        ButtonState::from(u16::new(raw))
    }
}

// ============================================================================
// 陀螺仪
// ============================================================================

/// 陀螺仪读数（两个 12-bit 有符号字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GyroReading {
    /// 角度（度），高 12 bit
    pub angle: i16,
    /// 角速度（度/秒），低 12 bit
    pub angular_velocity: i16,
}

fn sign_extend_12(value: u32) -> i16 {
    let value = (value & 0x0FFF) as i16;
    if value < 0x800 { value } else { value - 0x1000 }
}

impl GyroReading {
    /// 从 3 字节打包字段解析
    pub fn unpack(bytes: [u8; 3]) -> Self {
        let packed = read_u24_be(bytes);
        Self {
            angle: sign_extend_12(packed >> 12),
            angular_velocity: sign_extend_12(packed),
        }
    }

    /// 打包为 3 字节（超出 12-bit 的部分被截断）
    pub fn pack(self) -> [u8; 3] {
        let angle = (self.angle as u16 as u32) & 0x0FFF;
        let rate = (self.angular_velocity as u16 as u32) & 0x0FFF;
        let packed = (angle << 12) | rate;
        [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
    }
}

/// 把 (角度, 角速度) 打包为 24-bit 整数
pub fn pack_gyro(angle: i16, angular_velocity: i16) -> u32 {
    read_u24_be(
        GyroReading {
            angle,
            angular_velocity,
        }
        .pack(),
    )
}

/// 从 24-bit 打包整数拆出 (角度, 角速度)
pub fn unpack_gyro(packed: u32) -> (i16, i16) {
    let reading =
        GyroReading::unpack([(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]);
    (reading.angle, reading.angular_velocity)
}

// ============================================================================
// 系统信息槽
// ============================================================================

/// 系统信息（每帧只携带三个槽中的一个）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SystemInfo {
    /// 槽 0：按键位掩码
    Buttons(u16),
    /// 槽 1：电池电压（mV）
    BatteryVoltage(u16),
    /// 槽 2：电池电流（mA）
    BatteryCurrent(u16),
}

impl SystemInfo {
    /// 由槽编号构造；编号不在 0..3 时返回 `None`
    pub fn from_slot(slot: u8, value: u16) -> Option<Self> {
        match slot {
            0 => Some(SystemInfo::Buttons(value)),
            1 => Some(SystemInfo::BatteryVoltage(value)),
            2 => Some(SystemInfo::BatteryCurrent(value)),
            _ => None,
        }
    }

    pub fn slot(&self) -> u8 {
        match self {
            SystemInfo::Buttons(_) => 0,
            SystemInfo::BatteryVoltage(_) => 1,
            SystemInfo::BatteryCurrent(_) => 2,
        }
    }

    pub fn value(&self) -> u16 {
        match *self {
            SystemInfo::Buttons(v)
            | SystemInfo::BatteryVoltage(v)
            | SystemInfo::BatteryCurrent(v) => v,
        }
    }
}

// ============================================================================
// 观测帧
// ============================================================================

/// 观测帧（已校验）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    /// Hub 启动后的时间（ms，24-bit）
    pub time_ms: u32,
    /// 电机计数 A/B/C（度，24-bit 有符号）
    pub motor_counts: [i32; MOTOR_PORT_COUNT],
    /// 颜色传感器槽原始字节（含义取决于当前模式）
    pub sensor: [u8; 3],
    /// 超声波距离（cm）
    pub ultrasonic: u8,
    /// 陀螺仪读数
    pub gyro: GyroReading,
    /// 本帧携带的系统信息（槽编号越界时为 `None`）
    pub system: Option<SystemInfo>,
}

impl TryFrom<&[u8]> for Report {
    type Error = ProtocolError;

    /// 从解码后的 24 字节解析（校验长度和校验位）
    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        if raw.len() != REPORT_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: REPORT_LEN,
                actual: raw.len(),
            });
        }

        verify_report_parity(raw)?;

        let field3 = |offset: usize| [raw[offset], raw[offset + 1], raw[offset + 2]];

        let mut motor_counts = [0i32; MOTOR_PORT_COUNT];
        for (port, count) in motor_counts.iter_mut().enumerate() {
            *count = read_i24_be(field3(OFFSET_MOTOR_COUNT + port * 3));
        }

        let system_value = read_u16_be([raw[OFFSET_SYSTEM_VALUE], raw[OFFSET_SYSTEM_VALUE + 1]]);

        Ok(Self {
            time_ms: read_u24_be(field3(OFFSET_TIME)),
            motor_counts,
            sensor: field3(OFFSET_SENSOR),
            ultrasonic: raw[OFFSET_ULTRASONIC],
            gyro: GyroReading::unpack(field3(OFFSET_GYRO)),
            system: SystemInfo::from_slot(raw[OFFSET_SYSTEM_SLOT], system_value),
        })
    }
}

impl Report {
    /// 生成原始 24 字节（包含魔数和校验位）
    pub fn to_raw(&self) -> [u8; REPORT_LEN] {
        let mut raw = [0u8; REPORT_LEN];
        raw[0] = FRAME_MAGIC;

        let time = self.time_ms.to_be_bytes();
        raw[OFFSET_TIME..OFFSET_TIME + 3].copy_from_slice(&time[1..]);

        for (port, count) in self.motor_counts.iter().enumerate() {
            let offset = OFFSET_MOTOR_COUNT + port * 3;
            raw[offset..offset + 3].copy_from_slice(&write_i24_be(*count));
        }

        raw[OFFSET_SENSOR..OFFSET_SENSOR + 3].copy_from_slice(&self.sensor);
        raw[OFFSET_ULTRASONIC] = self.ultrasonic;
        raw[OFFSET_GYRO..OFFSET_GYRO + 3].copy_from_slice(&self.gyro.pack());

        match self.system {
            Some(info) => {
                raw[OFFSET_SYSTEM_SLOT] = info.slot();
                raw[OFFSET_SYSTEM_VALUE..].copy_from_slice(&info.value().to_be_bytes());
            },
            None => raw[OFFSET_SYSTEM_SLOT] = SYSTEM_SLOT_COUNT,
        }

        raw[OFFSET_PARITY] = REPORT_MAGIC_NIBBLE | parity_nibble(&raw[OFFSET_TIME..]);
        raw
    }

    /// 编码为 Base64 文本（与 Hub 发送格式一致，以 "f3" 开头）
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_raw())
    }
}

/// 解析已同步的观测帧文本
///
/// # 错误
/// - `ProtocolError::Decode`: Base64 格式错误
/// - `ProtocolError::InvalidLength`: 解码后长度不是 24
/// - `ProtocolError::ParityMismatch`: 校验失败
pub fn decode_report(encoded: &[u8]) -> Result<Report, ProtocolError> {
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| ProtocolError::Decode(e.to_string()))?;
    Report::try_from(raw.as_slice())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn parity_accepts_exactly_matching_nibble(
            body in proptest::collection::vec(any::<u8>(), REPORT_LEN - 2),
            nibble in 0u8..16,
        ) {
            let mut raw = vec![FRAME_MAGIC, REPORT_MAGIC_NIBBLE | nibble];
            raw.extend_from_slice(&body);

            let matches = nibble == parity_nibble(&body);
            prop_assert_eq!(verify_report_parity(&raw).is_ok(), matches);
        }

        #[test]
        fn parity_ignores_high_nibble_of_parity_byte(
            body in proptest::collection::vec(any::<u8>(), REPORT_LEN - 2),
            high in 0u8..16,
        ) {
            let mut raw = vec![FRAME_MAGIC, (high << 4) | parity_nibble(&body)];
            raw.extend_from_slice(&body);
            prop_assert!(verify_report_parity(&raw).is_ok());
        }

        #[test]
        fn gyro_packing_recovers_12bit_values(angle in -2048i16..2048, rate in -2048i16..2048) {
            let gyro = GyroReading { angle, angular_velocity: rate };
            prop_assert_eq!(GyroReading::unpack(gyro.pack()), gyro);
        }
    }
}
