//! 协议常量定义
//!
//! 观测帧（Hub → 主机）解码后的字节布局：
//!
//! ```text
//! [0]      魔数 0x7F
//! [1]      高 4 bit 魔数 0x7，低 4 bit 校验
//! [2..5)   时间（ms，无符号）
//! [5..14)  电机计数 A/B/C（各 3 字节，有符号）
//! [14..17) 颜色传感器槽（ambient / color / reflect / rgb，随模式变化）
//! [17]     超声波距离
//! [18..21) 陀螺仪：角度（高 12 bit）+ 角速度（低 12 bit）
//! [21]     系统信息槽编号（0: 按键, 1: 电池电压, 2: 电池电流）
//! [22..24) 系统信息值
//! ```
//!
//! 命令帧（主机 → Hub）：`[0x7F][parity][command][value: i32 BE]`

/// 观测帧编码后的长度（Base64 字符数）
pub const REPORT_ENCODED_LEN: usize = 32;

/// 观测帧解码后的长度
pub const REPORT_LEN: usize = 24;

/// 观测帧编码后的起始标记（"f3"，即 0x7F 0x7? 的 Base64 前缀）
pub const REPORT_MARKER: [u8; 2] = [0x66, 0x33];

/// 帧魔数（两个方向的第 0 字节）
pub const FRAME_MAGIC: u8 = 0x7F;

/// 观测帧第 1 字节的高 4 bit
pub const REPORT_MAGIC_NIBBLE: u8 = 0x70;

/// 命令帧长度
pub const COMMAND_LEN: usize = 7;

// === 观测帧字段偏移（解码后） ===

pub const OFFSET_PARITY: usize = 1;
pub const OFFSET_TIME: usize = 2;
pub const OFFSET_MOTOR_COUNT: usize = 5;
pub const OFFSET_SENSOR: usize = 14;
pub const OFFSET_ULTRASONIC: usize = 17;
pub const OFFSET_GYRO: usize = 18;
pub const OFFSET_SYSTEM_SLOT: usize = 21;
pub const OFFSET_SYSTEM_VALUE: usize = 22;

/// 电机端口数量（A/B/C）
pub const MOTOR_PORT_COUNT: usize = 3;

/// 系统信息槽数量（按键 / 电压 / 电流）
pub const SYSTEM_SLOT_COUNT: u8 = 3;

/// 电机功率范围（固件侧按 i8 解释）
pub const MOTOR_POWER_MIN: i32 = -128;
pub const MOTOR_POWER_MAX: i32 = 127;
