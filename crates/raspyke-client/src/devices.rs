//! 设备能力接口
//!
//! 每类设备一个 trait，用户代码对 trait 编程，后端可以替换。
//! 读取接口返回最近一帧观测中的值；写入接口发送一条命令，不等待应答。

use crate::error::DeviceError;
use raspyke_protocol::ButtonState;

/// RGB 原始值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// 主控（Hub）
pub trait Hub {
    /// LED 颜色编号
    fn set_led(&self, color_code: u8) -> Result<(), DeviceError>;
    /// Hub 启动后的时间（ms）
    fn time(&self) -> u32;
    /// 电池电压（mV）
    fn battery_voltage(&self) -> u16;
    /// 电池电流（mA）
    fn battery_current(&self) -> u16;
    fn play_speaker_tone(&self, frequency_hz: u16, duration_ms: u16) -> Result<(), DeviceError>;
    fn set_speaker_volume(&self, volume: u8) -> Result<(), DeviceError>;
    /// 按键原始位掩码
    fn button_pressed(&self) -> u16;

    fn buttons(&self) -> ButtonState {
        ButtonState::from_raw(self.button_pressed())
    }
}

/// 电机
pub trait Motor {
    /// 编码器计数（度）
    fn count(&self) -> i32;
    fn reset_count(&self) -> Result<(), DeviceError>;
    /// 功率，超出 -128..=127 的值会被截断
    fn set_power(&self, power: i32) -> Result<(), DeviceError>;
    fn set_brake(&self, brake: bool) -> Result<(), DeviceError>;
}

/// 颜色传感器
///
/// 传感器同一时刻只工作在一种模式下。读取某个量时如果当前模式不对，
/// 会发送切换命令，但本次返回的值仍来自旧模式；调用方需要持续轮询，
/// 直到模式切换生效。
pub trait ColorSensor {
    /// 反射光强度
    fn brightness(&self) -> Result<u8, DeviceError>;
    /// 环境光强度
    fn ambient(&self) -> Result<u8, DeviceError>;
    /// 颜色编号
    fn color(&self) -> Result<u8, DeviceError>;
    fn raw_color(&self) -> Result<Rgb, DeviceError>;
}

/// 超声波传感器
pub trait SonarSensor {
    /// 距离（cm）
    fn distance(&self) -> u8;
    /// 是否检测到其他超声波信号
    fn listen(&self) -> bool;
}

/// 陀螺仪
pub trait GyroSensor {
    /// 角度（度）
    fn angle(&self) -> i16;
    /// 角速度（度/秒）
    fn angular_velocity(&self) -> i16;
    fn reset(&self) -> Result<(), DeviceError>;
}

/// 反向安装的电机：功率和计数取反
#[derive(Debug, Clone)]
pub struct Reversed<M> {
    inner: M,
}

impl<M: Motor> Reversed<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Motor> Motor for Reversed<M> {
    fn count(&self) -> i32 {
        self.inner.count().wrapping_neg()
    }

    fn reset_count(&self) -> Result<(), DeviceError> {
        self.inner.reset_count()
    }

    fn set_power(&self, power: i32) -> Result<(), DeviceError> {
        self.inner.set_power(power.saturating_neg())
    }

    fn set_brake(&self, brake: bool) -> Result<(), DeviceError> {
        self.inner.set_brake(brake)
    }
}
