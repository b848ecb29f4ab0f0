//! RasPike 后端
//!
//! 所有设备都从一个 [`Connection`] 构造，读取共享遥测状态、通过同一条链路发送命令。
//! 设备只持有 `Arc<Link>`，可以在 `Connection::run` 的回调中使用。

use crate::devices::{ColorSensor, GyroSensor, Hub, Motor, Rgb, SonarSensor};
use crate::error::DeviceError;
use raspyke_driver::{Connection, Link};
use raspyke_protocol::{ColorMode, Command, MotorPort};
use std::sync::Arc;
use tracing::trace;

fn send(link: &Link, command: Command) -> Result<(), DeviceError> {
    link.send(command).map_err(DeviceError::from)
}

/// RasPike Hub
#[derive(Clone)]
pub struct RaspikeHub {
    link: Arc<Link>,
}

impl RaspikeHub {
    pub fn new(conn: &Connection) -> Self {
        Self { link: conn.link() }
    }
}

impl Hub for RaspikeHub {
    fn set_led(&self, color_code: u8) -> Result<(), DeviceError> {
        send(&self.link, Command::led(color_code))
    }

    fn time(&self) -> u32 {
        self.link.telemetry().time_ms()
    }

    fn battery_voltage(&self) -> u16 {
        self.link.telemetry().battery_voltage()
    }

    fn battery_current(&self) -> u16 {
        self.link.telemetry().battery_current()
    }

    fn play_speaker_tone(&self, frequency_hz: u16, duration_ms: u16) -> Result<(), DeviceError> {
        send(&self.link, Command::tone(frequency_hz, duration_ms))
    }

    fn set_speaker_volume(&self, volume: u8) -> Result<(), DeviceError> {
        send(&self.link, Command::volume(volume))
    }

    fn button_pressed(&self) -> u16 {
        self.link.telemetry().buttons()
    }
}

/// RasPike 电机（端口 A/B/C）
#[derive(Clone)]
pub struct RaspikeMotor {
    link: Arc<Link>,
    port: MotorPort,
}

impl RaspikeMotor {
    pub fn new(conn: &Connection, port: MotorPort) -> Self {
        Self {
            link: conn.link(),
            port,
        }
    }

    pub fn port(&self) -> MotorPort {
        self.port
    }
}

impl Motor for RaspikeMotor {
    fn count(&self) -> i32 {
        self.link.telemetry().motor_count(self.port)
    }

    fn reset_count(&self) -> Result<(), DeviceError> {
        send(&self.link, Command::motor_reset(self.port))
    }

    fn set_power(&self, power: i32) -> Result<(), DeviceError> {
        send(&self.link, Command::motor_power(self.port, power))
    }

    fn set_brake(&self, brake: bool) -> Result<(), DeviceError> {
        send(&self.link, Command::motor_brake(self.port, brake))
    }
}

/// RasPike 颜色传感器
///
/// 传感器槽 `[s0, s1, s2]` 的含义：
/// - 单值模式：`[value, 0, mode]`
/// - RGB 模式：`[r + 1, g + 1, b + 1]`
#[derive(Clone)]
pub struct RaspikeColorSensor {
    link: Arc<Link>,
}

impl RaspikeColorSensor {
    pub fn new(conn: &Connection) -> Self {
        Self { link: conn.link() }
    }

    /// 读取单值模式的值；当前不是 `mode` 时先请求切换
    fn read_scalar(&self, mode: ColorMode) -> Result<u8, DeviceError> {
        let [value, marker, active] = self.link.telemetry().sensor();
        if marker != 0 || active != u8::from(mode) {
            trace!("Color sensor mode switch requested: {:?}", mode);
            send(&self.link, Command::color_mode(mode))?;
        }
        Ok(value)
    }
}

impl ColorSensor for RaspikeColorSensor {
    fn brightness(&self) -> Result<u8, DeviceError> {
        self.read_scalar(ColorMode::Reflect)
    }

    fn ambient(&self) -> Result<u8, DeviceError> {
        self.read_scalar(ColorMode::Ambient)
    }

    fn color(&self) -> Result<u8, DeviceError> {
        self.read_scalar(ColorMode::Color)
    }

    fn raw_color(&self) -> Result<Rgb, DeviceError> {
        let [r, g, b] = self.link.telemetry().sensor();
        if g == 0 || b == 0 {
            trace!("Color sensor mode switch requested: {:?}", ColorMode::Rgb);
            send(&self.link, Command::color_mode(ColorMode::Rgb))?;
        }
        Ok(Rgb {
            r: r.saturating_sub(1),
            g: g.saturating_sub(1),
            b: b.saturating_sub(1),
        })
    }
}

/// RasPike 超声波传感器
#[derive(Clone)]
pub struct RaspikeSonarSensor {
    link: Arc<Link>,
}

impl RaspikeSonarSensor {
    pub fn new(conn: &Connection) -> Self {
        Self { link: conn.link() }
    }
}

impl SonarSensor for RaspikeSonarSensor {
    fn distance(&self) -> u8 {
        self.link.telemetry().ultrasonic()
    }

    /// 固件不上报该值
    fn listen(&self) -> bool {
        false
    }
}

/// RasPike 陀螺仪
#[derive(Clone)]
pub struct RaspikeGyroSensor {
    link: Arc<Link>,
}

impl RaspikeGyroSensor {
    pub fn new(conn: &Connection) -> Self {
        Self { link: conn.link() }
    }
}

impl GyroSensor for RaspikeGyroSensor {
    fn angle(&self) -> i16 {
        self.link.telemetry().gyro().angle
    }

    fn angular_velocity(&self) -> i16 {
        self.link.telemetry().gyro().angular_velocity
    }

    fn reset(&self) -> Result<(), DeviceError> {
        send(&self.link, Command::gyro_reset())
    }
}
