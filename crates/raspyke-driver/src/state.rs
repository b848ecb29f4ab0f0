//! 共享遥测状态
//!
//! 接收线程写入、回调线程读取。每个逻辑字段是一个独立的原子变量：
//! 单个字段永远不会读到撕裂的值，但不同字段之间可能相差一帧。

use raspyke_protocol::{GyroReading, MOTOR_PORT_COUNT, MotorPort, Report, SystemInfo};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU16, AtomicU32, Ordering};

/// 最近一次观测值
///
/// 系统信息三个槽分别保留各自最后一次出现时的值。
#[derive(Debug, Default)]
pub struct Telemetry {
    time_ms: AtomicU32,
    motor_counts: [AtomicI32; MOTOR_PORT_COUNT],
    /// 颜色传感器槽 3 字节，按大端打包在低 24 bit
    sensor: AtomicU32,
    ultrasonic: AtomicU8,
    /// 陀螺仪 3 字节，按大端打包在低 24 bit
    gyro: AtomicU32,
    buttons: AtomicU16,
    battery_voltage: AtomicU16,
    battery_current: AtomicU16,
}

fn pack3(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

fn unpack3(packed: u32) -> [u8; 3] {
    let [_, b0, b1, b2] = packed.to_be_bytes();
    [b0, b1, b2]
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一帧已校验的观测写入状态
    ///
    /// 系统信息槽只更新该帧携带的那一个字段，槽编号越界时跳过。
    pub fn apply(&self, report: &Report) {
        self.time_ms.store(report.time_ms, Ordering::Relaxed);
        for (slot, count) in self.motor_counts.iter().zip(report.motor_counts) {
            slot.store(count, Ordering::Relaxed);
        }
        self.sensor.store(pack3(report.sensor), Ordering::Relaxed);
        self.ultrasonic.store(report.ultrasonic, Ordering::Relaxed);
        self.gyro.store(pack3(report.gyro.pack()), Ordering::Relaxed);

        match report.system {
            Some(SystemInfo::Buttons(v)) => self.buttons.store(v, Ordering::Relaxed),
            Some(SystemInfo::BatteryVoltage(v)) => self.battery_voltage.store(v, Ordering::Relaxed),
            Some(SystemInfo::BatteryCurrent(v)) => self.battery_current.store(v, Ordering::Relaxed),
            None => {},
        }
    }

    pub fn time_ms(&self) -> u32 {
        self.time_ms.load(Ordering::Relaxed)
    }

    pub fn motor_count(&self, port: MotorPort) -> i32 {
        self.motor_counts[port.index()].load(Ordering::Relaxed)
    }

    pub fn sensor(&self) -> [u8; 3] {
        unpack3(self.sensor.load(Ordering::Relaxed))
    }

    pub fn ultrasonic(&self) -> u8 {
        self.ultrasonic.load(Ordering::Relaxed)
    }

    pub fn gyro(&self) -> GyroReading {
        GyroReading::unpack(unpack3(self.gyro.load(Ordering::Relaxed)))
    }

    /// 按键原始位掩码
    pub fn buttons(&self) -> u16 {
        self.buttons.load(Ordering::Relaxed)
    }

    pub fn battery_voltage(&self) -> u16 {
        self.battery_voltage.load(Ordering::Relaxed)
    }

    pub fn battery_current(&self) -> u16 {
        self.battery_current.load(Ordering::Relaxed)
    }

    /// 复制当前全部字段（用于显示和日志）
    pub fn snapshot(&self) -> Observation {
        Observation {
            time_ms: self.time_ms(),
            motor_counts: MotorPort::ALL.map(|port| self.motor_count(port)),
            sensor: self.sensor(),
            ultrasonic: self.ultrasonic(),
            gyro: self.gyro(),
            buttons: self.buttons(),
            battery_voltage: self.battery_voltage(),
            battery_current: self.battery_current(),
        }
    }
}

/// [`Telemetry`] 的普通值拷贝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Observation {
    pub time_ms: u32,
    pub motor_counts: [i32; MOTOR_PORT_COUNT],
    pub sensor: [u8; 3],
    pub ultrasonic: u8,
    pub gyro: GyroReading,
    pub buttons: u16,
    pub battery_voltage: u16,
    pub battery_current: u16,
}

/// 会话标志
///
/// - `running`: 会话是否应继续；任何一方清除后两个循环都会退出
/// - `ready`: 是否已经收到过至少一帧有效观测
#[derive(Debug)]
pub struct LinkFlags {
    running: AtomicBool,
    ready: AtomicBool,
}

impl Default for LinkFlags {
    fn default() -> Self {
        Self {
            running: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }
}

impl LinkFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// 请求停止（不影响 `ready`）
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// 清除两个标志
    pub fn clear(&self) {
        self.running.store(false, Ordering::Release);
        self.ready.store(false, Ordering::Release);
    }
}

/// 作用域结束时清除全部标志
pub(crate) struct ClearOnDrop<'a>(pub(crate) &'a LinkFlags);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(system: Option<SystemInfo>) -> Report {
        Report {
            time_ms: 42,
            motor_counts: [1, -2, 300_000],
            sensor: [10, 0, 2],
            ultrasonic: 99,
            gyro: GyroReading {
                angle: -200,
                angular_velocity: 300,
            },
            system,
        }
    }

    #[test]
    fn test_apply_and_read_fields() {
        let telemetry = Telemetry::new();
        telemetry.apply(&report_with(None));

        assert_eq!(telemetry.time_ms(), 42);
        assert_eq!(telemetry.motor_count(MotorPort::B), -2);
        assert_eq!(telemetry.motor_count(MotorPort::C), 300_000);
        assert_eq!(telemetry.sensor(), [10, 0, 2]);
        assert_eq!(telemetry.ultrasonic(), 99);
        assert_eq!(telemetry.gyro().angle, -200);
        assert_eq!(telemetry.gyro().angular_velocity, 300);
    }

    #[test]
    fn test_system_slots_keep_their_own_frame() {
        let telemetry = Telemetry::new();
        telemetry.apply(&report_with(Some(SystemInfo::Buttons(0b0101))));
        telemetry.apply(&report_with(Some(SystemInfo::BatteryVoltage(8200))));
        telemetry.apply(&report_with(Some(SystemInfo::BatteryCurrent(150))));
        telemetry.apply(&report_with(Some(SystemInfo::BatteryVoltage(8100))));

        assert_eq!(telemetry.buttons(), 0b0101);
        assert_eq!(telemetry.battery_voltage(), 8100);
        assert_eq!(telemetry.battery_current(), 150);
    }

    #[test]
    fn test_out_of_range_slot_still_applies_other_fields() {
        let telemetry = Telemetry::new();
        telemetry.apply(&report_with(Some(SystemInfo::BatteryVoltage(7000))));

        let mut report = report_with(None);
        report.time_ms = 43;
        telemetry.apply(&report);

        assert_eq!(telemetry.time_ms(), 43);
        assert_eq!(telemetry.battery_voltage(), 7000);
    }

    #[test]
    fn test_snapshot_copies_everything() {
        let telemetry = Telemetry::new();
        telemetry.apply(&report_with(Some(SystemInfo::Buttons(3))));
        let obs = telemetry.snapshot();
        assert_eq!(obs.motor_counts, [1, -2, 300_000]);
        assert_eq!(obs.buttons, 3);
        assert_eq!(obs.ultrasonic, 99);
    }

    #[test]
    fn test_link_flags_lifecycle() {
        let flags = LinkFlags::new();
        assert!(flags.is_running());
        assert!(!flags.is_ready());

        flags.set_ready();
        flags.request_stop();
        assert!(!flags.is_running());
        assert!(flags.is_ready());

        {
            let _guard = ClearOnDrop(&flags);
        }
        assert!(!flags.is_ready());
    }
}
