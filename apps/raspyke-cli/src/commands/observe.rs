//! 观测命令
//!
//! 连接 Hub，按调度周期读取所有设备并打印。Ctrl-C 结束会话，结束时所有电机停止。

use crate::config::{CliConfig, ConnectionArgs};
use anyhow::{Context, Result};
use clap::Args;
use raspyke_client::prelude::*;
use raspyke_driver::{DispatchExit, DriverError, Flow};
use raspyke_protocol::MotorPort;
use tracing::{info, warn};

/// 观测命令参数
#[derive(Args, Debug)]
pub struct ObserveCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 每隔多少个周期打印一次
    #[arg(long, default_value_t = 1)]
    pub every: u32,

    /// 打印多少次后结束（默认一直运行）
    #[arg(long)]
    pub count: Option<u32>,

    /// 读取颜色传感器的 RGB 值（会把传感器切换到 RGB 模式）
    #[arg(long)]
    pub raw_color: bool,

    /// 以 JSON 行输出原始观测（不读取设备，不切换传感器模式）
    #[arg(long, conflicts_with = "raw_color")]
    pub json: bool,
}

/// 一次观测的全部设备读数
struct Devices {
    hub: RaspikeHub,
    motors: [RaspikeMotor; 3],
    color: RaspikeColorSensor,
    sonar: RaspikeSonarSensor,
    gyro: RaspikeGyroSensor,
}

impl Devices {
    fn render(&self, raw_color: bool) -> Result<String, DeviceError> {
        let buttons = self.hub.buttons();
        let counts: Vec<String> = self
            .motors
            .iter()
            .map(|m| format!("{:?}={}", m.port(), m.count()))
            .collect();
        let color = if raw_color {
            let rgb = self.color.raw_color()?;
            format!("rgb=({}, {}, {})", rgb.r, rgb.g, rgb.b)
        } else {
            format!("brightness={}", self.color.brightness()?)
        };

        Ok([
            format!(
                "Hub: time={} battery={}mV/{}mA buttons(left={} right={} center={})",
                self.hub.time(),
                self.hub.battery_voltage(),
                self.hub.battery_current(),
                buttons.left(),
                buttons.right(),
                buttons.center(),
            ),
            format!("Motors: {}", counts.join(" ")),
            format!("ColorSensor: {}", color),
            format!("SonarSensor: distance={}", self.sonar.distance()),
            format!(
                "GyroSensor: angle={} angular_velocity={}",
                self.gyro.angle(),
                self.gyro.angular_velocity()
            ),
        ]
        .join("\n"))
    }
}

impl ObserveCommand {
    pub fn execute(&self, file: &CliConfig) -> Result<()> {
        let conn = self
            .connection
            .builder(file)
            .open()
            .context("failed to open the serial link")?;
        info!("Connected to {}, waiting for telemetry", conn.port_name());

        let shutdown = conn.shutdown_handle();
        ctrlc::set_handler(move || shutdown.request())
            .context("failed to install the Ctrl-C handler")?;

        let devices = Devices {
            hub: RaspikeHub::new(&conn),
            motors: MotorPort::ALL.map(|port| RaspikeMotor::new(&conn, port)),
            color: RaspikeColorSensor::new(&conn),
            sonar: RaspikeSonarSensor::new(&conn),
            gyro: RaspikeGyroSensor::new(&conn),
        };
        let link = conn.link();

        let every = self.every.max(1);
        let mut ticks: u64 = 0;
        let mut printed: u32 = 0;
        let exit = conn.run(|| {
            ticks += 1;
            if ticks % u64::from(every) != 0 {
                return Ok::<_, DeviceError>(Flow::Continue);
            }

            if self.json {
                match serde_json::to_string(&link.telemetry().snapshot()) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize observation: {}", e),
                }
            } else {
                println!("{}\n", devices.render(self.raw_color)?);
            }
            printed += 1;

            Ok(match self.count {
                Some(limit) if printed >= limit => Flow::Stop,
                _ => Flow::Continue,
            })
        });

        let metrics = link.metrics();
        info!(
            "Frames applied: {}, dropped: {}, commands sent: {}",
            metrics.rx_frames_applied,
            metrics.rx_dropped(),
            metrics.tx_commands
        );

        match exit {
            Ok(DispatchExit::Stopped) => info!("Observation finished"),
            Ok(DispatchExit::Shutdown) => info!("Interrupted, motors stopped"),
            Err(DriverError::Serial(e)) => {
                return Err(e).context("serial link lost");
            },
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
