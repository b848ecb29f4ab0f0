//! 设备接口模块
//!
//! 本模块在串口会话之上提供设备级接口：
//! - `devices`: 每类设备的能力 trait（Hub、电机、颜色、超声波、陀螺仪）
//! - `raspike`: 基于 RasPike 串口链路的实现
//!
//! # 使用场景
//!
//! ```no_run
//! use raspyke_client::prelude::*;
//! use raspyke_driver::{ConnectionBuilder, Flow};
//! use raspyke_protocol::MotorPort;
//!
//! let conn = ConnectionBuilder::new().port("/dev/USB_SPIKE").open().unwrap();
//! let left = RaspikeMotor::new(&conn, MotorPort::A);
//! let right = Reversed::new(RaspikeMotor::new(&conn, MotorPort::B));
//! let color = RaspikeColorSensor::new(&conn);
//!
//! conn.run(move || {
//!     let power = if color.brightness()? > 50 { 40 } else { 20 };
//!     left.set_power(power)?;
//!     right.set_power(power)?;
//!     Ok::<_, DeviceError>(Flow::Continue)
//! })
//! .unwrap();
//! ```

pub mod devices;
mod error;
pub mod raspike;

pub use devices::{ColorSensor, GyroSensor, Hub, Motor, Reversed, Rgb, SonarSensor};
pub use error::DeviceError;
pub use raspike::{
    RaspikeColorSensor, RaspikeGyroSensor, RaspikeHub, RaspikeMotor, RaspikeSonarSensor,
};

/// 常用类型
pub mod prelude {
    pub use crate::devices::{ColorSensor, GyroSensor, Hub, Motor, Reversed, Rgb, SonarSensor};
    pub use crate::error::DeviceError;
    pub use crate::raspike::{
        RaspikeColorSensor, RaspikeGyroSensor, RaspikeHub, RaspikeMotor, RaspikeSonarSensor,
    };
}
