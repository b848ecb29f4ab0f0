//! 急停命令
//!
//! 打开链路，向所有电机发送功率 0 并断开；`--brake` 时在断开之后再发送刹车，
//! 保证刹车是最后写入的命令。

use crate::config::{CliConfig, ConnectionArgs};
use anyhow::{Context, Result};
use clap::Args;
use raspyke_driver::Connection;
use raspyke_protocol::{Command, MotorPort};
use tracing::{info, warn};

/// 急停命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 同时刹车
    #[arg(long)]
    pub brake: bool,
}

impl StopCommand {
    /// 断开之后追加发送的命令
    fn brake_commands(&self) -> Vec<Command> {
        if self.brake {
            MotorPort::ALL.map(|port| Command::motor_brake(port, true)).to_vec()
        } else {
            Vec::new()
        }
    }

    pub fn execute(&self, file: &CliConfig) -> Result<()> {
        let conn = self
            .connection
            .builder(file)
            .open()
            .context("failed to open the serial link")?;
        self.stop(conn)
    }

    fn stop(&self, conn: Connection) -> Result<()> {
        let link = conn.link();
        let port_name = conn.port_name().to_string();

        for command in Command::failsafe_stop() {
            conn.send_command(command)
                .with_context(|| format!("failed to send {:?}", command.code))?;
        }

        // 会话结束时会再写一次功率 0，必须先于刹车完成
        if let Err(e) = conn.disconnect() {
            warn!("Receive side ended with: {}", e);
        }

        for command in self.brake_commands() {
            link.send(command)
                .with_context(|| format!("failed to send {:?}", command.code))?;
        }
        info!("All motors stopped on {}", port_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raspyke_driver::ConnectionBuilder;
    use raspyke_protocol::{CommandCode, CommandFrame};
    use raspyke_serial::MockPort;
    use serial_test::serial;

    fn run_stop(brake: bool) -> Vec<Command> {
        let port = MockPort::new();
        let observer = port.clone();
        let conn = ConnectionBuilder::new().port("mock0").open_with(port).unwrap();
        let cmd = StopCommand {
            connection: ConnectionArgs::default(),
            brake,
        };
        cmd.stop(conn).unwrap();

        observer
            .written()
            .iter()
            .map(|frame| CommandFrame::decode(frame).unwrap())
            .collect()
    }

    #[test]
    fn test_brake_commands() {
        let cmd = StopCommand {
            connection: ConnectionArgs::default(),
            brake: false,
        };
        assert!(cmd.brake_commands().is_empty());

        let cmd = StopCommand {
            connection: ConnectionArgs::default(),
            brake: true,
        };
        let commands = cmd.brake_commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0], Command::motor_brake(MotorPort::A, true));
        assert!(commands.iter().all(|c| c.value == 1));
    }

    #[test]
    #[serial]
    fn test_stop_ends_with_power_zero() {
        let sent = run_stop(false);
        assert!(!sent.is_empty());
        let tail: Vec<CommandCode> = sent[sent.len() - 3..].iter().map(|c| c.code).collect();
        assert_eq!(
            tail,
            vec![CommandCode::MotorAPower, CommandCode::MotorBPower, CommandCode::MotorCPower]
        );
        assert!(sent.iter().all(|c| c.value == 0));
    }

    #[test]
    #[serial]
    fn test_brake_is_written_last() {
        let sent = run_stop(true);
        assert!(sent.len() >= 6);

        let (stops, brakes) = sent.split_at(sent.len() - 3);
        let expected = MotorPort::ALL.map(|port| Command::motor_brake(port, true));
        assert_eq!(brakes, expected.as_slice());
        assert!(stops.iter().all(|c| c.value == 0));
        assert_eq!(stops[stops.len() - 1].code, CommandCode::MotorCPower);
    }
}
