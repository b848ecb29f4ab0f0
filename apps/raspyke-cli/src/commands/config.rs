//! 配置管理命令

use crate::config::CliConfig;
use anyhow::Result;
use clap::Subcommand;
use std::path::Path;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 串口设备路径
        #[arg(short, long)]
        port: Option<String>,

        /// 波特率
        #[arg(short, long)]
        baud_rate: Option<u32>,

        /// 串口读超时（毫秒）
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// 回调间隔（毫秒）
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },

    /// 显示当前配置
    Show,

    /// 显示配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud_rate,
                timeout_ms,
                interval_ms,
            } => {
                let mut config = CliConfig::load(path)?;
                apply(&mut config, port, baud_rate, timeout_ms, interval_ms);
                config.save(path)?;
                println!("Saved {}", path.display());
                Ok(())
            },
            ConfigCommand::Show => {
                let config = CliConfig::load(path)?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            },
            ConfigCommand::Path => {
                println!("{}", path.display());
                Ok(())
            },
        }
    }
}

fn apply(
    config: &mut CliConfig,
    port: Option<String>,
    baud_rate: Option<u32>,
    timeout_ms: Option<u64>,
    interval_ms: Option<u64>,
) {
    if port.is_some() {
        config.serial.port = port;
    }
    if baud_rate.is_some() {
        config.serial.baud_rate = baud_rate;
    }
    if timeout_ms.is_some() {
        config.serial.timeout_ms = timeout_ms;
    }
    if interval_ms.is_some() {
        config.dispatch.interval_ms = interval_ms;
    }
}
