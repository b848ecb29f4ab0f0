//! CLI 配置文件
//!
//! ```toml
//! [serial]
//! port = "/dev/USB_SPIKE"
//! baud_rate = 115200
//! timeout_ms = 500
//!
//! [dispatch]
//! interval_ms = 10
//! ```
//!
//! 所有字段都可省略；命令行参数优先于配置文件。

use anyhow::{Context, Result};
use clap::Args;
use raspyke_driver::ConnectionBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 默认配置文件路径
pub fn default_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("cannot determine the user config directory")?;
    path.push("raspyke");
    path.push("config.toml");
    Ok(path)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSection {
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub serial: SerialSection,
    pub dispatch: DispatchSection,
}

impl CliConfig {
    /// 加载配置；文件不存在时返回默认值
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 串口设备路径
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率
    #[arg(short, long)]
    pub baud_rate: Option<u32>,

    /// 串口读超时（毫秒），超时视为链路断开
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// 回调间隔（毫秒）
    #[arg(short, long)]
    pub interval_ms: Option<u64>,
}

impl ConnectionArgs {
    /// 合并命令行参数、配置文件和默认值
    pub fn builder(&self, file: &CliConfig) -> ConnectionBuilder {
        let mut builder = ConnectionBuilder::new();

        if let Some(port) = self.port.as_ref().or(file.serial.port.as_ref()) {
            builder = builder.port(port.clone());
        }
        if let Some(baud_rate) = self.baud_rate.or(file.serial.baud_rate) {
            builder = builder.baud_rate(baud_rate);
        }
        if let Some(ms) = self.timeout_ms.or(file.serial.timeout_ms) {
            builder = builder.read_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.interval_ms.or(file.dispatch.interval_ms) {
            builder = builder.interval(Duration::from_millis(ms));
        }
        builder
    }
}
