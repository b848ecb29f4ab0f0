//! # RasPike CLI
//!
//! ```bash
//! # 保存默认串口
//! raspyke-cli config set --port /dev/ttyAMA1
//!
//! # 每 40ms 打印一次观测值，Ctrl-C 结束（结束时所有电机停止）
//! raspyke-cli observe --interval-ms 40
//!
//! # 停止所有电机
//! raspyke-cli stop --brake
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{ConfigCommand, ObserveCommand, StopCommand};

/// RasPike CLI
#[derive(Parser, Debug)]
#[command(name = "raspyke-cli")]
#[command(about = "Observe and control a RasPike hub over its serial link", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 $CONFIG_DIR/raspyke/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 周期打印观测值
    Observe {
        #[command(flatten)]
        args: ObserveCommand,
    },

    /// 停止所有电机
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },
}

fn init_tracing(verbose: bool) -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("raspyke_cli=info".parse()?);
    if verbose {
        for directive in ["raspyke_cli=debug", "raspyke_driver=debug", "raspyke_client=debug"] {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_path()?,
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),
        Commands::Observe { args } => {
            let file = config::CliConfig::load(&config_path)?;
            args.execute(&file)
        },
        Commands::Stop { args } => {
            let file = config::CliConfig::load(&config_path)?;
            args.execute(&file)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_observe_with_overrides() {
        let cli = Cli::try_parse_from([
            "raspyke-cli",
            "--verbose",
            "observe",
            "--port",
            "/dev/ttyUSB0",
            "--interval-ms",
            "40",
            "--count",
            "5",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Observe { args } => {
                assert_eq!(args.connection.port.as_deref(), Some("/dev/ttyUSB0"));
                assert_eq!(args.connection.interval_ms, Some(40));
                assert_eq!(args.count, Some(5));
            },
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
