//! # Penguin CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - relay 编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use contracts::{LogConfig, RunMode};

use cli::{Cli, Commands};
use commands::{run_relay, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_relay(&cli, args).await,
        Commands::Validate(args) => {
            let log = LogConfig {
                level: "warn".to_string(),
                ..LogConfig::default()
            };
            init_logging(&cli, &log, RunMode::Dev)?;
            run_validate(args)
        }
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging from configuration, with CLI overrides applied
pub(crate) fn init_logging(cli: &Cli, log: &LogConfig, mode: RunMode) -> Result<()> {
    let mut log = log.clone();
    if cli.quiet {
        log.level = "warn".to_string();
    }
    if let Some(format) = cli.log_format {
        log.format = format.into();
    }

    observability::init_tracing(&log, mode, cli.verbose)
}
