//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "ctxcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "status", about = "Probe the cache backend health")]
    Status(StatusArgs),

    #[command(name = "admin", about = "Admin operations (invalidate, purge)")]
    Admin(AdminArgs),
}

#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Output in JSON format")]
    pub json: bool,
}

mod admin;
mod status;

pub use admin::{AdminArgs, AdminSubcommand, InvalidateArgs, PurgeArgs};

/// 加载配置
///
/// 未指定文件时使用默认配置，并应用环境变量覆盖
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config
                .validate()
                .map_err(anyhow::Error::msg)
                .context("Invalid default configuration")?;
            Ok(config)
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_tracing("ctxcache", cli.log_json);

    match &cli.command {
        Commands::Status(args) => status::execute(args).await,
        Commands::Admin(args) => admin::execute(args).await,
    }
}
