//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了管理员操作命令的实现。

use crate::cli::load_config;
use crate::context::{invalidation_pattern, CulturalCacheContext};
use crate::service::CacheService;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

pub async fn execute(args: &AdminArgs) -> Result<()> {
    match &args.command {
        AdminSubcommand::Invalidate(invalidate_args) => execute_invalidate(invalidate_args).await,
        AdminSubcommand::Purge(purge_args) => execute_purge(purge_args).await,
    }
}

async fn execute_invalidate(args: &InvalidateArgs) -> Result<()> {
    let mut ctx = CulturalCacheContext::new(&args.community, &args.region);
    if let Some(language) = &args.language {
        ctx = ctx.with_language(language);
    }
    if let Some(data_type) = &args.data_type {
        ctx = ctx.with_data_type(data_type);
    }

    // 在连接之前校验上下文
    let pattern = invalidation_pattern(&ctx)?;
    println!("Invalidating entries matching: {}", pattern);

    let service = CacheService::connect(load_config(args.config.as_deref())?).await?;
    let report = service.invalidate_by_context(&ctx).await?;

    println!(
        "\n✅ Removed {} entries matching {}",
        report.removed, report.pattern
    );
    Ok(())
}

async fn execute_purge(args: &PurgeArgs) -> Result<()> {
    if !args.yes {
        print!(
            "Remove every entry matching '{}'? [y/N]: ",
            args.pattern
        );
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim().to_lowercase() != "y" {
            println!("Operation cancelled.");
            return Ok(());
        }
    }

    let service = CacheService::connect(load_config(args.config.as_deref())?).await?;
    let removed = service.remove_pattern(&args.pattern).await?;

    println!("\n✅ Removed {} entries matching {}", removed, args.pattern);
    Ok(())
}

#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Community identifier")]
    pub community: String,

    #[arg(long, default_value = "", help = "Geographic region (wildcard when empty)")]
    pub region: String,

    #[arg(long, help = "Language code")]
    pub language: Option<String>,

    #[arg(long, help = "Data type prefix, e.g. cal or cultural_score")]
    pub data_type: Option<String>,
}

#[derive(Parser, Debug)]
pub struct PurgeArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Redis glob pattern")]
    pub pattern: String,

    #[arg(short, long, help = "Skip confirmation")]
    pub yes: bool,
}

#[derive(Subcommand, Debug)]
pub enum AdminSubcommand {
    #[command(name = "invalidate", about = "Invalidate entries for a cultural context")]
    Invalidate(InvalidateArgs),

    #[command(name = "purge", about = "Remove entries matching a pattern")]
    Purge(PurgeArgs),
}

#[derive(Parser, Debug)]
pub struct AdminArgs {
    #[command(subcommand)]
    pub command: AdminSubcommand,
}
