use crate::cli::{load_config, StatusArgs};
use crate::health::{HealthState, HealthStatus};
use crate::service::CacheService;
use anyhow::{bail, Result};

pub async fn execute(args: &StatusArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let service = CacheService::connect(config).await?;
    let status = service.check_health().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }

    if status.status == HealthState::Unhealthy {
        bail!("cache backend is unhealthy");
    }
    Ok(())
}

fn print_status(status: &HealthStatus) {
    let label = match status.status {
        HealthState::Healthy => "✅ HEALTHY",
        HealthState::Degraded => "⚠️ DEGRADED",
        HealthState::Unhealthy => "❌ UNHEALTHY",
    };

    println!("=== Cache Backend Status ===\n");
    println!("Status:     {}", label);
    println!("Checked at: {}", status.checked_at.to_rfc3339());
    for (name, value) in &status.details {
        // INFO 原文较长，只显示解析后的字段
        if name == "redis_memory_info" {
            continue;
        }
        println!("  {:<24} {}", name, value);
    }
}
