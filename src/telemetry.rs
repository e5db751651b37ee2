//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的日志与链路追踪初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// 日志级别的默认过滤规则，可由 `RUST_LOG` 覆盖
const DEFAULT_FILTER: &str = "info";

/// 初始化 tracing 与 OpenTelemetry
///
/// 应该在应用程序启动时调用一次；重复调用不会覆盖已经设置的全局 subscriber。
///
/// # 参数
///
/// * `service_name` - 服务名称，作为 tracer 名称
/// * `json` - 是否以JSON格式输出日志
///
/// # 返回值
///
/// 成功设置全局 subscriber 时返回 `true`
pub fn init_tracing(service_name: &str, json: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // 未配置导出器时 provider 不会发送任何数据
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    let fmt_layer = if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(telemetry);

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
