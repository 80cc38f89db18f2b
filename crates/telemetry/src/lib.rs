//! telemetry - 驱动可观测性库
//!
//! tracing 初始化与句柄生命周期 metrics

use metrics::{counter, gauge};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 句柄种类标签
pub const KIND_PRODUCER: &str = "producer";
pub const KIND_CONSUMER: &str = "consumer";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// 初始化 tracing
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// 初始化 JSON 格式的 tracing（多节点运行时便于采集）
pub fn init_tracing_json(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// 初始化 Prometheus metrics
pub fn init_metrics() -> Result<metrics_exporter_prometheus::PrometheusHandle, TelemetryError> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// 句柄创建成功并已纳入跟踪
pub fn record_handle_created(kind: &'static str) {
    counter!("omb_driver_handles_created_total", "kind" => kind).increment(1);
    gauge!("omb_driver_handles_tracked", "kind" => kind).increment(1.0);
}

/// 句柄创建失败（客户端已释放）
pub fn record_handle_failed(kind: &'static str, error_kind: &'static str) {
    counter!(
        "omb_driver_handles_failed_total",
        "kind" => kind,
        "error" => error_kind
    )
    .increment(1);
}

/// 关闭阶段释放句柄
pub fn record_handles_released(kind: &'static str, count: usize) {
    counter!("omb_driver_handles_released_total", "kind" => kind).increment(count as u64);
    gauge!("omb_driver_handles_tracked", "kind" => kind).decrement(count as f64);
}
