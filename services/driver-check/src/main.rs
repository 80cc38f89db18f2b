//! driver-check - 对真实集群做一次驱动冒烟检查
//!
//! 创建 topic、producer、consumer，发送固定数量的消息并等待全部投递，最后关闭驱动。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use omb_adapter_redpanda::{RdKafkaClientFactory, RedpandaBenchmarkDriver};
use omb_common::HandleId;
use omb_config::DriverConfig;
use omb_ports::ConsumerCallback;
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "driver-check")]
#[command(about = "Create a topic, produce and consume through the Redpanda benchmark driver")]
struct Args {
    /// Driver config file (TOML or YAML)
    #[arg(short, long, env = "REDPANDA_DRIVER_CONFIG", default_value = "config/redpanda.toml")]
    config: PathBuf,

    /// Number of messages to send
    #[arg(short, long, default_value_t = 100)]
    messages: u64,

    /// Payload size in bytes
    #[arg(long, default_value_t = 1024)]
    message_size: usize,

    /// Partitions of the created topic
    #[arg(short, long, default_value_t = 1)]
    partitions: i32,

    /// Seconds to wait for all messages to arrive
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Seconds a send may wait for room in the local producer queue
    #[arg(long, default_value_t = 30)]
    enqueue_timeout_secs: u64,

    /// Timeout in seconds for topic admin operations
    #[arg(long, default_value_t = 30)]
    admin_timeout_secs: u64,

    /// Install the Prometheus recorder and print driver metrics on exit
    #[arg(long)]
    metrics: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

/// 统计收到的消息数，达到目标后唤醒等待方
struct CountingCallback {
    received: AtomicU64,
    expected: u64,
    done: Notify,
}

impl ConsumerCallback for CountingCallback {
    fn message_received(&self, _payload: &[u8], _publish_timestamp: i64) {
        if self.received.fetch_add(1, Ordering::AcqRel) + 1 == self.expected {
            self.done.notify_one();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.json {
        omb_telemetry::init_tracing_json(&args.log_level);
    } else {
        omb_telemetry::init_tracing(&args.log_level);
    }

    let metrics = if args.metrics {
        Some(omb_telemetry::init_metrics().context("installing metrics recorder")?)
    } else {
        None
    };

    let config = DriverConfig::load(&args.config)
        .with_context(|| format!("loading driver config from {}", args.config.display()))?;
    let driver = RedpandaBenchmarkDriver::initialize(config, client_factory(&args))
        .await
        .context("initializing driver")?;

    let run_id = HandleId::new();
    let topic = format!("{}-{}", driver.topic_name_prefix(), run_id);
    driver
        .create_topic(&topic, args.partitions)
        .await
        .with_context(|| format!("creating topic {}", topic))?;

    let callback = Arc::new(CountingCallback {
        received: AtomicU64::new(0),
        expected: args.messages,
        done: Notify::new(),
    });

    let result = run(&driver, &topic, &args, callback.clone()).await;
    driver.close().await.context("closing driver")?;

    if let Some(handle) = metrics {
        println!("{}", handle.render());
    }
    result?;

    info!(
        topic = %topic,
        received = callback.received.load(Ordering::Acquire),
        "Driver check passed"
    );
    Ok(())
}

fn client_factory(args: &Args) -> RdKafkaClientFactory {
    RdKafkaClientFactory::default()
        .with_enqueue_timeout(Duration::from_secs(args.enqueue_timeout_secs))
        .with_admin_timeout(Duration::from_secs(args.admin_timeout_secs))
}

async fn run(
    driver: &RedpandaBenchmarkDriver,
    topic: &str,
    args: &Args,
    callback: Arc<CountingCallback>,
) -> Result<()> {
    let subscription = format!("sub-{}", HandleId::new());
    driver
        .create_consumer(topic, &subscription, callback.clone())
        .context("creating consumer")?;
    let producer = driver.create_producer(topic).context("creating producer")?;

    let payload = vec![0xA5u8; args.message_size];
    for i in 0..args.messages {
        let key = i.to_string();
        producer
            .send(Some(key.as_str()), &payload)
            .await
            .with_context(|| format!("sending message {}", i))?;
    }
    info!(topic = %topic, sent = args.messages, "All messages sent");

    if args.messages == 0 {
        return Ok(());
    }

    let wait = tokio::time::timeout(
        Duration::from_secs(args.timeout_secs),
        callback.done.notified(),
    );
    if wait.await.is_err() {
        let received = callback.received.load(Ordering::Acquire);
        warn!(topic = %topic, received, expected = args.messages, "Timed out waiting for messages");
        bail!(
            "received {} of {} messages within {}s",
            received,
            args.messages,
            args.timeout_secs
        );
    }

    Ok(())
}
