//! Producer
//!
//! rdkafka producer 客户端与基准测试 producer 句柄

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use omb_common::HandleId;
use omb_errors::{DriverError, DriverResult};
use omb_ports::{BenchmarkProducer, ProducerClient};
use parking_lot::RwLock;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, error, info, warn};

/// 关闭时刷新待发送消息的最长等待
pub const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// 基于 rdkafka FutureProducer 的客户端
pub struct RdKafkaProducer {
    producer: RwLock<Option<FutureProducer>>,
    enqueue_timeout: Duration,
}

impl RdKafkaProducer {
    pub fn new(producer: FutureProducer, enqueue_timeout: Duration) -> Self {
        Self {
            producer: RwLock::new(Some(producer)),
            enqueue_timeout,
        }
    }

    fn current(&self) -> DriverResult<FutureProducer> {
        self.producer.read().clone().ok_or(DriverError::Closed)
    }
}

#[async_trait]
impl ProducerClient for RdKafkaProducer {
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> DriverResult<()> {
        let producer = self.current()?;

        let mut record: FutureRecord<'_, str, [u8]> = FutureRecord::to(topic).payload(payload);
        if let Some(key) = key {
            record = record.key(key);
        }

        producer
            .send(record, Timeout::After(self.enqueue_timeout))
            .await
            .map_err(|(e, _)| DriverError::publish(format!("Failed to publish message: {}", e)))?;

        Ok(())
    }

    fn flush(&self, timeout: Duration) -> DriverResult<()> {
        let producer = self.current()?;
        producer
            .flush(Timeout::After(timeout))
            .map_err(|e| DriverError::publish(format!("Failed to flush producer: {}", e)))
    }

    fn close(&self) {
        // 丢弃最后一个引用即释放 librdkafka 句柄
        self.producer.write().take();
    }
}

/// 基准测试 producer 句柄
///
/// 独占一个 producer 客户端并绑定到单个 topic。
pub struct RedpandaBenchmarkProducer<P: ProducerClient> {
    id: HandleId,
    topic: String,
    client: Arc<P>,
    closed: AtomicBool,
}

impl<P: ProducerClient> RedpandaBenchmarkProducer<P> {
    pub fn new(client: P, topic: impl Into<String>) -> Self {
        Self {
            id: HandleId::new(),
            topic: topic.into(),
            client: Arc::new(client),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn client(&self) -> &P {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 发送一条消息到绑定的 topic
    pub async fn send(&self, key: Option<&str>, payload: &[u8]) -> DriverResult<()> {
        if self.is_closed() {
            return Err(DriverError::Closed);
        }

        self.client.send(&self.topic, key, payload).await?;
        debug!(handle = %self.id, topic = %self.topic, bytes = payload.len(), "Message published");
        Ok(())
    }

    /// 刷新并释放客户端，重复调用无副作用
    ///
    /// flush 与释放都会阻塞于 librdkafka，放到 blocking 线程池执行。
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let client = self.client.clone();
        let id = self.id;
        let topic = self.topic.clone();
        let released = tokio::task::spawn_blocking(move || {
            if let Err(e) = client.flush(PRODUCER_FLUSH_TIMEOUT) {
                warn!(handle = %id, topic = %topic, error = %e, "Producer flush failed on close");
            }
            client.close();
        })
        .await;

        match released {
            Ok(()) => info!(handle = %self.id, topic = %self.topic, "Producer closed"),
            Err(e) => {
                // 任务异常退出时仍保证释放
                self.client.close();
                error!(handle = %self.id, topic = %self.topic, error = %e, "Producer close task failed");
            }
        }
    }
}

#[async_trait]
impl<P: ProducerClient> BenchmarkProducer for RedpandaBenchmarkProducer<P> {
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> DriverResult<()> {
        RedpandaBenchmarkProducer::send(self, key, payload).await
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
