//! Redpanda 基准测试驱动
//!
//! 按需创建 producer / consumer 句柄并跟踪，`close` 时统一释放。
//!
//! 句柄只有在完整构造（含订阅、启动投递任务）成功后才会加入跟踪列表；
//! 任何一步失败都会先释放底层客户端再返回原始错误。

use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use omb_common::{
    ClientProperties, ConsumerInfo, GROUP_ID, ProducerInfo, TopicInfo, is_valid_identifier,
};
use omb_config::DriverConfig;
use omb_errors::{DriverError, DriverResult};
use omb_ports::{
    AdminClient, BenchmarkConsumer, BenchmarkDriver, BenchmarkProducer, ClientFactory,
    ConsumerCallback, ConsumerClient, NewTopicSpec, ProducerClient,
};
use omb_telemetry::{
    KIND_CONSUMER, KIND_PRODUCER, record_handle_created, record_handle_failed,
    record_handles_released,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::consumer::RedpandaBenchmarkConsumer;
use crate::factory::RdKafkaClientFactory;
use crate::producer::RedpandaBenchmarkProducer;

/// 基准测试 topic 名称前缀
pub const TOPIC_NAME_PREFIX: &str = "test-topic";

pub type ProducerHandle<F> = Arc<RedpandaBenchmarkProducer<<F as ClientFactory>::Producer>>;
pub type ConsumerHandle<F> = Arc<RedpandaBenchmarkConsumer<<F as ClientFactory>::Consumer>>;

/// Redpanda 基准测试驱动
pub struct RedpandaBenchmarkDriver<F: ClientFactory = RdKafkaClientFactory> {
    config: DriverConfig,
    factory: F,
    admin: F::Admin,
    producer_properties: ClientProperties,
    consumer_properties: ClientProperties,
    topic_properties: ClientProperties,
    producers: Mutex<Vec<ProducerHandle<F>>>,
    consumers: Mutex<Vec<ConsumerHandle<F>>>,
    closed: AtomicBool,
}

impl<F: ClientFactory> RedpandaBenchmarkDriver<F> {
    /// 初始化驱动
    ///
    /// 构造各类配置、创建 Admin 客户端；`reset` 开启时删除已有的基准测试 topic。
    pub async fn initialize(config: DriverConfig, factory: F) -> DriverResult<Self> {
        config
            .validate()
            .map_err(|e| DriverError::config(e.to_string()))?;

        let admin = factory.create_admin(&config.admin_properties())?;

        let driver = Self {
            producer_properties: config.producer_properties(),
            consumer_properties: config.consumer_properties(),
            topic_properties: config.topic_properties(),
            config,
            factory,
            admin,
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        };

        if driver.config.reset {
            driver.delete_benchmark_topics().await?;
        }

        info!(
            driver = %driver.config.name,
            replication_factor = driver.config.replication_factor,
            reset = driver.config.reset,
            "Benchmark driver initialized"
        );

        Ok(driver)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn admin(&self) -> &F::Admin {
        &self.admin
    }

    pub fn topic_name_prefix(&self) -> &str {
        TOPIC_NAME_PREFIX
    }

    /// 创建 topic 时附带的配置
    pub fn topic_properties(&self) -> &ClientProperties {
        &self.topic_properties
    }

    pub fn producer_properties(&self) -> &ClientProperties {
        &self.producer_properties
    }

    pub fn consumer_properties(&self) -> &ClientProperties {
        &self.consumer_properties
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn tracked_producers(&self) -> usize {
        self.producers.lock().len()
    }

    pub fn tracked_consumers(&self) -> usize {
        self.consumers.lock().len()
    }

    /// 删除所有以前缀开头的 topic
    pub async fn delete_benchmark_topics(&self) -> DriverResult<usize> {
        let topics: Vec<String> = self
            .admin
            .list_topics()
            .await?
            .into_iter()
            .filter(|t| t.starts_with(TOPIC_NAME_PREFIX))
            .collect();

        if topics.is_empty() {
            debug!("No benchmark topics to delete");
            return Ok(0);
        }

        self.admin.delete_topics(&topics).await?;
        info!(count = topics.len(), "Deleted existing benchmark topics");
        Ok(topics.len())
    }

    fn topic_spec(&self, topic: &str, partitions: i32) -> DriverResult<NewTopicSpec> {
        if !is_valid_identifier(topic) {
            return Err(DriverError::invalid_argument(format!(
                "invalid topic name: {:?}",
                topic
            )));
        }
        if partitions <= 0 {
            return Err(DriverError::invalid_argument(format!(
                "partitions must be > 0, got {}",
                partitions
            )));
        }

        Ok(NewTopicSpec {
            name: topic.to_string(),
            partitions,
            replication_factor: self.config.replication_factor,
            config: self.topic_properties.clone(),
        })
    }

    pub async fn create_topic(&self, topic: &str, partitions: i32) -> DriverResult<()> {
        let spec = self.topic_spec(topic, partitions)?;
        self.admin.create_topics(&[spec]).await
    }

    /// 批量创建 topic，任一失败即返回错误
    pub async fn create_topics(&self, topics: &[TopicInfo]) -> DriverResult<()> {
        let specs = topics
            .iter()
            .map(|t| self.topic_spec(&t.topic, t.partitions))
            .collect::<DriverResult<Vec<_>>>()?;

        if specs.is_empty() {
            return Ok(());
        }

        self.admin.create_topics(&specs).await
    }

    fn ensure_open(&self) -> DriverResult<()> {
        if self.is_closed() {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }

    fn validate_identifier(kind: &str, value: &str) -> DriverResult<()> {
        if is_valid_identifier(value) {
            Ok(())
        } else {
            Err(DriverError::invalid_argument(format!(
                "invalid {}: {:?}",
                kind, value
            )))
        }
    }

    /// 创建绑定到 `topic` 的 producer 并加入跟踪列表
    pub fn create_producer(&self, topic: &str) -> DriverResult<ProducerHandle<F>> {
        self.ensure_open()?;
        Self::validate_identifier("topic", topic)?;

        let client = self
            .factory
            .create_producer(&self.producer_properties)
            .inspect_err(|e| {
                error!(topic = %topic, error = %e, "Failed to create producer");
                record_handle_failed(KIND_PRODUCER, e.kind());
            })?;

        let handle = Arc::new(RedpandaBenchmarkProducer::new(client, topic));

        {
            let mut producers = self.producers.lock();
            if self.is_closed() {
                drop(producers);
                handle.client().close();
                record_handle_failed(KIND_PRODUCER, DriverError::Closed.kind());
                return Err(DriverError::Closed);
            }
            producers.push(handle.clone());
        }

        record_handle_created(KIND_PRODUCER);
        info!(handle = %handle.id(), topic = %topic, "Producer created");
        Ok(handle)
    }

    /// 创建订阅 `topic` 的 consumer 并加入跟踪列表
    ///
    /// `subscription_name` 原样作为 `group.id`。
    pub fn create_consumer(
        &self,
        topic: &str,
        subscription_name: &str,
        callback: Arc<dyn ConsumerCallback>,
    ) -> DriverResult<ConsumerHandle<F>> {
        self.ensure_open()?;
        Self::validate_identifier("topic", topic)?;
        Self::validate_identifier("subscription name", subscription_name)?;

        let properties = self
            .consumer_properties
            .clone()
            .with(GROUP_ID, subscription_name);

        let client = self
            .factory
            .create_consumer(&properties)
            .inspect_err(|e| {
                error!(topic = %topic, subscription = %subscription_name, error = %e, "Failed to create consumer");
                record_handle_failed(KIND_CONSUMER, e.kind());
            })?;
        let client = Arc::new(client);

        let handle = client
            .subscribe(&[topic])
            .and_then(|()| {
                RedpandaBenchmarkConsumer::start(
                    client.clone(),
                    topic,
                    subscription_name,
                    properties,
                    callback,
                )
            })
            .map(Arc::new)
            .inspect_err(|e| {
                client.close();
                error!(topic = %topic, subscription = %subscription_name, error = %e, "Failed to start consumer, client released");
                record_handle_failed(KIND_CONSUMER, e.kind());
            })?;

        {
            let mut consumers = self.consumers.lock();
            if self.is_closed() {
                drop(consumers);
                // 后台任务由 Drop 取消
                client.close();
                record_handle_failed(KIND_CONSUMER, DriverError::Closed.kind());
                return Err(DriverError::Closed);
            }
            consumers.push(handle.clone());
        }

        record_handle_created(KIND_CONSUMER);
        info!(
            handle = %handle.id(),
            topic = %topic,
            subscription = %subscription_name,
            "Consumer created"
        );
        Ok(handle)
    }

    /// 批量创建 producer，遇到首个失败即返回（已创建的仍在跟踪中）
    pub fn create_producers(&self, producers: &[ProducerInfo]) -> DriverResult<Vec<ProducerHandle<F>>> {
        producers
            .iter()
            .map(|p| self.create_producer(&p.topic))
            .collect()
    }

    /// 批量创建 consumer，共享同一个投递回调
    pub fn create_consumers(
        &self,
        consumers: &[ConsumerInfo],
        callback: Arc<dyn ConsumerCallback>,
    ) -> DriverResult<Vec<ConsumerHandle<F>>> {
        consumers
            .iter()
            .map(|c| self.create_consumer(&c.topic, &c.subscription_name, callback.clone()))
            .collect()
    }

    /// 释放所有跟踪的句柄
    ///
    /// 之后的创建调用返回 `Closed`；重复调用时列表为空，无副作用。
    pub async fn close(&self) -> DriverResult<()> {
        let first_close = !self.closed.swap(true, Ordering::AcqRel);

        let producers = mem::take(&mut *self.producers.lock());
        let consumers = mem::take(&mut *self.consumers.lock());

        for producer in &producers {
            producer.close().await;
        }
        record_handles_released(KIND_PRODUCER, producers.len());

        for consumer in &consumers {
            consumer.close().await;
        }
        record_handles_released(KIND_CONSUMER, consumers.len());

        if first_close {
            info!(
                driver = %self.config.name,
                producers = producers.len(),
                consumers = consumers.len(),
                "Benchmark driver closed"
            );
        } else if !producers.is_empty() || !consumers.is_empty() {
            warn!(
                producers = producers.len(),
                consumers = consumers.len(),
                "Handles released by repeated close"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<F: ClientFactory> BenchmarkDriver for RedpandaBenchmarkDriver<F> {
    fn topic_name_prefix(&self) -> &str {
        TOPIC_NAME_PREFIX
    }

    fn topic_properties(&self) -> &ClientProperties {
        &self.topic_properties
    }

    async fn create_topic(&self, topic: &str, partitions: i32) -> DriverResult<()> {
        RedpandaBenchmarkDriver::<F>::create_topic(self, topic, partitions).await
    }

    async fn create_topics(&self, topics: &[TopicInfo]) -> DriverResult<()> {
        RedpandaBenchmarkDriver::<F>::create_topics(self, topics).await
    }

    fn create_producer(&self, topic: &str) -> DriverResult<Arc<dyn BenchmarkProducer>> {
        let handle: Arc<dyn BenchmarkProducer> =
            RedpandaBenchmarkDriver::<F>::create_producer(self, topic)?;
        Ok(handle)
    }

    fn create_consumer(
        &self,
        topic: &str,
        subscription_name: &str,
        callback: Arc<dyn ConsumerCallback>,
    ) -> DriverResult<Arc<dyn BenchmarkConsumer>> {
        let handle: Arc<dyn BenchmarkConsumer> =
            RedpandaBenchmarkDriver::<F>::create_consumer(self, topic, subscription_name, callback)?;
        Ok(handle)
    }

    async fn close(&self) -> DriverResult<()> {
        RedpandaBenchmarkDriver::<F>::close(self).await
    }
}
