//! rdkafka 客户端工厂

use std::sync::Arc;
use std::time::Duration;

use omb_common::ClientProperties;
use omb_errors::{DriverError, DriverResult};
use omb_ports::ClientFactory;
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::FutureProducer;
use tracing::debug;

use crate::admin::RdKafkaAdmin;
use crate::consumer::RdKafkaConsumer;
use crate::producer::RdKafkaProducer;

/// 转换为 rdkafka ClientConfig
pub fn client_config(properties: &ClientProperties) -> ClientConfig {
    let mut client_config = ClientConfig::new();

    for (key, value) in properties.iter() {
        client_config.set(key, value);
    }

    client_config
}

/// 基于 librdkafka 的客户端工厂
#[derive(Debug, Clone)]
pub struct RdKafkaClientFactory {
    /// 本地发送队列满时的最长等待
    pub enqueue_timeout: Duration,
    /// Admin 操作超时
    pub admin_timeout: Duration,
}

impl Default for RdKafkaClientFactory {
    fn default() -> Self {
        Self {
            enqueue_timeout: Duration::from_secs(30),
            admin_timeout: Duration::from_secs(30),
        }
    }
}

impl RdKafkaClientFactory {
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    pub fn with_admin_timeout(mut self, timeout: Duration) -> Self {
        self.admin_timeout = timeout;
        self
    }
}

impl ClientFactory for RdKafkaClientFactory {
    type Producer = RdKafkaProducer;
    type Consumer = RdKafkaConsumer;
    type Admin = RdKafkaAdmin;

    fn create_producer(&self, properties: &ClientProperties) -> DriverResult<RdKafkaProducer> {
        let producer: FutureProducer = client_config(properties).create().map_err(|e| {
            DriverError::construction(format!("Failed to create Kafka producer: {}", e))
        })?;

        debug!(properties = ?properties, "rdkafka producer created");
        Ok(RdKafkaProducer::new(producer, self.enqueue_timeout))
    }

    fn create_consumer(&self, properties: &ClientProperties) -> DriverResult<RdKafkaConsumer> {
        let consumer: StreamConsumer = client_config(properties).create().map_err(|e| {
            DriverError::construction(format!("Failed to create Kafka consumer: {}", e))
        })?;

        debug!(properties = ?properties, "rdkafka consumer created");
        Ok(RdKafkaConsumer::new(consumer))
    }

    fn create_admin(&self, properties: &ClientProperties) -> DriverResult<RdKafkaAdmin> {
        let admin: AdminClient<DefaultClientContext> =
            client_config(properties).create().map_err(|e| {
                DriverError::construction(format!("Failed to create admin client: {}", e))
            })?;

        Ok(RdKafkaAdmin::new(Arc::new(admin), self.admin_timeout))
    }
}
