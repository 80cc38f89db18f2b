//! 压测框架使用的驱动接口

use std::sync::Arc;

use async_trait::async_trait;
use omb_common::{ClientProperties, TopicInfo};
use omb_errors::DriverResult;

use crate::ConsumerCallback;

/// 绑定到单个 topic 的 producer 句柄
#[async_trait]
pub trait BenchmarkProducer: Send + Sync {
    async fn send(&self, key: Option<&str>, payload: &[u8]) -> DriverResult<()>;

    fn topic(&self) -> &str;
}

/// 绑定到单个 topic / 订阅的 consumer 句柄
pub trait BenchmarkConsumer: Send + Sync {
    fn topic(&self) -> &str;

    fn subscription_name(&self) -> &str;
}

/// 基准测试驱动
///
/// 创建出的句柄由驱动跟踪，`close` 时统一释放。
#[async_trait]
pub trait BenchmarkDriver: Send + Sync {
    fn topic_name_prefix(&self) -> &str;

    fn topic_properties(&self) -> &ClientProperties;

    async fn create_topic(&self, topic: &str, partitions: i32) -> DriverResult<()>;

    async fn create_topics(&self, topics: &[TopicInfo]) -> DriverResult<()>;

    fn create_producer(&self, topic: &str) -> DriverResult<Arc<dyn BenchmarkProducer>>;

    fn create_consumer(
        &self,
        topic: &str,
        subscription_name: &str,
        callback: Arc<dyn ConsumerCallback>,
    ) -> DriverResult<Arc<dyn BenchmarkConsumer>>;

    async fn close(&self) -> DriverResult<()>;
}
