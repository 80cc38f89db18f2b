//! 外部消息客户端接口
//!
//! 驱动只通过这些 trait 构造和使用客户端，生产实现见 redpanda 适配器。

use std::time::Duration;

use async_trait::async_trait;
use omb_common::ClientProperties;
use omb_errors::DriverResult;

/// 消费到的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
    /// 时间戳（毫秒）
    pub timestamp: Option<i64>,
}

/// 待创建的 topic 定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub config: ClientProperties,
}

/// Producer 客户端
#[async_trait]
pub trait ProducerClient: Send + Sync + 'static {
    /// 发送一条消息，broker 确认后返回
    async fn send(&self, topic: &str, key: Option<&str>, payload: &[u8]) -> DriverResult<()>;

    /// 刷新待发送的消息，阻塞至完成或超时
    fn flush(&self, timeout: Duration) -> DriverResult<()>;

    /// 释放底层连接，需幂等
    fn close(&self);
}

/// Consumer 客户端
#[async_trait]
pub trait ConsumerClient: Send + Sync + 'static {
    fn subscribe(&self, topics: &[&str]) -> DriverResult<()>;

    /// 等待下一条消息
    async fn recv(&self) -> DriverResult<ReceivedMessage>;

    /// 异步提交该消息之后的偏移
    fn commit(&self, message: &ReceivedMessage) -> DriverResult<()>;

    /// 释放底层连接，需幂等
    fn close(&self);
}

/// Admin 客户端
#[async_trait]
pub trait AdminClient: Send + Sync + 'static {
    async fn create_topics(&self, topics: &[NewTopicSpec]) -> DriverResult<()>;

    async fn list_topics(&self) -> DriverResult<Vec<String>>;

    async fn delete_topics(&self, topics: &[String]) -> DriverResult<()>;
}

/// 客户端工厂
///
/// 构造调用是同步的（阻塞于底层库），失败时返回的错误保留原始原因。
pub trait ClientFactory: Send + Sync + 'static {
    type Producer: ProducerClient;
    type Consumer: ConsumerClient;
    type Admin: AdminClient;

    fn create_producer(&self, properties: &ClientProperties) -> DriverResult<Self::Producer>;

    fn create_consumer(&self, properties: &ClientProperties) -> DriverResult<Self::Consumer>;

    fn create_admin(&self, properties: &ClientProperties) -> DriverResult<Self::Admin>;
}
