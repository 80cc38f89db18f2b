//! Consumer
//!
//! rdkafka consumer 客户端与基准测试 consumer 句柄。
//! 句柄创建后在后台任务中拉取消息并交给投递回调。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use omb_common::{ClientProperties, HandleId};
use omb_errors::{DriverError, DriverResult};
use omb_ports::{BenchmarkConsumer, ConsumerCallback, ConsumerClient, NO_TIMESTAMP, ReceivedMessage};
use parking_lot::{Mutex, RwLock};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 拉取出错后的等待间隔
pub const POLL_ERROR_BACKOFF: Duration = Duration::from_millis(100);
/// 关闭时等待后台任务退出的最长时间
pub const CONSUMER_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于 rdkafka StreamConsumer 的客户端
pub struct RdKafkaConsumer {
    consumer: RwLock<Option<Arc<StreamConsumer>>>,
}

impl RdKafkaConsumer {
    pub fn new(consumer: StreamConsumer) -> Self {
        Self {
            consumer: RwLock::new(Some(Arc::new(consumer))),
        }
    }

    fn current(&self) -> DriverResult<Arc<StreamConsumer>> {
        self.consumer.read().clone().ok_or(DriverError::Closed)
    }
}

#[async_trait]
impl ConsumerClient for RdKafkaConsumer {
    fn subscribe(&self, topics: &[&str]) -> DriverResult<()> {
        self.current()?
            .subscribe(topics)
            .map_err(|e| DriverError::subscription(format!("Failed to subscribe to topics: {}", e)))
    }

    async fn recv(&self) -> DriverResult<ReceivedMessage> {
        let consumer = self.current()?;
        let message = consumer
            .recv()
            .await
            .map_err(|e| DriverError::receive(format!("Kafka error: {}", e)))?;

        Ok(ReceivedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            timestamp: message.timestamp().to_millis(),
        })
    }

    fn commit(&self, message: &ReceivedMessage) -> DriverResult<()> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(|e| DriverError::receive(format!("Invalid commit offset: {}", e)))?;

        self.current()?
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| DriverError::receive(format!("Failed to commit offset: {}", e)))
    }

    fn close(&self) {
        if let Some(consumer) = self.consumer.write().take() {
            consumer.unsubscribe();
        }
    }
}

/// 基准测试 consumer 句柄
///
/// 持有 consumer 客户端、生效配置和投递回调；关闭时先停止后台任务再释放客户端。
pub struct RedpandaBenchmarkConsumer<C: ConsumerClient> {
    id: HandleId,
    topic: String,
    subscription_name: String,
    properties: ClientProperties,
    client: Arc<C>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<C: ConsumerClient> RedpandaBenchmarkConsumer<C> {
    /// 启动后台投递任务
    ///
    /// 需要当前线程处于 Tokio runtime 中，否则返回 `Construction` 错误，客户端由调用方释放。
    pub fn start(
        client: Arc<C>,
        topic: impl Into<String>,
        subscription_name: impl Into<String>,
        properties: ClientProperties,
        callback: Arc<dyn ConsumerCallback>,
    ) -> DriverResult<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            DriverError::construction(format!("No async runtime to start consumer: {}", e))
        })?;

        let id = HandleId::new();
        let topic = topic.into();
        let shutdown = CancellationToken::new();
        let auto_commit = properties.auto_commit_enabled();

        let task = runtime.spawn(poll_loop(
            id,
            client.clone(),
            callback,
            auto_commit,
            shutdown.clone(),
        ));

        debug!(handle = %id, topic = %topic, auto_commit, "Consumer delivery task started");

        Ok(Self {
            id,
            topic,
            subscription_name: subscription_name.into(),
            properties,
            client,
            shutdown,
            task: Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn subscription_name(&self) -> &str {
        &self.subscription_name
    }

    /// 生效的客户端配置（含 group.id）
    pub fn properties(&self) -> &ClientProperties {
        &self.properties
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 停止投递并释放客户端，重复调用无副作用
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown.cancel();

        let task = self.task.lock().take();
        if let Some(mut task) = task {
            match tokio::time::timeout(CONSUMER_CLOSE_TIMEOUT, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    error!(handle = %self.id, topic = %self.topic, "Consumer delivery task panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!(handle = %self.id, topic = %self.topic, "Consumer delivery task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        self.client.close();

        info!(
            handle = %self.id,
            topic = %self.topic,
            subscription = %self.subscription_name,
            "Consumer closed"
        );
    }
}

impl<C: ConsumerClient> BenchmarkConsumer for RedpandaBenchmarkConsumer<C> {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscription_name(&self) -> &str {
        &self.subscription_name
    }
}

impl<C: ConsumerClient> Drop for RedpandaBenchmarkConsumer<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn poll_loop<C: ConsumerClient>(
    id: HandleId,
    client: Arc<C>,
    callback: Arc<dyn ConsumerCallback>,
    auto_commit: bool,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = client.recv() => match result {
                Ok(message) => {
                    callback.message_received(
                        &message.payload,
                        message.timestamp.unwrap_or(NO_TIMESTAMP),
                    );

                    if !auto_commit {
                        if let Err(e) = client.commit(&message) {
                            warn!(
                                handle = %id,
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                error = %e,
                                "Failed to commit offset"
                            );
                        }
                    }
                }
                Err(DriverError::Closed) => break,
                Err(e) => {
                    warn!(handle = %id, error = %e, "Failed to receive message");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
    }

    debug!(handle = %id, "Consumer delivery task stopped");
}
