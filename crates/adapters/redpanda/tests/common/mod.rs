//! 测试用的内存客户端工厂

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use omb_common::ClientProperties;
use omb_config::DriverConfig;
use omb_errors::{DriverError, DriverResult};
use omb_ports::{
    AdminClient, ClientFactory, ConsumerClient, NewTopicSpec, ProducerClient, ReceivedMessage,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

pub fn test_config(reset: bool) -> DriverConfig {
    DriverConfig::from_toml_str(&format!(
        r#"
replication_factor = 1
reset = {}

[common_config]
"bootstrap.servers" = "localhost:9092"

[producer_config]
"acks" = "all"

[topic_config]
"retention.ms" = "600000"
"#,
        reset
    ))
    .unwrap()
}

pub fn message(topic: &str, offset: i64, payload: &[u8]) -> ReceivedMessage {
    ReceivedMessage {
        topic: topic.to_string(),
        partition: 0,
        offset,
        payload: payload.to_vec(),
        timestamp: Some(1_700_000_000_000 + offset),
    }
}

/// 工厂共享状态，测试通过它注入失败并观察调用
#[derive(Default)]
pub struct FakeState {
    pub fail_producer: AtomicBool,
    pub fail_consumer: AtomicBool,
    pub fail_subscribe: AtomicBool,
    /// 下一个客户端构造成功后执行一次
    pub on_client_created: Mutex<Option<Box<dyn FnOnce() + Send>>>,

    pub producer_props: Mutex<Vec<ClientProperties>>,
    pub producer_closes: Mutex<Vec<Arc<AtomicUsize>>>,
    pub sent: Mutex<Vec<(String, Vec<u8>)>>,

    pub consumer_props: Mutex<Vec<ClientProperties>>,
    pub consumer_closes: Mutex<Vec<Arc<AtomicUsize>>>,
    pub subscriptions: Mutex<Vec<Vec<String>>>,
    pub feeds: Mutex<Vec<mpsc::UnboundedSender<DriverResult<ReceivedMessage>>>>,
    pub commits: Mutex<Vec<i64>>,

    pub existing_topics: Mutex<Vec<String>>,
    pub created_topics: Mutex<Vec<NewTopicSpec>>,
    pub deleted_topics: Mutex<Vec<String>>,
}

impl FakeState {
    pub fn total_producer_closes(&self) -> usize {
        self.producer_closes
            .lock()
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    pub fn consumer_close_counts(&self) -> Vec<usize> {
        self.consumer_closes
            .lock()
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .collect()
    }

    fn client_created(&self) {
        let hook = self.on_client_created.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// 向第 `index` 个 consumer 投递一条消息
    pub fn feed(&self, index: usize, message: DriverResult<ReceivedMessage>) {
        self.feeds.lock()[index].send(message).unwrap();
    }
}

#[derive(Clone, Default)]
pub struct FakeFactory {
    pub state: Arc<FakeState>,
}

impl ClientFactory for FakeFactory {
    type Producer = FakeProducer;
    type Consumer = FakeConsumer;
    type Admin = FakeAdmin;

    fn create_producer(&self, properties: &ClientProperties) -> DriverResult<FakeProducer> {
        if self.state.fail_producer.load(Ordering::SeqCst) {
            return Err(DriverError::construction("Broker transport failure"));
        }

        let closes = Arc::new(AtomicUsize::new(0));
        self.state.producer_props.lock().push(properties.clone());
        self.state.producer_closes.lock().push(closes.clone());
        self.state.client_created();

        Ok(FakeProducer {
            state: self.state.clone(),
            closes,
        })
    }

    fn create_consumer(&self, properties: &ClientProperties) -> DriverResult<FakeConsumer> {
        if self.state.fail_consumer.load(Ordering::SeqCst) {
            return Err(DriverError::construction("Authentication failure"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        self.state.consumer_props.lock().push(properties.clone());
        self.state.consumer_closes.lock().push(closes.clone());
        self.state.feeds.lock().push(tx);
        self.state.client_created();

        Ok(FakeConsumer {
            state: self.state.clone(),
            rx: tokio::sync::Mutex::new(rx),
            closes,
        })
    }

    fn create_admin(&self, _properties: &ClientProperties) -> DriverResult<FakeAdmin> {
        Ok(FakeAdmin {
            state: self.state.clone(),
        })
    }
}

pub struct FakeProducer {
    state: Arc<FakeState>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ProducerClient for FakeProducer {
    async fn send(&self, topic: &str, _key: Option<&str>, payload: &[u8]) -> DriverResult<()> {
        self.state
            .sent
            .lock()
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeConsumer {
    state: Arc<FakeState>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<DriverResult<ReceivedMessage>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl ConsumerClient for FakeConsumer {
    fn subscribe(&self, topics: &[&str]) -> DriverResult<()> {
        if self.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(DriverError::subscription("Unknown topic or partition"));
        }
        self.state
            .subscriptions
            .lock()
            .push(topics.iter().map(|t| t.to_string()).collect());
        Ok(())
    }

    async fn recv(&self) -> DriverResult<ReceivedMessage> {
        match self.rx.lock().await.recv().await {
            Some(message) => message,
            None => Err(DriverError::Closed),
        }
    }

    fn commit(&self, message: &ReceivedMessage) -> DriverResult<()> {
        self.state.commits.lock().push(message.offset);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeAdmin {
    state: Arc<FakeState>,
}

#[async_trait]
impl AdminClient for FakeAdmin {
    async fn create_topics(&self, topics: &[NewTopicSpec]) -> DriverResult<()> {
        let mut existing = self.state.existing_topics.lock();
        for spec in topics {
            existing.push(spec.name.clone());
        }
        self.state.created_topics.lock().extend_from_slice(topics);
        Ok(())
    }

    async fn list_topics(&self) -> DriverResult<Vec<String>> {
        Ok(self.state.existing_topics.lock().clone())
    }

    async fn delete_topics(&self, topics: &[String]) -> DriverResult<()> {
        self.state
            .existing_topics
            .lock()
            .retain(|t| !topics.contains(t));
        self.state.deleted_topics.lock().extend_from_slice(topics);
        Ok(())
    }
}
