//! 驱动句柄创建与跟踪测试

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{FakeFactory, test_config};
use omb_adapter_redpanda::{RedpandaBenchmarkDriver, TOPIC_NAME_PREFIX};
use omb_common::{ConsumerInfo, GROUP_ID, ProducerInfo, TopicInfo};
use omb_errors::DriverError;
use omb_ports::{BenchmarkConsumer, BenchmarkDriver, BenchmarkProducer, ConsumerCallback};

fn noop_callback() -> Arc<dyn ConsumerCallback> {
    Arc::new(|_payload: &[u8], _ts: i64| {})
}

async fn new_driver() -> (RedpandaBenchmarkDriver<FakeFactory>, FakeFactory) {
    let factory = FakeFactory::default();
    let driver = RedpandaBenchmarkDriver::initialize(test_config(false), factory.clone())
        .await
        .unwrap();
    (driver, factory)
}

#[tokio::test]
async fn test_create_producer_tracks_handle() {
    let (driver, factory) = new_driver().await;

    let producer = driver.create_producer("orders").unwrap();

    assert_eq!(producer.topic(), "orders");
    assert_eq!(driver.tracked_producers(), 1);

    let props = factory.state.producer_props.lock();
    assert_eq!(props[0].get("bootstrap.servers"), Some("localhost:9092"));
    assert_eq!(props[0].get("acks"), Some("all"));
}

#[tokio::test]
async fn test_producer_construction_failure_is_not_tracked() {
    let (driver, factory) = new_driver().await;
    factory.state.fail_producer.store(true, Ordering::SeqCst);

    let err = driver.create_producer("orders").err().unwrap();

    assert!(matches!(err, DriverError::Construction(_)));
    assert!(err.to_string().contains("Broker transport failure"));
    assert_eq!(driver.tracked_producers(), 0);
}

#[tokio::test]
async fn test_create_consumer_uses_subscription_as_group_id() {
    let (driver, factory) = new_driver().await;

    let consumer = driver
        .create_consumer("orders", "group-A", noop_callback())
        .unwrap();

    assert_eq!(consumer.topic(), "orders");
    assert_eq!(consumer.subscription_name(), "group-A");
    assert_eq!(consumer.properties().get(GROUP_ID), Some("group-A"));
    assert_eq!(driver.tracked_consumers(), 1);

    assert_eq!(
        factory.state.consumer_props.lock()[0].get(GROUP_ID),
        Some("group-A")
    );
    assert_eq!(
        *factory.state.subscriptions.lock(),
        vec![vec!["orders".to_string()]]
    );

    // 基础配置不被修改
    assert_eq!(driver.consumer_properties().get(GROUP_ID), None);

    driver.close().await.unwrap();
}

#[tokio::test]
async fn test_subscribe_failure_releases_client() {
    let (driver, factory) = new_driver().await;
    factory.state.fail_subscribe.store(true, Ordering::SeqCst);

    let err = driver
        .create_consumer("orders", "group-A", noop_callback())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::Subscription(_)));
    assert_eq!(driver.tracked_consumers(), 0);
    assert_eq!(factory.state.consumer_close_counts(), vec![1]);

    // 失败的客户端不会在 close 时被再次释放
    driver.close().await.unwrap();
    assert_eq!(factory.state.consumer_close_counts(), vec![1]);
}

#[tokio::test]
async fn test_consumer_construction_failure_is_not_tracked() {
    let (driver, factory) = new_driver().await;
    factory.state.fail_consumer.store(true, Ordering::SeqCst);

    let err = driver
        .create_consumer("orders", "group-A", noop_callback())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::Construction(_)));
    assert_eq!(driver.tracked_consumers(), 0);
    assert!(factory.state.consumer_close_counts().is_empty());
}

#[test]
fn test_consumer_without_runtime_releases_client() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (driver, factory) = runtime.block_on(new_driver());

    // 不在 runtime 上下文中，无法启动投递任务
    let err = driver
        .create_consumer("orders", "group-A", noop_callback())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::Construction(_)));
    assert_eq!(driver.tracked_consumers(), 0);
    assert_eq!(factory.state.consumer_close_counts(), vec![1]);
}

#[tokio::test]
async fn test_duplicate_consumers_are_independent() {
    let (driver, factory) = new_driver().await;

    let first = driver
        .create_consumer("orders", "group-A", noop_callback())
        .unwrap();
    let second = driver
        .create_consumer("orders", "group-A", noop_callback())
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(driver.tracked_consumers(), 2);
    assert_eq!(factory.state.subscriptions.lock().len(), 2);

    driver.close().await.unwrap();
    assert_eq!(factory.state.consumer_close_counts(), vec![1, 1]);
}

#[tokio::test]
async fn test_invalid_arguments_skip_construction() {
    let (driver, factory) = new_driver().await;

    assert!(matches!(
        driver.create_producer("").err().unwrap(),
        DriverError::InvalidArgument(_)
    ));
    assert!(matches!(
        driver
            .create_consumer("orders", "", noop_callback())
            .err()
            .unwrap(),
        DriverError::InvalidArgument(_)
    ));

    assert!(factory.state.producer_props.lock().is_empty());
    assert!(factory.state.consumer_props.lock().is_empty());
}

#[tokio::test]
async fn test_close_releases_every_handle_once() {
    let (driver, factory) = new_driver().await;

    driver
        .create_producers(&[ProducerInfo::new(0, "orders"), ProducerInfo::new(1, "payments")])
        .unwrap();
    driver
        .create_consumers(
            &[
                ConsumerInfo::new(0, "orders", "sub-000"),
                ConsumerInfo::new(1, "payments", "sub-001"),
            ],
            noop_callback(),
        )
        .unwrap();
    assert_eq!(driver.tracked_producers(), 2);
    assert_eq!(driver.tracked_consumers(), 2);

    driver.close().await.unwrap();
    driver.close().await.unwrap();

    assert!(driver.is_closed());
    assert_eq!(driver.tracked_producers(), 0);
    assert_eq!(driver.tracked_consumers(), 0);
    assert_eq!(factory.state.total_producer_closes(), 2);
    assert_eq!(factory.state.consumer_close_counts(), vec![1, 1]);

    assert!(matches!(
        driver.create_producer("orders").err().unwrap(),
        DriverError::Closed
    ));
}

#[tokio::test]
async fn test_concurrent_producer_creation() {
    let (driver, _factory) = new_driver().await;

    std::thread::scope(|s| {
        for i in 0..16 {
            let driver = &driver;
            s.spawn(move || {
                driver
                    .create_producer(&format!("{}-{}", TOPIC_NAME_PREFIX, i))
                    .unwrap();
            });
        }
    });

    assert_eq!(driver.tracked_producers(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_consumer_creation() {
    let (driver, factory) = new_driver().await;
    let runtime = tokio::runtime::Handle::current();

    std::thread::scope(|s| {
        for i in 0..8 {
            let driver = &driver;
            let runtime = &runtime;
            s.spawn(move || {
                let _guard = runtime.enter();
                driver
                    .create_consumer("orders", &format!("group-{}", i), noop_callback())
                    .unwrap();
            });
        }
    });

    assert_eq!(driver.tracked_consumers(), 8);
    let mut groups: Vec<String> = factory
        .state
        .consumer_props
        .lock()
        .iter()
        .map(|p| p.get(GROUP_ID).unwrap().to_string())
        .collect();
    groups.sort();
    groups.dedup();
    assert_eq!(groups.len(), 8);

    driver.close().await.unwrap();
    assert_eq!(factory.state.consumer_close_counts(), vec![1; 8]);
}

/// 在独立线程上同步跑完 `close`，模拟另一个调用方
fn close_on_other_thread(driver: Arc<RedpandaBenchmarkDriver<FakeFactory>>) {
    std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(driver.close())
            .unwrap();
    })
    .join()
    .unwrap();
}

#[tokio::test]
async fn test_close_during_producer_creation_releases_client() {
    let (driver, factory) = new_driver().await;
    let driver = Arc::new(driver);

    let closer = driver.clone();
    *factory.state.on_client_created.lock() =
        Some(Box::new(move || close_on_other_thread(closer)));

    let err = driver.create_producer("orders").err().unwrap();

    assert!(matches!(err, DriverError::Closed));
    assert!(driver.is_closed());
    assert_eq!(driver.tracked_producers(), 0);
    assert_eq!(factory.state.total_producer_closes(), 1);
}

#[tokio::test]
async fn test_close_during_consumer_creation_releases_client() {
    let (driver, factory) = new_driver().await;
    let driver = Arc::new(driver);

    let closer = driver.clone();
    *factory.state.on_client_created.lock() =
        Some(Box::new(move || close_on_other_thread(closer)));

    let err = driver
        .create_consumer("orders", "group-A", noop_callback())
        .err()
        .unwrap();

    assert!(matches!(err, DriverError::Closed));
    assert_eq!(driver.tracked_consumers(), 0);
    assert_eq!(factory.state.consumer_close_counts(), vec![1]);

    // 之后的 close 不会再次释放
    driver.close().await.unwrap();
    assert_eq!(factory.state.consumer_close_counts(), vec![1]);
}

#[tokio::test]
async fn test_reset_deletes_only_benchmark_topics() {
    let factory = FakeFactory::default();
    factory.state.existing_topics.lock().extend([
        "test-topic-0000001-abc".to_string(),
        "test-topic-0000002-def".to_string(),
        "_schemas".to_string(),
        "orders".to_string(),
    ]);

    let _driver = RedpandaBenchmarkDriver::initialize(test_config(true), factory.clone())
        .await
        .unwrap();

    assert_eq!(
        *factory.state.deleted_topics.lock(),
        vec![
            "test-topic-0000001-abc".to_string(),
            "test-topic-0000002-def".to_string()
        ]
    );
    assert_eq!(
        *factory.state.existing_topics.lock(),
        vec!["_schemas".to_string(), "orders".to_string()]
    );
}

#[tokio::test]
async fn test_create_topics_applies_topic_config() {
    let (driver, factory) = new_driver().await;

    driver.create_topic("test-topic-1", 6).await.unwrap();
    driver
        .create_topics(&[TopicInfo::new("test-topic-2", 1), TopicInfo::new("test-topic-3", 2)])
        .await
        .unwrap();

    let created = factory.state.created_topics.lock();
    assert_eq!(created.len(), 3);
    assert_eq!(created[0].partitions, 6);
    assert_eq!(created[0].replication_factor, 1);
    assert_eq!(created[0].config.get("retention.ms"), Some("600000"));
    drop(created);

    assert!(matches!(
        driver.create_topic("test-topic-4", 0).await.unwrap_err(),
        DriverError::InvalidArgument(_)
    ));
}

#[tokio::test]
async fn test_driver_as_trait_object() {
    let (driver, factory) = new_driver().await;
    let driver: Arc<dyn BenchmarkDriver> = Arc::new(driver);

    assert_eq!(driver.topic_name_prefix(), "test-topic");
    assert_eq!(driver.topic_properties().get("retention.ms"), Some("600000"));

    let producer = driver.create_producer("orders").unwrap();
    producer.send(Some("key"), b"hello").await.unwrap();

    let consumer = driver
        .create_consumer("orders", "group-A", noop_callback())
        .unwrap();
    assert_eq!(consumer.subscription_name(), "group-A");

    driver.close().await.unwrap();

    assert_eq!(
        *factory.state.sent.lock(),
        vec![("orders".to_string(), b"hello".to_vec())]
    );
    assert_eq!(factory.state.total_producer_closes(), 1);
}
