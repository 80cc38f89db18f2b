//! Admin 模块
//!
//! Topic 创建、列举与删除

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use omb_errors::{DriverError, DriverResult};
use omb_ports::{AdminClient, NewTopicSpec};
use rdkafka::admin::{AdminClient as KafkaAdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::RDKafkaErrorCode;
use tracing::{debug, error, info};

/// 基于 rdkafka AdminClient 的客户端
pub struct RdKafkaAdmin {
    admin: Arc<KafkaAdminClient<DefaultClientContext>>,
    timeout: Duration,
}

impl RdKafkaAdmin {
    pub fn new(admin: Arc<KafkaAdminClient<DefaultClientContext>>, timeout: Duration) -> Self {
        Self { admin, timeout }
    }

    fn options(&self) -> AdminOptions {
        AdminOptions::new().operation_timeout(Some(self.timeout))
    }
}

#[async_trait]
impl AdminClient for RdKafkaAdmin {
    async fn create_topics(&self, topics: &[NewTopicSpec]) -> DriverResult<()> {
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|spec| {
                spec.config.iter().fold(
                    NewTopic::new(
                        &spec.name,
                        spec.partitions,
                        TopicReplication::Fixed(spec.replication_factor),
                    ),
                    |topic, (key, value)| topic.set(key, value),
                )
            })
            .collect();

        let results = self
            .admin
            .create_topics(&new_topics, &self.options())
            .await
            .map_err(|e| DriverError::admin(format!("Failed to create topics: {}", e)))?;

        for result in results {
            match result {
                Ok(name) => {
                    info!(topic = %name, "Topic created successfully");
                }
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!(topic = %name, "Topic already exists");
                }
                Err((name, err)) => {
                    error!(topic = %name, error = ?err, "Failed to create topic");
                    return Err(DriverError::admin(format!(
                        "Failed to create topic {}: {:?}",
                        name, err
                    )));
                }
            }
        }

        Ok(())
    }

    async fn list_topics(&self) -> DriverResult<Vec<String>> {
        let admin = self.admin.clone();
        let timeout = self.timeout;

        // fetch_metadata 为阻塞调用
        tokio::task::spawn_blocking(move || -> DriverResult<Vec<String>> {
            let metadata = admin
                .inner()
                .fetch_metadata(None, timeout)
                .map_err(|e| DriverError::admin(format!("Failed to fetch metadata: {}", e)))?;

            Ok(metadata
                .topics()
                .iter()
                .filter(|t| t.error().is_none())
                .map(|t| t.name().to_string())
                .collect())
        })
        .await
        .map_err(|e| DriverError::admin(format!("Metadata task failed: {}", e)))?
    }

    async fn delete_topics(&self, topics: &[String]) -> DriverResult<()> {
        if topics.is_empty() {
            return Ok(());
        }

        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        let results = self
            .admin
            .delete_topics(&names, &self.options())
            .await
            .map_err(|e| DriverError::admin(format!("Failed to delete topics: {}", e)))?;

        for result in results {
            match result {
                Ok(name) => {
                    info!(topic = %name, "Topic deleted successfully");
                }
                Err((name, err)) => {
                    error!(topic = %name, error = ?err, "Failed to delete topic");
                    return Err(DriverError::admin(format!(
                        "Failed to delete topic {}: {:?}",
                        name, err
                    )));
                }
            }
        }

        Ok(())
    }
}
