//! 通用类型定义

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Producer / Consumer 句柄 ID（用于日志关联）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
pub struct HandleId(pub Uuid);

impl HandleId {
    pub fn new() -> Self {
        Self(crate::new_id())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

/// 待创建的 Topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    pub topic: String,
    pub partitions: i32,
}

impl TopicInfo {
    pub fn new(topic: impl Into<String>, partitions: i32) -> Self {
        Self {
            topic: topic.into(),
            partitions,
        }
    }
}

/// 待创建的 Producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerInfo {
    pub id: u32,
    pub topic: String,
}

impl ProducerInfo {
    pub fn new(id: u32, topic: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
        }
    }
}

/// 待创建的 Consumer（回调由调用方单独提供）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub id: u32,
    pub topic: String,
    pub subscription_name: String,
}

impl ConsumerInfo {
    pub fn new(id: u32, topic: impl Into<String>, subscription_name: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
            subscription_name: subscription_name.into(),
        }
    }
}
