//! 客户端配置项
//!
//! 传递给 Kafka 客户端的扁平 key/value 配置

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// 消费者组 ID 配置项
pub const GROUP_ID: &str = "group.id";
/// 自动提交配置项
pub const ENABLE_AUTO_COMMIT: &str = "enable.auto.commit";
/// 偏移重置配置项
pub const AUTO_OFFSET_RESET: &str = "auto.offset.reset";
/// Broker 地址配置项
pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";

/// 客户端配置项集合
///
/// 有序存储，后写覆盖先写。Debug 输出会隐藏包含 `password` / `secret` 的值。
/// 反序列化时数字、布尔值按字面转为字符串。
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClientProperties {
    entries: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    fn into_string(self) -> String {
        match self {
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Int(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::String(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for ClientProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, PropertyValue>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, value.into_string()))
            .collect())
    }
}

impl ClientProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// 仅在未设置时写入
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 以 `other` 覆盖当前配置，返回新集合
    pub fn overlay(&self, other: &ClientProperties) -> ClientProperties {
        let mut merged = self.clone();
        for (key, value) in other.iter() {
            merged.set(key, value);
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `enable.auto.commit` 是否显式开启
    pub fn auto_commit_enabled(&self) -> bool {
        self.get(ENABLE_AUTO_COMMIT)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ClientProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = ClientProperties::new();
        for (key, value) in iter {
            props.set(key, value);
        }
        props
    }
}

impl From<BTreeMap<String, String>> for ClientProperties {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("password") || key.contains("secret")
}

impl fmt::Debug for ClientProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.iter() {
            if is_sensitive(key) {
                map.entry(&key, &"[REDACTED]");
            } else {
                map.entry(&key, &value);
            }
        }
        map.finish()
    }
}
