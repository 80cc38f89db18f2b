//! omb-config - 驱动配置加载库
//!
//! 驱动配置文件（TOML / YAML）与 `REDPANDA_DRIVER_` 前缀的环境变量合并加载。

use std::collections::BTreeMap;
use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};
use omb_common::{AUTO_OFFSET_RESET, BOOTSTRAP_SERVERS, ClientProperties, ENABLE_AUTO_COMMIT};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use thiserror::Error;

/// 环境变量前缀
pub const ENV_PREFIX: &str = "REDPANDA_DRIVER_";

/// 客户端配置项分组，其下的 key 原样保留（Kafka 配置项本身带 `.`）
const PROPERTY_SECTIONS: [&str; 4] = [
    "common_config",
    "producer_config",
    "consumer_config",
    "topic_config",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// SASL 认证配置
#[derive(Debug, Clone, Deserialize)]
pub struct SaslConfig {
    #[serde(default = "default_sasl_mechanism")]
    pub mechanism: String,
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    pub username: String,
    pub password: Secret<String>,
}

fn default_sasl_mechanism() -> String {
    "SCRAM-SHA-256".to_string()
}

fn default_security_protocol() -> String {
    "SASL_PLAINTEXT".to_string()
}

impl SaslConfig {
    /// 转换为客户端配置项
    pub fn to_properties(&self) -> ClientProperties {
        ClientProperties::new()
            .with("security.protocol", &self.security_protocol)
            .with("sasl.mechanism", &self.mechanism)
            .with("sasl.username", &self.username)
            .with("sasl.password", self.password.expose_secret())
    }
}

/// 驱动配置
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: i32,
    /// 初始化时删除已有的基准测试 topic
    #[serde(default)]
    pub reset: bool,
    #[serde(default)]
    pub common_config: ClientProperties,
    #[serde(default)]
    pub producer_config: ClientProperties,
    #[serde(default)]
    pub consumer_config: ClientProperties,
    #[serde(default)]
    pub topic_config: ClientProperties,
    #[serde(default)]
    pub sasl: Option<SaslConfig>,
}

fn default_name() -> String {
    "Redpanda".to_string()
}

fn default_replication_factor() -> i32 {
    3
}

impl DriverConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// `.yaml` / `.yml` 按 YAML 解析，其余按 TOML 解析。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        };

        Self::from_figment(merge_env(figment))
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Toml::string(s)))
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::new().merge(Yaml::string(s)))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.common_config.get(BOOTSTRAP_SERVERS) {
            Some(servers) if !servers.trim().is_empty() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "common_config must set {}",
                    BOOTSTRAP_SERVERS
                )));
            }
        }

        if self.replication_factor < 1 {
            return Err(ConfigError::Invalid(format!(
                "replication_factor must be >= 1, got {}",
                self.replication_factor
            )));
        }

        Ok(())
    }

    /// 公共配置（含 SASL），Admin 客户端直接使用
    pub fn admin_properties(&self) -> ClientProperties {
        match &self.sasl {
            Some(sasl) => self.common_config.overlay(&sasl.to_properties()),
            None => self.common_config.clone(),
        }
    }

    /// Producer 配置 = 公共配置 + producer_config
    pub fn producer_properties(&self) -> ClientProperties {
        self.admin_properties().overlay(&self.producer_config)
    }

    /// Consumer 基础配置 = 公共配置 + consumer_config
    ///
    /// 未显式设置时默认 `auto.offset.reset=earliest`、`enable.auto.commit=false`。
    pub fn consumer_properties(&self) -> ClientProperties {
        let mut props = self.admin_properties().overlay(&self.consumer_config);
        props
            .set_if_absent(AUTO_OFFSET_RESET, "earliest")
            .set_if_absent(ENABLE_AUTO_COMMIT, "false");
        props
    }

    /// 创建 topic 时附带的配置
    pub fn topic_properties(&self) -> ClientProperties {
        self.topic_config.clone()
    }
}

/// 合并环境变量
///
/// `REDPANDA_DRIVER_RESET`、`REDPANDA_DRIVER_SASL__USERNAME` 等按 `__` 嵌套；
/// `REDPANDA_DRIVER_PRODUCER_CONFIG__LINGER.MS` 这类只拆第一个 `__`，
/// 其后部分小写后整体作为配置项 key。
fn merge_env(figment: Figment) -> Figment {
    let figment = figment.merge(
        Env::prefixed(ENV_PREFIX)
            .filter(|key| section_of(key.as_str()).is_none())
            .split("__"),
    );

    PROPERTY_SECTIONS.iter().fold(figment, |figment, section| {
        let prefix = format!("{}{}__", ENV_PREFIX, section.to_ascii_uppercase());
        let entries: BTreeMap<String, String> = Env::prefixed(&prefix)
            .iter()
            .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
            .collect();

        if entries.is_empty() {
            figment
        } else {
            figment.merge(Serialized::default(section, entries))
        }
    })
}

fn section_of(key: &str) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    PROPERTY_SECTIONS
        .iter()
        .copied()
        .find(|section| key.starts_with(&format!("{}__", section)))
}
