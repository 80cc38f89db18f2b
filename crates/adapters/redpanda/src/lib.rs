//! adapter-redpanda - Redpanda 基准测试驱动
//!
//! 通过 Kafka 协议客户端（librdkafka）为压测框架提供：
//! - producer / consumer 句柄的创建与跟踪
//! - topic 创建与基准测试 topic 清理
//! - 统一关闭释放

mod admin;
mod consumer;
mod driver;
mod factory;
mod producer;

pub use admin::*;
pub use consumer::*;
pub use driver::*;
pub use factory::*;
pub use producer::*;
