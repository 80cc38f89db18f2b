//! 消息投递回调

/// Kafka 的 "无时间戳" 取值
pub const NO_TIMESTAMP: i64 = -1;

/// 消息投递回调 trait
///
/// 由 consumer 的后台任务对每条收到的消息调用。顺序、批量语义由底层客户端决定。
pub trait ConsumerCallback: Send + Sync {
    /// `publish_timestamp` 为消息时间戳（毫秒），缺失时为 [`NO_TIMESTAMP`]
    fn message_received(&self, payload: &[u8], publish_timestamp: i64);
}

impl<F> ConsumerCallback for F
where
    F: Fn(&[u8], i64) + Send + Sync,
{
    fn message_received(&self, payload: &[u8], publish_timestamp: i64) {
        self(payload, publish_timestamp)
    }
}
