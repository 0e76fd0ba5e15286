#[derive(Debug, thiserror::Error)]
/// 代理错误类型
///
/// Broker error taxonomy. Configuration errors (unknown topic or group) are
/// signaled synchronously to the caller and never retried by the broker.
pub enum BrokerError {
    #[error("topic not found: {0}")]
    UnknownTopic(String),

    #[error("consumer group not found: {group} (topic: {topic})")]
    UnknownGroup { topic: String, group: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
