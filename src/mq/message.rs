use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::BrokerError;

/// 当前 Unix 时间戳（毫秒）
///
/// Current Unix timestamp in milliseconds.
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// 消息处理结果
///
/// Verdict returned by a message handler. The consumer worker matches on this
/// exhaustively to decide acknowledgement and re-queueing.
pub enum MessageResult {
    /// 处理成功，确认消息并推进偏移量
    ///
    /// Processed successfully; the message is acknowledged and the read
    /// offset advances.
    Success,
    /// 处理失败，在重试次数内延迟重新入队，且不推进偏移量
    ///
    /// Processing failed; re-queued after a delay while under the retry
    /// bound, without advancing the read offset. Once the bound is exhausted
    /// the message is acknowledged anyway and dropped.
    Failed,
    /// 稍后重试，立即确认并延迟重新入队
    ///
    /// Defer processing; the message is acknowledged immediately and
    /// re-queued after a longer delay. This path never consults the retry
    /// bound, so the retry count grows unchecked.
    RetryLater,
}

#[derive(Debug, Serialize, Deserialize)]
/// 主题消息
///
/// Topic message. Identity is the caller-supplied `id`; no validation is
/// performed and duplicate or empty ids are accepted. The broker shares one
/// allocation per message (`Arc<Message>`), so a re-queued retry aliases the
/// original log entry and both see the same retry counter.
pub struct Message {
    id: String,
    content: String,
    headers: RwLock<HashMap<String, String>>,
    created_at: u64,
    retry_count: AtomicU32,
}

impl Message {
    /// 创建新消息
    ///
    /// Create a new message with the given id and content. The creation
    /// timestamp is taken now and the retry count starts at zero.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let id = id.into();
        let content = content.into();
        debug!(
            "创建消息, ID: {}, 大小: {} 字节 / Creating message, id: {}, size: {} bytes",
            id,
            content.len(),
            id,
            content.len()
        );
        Message {
            id,
            content,
            headers: RwLock::new(HashMap::new()),
            created_at: unix_millis(),
            retry_count: AtomicU32::new(0),
        }
    }

    /// 使用随机生成的 ID 创建消息
    ///
    /// Create a message with a freshly generated UUID v4 id.
    pub fn with_generated_id(content: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), content)
    }

    /// 将任意可序列化数据作为 JSON 内容创建消息
    ///
    /// Create a message whose content is the JSON serialization of `value`.
    pub fn from_value<T: Serialize>(id: impl Into<String>, value: &T) -> Result<Self, BrokerError> {
        let content = serde_json::to_string(value)?;
        Ok(Self::new(id, content))
    }

    /// 获取消息 ID
    ///
    /// Get the message id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 获取消息内容
    ///
    /// Get the message content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 获取创建时间（Unix 毫秒）
    ///
    /// Get the creation timestamp (Unix milliseconds).
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// 添加消息头（可链式调用，并发安全）
    ///
    /// Add a header entry. Safe under concurrent access and chainable:
    /// `msg.add_header("k1", "v1").add_header("k2", "v2")`.
    pub fn add_header(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        let mut headers = self
            .headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        headers.insert(key.into(), value.into());
        self
    }

    /// 读取单个消息头
    ///
    /// Look up a single header value.
    pub fn header(&self, key: &str) -> Option<String> {
        let headers = self.headers.read().unwrap_or_else(PoisonError::into_inner);
        headers.get(key).cloned()
    }

    /// 获取消息头快照
    ///
    /// Get a snapshot of the header bag.
    pub fn headers(&self) -> HashMap<String, String> {
        let headers = self.headers.read().unwrap_or_else(PoisonError::into_inner);
        headers.clone()
    }

    /// 获取当前重试次数
    ///
    /// Get the current retry count.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// 重试次数加一
    ///
    /// Increment the retry count by one. Called by the consumer worker on the
    /// `Failed` and `RetryLater` paths.
    pub fn increment_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::SeqCst);
    }

    /// 反序列化 JSON 内容为目标类型
    ///
    /// Deserialize the JSON content into a target type.
    pub fn content_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, BrokerError> {
        Ok(serde_json::from_str(&self.content)?)
    }

    /// 展示内容摘要（截断以便日志输出）
    ///
    /// Display a content summary (truncated for logging).
    pub fn display_content(&self, max_len: usize) -> String {
        if self.content.len() > max_len {
            format!("{}... (len={})", &self.content[..max_len], self.content.len())
        } else {
            self.content.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_chaining_and_lookup() {
        let msg = Message::new("m-1", "payload");
        msg.add_header("type", "order_created")
            .add_header("source", "web");

        assert_eq!(msg.header("type").as_deref(), Some("order_created"));
        assert_eq!(msg.header("source").as_deref(), Some("web"));
        assert_eq!(msg.headers().len(), 2);
        assert!(msg.header("missing").is_none());
    }

    #[test]
    fn retry_count_starts_at_zero() {
        let msg = Message::new("m-2", "payload");
        assert_eq!(msg.retry_count(), 0);
        msg.increment_retry_count();
        msg.increment_retry_count();
        assert_eq!(msg.retry_count(), 2);
    }

    #[test]
    fn empty_and_duplicate_ids_accepted() {
        let a = Message::new("", "x");
        let b = Message::new("dup", "y");
        let c = Message::new("dup", "z");
        assert_eq!(a.id(), "");
        assert_eq!(b.id(), c.id());
    }

    #[test]
    fn typed_content_round_trip() -> anyhow::Result<()> {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Order {
            order_id: String,
            amount: f64,
        }

        let order = Order {
            order_id: "ORD-1".into(),
            amount: 10.0,
        };
        let msg = Message::from_value("m-3", &order)?;
        assert_eq!(msg.content_as::<Order>()?, order);
        Ok(())
    }
}
