use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::config::BrokerConfig;
use super::consumer::Consumer;
use super::error::BrokerError;
use super::message::Message;
use super::producer::Producer;
use super::topic::Topic;

#[derive(Debug, Clone, Serialize)]
/// 消费者组统计信息
///
/// Per-group statistics.
pub struct GroupStats {
    pub group_id: String,
    pub consumer_count: usize,
    pub lag: u64,
}

#[derive(Debug, Clone, Serialize)]
/// 主题统计信息
///
/// Per-topic statistics.
pub struct TopicStats {
    pub topic: String,
    pub message_count: u64,
    pub groups: Vec<GroupStats>,
}

struct BrokerShared {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    config: BrokerConfig,
    scheduler: Mutex<JoinSet<()>>,
    shutdown: CancellationToken,
}

#[derive(Clone)]
/// 消息代理
///
/// Message broker: the top-level registry of topics and the owner of the
/// delayed-retry scheduler. Producers and consumers never touch each other's
/// internals; every cross-component call is mediated here. The handle is
/// cheap to clone and clones share all state; no global singletons, so tests
/// run as many independent brokers as they like.
pub struct Broker {
    shared: Arc<BrokerShared>,
}

impl Broker {
    /// 使用默认配置创建代理
    ///
    /// Create a broker with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BrokerConfig::default())
    }

    /// 使用指定配置创建代理
    ///
    /// Create a broker with a custom configuration.
    pub fn with_config(config: BrokerConfig) -> Self {
        debug!("创建新的消息代理 / Creating new message broker");
        Broker {
            shared: Arc::new(BrokerShared {
                topics: RwLock::new(HashMap::new()),
                config,
                scheduler: Mutex::new(JoinSet::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub(crate) fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    async fn topic(&self, name: &str) -> Option<Arc<Topic>> {
        let topics = self.shared.topics.read().await;
        topics.get(name).cloned()
    }

    // ========== 主题管理 / Topic management ==========

    /// 创建主题（幂等）
    ///
    /// Create a topic. Idempotent: an existing topic of the same name is
    /// left untouched.
    pub async fn create_topic(&self, name: &str) {
        let mut topics = self.shared.topics.write().await;
        if !topics.contains_key(name) {
            info!("创建新主题: {} / Creating new topic: {}", name, name);
            topics.insert(name.to_string(), Arc::new(Topic::new(name)));
        } else {
            debug!("主题已存在: {} / Topic already exists: {}", name, name);
        }
    }

    /// 删除主题
    ///
    /// Delete a topic; returns whether it existed. Deletion is terminal:
    /// consumers bound to the topic stop receiving new messages.
    pub async fn delete_topic(&self, name: &str) -> bool {
        let mut topics = self.shared.topics.write().await;
        let removed = topics.remove(name).is_some();
        if removed {
            info!("删除主题: {} / Deleted topic: {}", name, name);
        }
        removed
    }

    /// 列出当前所有主题
    ///
    /// List all current topics.
    pub async fn topics(&self) -> Vec<String> {
        let topics = self.shared.topics.read().await;
        topics.keys().cloned().collect()
    }

    /// 获取主题的消息数量（主题不存在时为 0）
    ///
    /// Message count of a topic; 0 for a missing topic.
    pub async fn message_count(&self, topic: &str) -> u64 {
        match self.topic(topic).await {
            Some(t) => t.message_count().await,
            None => 0,
        }
    }

    /// 获取主题统计信息
    ///
    /// Get topic statistics.
    pub async fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        let t = self.topic(topic).await?;
        let mut groups = Vec::new();
        for group_id in t.consumer_group_ids().await {
            if let Some(group) = t.consumer_group(&group_id).await {
                groups.push(GroupStats {
                    group_id,
                    consumer_count: group.consumer_count(),
                    lag: group.lag(),
                });
            }
        }
        Some(TopicStats {
            topic: t.name().to_string(),
            message_count: t.message_count().await,
            groups,
        })
    }

    // ========== 消费者组管理 / Consumer group management ==========

    /// 在主题上创建消费者组（幂等）
    ///
    /// Create a consumer group on a topic. Idempotent per group id; fails
    /// with `UnknownTopic` if the topic does not exist.
    pub async fn create_consumer_group(&self, topic: &str, group_id: &str) -> Result<(), BrokerError> {
        let t = self
            .topic(topic)
            .await
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?;
        t.create_consumer_group(group_id).await;
        info!(
            "为主题 {} 创建消费者组 {} / Created consumer group {} for topic {}",
            topic, group_id, group_id, topic
        );
        Ok(())
    }

    /// 删除消费者组
    ///
    /// Delete a consumer group; returns whether it existed. A missing topic
    /// yields `false` rather than an error.
    pub async fn delete_consumer_group(&self, topic: &str, group_id: &str) -> bool {
        match self.topic(topic).await {
            Some(t) => {
                let removed = t.delete_consumer_group(group_id).await;
                if removed {
                    info!(
                        "从主题 {} 删除消费者组 {} / Deleted consumer group {} from topic {}",
                        topic, group_id, group_id, topic
                    );
                }
                removed
            }
            None => false,
        }
    }

    /// 列出主题上的消费者组
    ///
    /// Consumer groups on a topic; empty for a missing topic.
    pub async fn consumer_groups(&self, topic: &str) -> Vec<String> {
        match self.topic(topic).await {
            Some(t) => t.consumer_group_ids().await,
            None => Vec::new(),
        }
    }

    /// 获取消费者组滞后量（主题或组不存在时为 0）
    ///
    /// Lag of a consumer group; 0 for a missing topic or group.
    pub async fn consumer_group_lag(&self, topic: &str, group_id: &str) -> u64 {
        match self.topic(topic).await {
            Some(t) => match t.consumer_group(group_id).await {
                Some(group) => group.lag(),
                None => 0,
            },
            None => 0,
        }
    }

    // ========== 生产者与消费者创建 / Producer and consumer creation ==========

    /// 创建绑定到主题的生产者
    ///
    /// Create a producer bound to a topic. The topic must exist.
    pub async fn create_producer(&self, topic: &str) -> Result<Producer, BrokerError> {
        if self.topic(topic).await.is_none() {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        }
        Ok(Producer::new(self.clone(), topic.to_string()))
    }

    /// 创建消费者并注册进消费者组
    ///
    /// Create a consumer and register it into the group, joining at the
    /// group's current write offset. The consumer is not started. Topic and
    /// group must both exist.
    pub async fn create_consumer(
        &self,
        topic: &str,
        group_id: &str,
        consumer_id: &str,
    ) -> Result<Consumer, BrokerError> {
        let t = self
            .topic(topic)
            .await
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?;
        let group = t
            .consumer_group(group_id)
            .await
            .ok_or_else(|| BrokerError::UnknownGroup {
                topic: topic.to_string(),
                group: group_id.to_string(),
            })?;

        group.add_consumer(consumer_id);
        Ok(Consumer::new(topic, group_id, consumer_id, self.clone()))
    }

    // ========== 内部中介方法 / Internal mediation ==========

    /// 发布消息：追加日志并推进每个组的写偏移量
    ///
    /// Append to the topic log; every attached group's write offset advances
    /// with the append.
    pub(crate) async fn publish_message(
        &self,
        topic: &str,
        message: Arc<Message>,
    ) -> Result<(), BrokerError> {
        let t = self
            .topic(topic)
            .await
            .ok_or_else(|| BrokerError::UnknownTopic(topic.to_string()))?;
        let len = t.append(message.clone()).await;
        debug!(
            "发布消息 {} 到主题 {}, 日志长度: {} / Published message {} to topic {}, log length: {}",
            message.id(),
            topic,
            len,
            message.id(),
            topic,
            len
        );
        Ok(())
    }

    /// 读取消费者当前偏移量处的消息
    ///
    /// Message at the consumer's read offset, or `None` at or beyond the
    /// tail (and for a vanished topic or group, which a polling worker
    /// treats the same way).
    pub(crate) async fn next_message(
        &self,
        topic: &str,
        group_id: &str,
        consumer_id: &str,
    ) -> Option<Arc<Message>> {
        let t = self.topic(topic).await?;
        let group = t.consumer_group(group_id).await?;
        let index = group.next_message_index(consumer_id);
        t.message_at(index).await
    }

    /// 确认消息：读偏移量恰好加一
    ///
    /// Acknowledge: advance the consumer's read offset by exactly one from
    /// its current value. Never set to a caller-supplied position, so a
    /// consumer cannot skip.
    pub(crate) async fn acknowledge_message(&self, topic: &str, group_id: &str, consumer_id: &str) {
        let Some(t) = self.topic(topic).await else {
            return;
        };
        let Some(group) = t.consumer_group(group_id).await else {
            return;
        };
        let current = group.next_message_index(consumer_id);
        group.update_consumer_offset(consumer_id, current + 1);
    }

    /// 调度延迟重新入队
    ///
    /// Schedule a delayed re-publish of the same message onto the topic
    /// tail. Once scheduled the task cannot be cancelled individually;
    /// failures are logged, never retried further. After shutdown, new
    /// schedule requests are dropped with a warning.
    pub(crate) async fn retry_message(&self, topic: &str, message: Arc<Message>, delay: Duration) {
        if self.shared.shutdown.is_cancelled() {
            warn!(
                "调度器已关闭, 丢弃消息 {} 的重试任务 / Scheduler shut down, dropping retry task for message {}",
                message.id(),
                message.id()
            );
            return;
        }

        let broker = self.clone();
        let topic = topic.to_string();
        let mut scheduler = self.shared.scheduler.lock().await;
        // 回收已完成的任务 / Reap finished tasks
        while scheduler.try_join_next().is_some() {}
        scheduler.spawn(async move {
            tokio::time::sleep(delay).await;
            match broker.publish_message(&topic, message).await {
                Ok(()) => debug!(
                    "消息已重新入队到主题 {} / Message requeued to topic {}",
                    topic, topic
                ),
                Err(e) => warn!(
                    "重新入队失败, 主题: {}, 错误: {} / Failed to requeue message, topic: {}, error: {}",
                    topic, e, topic, e
                ),
            }
        });
    }

    // ========== 代理关闭 / Broker shutdown ==========

    /// 关闭代理
    ///
    /// Stop accepting new scheduled work, wait a bounded time for in-flight
    /// scheduled tasks, then force-stop the rest. Running consumers are not
    /// stopped here; stop each one explicitly.
    pub async fn shutdown(&self) {
        info!("正在关闭消息代理 / Shutting down message broker");
        self.shared.shutdown.cancel();

        let mut scheduler = self.shared.scheduler.lock().await;
        let wait = self.shared.config.shutdown_wait;
        let drained = tokio::time::timeout(wait, async {
            while scheduler.join_next().await.is_some() {}
        })
        .await
        .is_ok();

        if !drained {
            warn!(
                "等待 {:?} 后仍有未完成的调度任务, 强制终止 / Scheduled tasks still pending after {:?}, aborting",
                wait, wait
            );
            scheduler.abort_all();
            while scheduler.join_next().await.is_some() {}
        }
        info!("消息代理关闭完成 / Message broker shutdown completed");
    }
}

impl Default for Broker {
    /// 默认构造，等价于 `Broker::new()`
    ///
    /// Default constructor, same as `Broker::new()`.
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topic_creation_is_idempotent() {
        let broker = Broker::new();
        broker.create_topic("orders").await;
        broker.create_topic("orders").await;
        assert_eq!(broker.topics().await, vec!["orders".to_string()]);
    }

    #[tokio::test]
    async fn group_operations_on_missing_topic() {
        let broker = Broker::new();
        let err = broker.create_consumer_group("nope", "g1").await.unwrap_err();
        assert!(matches!(err, BrokerError::UnknownTopic(_)));
        assert!(!broker.delete_consumer_group("nope", "g1").await);
        assert!(broker.consumer_groups("nope").await.is_empty());
        assert_eq!(broker.consumer_group_lag("nope", "g1").await, 0);
    }

    #[tokio::test]
    async fn consumer_creation_validates_topic_and_group() -> anyhow::Result<()> {
        let broker = Broker::new();
        broker.create_topic("orders").await;

        let err = broker.create_consumer("orders", "g1", "c1").await.unwrap_err();
        assert!(matches!(err, BrokerError::UnknownGroup { .. }));

        broker.create_consumer_group("orders", "g1").await?;
        let consumer = broker.create_consumer("orders", "g1", "c1").await?;
        assert_eq!(consumer.consumer_id(), "c1");
        assert!(!consumer.is_running());
        Ok(())
    }

    #[tokio::test]
    async fn stats_reflect_log_and_groups() -> anyhow::Result<()> {
        let broker = Broker::new();
        broker.create_topic("orders").await;
        broker.create_consumer_group("orders", "g1").await?;
        let producer = broker.create_producer("orders").await?;
        producer.send(Message::new("m-1", "x")).await?;

        let stats = broker.topic_stats("orders").await.unwrap();
        assert_eq!(stats.message_count, 1);
        assert_eq!(stats.groups.len(), 1);
        assert_eq!(stats.groups[0].group_id, "g1");
        assert_eq!(stats.groups[0].consumer_count, 0);
        assert_eq!(stats.groups[0].lag, 0);
        Ok(())
    }
}
