use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use tokio::sync::RwLock;

use super::group::ConsumerGroup;
use super::message::Message;

struct TopicState {
    log: Vec<Arc<Message>>,
    groups: HashMap<String, Arc<ConsumerGroup>>,
}

/// 主题：追加式消息日志及其消费者组
///
/// Topic: an append-only, ordered message log plus the consumer groups
/// reading it. One reader/writer lock guards the log and the group registry
/// together; appends take it exclusively, lookups share it. Messages are
/// never removed or reordered, so an index that was once valid stays valid
/// and returns the same message forever.
pub struct Topic {
    name: String,
    state: RwLock<TopicState>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Topic {
            name: name.into(),
            state: RwLock::new(TopicState {
                log: Vec::new(),
                groups: HashMap::new(),
            }),
        }
    }

    /// 获取主题名称
    ///
    /// Get the topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 追加消息并推进所有已挂载组的写偏移量
    ///
    /// Append a message at the tail and advance the write offset of every
    /// attached group, under one exclusive lock hold so the write offsets
    /// always equal the log length each group has observed. Returns the new
    /// log length.
    pub async fn append(&self, message: Arc<Message>) -> u64 {
        let mut state = self.state.write().await;
        state.log.push(message);
        for group in state.groups.values() {
            group.increment_write_offset();
        }
        state.log.len() as u64
    }

    /// 获取日志长度
    ///
    /// Current log length.
    pub async fn message_count(&self) -> u64 {
        let state = self.state.read().await;
        state.log.len() as u64
    }

    /// 读取指定位置的消息
    ///
    /// Message at log position `index`, or `None` at or beyond the tail.
    pub async fn message_at(&self, index: u64) -> Option<Arc<Message>> {
        let state = self.state.read().await;
        state.log.get(index as usize).cloned()
    }

    /// 创建消费者组（幂等）
    ///
    /// Create a consumer group. Idempotent: an existing group is left
    /// untouched.
    pub async fn create_consumer_group(&self, group_id: &str) {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(group_id) {
            debug!(
                "主题 {} 创建消费者组: {} / Topic {} creating consumer group: {}",
                self.name, group_id, self.name, group_id
            );
            state
                .groups
                .insert(group_id.to_string(), Arc::new(ConsumerGroup::new(group_id)));
        }
    }

    /// 删除消费者组
    ///
    /// Delete a consumer group; returns whether it existed.
    pub async fn delete_consumer_group(&self, group_id: &str) -> bool {
        let mut state = self.state.write().await;
        state.groups.remove(group_id).is_some()
    }

    /// 查找消费者组
    ///
    /// Look up a consumer group.
    pub async fn consumer_group(&self, group_id: &str) -> Option<Arc<ConsumerGroup>> {
        let state = self.state.read().await;
        state.groups.get(group_id).cloned()
    }

    /// 获取所有消费者组 ID
    ///
    /// Ids of all consumer groups on this topic.
    pub async fn consumer_group_ids(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.groups.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_is_ordered_and_stable() {
        let topic = Topic::new("orders");
        for i in 0..5 {
            topic.append(Arc::new(Message::new(format!("m-{}", i), "x"))).await;
        }

        assert_eq!(topic.message_count().await, 5);
        for i in 0..5u64 {
            let msg = topic.message_at(i).await.unwrap();
            assert_eq!(msg.id(), format!("m-{}", i));
        }
        assert!(topic.message_at(5).await.is_none());
    }

    #[tokio::test]
    async fn append_advances_attached_groups_only() {
        let topic = Topic::new("orders");
        topic.create_consumer_group("early").await;

        topic.append(Arc::new(Message::new("m-0", "x"))).await;
        topic.append(Arc::new(Message::new("m-1", "x"))).await;

        // A group created after the appends has observed none of them.
        topic.create_consumer_group("late").await;
        topic.append(Arc::new(Message::new("m-2", "x"))).await;

        let early = topic.consumer_group("early").await.unwrap();
        let late = topic.consumer_group("late").await.unwrap();
        assert_eq!(early.write_offset(), 3);
        assert_eq!(late.write_offset(), 1);
    }

    #[tokio::test]
    async fn group_creation_is_idempotent() {
        let topic = Topic::new("orders");
        topic.create_consumer_group("g1").await;
        let group = topic.consumer_group("g1").await.unwrap();
        group.increment_write_offset();

        topic.create_consumer_group("g1").await;
        let again = topic.consumer_group("g1").await.unwrap();
        assert_eq!(again.write_offset(), 1);
        assert_eq!(topic.consumer_group_ids().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_group_reports_existence() {
        let topic = Topic::new("orders");
        topic.create_consumer_group("g1").await;
        assert!(topic.delete_consumer_group("g1").await);
        assert!(!topic.delete_consumer_group("g1").await);
    }
}
