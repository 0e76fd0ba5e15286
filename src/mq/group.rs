use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use log::debug;

use super::message::unix_millis;

#[derive(Debug, Clone)]
/// 已注册消费者的元数据
///
/// Metadata kept per registered consumer.
pub struct ConsumerMeta {
    pub consumer_id: String,
    pub joined_at: u64,
}

/// 消费者组
///
/// Consumer group: a cursor namespace attached to one topic. The group tracks
/// one write offset (messages observed as published since the group was
/// created) and an independent read offset per consumer. Consumers in a group
/// do not compete for messages: each cursor walks the full stream on its
/// own, so a "group" partitions nothing.
///
/// Offsets live in their own atomics and maps, never under the topic lock:
/// offset churn cannot block log appends and vice versa. Offsets only ever
/// reference already-appended, stable log positions.
pub struct ConsumerGroup {
    group_id: String,
    write_offset: AtomicU64,
    consumers: RwLock<HashMap<String, ConsumerMeta>>,
    read_offsets: RwLock<HashMap<String, u64>>,
}

impl ConsumerGroup {
    pub fn new(group_id: impl Into<String>) -> Self {
        ConsumerGroup {
            group_id: group_id.into(),
            write_offset: AtomicU64::new(0),
            consumers: RwLock::new(HashMap::new()),
            read_offsets: RwLock::new(HashMap::new()),
        }
    }

    /// 获取消费者组 ID
    ///
    /// Get the group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// 注册消费者，首次加入时从当前写偏移量开始
    ///
    /// Register a consumer. A consumer id seen for the first time starts at
    /// the group's current write offset (join = start from "now"); a
    /// returning consumer keeps its stored offset and resumes.
    pub fn add_consumer(&self, consumer_id: &str) {
        let mut consumers = self
            .consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        consumers.insert(
            consumer_id.to_string(),
            ConsumerMeta {
                consumer_id: consumer_id.to_string(),
                joined_at: unix_millis(),
            },
        );

        let mut offsets = self
            .read_offsets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let start = self.write_offset.load(Ordering::SeqCst);
        let entry = offsets.entry(consumer_id.to_string()).or_insert(start);
        debug!(
            "消费者 {} 加入组 {}, 读偏移量: {} / Consumer {} joined group {}, read offset: {}",
            consumer_id, self.group_id, entry, consumer_id, self.group_id, entry
        );
    }

    /// 注销消费者但保留其读偏移量
    ///
    /// Unregister a consumer. Its read offset is retained so a rejoin
    /// resumes instead of restarting.
    pub fn remove_consumer(&self, consumer_id: &str) -> bool {
        let mut consumers = self
            .consumers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        consumers.remove(consumer_id).is_some()
    }

    /// 获取消费者的下一个读取位置
    ///
    /// Next log index this consumer will read. Defaults to 0 if never set.
    pub fn next_message_index(&self, consumer_id: &str) -> u64 {
        let offsets = self
            .read_offsets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        offsets.get(consumer_id).copied().unwrap_or(0)
    }

    /// 更新消费者读偏移量
    ///
    /// Store a consumer's read offset. Callers only ever pass `old + 1`, one
    /// step per acknowledgement.
    pub fn update_consumer_offset(&self, consumer_id: &str, new_offset: u64) {
        let mut offsets = self
            .read_offsets
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        offsets.insert(consumer_id.to_string(), new_offset);
    }

    /// 获取组的写偏移量
    ///
    /// Get the group's write offset.
    pub fn write_offset(&self) -> u64 {
        self.write_offset.load(Ordering::SeqCst)
    }

    /// 写偏移量加一（每条发布的消息一次，由代理调用）
    ///
    /// Increment the write offset, once per published message. Called by the
    /// broker for every group attached to the topic, never by producers.
    pub fn increment_write_offset(&self) {
        self.write_offset.fetch_add(1, Ordering::SeqCst);
    }

    /// 计算组的滞后量
    ///
    /// Lag: write offset minus the minimum read offset across consumers,
    /// floored at 0. A group with no consumers has lag 0 regardless of
    /// backlog.
    pub fn lag(&self) -> u64 {
        let consumers = self
            .consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if consumers.is_empty() {
            return 0;
        }

        let offsets = self
            .read_offsets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let min_offset = offsets.values().copied().min().unwrap_or(0);
        self.write_offset.load(Ordering::SeqCst).saturating_sub(min_offset)
    }

    /// 当前注册的消费者数量
    ///
    /// Number of currently registered consumers.
    pub fn consumer_count(&self) -> usize {
        let consumers = self
            .consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        consumers.len()
    }

    /// 当前注册的消费者 ID 列表
    ///
    /// Ids of the currently registered consumers.
    pub fn consumer_ids(&self) -> Vec<String> {
        let consumers = self
            .consumers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        consumers.keys().cloned().collect()
    }
}
