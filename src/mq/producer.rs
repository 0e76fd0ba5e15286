use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;

use super::broker::Broker;
use super::error::BrokerError;
use super::message::Message;

#[derive(Clone)]
/// 主题生产者
///
/// Topic producer: a thin handle bound to one topic. All publishing goes
/// through the broker; the producer owns no state of its own.
pub struct Producer {
    broker: Broker,
    topic: String,
}

impl Producer {
    pub(crate) fn new(broker: Broker, topic: String) -> Self {
        debug!(
            "创建新的生产者, 主题: {} / Creating new producer, topic: {}",
            topic, topic
        );
        Producer { broker, topic }
    }

    /// 同步发布消息
    ///
    /// Publish a message to the bound topic. Publishing to a topic that no
    /// longer exists fails with `UnknownTopic`.
    pub async fn send(&self, message: Message) -> Result<(), BrokerError> {
        self.broker
            .publish_message(&self.topic, Arc::new(message))
            .await
    }

    /// 延迟发布消息
    ///
    /// Publish after a delay. A zero delay behaves as an immediate `send`;
    /// otherwise the publish runs on a background timer without blocking the
    /// caller, and cannot be cancelled once scheduled. Because nobody is
    /// listening for the delayed result, an unknown-topic failure on that
    /// path is logged and the message dropped.
    pub async fn send_after(&self, message: Message, delay: Duration) -> Result<(), BrokerError> {
        if delay.is_zero() {
            return self.send(message).await;
        }

        let broker = self.broker.clone();
        let topic = self.topic.clone();
        debug!(
            "调度延迟发布, 主题: {}, 延迟: {:?} / Scheduling delayed publish, topic: {}, delay: {:?}",
            topic, delay, topic, delay
        );
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = broker.publish_message(&topic, Arc::new(message)).await {
                warn!(
                    "延迟发布失败, 主题: {}, 错误: {} / Delayed publish failed, topic: {}, error: {}",
                    topic, e, topic, e
                );
            }
        });
        Ok(())
    }

    /// 序列化并发布任意可序列化数据
    ///
    /// Serialize `value` to JSON and publish it under the given message id.
    pub async fn send_value<T: Serialize>(
        &self,
        id: impl Into<String>,
        value: &T,
    ) -> Result<(), BrokerError> {
        let message = Message::from_value(id, value)?;
        self.send(message).await
    }

    /// 获取绑定的主题名称
    ///
    /// Get the bound topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mq::broker::Broker;

    #[tokio::test]
    async fn send_to_deleted_topic_is_an_error() -> anyhow::Result<()> {
        let broker = Broker::new();
        broker.create_topic("orders").await;
        let producer = broker.create_producer("orders").await?;

        producer.send(Message::new("m-1", "ok")).await?;
        assert!(broker.delete_topic("orders").await);

        let err = producer.send(Message::new("m-2", "late")).await.unwrap_err();
        assert!(matches!(err, BrokerError::UnknownTopic(_)));
        Ok(())
    }

    #[tokio::test]
    async fn zero_delay_behaves_as_immediate_send() -> anyhow::Result<()> {
        let broker = Broker::new();
        broker.create_topic("orders").await;
        let producer = broker.create_producer("orders").await?;

        producer
            .send_after(Message::new("m-1", "now"), Duration::ZERO)
            .await?;
        assert_eq!(broker.message_count("orders").await, 1);
        Ok(())
    }
}
