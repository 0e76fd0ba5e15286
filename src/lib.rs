//! Tokio MemBroker - 简单高性能的基于 Tokio 的内存消息代理
//!
//! Tokio MemBroker - Simple, high-performance in-process message broker
//! powered by Tokio: named topics over append-only logs, consumer groups
//! with tracked offsets, and at-least-once delivery with bounded retry and
//! delayed re-queue.
//!
//! # Examples
//!
//! Basic publish/consume:
//! ```rust
//! use tokio_membroker::{handler_fn, Broker, Message, MessageResult};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let broker = Broker::new();
//!     broker.create_topic("orders").await;
//!     broker.create_consumer_group("orders", "processors").await?;
//!
//!     let consumer = broker.create_consumer("orders", "processors", "c1").await?;
//!     consumer.set_message_handler(handler_fn(|msg: &Message| {
//!         println!("processing {}", msg.content());
//!         MessageResult::Success
//!     }));
//!     consumer.start_consuming();
//!
//!     let producer = broker.create_producer("orders").await?;
//!     producer.send(Message::new("m-1", "hello")).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_millis(300)).await;
//!     assert_eq!(consumer.processed_message_count(), 1);
//!     assert_eq!(broker.consumer_group_lag("orders", "processors").await, 0);
//!
//!     consumer.stop_consuming().await;
//!     broker.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! Bounded retry on failure:
//! ```rust
//! use std::time::Duration;
//! use tokio_membroker::{handler_fn, Broker, BrokerConfig, Message, MessageResult};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BrokerConfig {
//!         poll_interval: Duration::from_millis(10),
//!         failed_retry_delay: Duration::from_millis(50),
//!         ..Default::default()
//!     };
//!     let broker = Broker::with_config(config);
//!     broker.create_topic("jobs").await;
//!     broker.create_consumer_group("jobs", "workers").await?;
//!
//!     let consumer = broker.create_consumer("jobs", "workers", "w1").await?;
//!     consumer.set_message_handler(handler_fn(|_msg: &Message| MessageResult::Failed));
//!     consumer.start_consuming();
//!
//!     let producer = broker.create_producer("jobs").await?;
//!     producer.send(Message::new("job-1", "payload")).await?;
//!
//!     // The handler never succeeds: after the retry bound is exhausted the
//!     // message is dropped and the consumer's offset moves past it.
//!     tokio::time::sleep(Duration::from_millis(500)).await;
//!     assert_eq!(consumer.processed_message_count(), 0);
//!     assert_eq!(broker.consumer_group_lag("jobs", "workers").await, 0);
//!
//!     consumer.stop_consuming().await;
//!     broker.shutdown().await;
//!     Ok(())
//! }
//! ```
pub mod mq;

pub use mq::broker::{Broker, GroupStats, TopicStats};
pub use mq::config::BrokerConfig;
pub use mq::consumer::Consumer;
pub use mq::error::BrokerError;
pub use mq::group::{ConsumerGroup, ConsumerMeta};
pub use mq::message::{Message, MessageResult};
pub use mq::producer::Producer;
pub use mq::topic::Topic;
pub use mq::traits::{handler_fn, FnHandler, MessageHandler};
