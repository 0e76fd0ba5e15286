pub mod broker;
pub mod config;
pub mod consumer;
pub mod error;
pub mod group;
pub mod message;
pub mod producer;
pub mod topic;
pub mod traits;

pub use broker::{Broker, GroupStats, TopicStats};
pub use config::BrokerConfig;
pub use consumer::Consumer;
pub use error::BrokerError;
pub use group::{ConsumerGroup, ConsumerMeta};
pub use message::{Message, MessageResult};
pub use producer::Producer;
pub use topic::Topic;
pub use traits::{handler_fn, FnHandler, MessageHandler};
