use crate::mq::message::{Message, MessageResult};

/// 消息处理器 trait / Message handler trait
/// 消费者对每条取出的消息调用一次处理器 / The consumer worker invokes the handler once per fetched message
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    /// 处理一条消息并返回处理结果 / Process one message and return a verdict
    ///
    /// 返回 `Err` 表示处理过程中出现意外错误，消费者记录日志并退避后继续 /
    /// Returning `Err` marks an unexpected processing error; the consumer
    /// logs it, backs off, and keeps running.
    async fn handle(&self, message: &Message) -> anyhow::Result<MessageResult>;
}

/// 包装普通闭包的处理器 / Handler adapter around a plain closure
///
/// 由 [`handler_fn`] 构造 / Built with [`handler_fn`].
pub struct FnHandler<F>(F);

#[async_trait::async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&Message) -> MessageResult + Send + Sync,
{
    async fn handle(&self, message: &Message) -> anyhow::Result<MessageResult> {
        Ok((self.0)(message))
    }
}

/// 从闭包创建处理器 / Build a handler from a closure
///
/// 适用于不需要异步或错误通道的简单处理逻辑 / For simple handling logic
/// that needs neither async nor an error channel:
///
/// ```rust
/// use tokio_membroker::{handler_fn, Message, MessageResult};
///
/// let handler = handler_fn(|msg: &Message| {
///     println!("{}", msg.content());
///     MessageResult::Success
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Message) -> MessageResult + Send + Sync,
{
    FnHandler(f)
}
