use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::broker::Broker;
use super::message::MessageResult;
use super::traits::MessageHandler;

type HandlerSlot = Arc<RwLock<Option<Arc<dyn MessageHandler>>>>;

/// 主题消费者
///
/// Topic consumer: an independently scheduled worker bound to one
/// (topic, group, consumer id) triple. Started with [`start_consuming`],
/// the worker polls the broker for the message at this consumer's read
/// offset, invokes the handler, and acknowledges or re-queues based on the
/// verdict. Consumers never talk to topics or groups directly; every step
/// goes through the broker.
///
/// [`start_consuming`]: Consumer::start_consuming
pub struct Consumer {
    consumer_id: String,
    group_id: String,
    topic: String,
    broker: Broker,
    processed: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handler: HandlerSlot,
    cancel: Mutex<Option<CancellationToken>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("consumer_id", &self.consumer_id)
            .field("group_id", &self.group_id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    pub(crate) fn new(
        topic: impl Into<String>,
        group_id: impl Into<String>,
        consumer_id: impl Into<String>,
        broker: Broker,
    ) -> Self {
        Consumer {
            consumer_id: consumer_id.into(),
            group_id: group_id.into(),
            topic: topic.into(),
            broker,
            processed: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handler: Arc::new(RwLock::new(None)),
            cancel: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// 设置消息处理器
    ///
    /// Install the message handler. Replaces any previous handler; messages
    /// fetched while no handler is installed are left unread.
    pub fn set_message_handler(&self, handler: impl MessageHandler + 'static) {
        let mut slot = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler));
    }

    /// 启动消费（幂等）
    ///
    /// Start the worker. A no-op while already running.
    pub fn start_consuming(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancel = CancellationToken::new();
        let worker = Worker {
            consumer_id: self.consumer_id.clone(),
            group_id: self.group_id.clone(),
            topic: self.topic.clone(),
            broker: self.broker.clone(),
            processed: Arc::clone(&self.processed),
            running: Arc::clone(&self.running),
            handler: Arc::clone(&self.handler),
            cancel: cancel.clone(),
        };

        let handle = tokio::spawn(worker.run());
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel);
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!(
            "启动消费者 {}, 主题: {}, 组: {} / Started consumer {}, topic: {}, group: {}",
            self.consumer_id, self.topic, self.group_id, self.consumer_id, self.topic, self.group_id
        );
    }

    /// 停止消费
    ///
    /// Signal the worker to exit, cancel any in-progress sleep, and wait a
    /// bounded time for it to finish. Best-effort: the call returns even if
    /// the worker has not exited in time, and it does not guarantee the
    /// in-flight message was fully processed.
    pub async fn stop_consuming(&self) {
        self.running.store(false, Ordering::SeqCst);
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let wait = self.broker.config().stop_join_wait;
            if tokio::time::timeout(wait, handle).await.is_err() {
                warn!(
                    "消费者 {} 未在 {:?} 内退出 / Consumer {} did not exit within {:?}",
                    self.consumer_id, wait, self.consumer_id, wait
                );
            }
        }
        info!(
            "停止消费者 {}, 主题: {}, 组: {} / Stopped consumer {}, topic: {}, group: {}",
            self.consumer_id, self.topic, self.group_id, self.consumer_id, self.topic, self.group_id
        );
    }

    /// 获取消费者 ID
    ///
    /// Get the consumer id.
    pub fn consumer_id(&self) -> &str {
        &self.consumer_id
    }

    /// 获取消费者组 ID
    ///
    /// Get the consumer group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// 获取绑定的主题名称
    ///
    /// Get the bound topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 已成功处理的消息数量
    ///
    /// Number of successfully processed (acknowledged via `Success`)
    /// messages.
    pub fn processed_message_count(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// 当前是否正在运行
    ///
    /// Whether the worker is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// 消费者工作循环的共享状态
///
/// The worker task's view of the consumer state.
struct Worker {
    consumer_id: String,
    group_id: String,
    topic: String,
    broker: Broker,
    processed: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handler: HandlerSlot,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let config = self.broker.config().clone();

        while self.running.load(Ordering::SeqCst) && !self.cancel.is_cancelled() {
            let message = self
                .broker
                .next_message(&self.topic, &self.group_id, &self.consumer_id)
                .await;
            let handler = self
                .handler
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            let (message, handler) = match (message, handler) {
                (Some(message), Some(handler)) => (message, handler),
                _ => {
                    // 无可用消息（或尚未设置处理器），短暂休眠 / No message
                    // available (or no handler yet), sleep briefly
                    if self.pause(config.poll_interval).await {
                        break;
                    }
                    continue;
                }
            };

            match handler.handle(&message).await {
                Ok(MessageResult::Success) => {
                    self.broker
                        .acknowledge_message(&self.topic, &self.group_id, &self.consumer_id)
                        .await;
                    self.processed.fetch_add(1, Ordering::SeqCst);
                }
                Ok(MessageResult::Failed) => {
                    if message.retry_count() < config.max_retries {
                        // 不确认：偏移量停在原地，重试副本追加到日志尾部 / No
                        // acknowledgement: the offset stays put while the
                        // retry copy lands at the log tail.
                        message.increment_retry_count();
                        self.broker
                            .retry_message(&self.topic, Arc::clone(&message), config.failed_retry_delay)
                            .await;
                    } else {
                        self.broker
                            .acknowledge_message(&self.topic, &self.group_id, &self.consumer_id)
                            .await;
                        warn!(
                            "消息 {} 超过最大重试次数, 将被丢弃 / Message {} exceeded max retry count and will be dropped",
                            message.id(),
                            message.id()
                        );
                    }
                }
                Ok(MessageResult::RetryLater) => {
                    message.increment_retry_count();
                    self.broker
                        .retry_message(&self.topic, Arc::clone(&message), config.retry_later_delay)
                        .await;
                    self.broker
                        .acknowledge_message(&self.topic, &self.group_id, &self.consumer_id)
                        .await;
                }
                Err(e) => {
                    error!(
                        "消费者 {} 处理消息 {} 出错: {:#} / Consumer {} error processing message {}: {:#}",
                        self.consumer_id,
                        message.id(),
                        e,
                        self.consumer_id,
                        message.id(),
                        e
                    );
                    // 退避以避免错误热循环 / Back off to avoid a tight error loop
                    if self.pause(config.error_backoff).await {
                        break;
                    }
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "消费者 {} 工作循环退出, 主题: {} / Consumer {} worker loop exited, topic: {}",
            self.consumer_id, self.topic, self.consumer_id, self.topic
        );
    }

    /// 可取消的休眠，返回是否被取消
    ///
    /// Cancellable sleep; returns true if the worker was cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        }
    }
}
