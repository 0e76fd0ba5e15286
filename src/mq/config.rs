use std::time::Duration;

#[derive(Debug, Clone)]
/// 代理配置选项
///
/// Broker configuration options. Every timing constant of the delivery and
/// retry machinery lives here so tests can shrink them.
pub struct BrokerConfig {
    /// 消费者空轮询间隔
    ///
    /// Sleep between polls when a consumer finds no message at its offset.
    pub poll_interval: Duration,
    /// 最大重试次数（仅 Failed 路径检查）
    ///
    /// Retry bound consulted on the `Failed` path only.
    pub max_retries: u32,
    /// Failed 重新入队延迟
    ///
    /// Re-queue delay after a `Failed` verdict.
    pub failed_retry_delay: Duration,
    /// RetryLater 重新入队延迟
    ///
    /// Re-queue delay after a `RetryLater` verdict.
    pub retry_later_delay: Duration,
    /// 处理异常后的退避时间
    ///
    /// Backoff after an unexpected handler error, so one bad message does not
    /// spin the worker.
    pub error_backoff: Duration,
    /// 停止消费者时等待工作任务退出的上限
    ///
    /// Bounded wait for the worker task in `stop_consuming`.
    pub stop_join_wait: Duration,
    /// 关闭代理时等待已调度任务完成的上限
    ///
    /// Bounded wait for in-flight scheduled tasks in `Broker::shutdown`.
    pub shutdown_wait: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            poll_interval: Duration::from_millis(100),
            max_retries: 3,
            failed_retry_delay: Duration::from_secs(5),
            retry_later_delay: Duration::from_secs(10),
            error_backoff: Duration::from_secs(1),
            stop_join_wait: Duration::from_secs(5),
            shutdown_wait: Duration::from_secs(5),
        }
    }
}
