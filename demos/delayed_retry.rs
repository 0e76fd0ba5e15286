use std::time::Duration;

use tokio_membroker::{handler_fn, Broker, BrokerConfig, Message, MessageResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Short delays so the demo finishes quickly.
    let config = BrokerConfig {
        poll_interval: Duration::from_millis(20),
        failed_retry_delay: Duration::from_millis(500),
        retry_later_delay: Duration::from_secs(1),
        ..Default::default()
    };
    let broker = Broker::with_config(config);

    broker.create_topic("jobs").await;
    broker.create_consumer_group("jobs", "workers").await?;

    let consumer = broker.create_consumer("jobs", "workers", "worker-1").await?;
    consumer.set_message_handler(handler_fn(|msg: &Message| {
        if msg.retry_count() == 0 {
            println!(
                "[Worker] Not ready for {}, deferring (attempt {})",
                msg.id(),
                msg.retry_count() + 1
            );
            MessageResult::RetryLater
        } else {
            println!("[Worker] Completed {} on attempt {}", msg.id(), msg.retry_count() + 1);
            MessageResult::Success
        }
    }));
    consumer.start_consuming();

    let producer = broker.create_producer("jobs").await?;

    println!("Publishing one immediate and one delayed message...");
    producer.send(Message::new("job-1", "resize images")).await?;
    producer
        .send_after(Message::new("job-2", "send digest"), Duration::from_secs(2))
        .await?;

    tokio::time::sleep(Duration::from_secs(5)).await;

    println!(
        "Processed {} messages, log length {} (deferred jobs re-enter at the tail)",
        consumer.processed_message_count(),
        broker.message_count("jobs").await
    );

    consumer.stop_consuming().await;
    broker.shutdown().await;
    Ok(())
}
