use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_membroker::{handler_fn, Broker, Message, MessageResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let broker = Broker::new();

    // Register topics
    broker.create_topic("orders").await;
    broker.create_topic("payments").await;
    broker.create_topic("notifications").await;

    // Consumer groups
    broker.create_consumer_group("orders", "order-processors").await?;
    broker.create_consumer_group("orders", "order-analytics").await?;
    broker.create_consumer_group("payments", "payment-processors").await?;
    broker.create_consumer_group("notifications", "email-senders").await?;

    // Consumers
    let order_consumer_1 = broker
        .create_consumer("orders", "order-processors", "consumer-1")
        .await?;
    let order_consumer_2 = broker
        .create_consumer("orders", "order-processors", "consumer-2")
        .await?;
    let analytics_consumer = broker
        .create_consumer("orders", "order-analytics", "analytics-1")
        .await?;
    let payment_consumer = broker
        .create_consumer("payments", "payment-processors", "payment-1")
        .await?;
    let notification_consumer = broker
        .create_consumer("notifications", "email-senders", "email-1")
        .await?;

    order_consumer_1.set_message_handler(handler_fn(|msg: &Message| {
        println!("[Order Consumer 1] Processing order: {}", msg.content());
        MessageResult::Success
    }));
    order_consumer_2.set_message_handler(handler_fn(|msg: &Message| {
        println!("[Order Consumer 2] Processing order: {}", msg.content());
        MessageResult::Success
    }));
    analytics_consumer.set_message_handler(handler_fn(|msg: &Message| {
        println!("[Order Analytics] Recording metrics for order: {}", msg.content());
        MessageResult::Success
    }));

    // Every third payment fails and goes through the bounded-retry path.
    let payment_attempts = Arc::new(AtomicU32::new(0));
    payment_consumer.set_message_handler(handler_fn(move |msg: &Message| {
        let attempt = payment_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt % 3 == 2 {
            println!("[Payment Processor] Failed to process payment: {}", msg.content());
            MessageResult::Failed
        } else {
            println!("[Payment Processor] Processing payment: {}", msg.content());
            MessageResult::Success
        }
    }));
    notification_consumer.set_message_handler(handler_fn(|msg: &Message| {
        println!("[Email Sender] Sending email notification: {}", msg.content());
        MessageResult::Success
    }));

    order_consumer_1.start_consuming();
    order_consumer_2.start_consuming();
    analytics_consumer.start_consuming();
    payment_consumer.start_consuming();
    notification_consumer.start_consuming();

    println!("===== Message Broker Demo =====\n");
    println!("Producing order messages...");

    let order_producer = broker.create_producer("orders").await?;
    let payment_producer = broker.create_producer("payments").await?;
    let notification_producer = broker.create_producer("notifications").await?;

    for i in 1..=10 {
        let order_id = format!("ORD-{}", i);
        let amount = 10.0 * i as f64;

        let order_msg = Message::with_generated_id(format!(
            "{{\"orderId\":\"{}\", \"amount\":{}, \"userId\":\"user-{}\"}}",
            order_id, amount, i
        ));
        order_msg.add_header("type", "order_created");
        order_producer.send(order_msg).await?;

        // Some orders generate payments and a confirmation email
        if i % 2 == 0 {
            let payment_msg = Message::with_generated_id(format!(
                "{{\"paymentId\":\"PAY-{}\", \"orderId\":\"{}\", \"amount\":{}}}",
                i, order_id, amount
            ));
            payment_msg.add_header("type", "payment_processed");
            payment_producer.send(payment_msg).await?;

            let notification_msg = Message::with_generated_id(format!(
                "{{\"type\":\"email\", \"to\":\"user-{}@example.com\", \"subject\":\"Order Confirmed\"}}",
                i
            ));
            notification_msg.add_header("type", "email_notification");
            notification_producer.send(notification_msg).await?;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("\nWaiting for message processing to complete...\n");
    tokio::time::sleep(Duration::from_secs(5)).await;

    println!("\n===== Message Broker Statistics =====");
    for topic in broker.topics().await {
        println!("\nTopic: {}", topic);
        println!("  Messages produced: {}", broker.message_count(&topic).await);
        let groups = broker.consumer_groups(&topic).await;
        println!("  Consumer groups: {:?}", groups);
        for group in groups {
            println!(
                "  Consumer group '{}' lag: {}",
                group,
                broker.consumer_group_lag(&topic, &group).await
            );
        }
    }

    println!("\nShutting down consumers...");
    order_consumer_1.stop_consuming().await;
    order_consumer_2.stop_consuming().await;
    analytics_consumer.stop_consuming().await;
    payment_consumer.stop_consuming().await;
    notification_consumer.stop_consuming().await;

    broker.shutdown().await;
    println!("\nMessage broker demo completed.");
    Ok(())
}
