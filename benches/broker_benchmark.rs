use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use tokio_membroker::{handler_fn, Broker, BrokerConfig, Message, MessageResult};

static TOPIC_SEQ: AtomicU32 = AtomicU32::new(0);

fn unique_topic(prefix: &str) -> String {
    format!("{}_{}", prefix, TOPIC_SEQ.fetch_add(1, Ordering::Relaxed))
}

async fn publish_individual(broker: &Broker, topic: &str, count: usize) {
    broker.create_topic(topic).await;
    let producer = broker.create_producer(topic).await.unwrap();
    for i in 0..count {
        producer
            .send(Message::new(format!("m-{}", i), "payload"))
            .await
            .unwrap();
    }
}

async fn publish_and_consume(broker: &Broker, topic: &str, count: usize) {
    broker.create_topic(topic).await;
    broker.create_consumer_group(topic, "bench").await.unwrap();
    let consumer = broker.create_consumer(topic, "bench", "c1").await.unwrap();
    consumer.set_message_handler(handler_fn(|_msg: &Message| MessageResult::Success));
    consumer.start_consuming();

    let producer = broker.create_producer(topic).await.unwrap();
    for i in 0..count {
        producer
            .send(Message::new(format!("m-{}", i), "payload"))
            .await
            .unwrap();
    }

    while consumer.processed_message_count() < count as u64 {
        tokio::time::sleep(Duration::from_micros(200)).await;
    }
    consumer.stop_consuming().await;
}

fn bench_publish(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let broker = Broker::new();
    let count = 1000;

    let mut group = c.benchmark_group("Publish");

    group.bench_function(BenchmarkId::new("Individual", count), |b| {
        b.to_async(&rt).iter(|| async {
            let topic = unique_topic("pub_ind");
            publish_individual(&broker, &topic, count).await;
        })
    });

    group.finish();
}

fn bench_consume(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let config = BrokerConfig {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let broker = Broker::with_config(config);
    let count = 1000;

    let mut group = c.benchmark_group("Consume");
    group.sample_size(10);

    group.bench_function(BenchmarkId::new("EndToEnd", count), |b| {
        b.to_async(&rt).iter(|| async {
            let topic = unique_topic("e2e");
            publish_and_consume(&broker, &topic, count).await;
        })
    });

    group.finish();
}

criterion_group!(benches, bench_publish, bench_consume);
criterion_main!(benches);
