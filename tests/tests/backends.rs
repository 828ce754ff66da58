//! Tests against real Redis and Postgres.
//!
//! Requires Docker for the testcontainers, or `PIPELINE_TEST_REDIS_URL` and
//! `PIPELINE_TEST_DATABASE_URL` pointing at running servers. Run with
//! `cargo test -p integration-tests --test backends -- --ignored`.

use integration_tests::{containers::TestContainers, fixtures};
use pipeline_core::{PersistableEvent, RawEvent};
use queue::{EventQueue, Popped, QueueConfig, RedisQueue};
use std::sync::Arc;
use std::time::Duration;
use storage::{schema::ensure_schema, EventSink, PgEventSink, StorageClient, StorageConfig};
use uuid::Uuid;
use worker::{Shutdown, Worker, WorkerConfig};

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

async fn redis_queue(containers: &TestContainers, queue_name: &str) -> RedisQueue {
    RedisQueue::connect(QueueConfig {
        redis_url: containers.redis_url.clone(),
        queue_name: queue_name.to_string(),
    })
    .await
    .expect("Failed to connect to Redis")
}

async fn connect_storage(containers: &TestContainers, table: &str) -> StorageClient {
    let client = StorageClient::connect(StorageConfig {
        database_url: containers.database_url.clone(),
        table: table.to_string(),
        ..StorageConfig::default()
    })
    .await
    .expect("Failed to connect to Postgres");

    ensure_schema(&client).await.expect("Failed to create schema");
    client
}

async fn count_rows(client: &StorageClient) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {}", client.config().table);
    sqlx::query_scalar(&sql)
        .fetch_one(client.pool())
        .await
        .expect("Failed to count rows")
}

fn persistable(user: &str, label: &str) -> PersistableEvent {
    let event = RawEvent::new("$pageview", user);
    PersistableEvent {
        user_id: user.to_string(),
        session_id: "global".to_string(),
        semantic_label: label.to_string(),
        raw_payload: event.to_payload().unwrap(),
        created_at: event.timestamp,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_queue_is_fifo() {
    let containers = TestContainers::start().await;
    let queue = redis_queue(&containers, &unique("events")).await;

    for i in 0..3 {
        queue
            .push(&RawEvent::new("$pageview", format!("user-{}", i)))
            .await
            .expect("Push failed");
    }

    for i in 0..3 {
        match queue.pop(Duration::from_secs(1)).await.expect("Pop failed") {
            Popped::Event(event) => assert_eq!(event.distinct_id, format!("user-{}", i)),
            other => panic!("expected event, got {:?}", other),
        }
    }

    let empty = queue.pop(Duration::from_millis(100)).await.expect("Pop failed");
    assert!(empty.is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_queue_discards_malformed_payloads() {
    let containers = TestContainers::start().await;
    let name = unique("events");
    let queue = redis_queue(&containers, &name).await;

    queue.push_raw(&name, "{not json").await.expect("Push failed");

    let popped = queue.pop(Duration::from_secs(1)).await.expect("Pop failed");
    assert_eq!(popped, Popped::Discarded);
    assert!(queue.pop(Duration::from_millis(100)).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_push_many_and_close() {
    let containers = TestContainers::start().await;
    let queue = redis_queue(&containers, &unique("events")).await;
    let dlq = unique("events_dlq");

    let payloads = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    queue.push_raw_many(&dlq, &payloads).await.expect("Pipelined push failed");

    let depth = queue::health::queue_depth(queue.config(), &dlq).await;
    assert_eq!(depth, Some(3));

    queue.close().await;
    queue.close().await;
    assert!(queue.pop(Duration::from_millis(100)).await.is_err());
    assert!(queue.push_raw(&dlq, "d").await.is_err());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_sink_commits_batch() {
    let containers = TestContainers::start().await;
    let client = connect_storage(&containers, &unique("events")).await;
    let sink = PgEventSink::new(client.clone());

    let batch = vec![persistable("u1", "Viewed page: /a"), persistable("u2", "Viewed page: /b")];
    assert_eq!(sink.commit(&batch).await.expect("Commit failed"), 2);
    assert_eq!(sink.commit(&[]).await.expect("Empty commit failed"), 0);

    assert_eq!(count_rows(&client).await, 2);
    assert!(storage::health::check_connection(&client).await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_sink_is_all_or_nothing() {
    let containers = TestContainers::start().await;
    let client = connect_storage(&containers, &unique("events")).await;

    let constraint = format!(
        "ALTER TABLE {} ADD CONSTRAINT no_poison CHECK (semantic_label <> 'poison')",
        client.config().table
    );
    sqlx::query(&constraint).execute(client.pool()).await.unwrap();

    let sink = PgEventSink::new(client.clone());
    let batch = vec![
        persistable("u1", "ok"),
        persistable("u2", "poison"),
        persistable("u3", "ok"),
    ];

    let err = sink.commit(&batch).await.expect_err("Constraint violation must fail the batch");
    assert_eq!(err.code(), "DB_001");
    assert_eq!(count_rows(&client).await, 0, "No partial batch may be visible");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_worker_end_to_end() {
    let containers = TestContainers::start().await;
    let name = unique("events");
    let queue = Arc::new(redis_queue(&containers, &name).await);
    let client = connect_storage(&containers, &unique("events")).await;

    for i in 0..3 {
        let payload = fixtures::pageview(&format!("user-{}", i), "/pricing").to_string();
        queue.push_raw(&name, &payload).await.unwrap();
    }

    let config = WorkerConfig {
        batch_size: 2,
        dlq_name: unique("events_dlq"),
        ..WorkerConfig::default()
    };
    let worker = Worker::new(queue.clone(), Arc::new(PgEventSink::new(client.clone())), config);

    let (shutdown, signal) = Shutdown::new();
    let handle = tokio::spawn(worker.run(signal));

    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.trigger();
    let stats = handle.await.expect("Worker panicked");

    assert_eq!(stats.events_committed, 3);
    assert_eq!(count_rows(&client).await, 3);

    let sql = format!(
        "SELECT semantic_label FROM {} ORDER BY id",
        client.config().table
    );
    let labels: Vec<String> = sqlx::query_scalar(&sql).fetch_all(client.pool()).await.unwrap();
    assert!(labels.iter().all(|l| l == "Viewed page: /pricing"));
}
