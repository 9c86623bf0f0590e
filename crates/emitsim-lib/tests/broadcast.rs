use std::sync::Arc;

use chrono::DateTime;
use emitsim_lib::{
    BroadcastConfig, Broadcaster, ChannelSink, Enqueuer, QueueBackend, QueueDefinition,
    SqliteQueueBackend,
};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn sqlite_queue_replays_at_compressed_time() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(SqliteQueueBackend::open(&dir.path().join("queue.db")).unwrap());
    let enqueuer = Enqueuer::new(backend.clone());
    enqueuer
        .enqueue(
            "adsb",
            "AF123",
            vec![
                (1600.0, "position 3".to_string()),
                (1060.0, "position 1".to_string()),
                (1300.0, "position 2".to_string()),
            ],
        )
        .await
        .unwrap();

    let definition = QueueDefinition::new("adsb", 60.0, DateTime::from_timestamp(1000, 0)).unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let t0 = Instant::now();
    let handle = Broadcaster::new(definition, backend.clone(), Arc::new(sink), BroadcastConfig::default())
        .start()
        .await
        .unwrap();

    for (payload, at) in [("position 1", 1.0), ("position 2", 5.0), ("position 3", 10.0)] {
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.payload, payload);
        assert_eq!(entry.ident, "AF123");
        assert!((t0.elapsed().as_secs_f64() - at).abs() < 0.01);
    }

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.total_sent, 3);
    assert_eq!(backend.len("adsb").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn dequeue_cancels_pending_messages() {
    let backend = Arc::new(SqliteQueueBackend::open_in_memory().unwrap());
    let enqueuer = Enqueuer::new(backend.clone());
    enqueuer
        .enqueue("adsb", "AF123", vec![(1005.0, "cancelled".to_string())])
        .await
        .unwrap();
    enqueuer
        .enqueue("adsb", "BA456", vec![(1008.0, "kept".to_string())])
        .await
        .unwrap();

    let definition = QueueDefinition::new("adsb", 1.0, DateTime::from_timestamp(1000, 0)).unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let handle = Broadcaster::new(definition, backend.clone(), Arc::new(sink), BroadcastConfig::default())
        .start()
        .await
        .unwrap();

    assert_eq!(enqueuer.dequeue("adsb", "AF123").await.unwrap(), 1);
    assert_eq!(rx.recv().await.unwrap().payload, "kept");
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn enqueue_through_another_handle_reaches_running_broadcaster() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");
    let broadcasting = Arc::new(SqliteQueueBackend::open(&path).unwrap());
    let scheduling = Arc::new(SqliteQueueBackend::open(&path).unwrap());
    let local = Enqueuer::new(broadcasting.clone());
    let remote = Enqueuer::new(scheduling.clone());

    local
        .enqueue("adsb", "AF123", vec![(1010.0, "later".to_string())])
        .await
        .unwrap();
    local
        .enqueue("adsb", "KL789", vec![(1012.0, "old slot".to_string())])
        .await
        .unwrap();

    let definition = QueueDefinition::new("adsb", 1.0, DateTime::from_timestamp(1000, 0)).unwrap();
    let (sink, mut rx) = ChannelSink::new();
    let t0 = Instant::now();
    let handle = Broadcaster::new(definition, broadcasting.clone(), Arc::new(sink), BroadcastConfig::default())
        .start()
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    remote
        .enqueue("adsb", "BA456", vec![(1005.0, "sooner".to_string())])
        .await
        .unwrap();
    remote
        .enqueue("adsb", "KL789", vec![(1015.0, "new slot".to_string())])
        .await
        .unwrap();

    for (payload, at) in [("sooner", 5.0), ("later", 10.0), ("new slot", 15.0)] {
        let entry = rx.recv().await.unwrap();
        assert_eq!(entry.payload, payload);
        assert!((t0.elapsed().as_secs_f64() - at).abs() < 0.01, "{payload} at {}", t0.elapsed().as_secs_f64());
    }

    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.total_sent, 3);
    assert_eq!(stats.dropped, 0);
    assert_eq!(scheduling.len("adsb").await.unwrap(), 0);
    assert!(rx.try_recv().is_err());
}
