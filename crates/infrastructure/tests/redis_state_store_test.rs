use std::time::Duration;

use pipeline_core::{config::StateStoreConfig, StateStore};
use pipeline_infrastructure::RedisStateStore;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::redis::Redis;

#[tokio::test]
#[ignore] // 需要Docker环境
async fn test_redis_lock_semantics() {
    let container = Redis::default().start().await.unwrap();
    let port = container.get_host_port_ipv4(6379).await.unwrap();
    let config = StateStoreConfig {
        backend: "redis".to_string(),
        url: format!("redis://127.0.0.1:{port}"),
        key_prefix: "test".to_string(),
        command_timeout_ms: 2000,
        ..StateStoreConfig::default()
    };
    let store = RedisStateStore::connect(&config).await.unwrap();

    let ttl = Duration::from_secs(30);
    assert!(store.set_if_absent("lock:job:a", "run-1", ttl).await.unwrap());
    assert!(!store.set_if_absent("lock:job:a", "run-2", ttl).await.unwrap());
    assert_eq!(
        store.get("lock:job:a").await.unwrap().as_deref(),
        Some("run-1")
    );

    assert!(!store.delete_if_equals("lock:job:a", "run-2").await.unwrap());
    assert!(store.delete_if_equals("lock:job:a", "run-1").await.unwrap());
    assert!(!store.exists("lock:job:a").await.unwrap());

    store
        .set("short", "v", Duration::from_millis(200))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(store.get("short").await.unwrap(), None);

    assert!(!store.delete("missing").await.unwrap());
    store.ping().await.unwrap();
}
