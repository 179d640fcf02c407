mod common;

use common::RedisTestContext;
use starquery::models::RepoRef;
use starquery::store::KvStore;

async fn setup() -> RedisTestContext {
    RedisTestContext::new().await.expect("Failed to connect to Redis")
}

fn pair(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_ping() {
    let ctx = setup().await;
    ctx.store.ping().await.expect("PING failed");
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_batch_set_then_get() {
    let ctx = setup().await;
    let repo = RepoRef::new("coder", "coder");
    let keys: Vec<String> = ["user1", "user2", "user3"]
        .iter()
        .map(|login| ctx.key(&repo.key(login)))
        .collect();
    let pairs: Vec<(String, String)> = keys.iter().map(|k| pair(k, "true")).collect();

    ctx.store.set_with_expiry(60, &pairs).await.expect("Failed to write batch");

    for key in &keys {
        assert_eq!(ctx.store.get(key).await.unwrap().as_deref(), Some("true"));
    }
    for key in &keys {
        ctx.store.delete(key).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_written_key_carries_ttl() {
    let ctx = setup().await;
    let key = ctx.key("ttl");

    ctx.store.set_with_expiry(120, &[pair(&key, "true")]).await.unwrap();

    let ttl = ctx.ttl(&key).await;
    assert!(ttl > 0 && ttl <= 120, "unexpected TTL {}", ttl);
    ctx.store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_zero_ttl_is_raised_to_minimum() {
    let ctx = setup().await;
    let key = ctx.key("zero-ttl");

    ctx.store.set_with_expiry(0, &[pair(&key, "true")]).await.unwrap();

    assert_eq!(ctx.store.get(&key).await.unwrap().as_deref(), Some("true"));
    assert!(ctx.ttl(&key).await <= 1);
    ctx.store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_missing_key_is_none() {
    let ctx = setup().await;
    assert_eq!(ctx.store.get(&ctx.key("never-written")).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_delete_removes_and_tolerates_absent_keys() {
    let ctx = setup().await;
    let key = ctx.key("delete");

    ctx.store.set_with_expiry(60, &[pair(&key, "true")]).await.unwrap();
    ctx.store.delete(&key).await.expect("Failed to delete key");
    assert_eq!(ctx.store.get(&key).await.unwrap(), None);
    assert_eq!(ctx.ttl(&key).await, -2);

    ctx.store.delete(&key).await.expect("Deleting an absent key failed");
}

#[tokio::test]
#[ignore = "Requires a running Redis"]
async fn test_purge_is_a_noop() {
    let ctx = setup().await;
    assert_eq!(ctx.store.purge_expired().await.unwrap(), 0);
}
