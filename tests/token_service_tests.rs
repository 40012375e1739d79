//! 令牌服务集成测试
//!
//! 签发/验证往返、签名篡改、并发冷启动与强制重新生成

use chrono::Utc;
use lightpub_auth::{
    models::user_id,
    store::{MemorySecretStore, SecretStore},
};
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::{create_revalidating_token_service, create_token_service, flip_signature_bit};

#[tokio::test]
async fn test_issue_then_verify_yields_subject() {
    let service = create_token_service(Arc::new(MemorySecretStore::new()));

    for _ in 0..5 {
        let user = user_id::trim(&Uuid::new_v4());
        let token = service.issue(&user).await.unwrap();

        let principal = service
            .verify(&token)
            .await
            .unwrap()
            .expect("freshly issued token must verify");
        assert_eq!(principal.user_id, user);
        assert!(principal.authenticated);
    }
}

#[tokio::test]
async fn test_documented_example() {
    let service = create_token_service(Arc::new(MemorySecretStore::new()));
    let user = "3fa85f6457174562b3fc2c963f66afa6";

    let before = Utc::now();
    let token = service.issue(user).await.unwrap();
    let principal = service.verify(&token).await.unwrap().unwrap();

    assert_eq!(principal.user_id, user);
    assert!(principal.authenticated);
    assert!((principal.issued_at - before).num_seconds().abs() <= 2);
}

#[tokio::test]
async fn test_token_is_compact_jws() {
    let service = create_token_service(Arc::new(MemorySecretStore::new()));
    let token = service.issue("3fa85f6457174562b3fc2c963f66afa6").await.unwrap();

    // JWT 应该是三个部分用点分隔
    let parts: Vec<&str> = token.split('.').collect();
    assert_eq!(parts.len(), 3, "JWT should have 3 parts");
    assert!(parts.iter().all(|p| !p.is_empty()));
}

#[tokio::test]
async fn test_flipped_signature_bit_is_rejected() {
    let service = create_token_service(Arc::new(MemorySecretStore::new()));
    let token = service.issue("3fa85f6457174562b3fc2c963f66afa6").await.unwrap();

    // 2048 位签名，抽样覆盖首尾及中间比特
    for bit in (0..2048).step_by(61).chain([2047]) {
        let tampered = flip_signature_bit(&token, bit);
        assert_ne!(tampered, token);
        assert!(
            service.verify(&tampered).await.unwrap().is_none(),
            "bit {} flip must be rejected",
            bit
        );
    }

    assert!(service.verify(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_cold_start_instances_share_one_pair() {
    let store = Arc::new(MemorySecretStore::new());
    let a = create_token_service(store.clone());
    let b = create_token_service(store.clone());

    let (token_a, token_b) = tokio::join!(a.issue("aaaa"), b.issue("bbbb"));
    let (token_a, token_b) = (token_a.unwrap(), token_b.unwrap());

    assert_eq!(store.len().await, 2, "exactly one key pair persisted");

    // 互相验证对方签发的令牌
    assert_eq!(b.verify(&token_a).await.unwrap().unwrap().user_id, "aaaa");
    assert_eq!(a.verify(&token_b).await.unwrap().unwrap().user_id, "bbbb");
}

#[tokio::test]
async fn test_restart_keeps_tokens_valid() {
    let store = Arc::new(MemorySecretStore::new());
    let token = create_token_service(store.clone()).issue("abc").await.unwrap();

    let restarted = create_token_service(store.clone());
    assert!(restarted.verify(&token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_forced_regeneration_invalidates_old_tokens() {
    let service = create_token_service(Arc::new(MemorySecretStore::new()));
    let old_token = service.issue("abc").await.unwrap();

    service.key_store().regenerate().await.unwrap();

    assert!(service.verify(&old_token).await.unwrap().is_none());

    let new_token = service.issue("abc").await.unwrap();
    assert!(service.verify(&new_token).await.unwrap().is_some());
}

#[tokio::test]
async fn test_regeneration_by_other_instance_reaches_shared_store_peers() {
    let store = Arc::new(MemorySecretStore::new());
    let a = create_revalidating_token_service(store.clone());
    let b = create_revalidating_token_service(store.clone());

    let old_token = a.issue("abc").await.unwrap();
    assert!(b.verify(&old_token).await.unwrap().is_some());

    b.key_store().regenerate().await.unwrap();
    let new_token = b.issue("abc").await.unwrap();

    // A 未手动失效缓存，也不再接受旧令牌
    assert!(a.verify(&old_token).await.unwrap().is_none());
    assert_eq!(a.verify(&new_token).await.unwrap().unwrap().user_id, "abc");

    let from_a = a.issue("def").await.unwrap();
    assert_eq!(b.verify(&from_a).await.unwrap().unwrap().user_id, "def");
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_token_from_other_store_is_rejected() {
    let ours = create_token_service(Arc::new(MemorySecretStore::new()));
    let theirs = create_token_service(Arc::new(MemorySecretStore::new()));

    let foreign = theirs.issue("abc").await.unwrap();
    assert!(ours.verify(&foreign).await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_records_hold_der_key_material() {
    let store = Arc::new(MemorySecretStore::new());
    let service = create_token_service(store.clone());
    service.issue("abc").await.unwrap();

    let private = store.get("privateKey").await.unwrap();
    let public = store.get("publicKey").await.unwrap();

    // DER SEQUENCE 标签
    assert_eq!(private[0], 0x30);
    assert_eq!(public[0], 0x30);
    assert!(lightpub_auth::auth::KeyPair::decode(&private, &public).is_ok());

    let store: Arc<dyn SecretStore> = store;
    assert!(store.health_check().await.is_ok());
}
