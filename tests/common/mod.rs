//! 测试公共模块
//! 提供令牌服务、应用状态和响应解析辅助函数

#![allow(dead_code)]

use axum::{body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use lightpub_auth::{
    auth::{KeyStore, TokenService},
    middleware::AppState,
    store::{MemorySecretStore, SecretStore},
};
use std::sync::Arc;
use std::time::Duration;

/// 存储调用超时；RSA 生成期间并发调用需要等锁
pub const TEST_STORE_TIMEOUT: Duration = Duration::from_secs(30);

pub fn create_token_service(store: Arc<dyn SecretStore>) -> Arc<TokenService> {
    let key_store = Arc::new(KeyStore::new(store, TEST_STORE_TIMEOUT));
    Arc::new(TokenService::new(key_store))
}

/// 缓存每次都与存储核对的令牌服务
pub fn create_revalidating_token_service(store: Arc<dyn SecretStore>) -> Arc<TokenService> {
    let key_store =
        Arc::new(KeyStore::new(store, TEST_STORE_TIMEOUT).with_revalidate_interval(Duration::ZERO));
    Arc::new(TokenService::new(key_store))
}

/// 基于指定存储创建测试应用状态
pub fn create_app_state_with_store(store: Arc<dyn SecretStore>, timeout: Duration) -> Arc<AppState> {
    let key_store = Arc::new(KeyStore::new(store, timeout));
    let token_service = Arc::new(TokenService::new(key_store.clone()));

    Arc::new(AppState {
        key_store,
        token_service,
    })
}

/// 创建基于内存存储的测试应用状态
pub fn create_test_app_state() -> Arc<AppState> {
    create_app_state_with_store(Arc::new(MemorySecretStore::new()), TEST_STORE_TIMEOUT)
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header("authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// 翻转签名段中的一个比特
pub fn flip_signature_bit(token: &str, bit: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    let (signed, signature) = token.rsplit_once('.').unwrap();
    let mut raw = URL_SAFE_NO_PAD.decode(signature).unwrap();
    raw[bit / 8] ^= 1 << (bit % 8);
    format!("{}.{}", signed, URL_SAFE_NO_PAD.encode(raw))
}
