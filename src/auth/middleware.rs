//! JWT 认证中间件
//!
//! Per-request gate. A request either passes through without a principal
//! (no bearer credential), passes through with a [`Principal`] in its
//! extensions (valid token), or is rejected with 401 before any downstream
//! handler runs (invalid token).

use crate::{auth::jwt::TokenService, auth::principal::Principal, error::AppError};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const BEARER_PREFIX: &[u8] = b"Bearer ";

/// 从 Authorization 头提取令牌原始字节；无头或非 Bearer 方案视为无凭据
///
/// The prefix is matched on raw bytes so a Bearer credential carrying
/// non-UTF-8 bytes is still treated as a credential.
pub fn extract_token(headers: &HeaderMap) -> Option<&[u8]> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.as_bytes().strip_prefix(BEARER_PREFIX))
}

/// 认证闸门
pub async fn authentication_gate(
    State(token_service): State<Arc<TokenService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential = extract_token(req.headers())
        .map(|raw| std::str::from_utf8(raw).map(str::to_owned));

    let token = match credential {
        None => {
            metrics::counter!("auth_gate_requests_total", "outcome" => "anonymous").increment(1);
            return Ok(next.run(req).await);
        }
        Some(Err(_)) => {
            metrics::counter!("auth_gate_requests_total", "outcome" => "rejected").increment(1);
            tracing::debug!("Bearer token is not valid UTF-8");
            return Err(AppError::InvalidAuthentication);
        }
        Some(Ok(token)) => token,
    };

    let principal = match token_service.verify(&token).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            metrics::counter!("auth_gate_requests_total", "outcome" => "rejected").increment(1);
            return Err(AppError::InvalidAuthentication);
        }
        Err(e) => {
            metrics::counter!("auth_gate_requests_total", "outcome" => "error").increment(1);
            return Err(AppError::KeyStore(e));
        }
    };

    metrics::counter!("auth_gate_requests_total", "outcome" => "authenticated").increment(1);
    tracing::debug!(user_id = %principal.user_id, "Request authenticated");

    // 附加到请求扩展
    req.extensions_mut().insert::<Principal>(principal);

    Ok(next.run(req).await)
}
