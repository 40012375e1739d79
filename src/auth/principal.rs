//! 认证主体（附加到请求扩展，仅在单次请求内存在）

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};
use chrono::{DateTime, Utc};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{error::AppError, models::user_id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Token subject
    pub user_id: String,
    /// Token `iat`
    pub issued_at: DateTime<Utc>,
    pub authenticated: bool,
}

impl Principal {
    pub fn authenticated(user_id: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            issued_at,
            authenticated: true,
        }
    }

    /// Subject parsed as a UUID, when it is one
    pub fn user_uuid(&self) -> Option<Uuid> {
        user_id::from_trimmed(&self.user_id).ok()
    }
}

// 在 handler 中直接提取 Principal；未认证时拒绝
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .filter(|p| p.authenticated)
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

// Option<Principal>：未认证的请求得到 None
impl<S> OptionalFromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Principal>()
            .filter(|p| p.authenticated)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(principal: Option<Principal>) -> Parts {
        let mut req = Request::builder().uri("/").body(()).unwrap();
        if let Some(principal) = principal {
            req.extensions_mut().insert(principal);
        }
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_extract_present_principal() {
        let principal = Principal::authenticated(
            "3fa85f6457174562b3fc2c963f66afa6".to_string(),
            Utc::now(),
        );
        let mut parts = parts_with(Some(principal.clone()));

        let extracted =
            <Principal as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, principal);
        assert!(extracted.user_uuid().is_some());
    }

    #[tokio::test]
    async fn test_extract_missing_principal() {
        let mut parts = parts_with(None);

        let required = <Principal as FromRequestParts<()>>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(required, Err(AppError::Unauthorized)));

        let optional =
            <Principal as OptionalFromRequestParts<()>>::from_request_parts(&mut parts, &())
                .await
                .unwrap();
        assert!(optional.is_none());
    }

    #[test]
    fn test_non_uuid_subject() {
        let principal = Principal::authenticated("not-a-uuid".to_string(), Utc::now());
        assert!(principal.user_uuid().is_none());
    }
}
