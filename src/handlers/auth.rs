//! 认证相关的 HTTP 处理器

use axum::Json;
use serde::Serialize;

use crate::auth::Principal;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
}

/// 当前用户
pub async fn me(principal: Principal) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: principal.user_id,
    })
}
