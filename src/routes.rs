//! 路由注册
//! 创建所有 API 路由并按固定顺序应用中间件

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;

use crate::{auth::authentication_gate, handlers, middleware::AppState};

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 需要认证主体的端点
    let auth_routes = Router::new().route("/auth/me", get(handlers::auth::me));

    let router = Router::new().merge(public_routes).merge(auth_routes);

    with_middleware(router, &state).with_state(state)
}

/// 应用中间件栈，自外向内：请求追踪 → 认证闸门
///
/// The gate runs for every route: an invalid bearer token is rejected even on
/// public endpoints, while requests without one pass through.
pub fn with_middleware<S>(router: Router<S>, state: &AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(crate::middleware::request_tracking_middleware))
            .layer(middleware::from_fn_with_state(
                state.token_service.clone(),
                authentication_gate,
            )),
    )
}
