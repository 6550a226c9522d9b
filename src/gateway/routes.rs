//! # 路由定义
//!
//! 路由按完整路径注册（而不是 `nest`），处理器拿到的是未剥离前缀、
//! 未做百分号解码的原始 URI 路径。其余路径（包括裸前缀）统一返回 404。

use axum::Router;
use axum::routing::{any, get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

/// 创建网关路由
pub fn create_router(state: AppState) -> Router {
    let prefix = state.prefix().to_string();

    Router::new()
        .route(
            &format!("{prefix}/health"),
            get(handlers::health).fallback(handlers::proxy),
        )
        .route(
            &format!("{prefix}/login"),
            post(handlers::login).fallback(handlers::proxy),
        )
        .route(
            &format!("{prefix}/me"),
            get(handlers::me).fallback(handlers::proxy),
        )
        .route(&format!("{prefix}/{{*path}}"), any(handlers::proxy))
        .fallback(handlers::not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
