//! items API 服务
//!
//! 提供以下功能：
//! - 健康检查与网关超时测试端点
//! - 数据库配置查看（密码遮蔽）与表列表
//! - items 的创建与查询（PostgreSQL / MySQL / MariaDB / MongoDB）
//! - 数据库不可用时的统一提示页面

pub mod db_log;
pub mod handlers;
pub mod pages;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

use axum::{middleware, routing::get, Json, Router};
use common::middleware::request_id::request_id_middleware;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub use state::AppState;

pub const SERVICE_NAME: &str = "item-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "items API",
        version = "0.1.0",
        description = "健康检查、配置查看与 items CRUD"
    ),
    paths(
        handlers::api_info,
        handlers::get_config,
        handlers::list_tables,
        handlers::health_check,
        handlers::list_items,
        handlers::get_item,
        handlers::create_item,
    ),
    components(schemas(
        common::models::Item,
        common::models::CreateItemRequest,
        common::models::DbKind,
        common::models::MaskedConfig,
        handlers::ApiInfo,
        handlers::Endpoints,
        handlers::ConfigResponse,
        handlers::HealthResponse,
    )),
    tags(
        (name = "items", description = "items 端点"),
        (name = "meta", description = "元信息端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router(state.clone()))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
