//! Handler模块

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use common::errors::AppError;
use common::models::{CreateItemRequest, DbKind, Item, MaskedConfig};
use crate::service::{ItemService, ItemServiceTrait};
use crate::state::AppState;
use crate::store::SharedStore;

/// API 元信息
#[utoipa::path(
    get,
    path = "/api",
    tag = "meta",
    responses(
        (status = 200, description = "API 元信息", body = ApiInfo)
    )
)]
pub async fn api_info() -> Json<ApiInfo> {
    Json(ApiInfo {
        message: "API Server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            config: "GET /api/config",
            tables: "GET /api/tables",
            health: "GET /api/health",
            items: "GET /api/items",
            items_by_id: "GET /api/items/:id",
            create_item: "POST /api/items",
        },
    })
}

/// 当前数据库配置（密码已遮蔽）
#[utoipa::path(
    get,
    path = "/api/config",
    tag = "meta",
    responses(
        (status = 200, description = "数据库配置", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let descriptor = state.stores.descriptor();
    Json(ConfigResponse {
        db_type: descriptor.kind,
        configured: descriptor.is_configured(),
        env: descriptor.masked(),
    })
}

/// 列出数据库中的表（或集合）
#[utoipa::path(
    get,
    path = "/api/tables",
    tag = "items",
    responses(
        (status = 200, description = "表名列表", body = Vec<String>),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn list_tables(
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<String>>, AppError> {
    let tables = ItemService::new(store).tables().await?;
    Ok(Json(tables.into_iter().map(|t| t.name).collect()))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "健康状态，status 反映数据库 ping 结果", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.stores.ping().await { "ok" } else { "unavailable" };
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// 列出所有 items
#[utoipa::path(
    get,
    path = "/api/items",
    tag = "items",
    responses(
        (status = 200, description = "item 列表", body = Vec<Item>),
        (status = 503, description = "数据库不可用")
    )
)]
pub async fn list_items(
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<Item>>, AppError> {
    let items = ItemService::new(store).list().await?;
    Ok(Json(items))
}

/// 根据 ID 获取 item
#[utoipa::path(
    get,
    path = "/api/items/{id}",
    tag = "items",
    params(
        ("id" = String, Path, description = "item ID")
    ),
    responses(
        (status = 200, description = "item 详情", body = Item),
        (status = 404, description = "item 未找到")
    )
)]
pub async fn get_item(
    Extension(store): Extension<SharedStore>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let item = ItemService::new(store).get(&id).await?;
    Ok(Json(item))
}

/// 创建 item
///
/// A body that is not a JSON object with a non-empty string `name` is a
/// validation error.
#[utoipa::path(
    post,
    path = "/api/items",
    tag = "items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "item 已创建", body = Item),
        (status = 400, description = "name 缺失或为空")
    )
)]
pub async fn create_item(
    Extension(store): Extension<SharedStore>,
    body: Bytes,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let req: CreateItemRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error = %e, "malformed item body");
        AppError::Validation(format!("invalid JSON body: {e}"))
    })?;
    let item = ItemService::new(store).create(req).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// API 元信息响应
#[derive(Serialize, ToSchema)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Endpoints,
}

/// 可用端点
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub config: &'static str,
    pub tables: &'static str,
    pub health: &'static str,
    pub items: &'static str,
    pub items_by_id: &'static str,
    pub create_item: &'static str,
}

/// 配置响应
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// 解析后的数据库类型
    pub db_type: DbKind,
    /// 是否具备连接所需的配置
    pub configured: bool,
    /// 环境变量（密码已遮蔽）
    pub env: MaskedConfig,
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" 或 "unavailable"
    pub status: String,
    /// 当前时间戳
    pub timestamp: String,
}
