//! 路由模块
//!
//! `/ok`, `/gateway-timeout` and `/api/health` never depend on the database.
//! Every other route sits behind [`require_database`].

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};

use crate::handlers;
use crate::pages;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let database_routes = Router::new()
        .route("/", get(pages::index))
        .route("/sample", get(pages::sample))
        .route("/api", get(handlers::api_info))
        .route("/api/config", get(handlers::get_config))
        .route("/api/tables", get(handlers::list_tables))
        .route("/api/items", get(handlers::list_items).post(handlers::create_item))
        .route("/api/items/{id}", get(handlers::get_item))
        .route_layer(middleware::from_fn_with_state(state, require_database));

    Router::new()
        .route("/ok", get(pages::ok))
        .route("/gateway-timeout", get(pages::gateway_timeout))
        .route("/api/health", get(handlers::health_check))
        .merge(database_routes)
}

/// Acquires and pings the store before the handler runs. On failure the
/// unreachable page is returned instead; on success the handle is passed to
/// the handler as an extension.
pub async fn require_database(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.stores.acquire_live().await {
        Ok(store) => {
            req.extensions_mut().insert(store);
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(path = %req.uri().path(), error = %e, "access denied: database unavailable");
            pages::unreachable_response(&state)
        }
    }
}
