//! HTML pages and the unreachable fallback.

use askama::Template;
use axum::{
    extract::{Extension, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
};

use common::models::{DbKind, MaskedConfig, TableDescriptor};
use crate::db_log::LogEntry;
use crate::service::{ItemService, ItemServiceTrait};
use crate::state::AppState;
use crate::store::SharedStore;

/// Header marking responses served while the database is unavailable.
pub static SERVICE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-service-status");

/// Landing page listing the tables of the connected store.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    kind: DbKind,
    tables: Vec<TableDescriptor>,
}

#[derive(Template)]
#[template(path = "sample.html")]
struct SampleTemplate;

/// Page shown whenever the database is needed but unavailable.
#[derive(Template)]
#[template(path = "unreachable.html")]
struct UnreachableTemplate {
    rows: Vec<(&'static str, String)>,
    log: Vec<LogEntry>,
}

/// Wrapper to render Askama templates as Axum responses.
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Renders the unreachable document. The output depends only on the
/// configuration and the connection log, never on the request path.
pub fn render_unreachable(config: &MaskedConfig, log: &[LogEntry]) -> Result<String, askama::Error> {
    UnreachableTemplate {
        rows: config
            .entries()
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect(),
        log: log.to_vec(),
    }
    .render()
}

/// Full fallback response: 503, HTML body, `X-Service-Status: unavailable`.
pub fn unreachable_response(state: &AppState) -> Response {
    let stores = &state.stores;
    let body = match render_unreachable(&stores.descriptor().masked(), &stores.log().entries()) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(error = %err, "Template render failed");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let mut response = (StatusCode::SERVICE_UNAVAILABLE, Html(body)).into_response();
    response
        .headers_mut()
        .insert(SERVICE_STATUS_HEADER.clone(), HeaderValue::from_static("unavailable"));
    response
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    Extension(store): Extension<SharedStore>,
) -> Response {
    let kind = store.kind();
    match ItemService::new(store).tables().await {
        Ok(tables) => HtmlTemplate(IndexTemplate { kind, tables }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "listing tables for index page failed");
            unreachable_response(&state)
        }
    }
}

/// `GET /sample`
pub async fn sample() -> impl IntoResponse {
    HtmlTemplate(SampleTemplate)
}

/// `GET /ok`
pub async fn ok() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "OK")
}

/// `GET /gateway-timeout`
pub async fn gateway_timeout() -> impl IntoResponse {
    (
        StatusCode::GATEWAY_TIMEOUT,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Gateway Timeout",
    )
}
