//! Record HTTP Routes
//!
//! - `GET /records?userName=` - records of one user
//! - `GET /records-page?num=&cursor=` - one page, next cursor in `X-Cursor`
//! - `POST /records` - store a record, BMI computed server-side
//! - `DELETE /records/:id` - delete one record

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
    Extension, Json, Router,
};
use tracing::debug;

use crate::context::RequestContext;
use crate::domain::{BmiRecord, CreateRecordRequest, DomainError};
use crate::service::RecordService;

use super::errors::{ApiError, ApiResult};

/// Page size used when `num` is missing, unparsable or zero
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Response header carrying the next page cursor
pub const CURSOR_HEADER: &str = "X-Cursor";

// ==================
// Shared State
// ==================

/// Record routes state shared across handlers
#[derive(Clone)]
pub struct RecordState {
    pub service: Arc<dyn RecordService>,
    pub request_timeout: Duration,
}

impl RecordState {
    pub fn new(service: Arc<dyn RecordService>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }
}

// ==================
// Record Routes
// ==================

/// Create record routes
pub fn record_routes(state: RecordState) -> Router {
    Router::new()
        .route("/records", get(get_by_name_handler).post(store_handler))
        .route("/records-page", get(fetch_handler))
        .route("/records/:id", delete(delete_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            request_deadline,
        ))
        .with_state(state)
}

/// Attach a fresh deadline-bearing context to every request
async fn request_deadline(
    State(state): State<RecordState>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::with_timeout(state.request_timeout);
    debug!(request_id = %ctx.request_id, uri = %request.uri(), "request context attached");
    request.extensions_mut().insert(ctx);
    next.run(request).await
}

fn parse_page_size(raw: Option<&String>) -> u32 {
    raw.and_then(|s| s.parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

// ==================
// Handlers
// ==================

async fn fetch_handler(
    State(state): State<RecordState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let num = parse_page_size(query.get("num"));
    let cursor = query.get("cursor").map(String::as_str).unwrap_or_default();

    let (records, next_cursor) = state.service.fetch(&ctx, cursor, num).await?;
    Ok((StatusCode::OK, [(CURSOR_HEADER, next_cursor)], Json(records)).into_response())
}

async fn get_by_name_handler(
    State(state): State<RecordState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<BmiRecord>>> {
    let name = query.get("userName").map(String::as_str).unwrap_or_default();

    let records = state.service.get_by_name(&ctx, name).await?;
    Ok(Json(records))
}

async fn store_handler(
    State(state): State<RecordState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CreateRecordRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BmiRecord>)> {
    let Json(request) = payload.map_err(|e| ApiError::UnprocessableBody(e.body_text()))?;
    request.validate().map_err(ApiError::UnprocessableBody)?;

    let mut record = request.into_record();
    state.service.store(&ctx, &mut record).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn delete_handler(
    State(state): State<RecordState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = id
        .parse::<i64>()
        .map_err(|_| ApiError::from(DomainError::NotFound))?;

    state.service.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
