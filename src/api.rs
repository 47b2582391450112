// DDS Ledger - HTTP boundary
//
// JSON API under /api plus the urlencoded form routes the HTML screens post
// to (those answer with 303 redirects). Every request runs as one unit of
// work: one SQLite transaction on a blocking worker, committed on success
// and rolled back on any error.

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::in_transaction;
use crate::error::{DdsError, Result};
use crate::filter::EntryQuery;
use crate::models::{
    Category, EntryInput, FlowType, RefCatalog, ResolvedEntry, Status, Subcategory,
};
use crate::{entries, reference};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` inside one transaction on a blocking worker thread.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().map_err(|_| {
                DdsError::Unavailable("database connection lock poisoned".to_string())
            })?;
            in_transaction(&mut conn, f)
        })
        .await
        .map_err(|e| DdsError::Unavailable(format!("database worker failed: {e}")))?
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(err: &DdsError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            kind: Some(error_kind(err).to_string()),
        }
    }
}

fn error_kind(err: &DdsError) -> &'static str {
    match err {
        DdsError::ReferenceNotFound { .. } => "ReferenceNotFound",
        DdsError::EntryNotFound(_) => "EntryNotFound",
        DdsError::DuplicateName { .. } => "DuplicateName",
        DdsError::InvalidAmount(_) => "InvalidAmount",
        DdsError::InvalidFilter(_) => "InvalidFilter",
        DdsError::InvalidName => "InvalidName",
        DdsError::InvalidDate(_) => "InvalidDate",
        DdsError::InvalidBody(_) => "InvalidBody",
        DdsError::HierarchyMismatch(_) => "HierarchyMismatch",
        DdsError::Storage(_) => "Storage",
        DdsError::Unavailable(_) => "Unavailable",
    }
}

fn status_code(err: &DdsError) -> StatusCode {
    match err {
        DdsError::ReferenceNotFound { .. }
        | DdsError::InvalidFilter(_)
        | DdsError::InvalidName => StatusCode::BAD_REQUEST,
        DdsError::EntryNotFound(_) => StatusCode::NOT_FOUND,
        DdsError::DuplicateName { .. } => StatusCode::CONFLICT,
        DdsError::InvalidAmount(_)
        | DdsError::InvalidDate(_)
        | DdsError::InvalidBody(_)
        | DdsError::HierarchyMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DdsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DdsError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for DdsError {
    fn into_response(self) -> Response {
        if self.is_retryable() {
            tracing::error!(error = %self, "request failed");
        }
        (status_code(&self), Json(ApiResponse::failure(&self))).into_response()
    }
}

// Extractor failures (bad date, non-numeric amount, missing field) keep the envelope
impl From<JsonRejection> for DdsError {
    fn from(rejection: JsonRejection) -> Self {
        DdsError::InvalidBody(rejection.body_text())
    }
}

impl From<FormRejection> for DdsError {
    fn from(rejection: FormRejection) -> Self {
        DdsError::InvalidBody(rejection.body_text())
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NameForm {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub type_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryForm {
    pub name: String,
    pub category_id: i64,
}

// ============================================================================
// Reference handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/statuses
async fn get_statuses(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Status>>>> {
    let statuses = state.run(reference::list_statuses).await?;
    Ok(Json(ApiResponse::ok(statuses)))
}

/// GET /api/types
async fn get_types(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<FlowType>>>> {
    let types = state.run(reference::list_types).await?;
    Ok(Json(ApiResponse::ok(types)))
}

/// GET /api/categories/:type_id
async fn get_categories(
    State(state): State<AppState>,
    Path(type_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = state
        .run(move |conn| reference::list_categories(conn, type_id))
        .await?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// GET /api/subcategories/:category_id
async fn get_subcategories(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Subcategory>>>> {
    let subcategories = state
        .run(move |conn| reference::list_subcategories(conn, category_id))
        .await?;
    Ok(Json(ApiResponse::ok(subcategories)))
}

/// GET /api/refs - everything the reference-management screen lists
async fn get_catalog(State(state): State<AppState>) -> Result<Json<ApiResponse<RefCatalog>>> {
    let catalog = state.run(reference::reference_catalog).await?;
    Ok(Json(ApiResponse::ok(catalog)))
}

/// POST /api/statuses
async fn post_status(
    State(state): State<AppState>,
    body: Result<Json<NameForm>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = body?;
    let status = state
        .run(move |conn| reference::create_status(conn, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(status))))
}

/// POST /api/types
async fn post_type(
    State(state): State<AppState>,
    body: Result<Json<NameForm>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = body?;
    let flow_type = state
        .run(move |conn| reference::create_type(conn, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(flow_type))))
}

/// POST /api/categories
async fn post_category(
    State(state): State<AppState>,
    body: Result<Json<CategoryForm>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = body?;
    let category = state
        .run(move |conn| reference::create_category(conn, &body.name, body.type_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(category))))
}

/// POST /api/subcategories
async fn post_subcategory(
    State(state): State<AppState>,
    body: Result<Json<SubcategoryForm>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = body?;
    let subcategory = state
        .run(move |conn| reference::create_subcategory(conn, &body.name, body.category_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(subcategory))))
}

// ============================================================================
// Entry handlers
// ============================================================================

/// GET /api/entries?date_from=&date_to=&status_id=&type_id=&category_id=&subcategory_id=&order=
async fn get_entries(
    State(state): State<AppState>,
    Query(query): Query<EntryQuery>,
) -> Result<Json<ApiResponse<Vec<ResolvedEntry>>>> {
    let (filter, order) = query.parse()?;
    let entries = state
        .run(move |conn| entries::list_entries(conn, &filter, order))
        .await?;
    Ok(Json(ApiResponse::ok(entries)))
}

/// GET /api/entries/:id
async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ResolvedEntry>>> {
    let entry = state
        .run(move |conn| entries::get_entry(conn, id)?.ok_or(DdsError::EntryNotFound(id)))
        .await?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// POST /api/entries
async fn post_entry(
    State(state): State<AppState>,
    input: Result<Json<EntryInput>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(input) = input?;
    let entry = state
        .run(move |conn| entries::create_entry(conn, input))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(entry))))
}

/// PUT /api/entries/:id
async fn put_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    input: Result<Json<EntryInput>, JsonRejection>,
) -> Result<Json<ApiResponse<ResolvedEntry>>> {
    let Json(input) = input?;
    let entry = state
        .run(move |conn| entries::update_entry(conn, id, input))
        .await?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// DELETE /api/entries/:id
async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<i64>>> {
    state.run(move |conn| entries::delete_entry(conn, id)).await?;
    Ok(Json(ApiResponse::ok(id)))
}

// ============================================================================
// Form handlers (redirect after post)
// ============================================================================

/// POST /add
async fn form_add_entry(
    State(state): State<AppState>,
    input: Result<Form<EntryInput>, FormRejection>,
) -> Result<Redirect> {
    let Form(input) = input?;
    state
        .run(move |conn| entries::create_entry(conn, input))
        .await?;
    Ok(Redirect::to("/"))
}

/// POST /edit/:id
async fn form_edit_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    input: Result<Form<EntryInput>, FormRejection>,
) -> Result<Redirect> {
    let Form(input) = input?;
    state
        .run(move |conn| entries::update_entry(conn, id, input))
        .await?;
    Ok(Redirect::to("/"))
}

/// POST /delete/:id
async fn form_delete_entry(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Redirect> {
    state.run(move |conn| entries::delete_entry(conn, id)).await?;
    Ok(Redirect::to("/"))
}

/// POST /add_status
async fn form_add_status(
    State(state): State<AppState>,
    form: Result<Form<NameForm>, FormRejection>,
) -> Result<Redirect> {
    let Form(form) = form?;
    state
        .run(move |conn| reference::create_status(conn, &form.name))
        .await?;
    Ok(Redirect::to("/manage_refs"))
}

/// POST /add_type
async fn form_add_type(
    State(state): State<AppState>,
    form: Result<Form<NameForm>, FormRejection>,
) -> Result<Redirect> {
    let Form(form) = form?;
    state
        .run(move |conn| reference::create_type(conn, &form.name))
        .await?;
    Ok(Redirect::to("/manage_refs"))
}

/// POST /add_category
async fn form_add_category(
    State(state): State<AppState>,
    form: Result<Form<CategoryForm>, FormRejection>,
) -> Result<Redirect> {
    let Form(form) = form?;
    state
        .run(move |conn| reference::create_category(conn, &form.name, form.type_id))
        .await?;
    Ok(Redirect::to("/manage_refs"))
}

/// POST /add_subcategory
async fn form_add_subcategory(
    State(state): State<AppState>,
    form: Result<Form<SubcategoryForm>, FormRejection>,
) -> Result<Redirect> {
    let Form(form) = form?;
    state
        .run(move |conn| reference::create_subcategory(conn, &form.name, form.category_id))
        .await?;
    Ok(Redirect::to("/manage_refs"))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/statuses", get(get_statuses).post(post_status))
        .route("/types", get(get_types).post(post_type))
        .route("/categories", post(post_category))
        .route("/categories/:type_id", get(get_categories))
        .route("/subcategories", post(post_subcategory))
        .route("/subcategories/:category_id", get(get_subcategories))
        .route("/refs", get(get_catalog))
        .route("/entries", get(get_entries).post(post_entry))
        .route(
            "/entries/:id",
            get(get_entry).put(put_entry).delete(delete_entry),
        );

    let form_routes = Router::new()
        .route("/add", post(form_add_entry))
        .route("/edit/:id", post(form_edit_entry))
        .route("/delete/:id", post(form_delete_entry))
        .route("/add_status", post(form_add_status))
        .route("/add_type", post(form_add_type))
        .route("/add_category", post(form_add_category))
        .route("/add_subcategory", post(form_add_subcategory));

    Router::new()
        .nest("/api", api_routes)
        .merge(form_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
