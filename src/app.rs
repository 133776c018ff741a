use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::downloader;
use crate::project::{self, ProjectSheet, QuoteError};
use crate::quotation::{QuotationRow, QuotationTable, SheetLayout, coerce_number};
use crate::retry::RetryingStore;
use crate::saving::FileWorkbook;
use crate::store::{SheetStore, StoreError};
use crate::terms::Terms;

type DynStore = Box<dyn SheetStore + Send>;

/// Local editing state of one open project.
#[derive(Clone, Debug)]
pub struct ProjectSession {
    pub table: QuotationTable,
    pub unsaved_changes: bool,
    pub loaded_at: DateTime<Utc>,
}

impl ProjectSession {
    fn new(table: QuotationTable) -> Self {
        ProjectSession {
            table,
            unsaved_changes: false,
            loaded_at: Utc::now(),
        }
    }
}

/// Everything a request handler may touch. Store calls are serialized by its mutex.
pub struct AppState {
    store: Mutex<DynStore>,
    layout: SheetLayout,
    sessions: Mutex<HashMap<String, ProjectSession>>,
}

impl AppState {
    pub fn new(store: DynStore, layout: SheetLayout) -> Self {
        AppState {
            store: Mutex::new(store),
            layout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn store(&self) -> MutexGuard<'_, DynStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, ProjectSession>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn session(&self, name: &str) -> Option<ProjectSession> {
        self.sessions().get(name).cloned()
    }

    fn load_table(&self, name: &str) -> Result<QuotationTable, QuoteError> {
        let mut store = self.store();
        let sheet = ProjectSheet::open(&mut **store, &self.layout, name)?;
        sheet.load_table()
    }

    /// The session for `name`, loading it from the store the first time.
    fn ensure_session(&self, name: &str) -> Result<ProjectSession, QuoteError> {
        if let Some(session) = self.session(name) {
            return Ok(session);
        }
        let session = ProjectSession::new(self.load_table(name)?);
        self.sessions().insert(name.to_string(), session.clone());
        Ok(session)
    }

    fn update_session<F>(&self, name: &str, f: F) -> Result<ProjectSession, QuoteError>
    where
        F: FnOnce(&mut ProjectSession),
    {
        self.ensure_session(name)?;
        let mut sessions = self.sessions();
        let session = sessions
            .entry(name.to_string())
            .or_insert_with(|| ProjectSession::new(QuotationTable::new()));
        f(session);
        Ok(session.clone())
    }
}

// --- Wire types ---

#[derive(Deserialize)]
struct ProjectQuery {
    #[serde(default)]
    filter: String,
}

#[derive(Deserialize)]
struct CreateProject {
    name: String,
}

/// One edited row as the client sends it. Numbers may arrive as text.
#[derive(Debug, Default, Deserialize)]
pub struct RowInput {
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: serde_json::Value,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub unit_price: serde_json::Value,
}

impl RowInput {
    fn into_row(self) -> QuotationRow {
        QuotationRow::new(
            self.part_number,
            self.description,
            number_value(&self.quantity),
            self.unit,
            number_value(&self.unit_price),
        )
    }
}

fn number_value(value: &serde_json::Value) -> f64 {
    match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => coerce_number(s),
        _ => 0.0,
    }
}

#[derive(Deserialize)]
struct RowsUpdate {
    rows: Vec<RowInput>,
}

#[derive(Serialize)]
struct RowView {
    item: usize,
    part_number: String,
    description: String,
    quantity: f64,
    unit: String,
    unit_price: f64,
    subtotal: f64,
}

#[derive(Serialize)]
struct ProjectView {
    name: String,
    rows: Vec<RowView>,
    total: f64,
    unsaved_changes: bool,
    loaded_at: DateTime<Utc>,
}

impl ProjectView {
    fn new(name: &str, session: &ProjectSession) -> Self {
        let rows = session
            .table
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| RowView {
                item: i + 1,
                part_number: row.part_number.clone(),
                description: row.description.clone(),
                quantity: row.quantity,
                unit: row.unit.clone(),
                unit_price: row.unit_price,
                subtotal: row.subtotal(),
            })
            .collect();
        ProjectView {
            name: name.to_string(),
            rows,
            total: session.table.total(),
            unsaved_changes: session.unsaved_changes,
            loaded_at: session.loaded_at,
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct SaveResponse {
    status: String,
    writes: usize,
    rows_written: usize,
    finished_at: DateTime<Utc>,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<QuoteError> for ApiError {
    fn from(e: QuoteError) -> Self {
        let status = match &e {
            QuoteError::EmptyProjectName => StatusCode::BAD_REQUEST,
            QuoteError::ProjectExists(_) => StatusCode::CONFLICT,
            QuoteError::ProjectNotFound(_) | QuoteError::Store(StoreError::WorksheetNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            QuoteError::Store(_) | QuoteError::Apply(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            warn!("request failed: {}", e);
        }
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(StatusResponse {
            status: "error".to_string(),
            message: Some(self.message),
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// --- Router ---

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:name", get(open_project))
        .route("/api/projects/:name/rows", post(add_row).put(replace_rows))
        .route("/api/projects/:name/refresh", post(refresh_project))
        .route("/api/projects/:name/save", post(save_project))
        .route("/api/projects/:name/terms", get(get_terms).put(put_terms))
        .route("/api/projects/:name/export/csv", get(export_csv))
        .route("/api/projects/:name/export/xlsx", get(export_xlsx))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let workbook = FileWorkbook::open(&config.workbook_path)?;
    let store = RetryingStore::new(workbook, config.retry_policy());
    let state = Arc::new(AppState::new(Box::new(store), config.layout()));

    let app = router(state).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.listen).await?;
    info!(
        "Listening on http://{} (workbook {})",
        config.listen,
        config.workbook_path.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run `f` on the blocking pool. Store calls block, and a retrying store sleeps
/// between attempts, so they must stay off the async workers.
async fn with_store<T, F>(state: Arc<AppState>, f: F) -> ApiResult<T>
where
    F: FnOnce(&AppState) -> Result<T, QuoteError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&state)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            warn!("store task failed: {}", e);
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Store task failed: {}", e),
            })
        }
    }
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProjectQuery>,
) -> ApiResult<Json<Vec<String>>> {
    let names = with_store(state, move |state| {
        let store = state.store();
        project::list_projects(&**store, &params.filter)
    })
    .await?;
    Ok(Json(names))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProject>,
) -> ApiResult<impl IntoResponse> {
    let view = with_store(state, move |state| {
        {
            let mut store = state.store();
            project::create_project(&mut **store, &state.layout, &payload.name)?;
        }
        let name = payload.name.trim();
        let session = state.ensure_session(name)?;
        Ok(ProjectView::new(name, &session))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn open_project(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProjectView>> {
    let view = with_store(state, move |state| {
        let session = state.ensure_session(&name)?;
        Ok(ProjectView::new(&name, &session))
    })
    .await?;
    Ok(Json(view))
}

async fn replace_rows(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<RowsUpdate>,
) -> ApiResult<Json<ProjectView>> {
    let table = QuotationTable::from_rows(payload.rows.into_iter().map(RowInput::into_row).collect());
    let view = with_store(state, move |state| {
        let session = state.update_session(&name, |session| {
            if session.table != table {
                session.table = table;
                session.unsaved_changes = true;
            }
        })?;
        Ok(ProjectView::new(&name, &session))
    })
    .await?;
    Ok(Json(view))
}

async fn add_row(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProjectView>> {
    let view = with_store(state, move |state| {
        let session = state.update_session(&name, |session| {
            session.table.push(QuotationRow::blank());
            session.unsaved_changes = true;
        })?;
        Ok(ProjectView::new(&name, &session))
    })
    .await?;
    Ok(Json(view))
}

async fn refresh_project(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<ProjectView>> {
    let view = with_store(state, move |state| {
        let session = ProjectSession::new(state.load_table(&name)?);
        state.sessions().insert(name.clone(), session.clone());
        Ok(ProjectView::new(&name, &session))
    })
    .await?;
    Ok(Json(view))
}

async fn save_project(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<SaveResponse>> {
    let report = with_store(state, move |state| {
        let table = state.ensure_session(&name)?.table;

        let report = {
            let mut store = state.store();
            let mut sheet = ProjectSheet::open(&mut **store, &state.layout, &name)?;
            sheet.save_changes(&table)?
        };

        if let Some(session) = state.sessions().get_mut(&name) {
            // edits that arrived while saving stay unsaved
            if session.table == table {
                session.unsaved_changes = false;
            }
        }
        Ok(report)
    })
    .await?;

    Ok(Json(SaveResponse {
        status: "ok".to_string(),
        writes: report.writes,
        rows_written: report.rows_written,
        finished_at: report.finished_at,
    }))
}

async fn get_terms(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Terms>> {
    let terms = with_store(state, move |state| {
        let mut store = state.store();
        let sheet = ProjectSheet::open(&mut **store, &state.layout, &name)?;
        Ok(sheet.read_terms())
    })
    .await?;
    Ok(Json(terms))
}

async fn put_terms(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(terms): Json<Terms>,
) -> ApiResult<Json<StatusResponse>> {
    with_store(state, move |state| {
        let mut store = state.store();
        let mut sheet = ProjectSheet::open(&mut **store, &state.layout, &name)?;
        sheet.save_terms(&terms)
    })
    .await?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        message: Some("Saved terms successfully.".to_string()),
    }))
}

fn attachment(name: &str, extension: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("attachment; filename=\"{}_quotation.{}\"", safe, extension)
}

async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let key = name.clone();
    let table = with_store(state, move |state| Ok(state.ensure_session(&key)?.table)).await?;
    let csv = downloader::to_csv(&table);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&name, "csv")),
        ],
        csv,
    )
        .into_response())
}

async fn export_xlsx(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let key = name.clone();
    let table = with_store(state, move |state| Ok(state.ensure_session(&key)?.table)).await?;
    let bytes = downloader::to_xlsx(&name, &table).map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("Failed to build workbook: {}", e),
    })?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, attachment(&name, "xlsx")),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_arrive_in_any_shape() {
        assert_eq!(number_value(&serde_json::json!(2.5)), 2.5);
        assert_eq!(number_value(&serde_json::json!("3")), 3.0);
        assert_eq!(number_value(&serde_json::json!("three")), 0.0);
        assert_eq!(number_value(&serde_json::Value::Null), 0.0);
    }

    #[test]
    fn attachment_names_are_sanitized() {
        assert_eq!(
            attachment("Mill St. \"B\"", "csv"),
            "attachment; filename=\"Mill_St___B_quotation.csv\""
        );
    }
}
