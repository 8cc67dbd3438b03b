use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    serve, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::InvalidSelectionError;
use crate::models::{AttendanceRecord, Dashboard, Dataset, ModuleCatalog};
use crate::page;
use crate::selection::SelectionController;
use crate::stats;

struct SessionEntry {
    controller: SelectionController,
    last_seen: Instant,
}

/// Shared, read-only dataset plus the per-session selections.
pub struct AppState {
    records: Vec<AttendanceRecord>,
    catalog: Arc<ModuleCatalog>,
    // Validated once at startup; every new session starts from a clone.
    initial: SelectionController,
    max_sessions: usize,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

pub struct SelectOutcome {
    pub session: Uuid,
    pub current: String,
    pub rejected: Option<InvalidSelectionError>,
}

impl AppState {
    /// Fails when `default_module` is not part of the loaded catalog.
    pub fn new(
        dataset: Dataset,
        default_module: &str,
        max_sessions: usize,
    ) -> Result<Self, InvalidSelectionError> {
        let Dataset { records, catalog } = dataset;
        let catalog = Arc::new(catalog);
        let initial = SelectionController::new(catalog.clone(), default_module)?;
        Ok(Self {
            records,
            catalog,
            initial,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn dashboard(&self, module: &str) -> Dashboard {
        stats::compute_dashboard(&self.records, module)
    }

    /// Current selection for `session`, opening a new session when it is unknown.
    pub fn current_selection(&self, session: Option<Uuid>) -> (Uuid, String) {
        let mut sessions = self.lock_sessions();
        let (id, entry) = self.touch_or_open(&mut sessions, session);
        (id, entry.controller.current().to_string())
    }

    pub fn select(&self, session: Option<Uuid>, module: &str) -> SelectOutcome {
        let mut sessions = self.lock_sessions();
        let (id, entry) = self.touch_or_open(&mut sessions, session);
        let rejected = entry.controller.set_selection(module).err();
        SelectOutcome {
            session: id,
            current: entry.controller.current().to_string(),
            rejected,
        }
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch_or_open<'s>(
        &self,
        sessions: &'s mut HashMap<Uuid, SessionEntry>,
        session: Option<Uuid>,
    ) -> (Uuid, &'s mut SessionEntry) {
        let known = session.filter(|id| sessions.contains_key(id));
        let id = match known {
            Some(id) => id,
            None => {
                while sessions.len() >= self.max_sessions {
                    let oldest = sessions
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_seen)
                        .map(|(id, _)| *id);
                    match oldest {
                        Some(id) => {
                            sessions.remove(&id);
                            debug!(session = %id, "evicted idle session");
                        }
                        None => break,
                    }
                }
                let id = Uuid::new_v4();
                debug!(session = %id, "opened session");
                id
            }
        };

        let entry = sessions.entry(id).or_insert_with(|| SessionEntry {
            controller: self.initial.clone(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        (id, entry)
    }
}

#[derive(Deserialize)]
struct PageParams {
    session: Option<Uuid>,
}

#[derive(Deserialize)]
struct SelectParams {
    session: Option<Uuid>,
    module: String,
}

#[derive(Deserialize)]
struct DashboardParams {
    module: String,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/select", get(select_module))
        .route("/api/modules", get(list_modules))
        .route("/api/dashboard", get(module_dashboard))
        .route("/healthz", get(healthz))
        .layer(Extension(state))
}

pub async fn run(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("serving attendance dashboard on http://{addr}");
    serve(listener, app).await?;
    Ok(())
}

fn render(
    state: &AppState,
    dashboard: &Dashboard,
    session: Uuid,
    notice: Option<&str>,
) -> Result<Html<String>, StatusCode> {
    page::render_page(state.catalog(), dashboard, session, notice)
        .map(Html)
        .map_err(|err| {
            error!(module = %dashboard.selection, error = %err, "page rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn index(
    Query(params): Query<PageParams>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Html<String>, StatusCode> {
    let (session, current) = state.current_selection(params.session);
    let dashboard = state.dashboard(&current);
    render(&state, &dashboard, session, None)
}

async fn select_module(
    Query(params): Query<SelectParams>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let outcome = state.select(params.session, &params.module);
    match outcome.rejected {
        None => {
            debug!(session = %outcome.session, module = %outcome.current, "selection changed");
            Redirect::to(&format!("/?session={}", outcome.session)).into_response()
        }
        Some(err) => {
            warn!(session = %outcome.session, error = %err, "rejected selection");
            let dashboard = state.dashboard(&outcome.current);
            let notice = err.to_string();
            match render(&state, &dashboard, outcome.session, Some(&notice)) {
                Ok(html) => (StatusCode::UNPROCESSABLE_ENTITY, html).into_response(),
                Err(status) => status.into_response(),
            }
        }
    }
}

async fn list_modules(Extension(state): Extension<Arc<AppState>>) -> Json<ModuleCatalog> {
    Json(state.catalog().clone())
}

async fn module_dashboard(
    Query(params): Query<DashboardParams>,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Dashboard>, (StatusCode, Json<ApiError>)> {
    if !state.catalog().contains(&params.module) {
        let err = InvalidSelectionError {
            module: params.module,
        };
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError {
                error: err.to_string(),
            }),
        ));
    }
    Ok(Json(state.dashboard(&params.module)))
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::tests::sample_records;

    fn state(max_sessions: usize) -> Arc<AppState> {
        let records = sample_records();
        let catalog = ModuleCatalog::from_records(&records);
        Arc::new(AppState::new(Dataset { records, catalog }, "ModA", max_sessions).unwrap())
    }

    #[test]
    fn default_module_must_be_in_catalog() {
        let records = sample_records();
        let catalog = ModuleCatalog::from_records(&records);
        let result = AppState::new(Dataset { records, catalog }, "Journalism", 8);
        assert!(matches!(result, Err(InvalidSelectionError { module }) if module == "Journalism"));
    }

    #[test]
    fn sessions_hold_independent_selections() {
        let state = state(8);
        let (first, _) = state.current_selection(None);
        let (second, _) = state.current_selection(None);
        assert_ne!(first, second);

        let outcome = state.select(Some(first), "ModB");
        assert!(outcome.rejected.is_none());
        assert_eq!(state.current_selection(Some(first)).1, "ModB");
        assert_eq!(state.current_selection(Some(second)).1, "ModA");
    }

    #[test]
    fn rejected_selection_keeps_session_value() {
        let state = state(8);
        let (id, _) = state.current_selection(None);
        state.select(Some(id), "ModB");
        let outcome = state.select(Some(id), "Unknown");
        assert_eq!(outcome.session, id);
        assert_eq!(outcome.current, "ModB");
        assert_eq!(outcome.rejected.unwrap().module, "Unknown");
    }

    #[test]
    fn switching_back_restores_the_same_dashboard() {
        let state = state(8);
        let (id, current) = state.current_selection(None);
        let before = state.dashboard(&current);

        let away = state.select(Some(id), "ModB");
        assert_eq!(state.dashboard(&away.current).selection, "ModB");
        let back = state.select(Some(id), "ModA");
        assert!(back.rejected.is_none());
        assert_eq!(state.dashboard(&back.current), before);
    }

    #[test]
    fn selecting_on_a_stale_session_registers_the_new_one() {
        let state = state(8);
        let outcome = state.select(Some(Uuid::new_v4()), "ModB");
        assert!(outcome.rejected.is_none());
        assert_eq!(state.lock_sessions().len(), 1);
        assert_eq!(
            state.current_selection(Some(outcome.session)),
            (outcome.session, "ModB".to_string())
        );
    }

    #[test]
    fn unknown_session_starts_at_default() {
        let state = state(8);
        let stale = Uuid::new_v4();
        let (id, current) = state.current_selection(Some(stale));
        assert_ne!(id, stale);
        assert_eq!(current, "ModA");
    }

    #[test]
    fn evicts_least_recently_used_session() {
        let state = state(2);
        let (first, _) = state.current_selection(None);
        let (second, _) = state.current_selection(None);
        state.current_selection(Some(first));
        let (_third, _) = state.current_selection(None);
        assert_eq!(state.lock_sessions().len(), 2);
        assert_eq!(state.current_selection(Some(first)).0, first);
        assert_ne!(state.current_selection(Some(second)).0, second);
    }

    #[tokio::test]
    async fn index_renders_default_selection() {
        let state = state(8);
        let Html(body) = index(Query(PageParams { session: None }), Extension(state))
            .await
            .unwrap();
        assert!(body.contains("<option value=\"ModA\" selected>ModA</option>"));
        assert!(body.contains("0.80"));
    }

    #[tokio::test]
    async fn select_redirects_back_to_session_page() {
        let state = state(8);
        let (id, _) = state.current_selection(None);
        let response = select_module(
            Query(SelectParams {
                session: Some(id),
                module: "ModB".to_string(),
            }),
            Extension(state.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, format!("/?session={id}"));
        assert_eq!(state.current_selection(Some(id)).1, "ModB");
    }

    #[tokio::test]
    async fn select_unknown_module_is_unprocessable() {
        let state = state(8);
        let (id, _) = state.current_selection(None);
        let response = select_module(
            Query(SelectParams {
                session: Some(id),
                module: "Nope".to_string(),
            }),
            Extension(state.clone()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(state.current_selection(Some(id)).1, "ModA");
    }

    #[tokio::test]
    async fn api_dashboard_validates_module() {
        let state = state(8);
        let Json(dashboard) = module_dashboard(
            Query(DashboardParams {
                module: "ModB".to_string(),
            }),
            Extension(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(dashboard.record_count, 1);
        assert_eq!(dashboard.stats.mean, Some(0.5));
        assert_eq!(dashboard.stats.std_dev, None);

        let (status, Json(body)) = module_dashboard(
            Query(DashboardParams {
                module: "ModC".to_string(),
            }),
            Extension(state),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.error.contains("ModC"));
    }

    #[tokio::test]
    async fn api_modules_lists_catalog() {
        let Json(catalog) = list_modules(Extension(state(8))).await;
        assert_eq!(catalog.iter().collect::<Vec<_>>(), vec!["ModA", "ModB"]);
        assert_eq!(serde_json::to_string(&catalog).unwrap(), "[\"ModA\",\"ModB\"]");
    }
}
