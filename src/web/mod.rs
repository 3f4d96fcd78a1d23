//! HTTP surface: routes, handlers and the session layer.
//!
//! | Route                          | Gate      |
//! |--------------------------------|-----------|
//! | `GET /`, `POST /`              | open      |
//! | `GET /unlock`, `POST /unlock`  | open      |
//! | `GET /unlock/cancel`           | open      |
//! | `POST /lock`                   | open      |
//! | `GET /dashboard`               | unlocked  |
//! | `POST /dashboard/refresh`      | unlocked  |
//! | `GET /dashboard/export`        | unlocked  |
//! | `GET /dashboard/records.json`  | unlocked  |
//!
//! Gated routes redirect to `/` when the session's gate is locked and never
//! touch the store in that case.

pub mod pages;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{FixedOffset, Offset, Utc};
use serde::Deserialize;
use tower_sessions::{Expiry, Session, SessionManagerLayer, SessionStore};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::export::{self, EXPORT_FILE_NAME, XLSX_CONTENT_TYPE};
use crate::gate::{AccessGate, PinPolicy};
use crate::review::ReviewSnapshot;
use crate::store::{StudentRecord, StudentStore};
use crate::submission::{submit_in_session, RegistrationSession, SubmitError};
use crate::validation::{sanitize_pin, FieldError, RegistrationForm};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<dyn StudentStore>,
    pub pin_policy: Arc<PinPolicy>,
    pub display_offset: FixedOffset,
}

impl AppState {
    pub fn new(store: Arc<dyn StudentStore>, pin_policy: PinPolicy) -> Self {
        Self {
            store,
            pin_policy: Arc::new(pin_policy),
            display_offset: Utc.fix(),
        }
    }

    pub fn from_config(store: Arc<dyn StudentStore>, config: &AppConfig) -> Self {
        Self {
            store,
            pin_policy: Arc::new(config.pin_policy.clone()),
            display_offset: config.display_offset,
        }
    }
}

/// Routes without the session layer. Use [`app`] unless the caller provides
/// its own [`SessionManagerLayer`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(registration_form).post(register))
        .route("/unlock", get(unlock_form).post(unlock))
        .route("/unlock/cancel", get(cancel_unlock))
        .route("/lock", post(lock))
        .route("/dashboard", get(dashboard))
        .route("/dashboard/refresh", post(refresh))
        .route("/dashboard/export", get(export_records))
        .route("/dashboard/records.json", get(records_json))
        .with_state(state)
}

/// The full application with browser-session scoped sessions kept in
/// `sessions`.
///
/// The cookie carries no expiry, so closing the browser ends the session and
/// with it the unlocked gate. The server-side row outlives it until the
/// store's expired-session sweep removes it.
pub fn app<S>(state: AppState, sessions: S, secure_cookies: bool) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = SessionManagerLayer::new(sessions)
        .with_secure(secure_cookies)
        .with_expiry(Expiry::OnSessionEnd);

    router(state).layer(session_layer)
}

#[derive(Debug, Default, Deserialize)]
pub struct PinForm {
    #[serde(default)]
    pub pin: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

async fn registration_form(session: Session) -> Result<Html<String>, AppError> {
    let mut registration = RegistrationSession::load(&session).await?;
    let now = Utc::now();
    let acknowledged = registration.acknowledgment_visible(now);
    if registration.expire_acknowledgment(now) {
        registration.persist(&session).await?;
    }
    let unlocked = AccessGate::load(&session).await?.is_unlocked();

    Ok(Html(pages::registration_page(
        &registration.form,
        &[],
        None,
        acknowledged,
        unlocked,
    )))
}

async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, AppError> {
    let mut registration = RegistrationSession::load(&session).await?;
    registration.edit(form);
    let unlocked = AccessGate::load(&session).await?.is_unlocked();

    let render = |form: &RegistrationForm, errors: &[FieldError], notice: Option<&str>| {
        pages::registration_page(form, errors, notice, false, unlocked)
    };

    match submit_in_session(state.store.as_ref(), &session, &mut registration).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(AppError::Submit(SubmitError::Invalid(errors))) => {
            registration.persist(&session).await?;
            let html = render(&registration.form, errors.0.as_slice(), None);
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Html(html)).into_response())
        }
        // Rendered as a normal page so the session layer still saves the
        // session and hands a first-time visitor their cookie
        Err(AppError::Submit(SubmitError::Store(e))) => {
            let html = render(&registration.form, &[], Some(&e.to_string()));
            Ok(Html(html).into_response())
        }
        Err(AppError::Submit(SubmitError::InFlight)) => {
            let html = render(
                &registration.form,
                &[],
                Some("A submission is already in progress. Please wait."),
            );
            Ok((StatusCode::CONFLICT, Html(html)).into_response())
        }
        Err(other) => Err(other),
    }
}

async fn unlock_form(session: Session) -> Result<Response, AppError> {
    if AccessGate::load(&session).await?.is_unlocked() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    Ok(Html(pages::pin_page(false)).into_response())
}

async fn unlock(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<PinForm>,
) -> Result<Response, AppError> {
    let mut gate = AccessGate::load(&session).await?;
    let pin = sanitize_pin(&form.pin);

    if gate.try_unlock(&pin, &state.pin_policy).is_err() {
        warn!("rejected dashboard PIN");
        return Ok((StatusCode::UNAUTHORIZED, Html(pages::pin_page(true))).into_response());
    }

    gate.persist(&session).await?;
    info!("dashboard unlocked");

    // Entering the unlocked state takes the one snapshot the dashboard works from
    let snapshot = ReviewSnapshot::fetch(state.store.as_ref()).await;
    snapshot.persist(&session).await?;

    Ok(Redirect::to("/dashboard").into_response())
}

async fn cancel_unlock() -> Redirect {
    Redirect::to("/")
}

async fn lock(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    info!("dashboard locked");
    Ok(Redirect::to("/"))
}

/// The session's snapshot, taking one if the gate was opened without it.
///
/// `None` means the gate is locked.
async fn unlocked_snapshot(
    state: &AppState,
    session: &Session,
) -> Result<Option<ReviewSnapshot>, AppError> {
    let gate = AccessGate::load(session).await?;
    if !gate.is_unlocked() {
        return Ok(None);
    }
    if let Some(snapshot) = ReviewSnapshot::load(session).await? {
        return Ok(Some(snapshot));
    }
    let snapshot = ReviewSnapshot::fetch(state.store.as_ref()).await;
    snapshot.persist(session).await?;
    Ok(Some(snapshot))
}

async fn dashboard(
    State(state): State<AppState>,
    session: Session,
    Query(search): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let Some(snapshot) = unlocked_snapshot(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    Ok(Html(pages::dashboard_page(&snapshot, &search.q, state.display_offset)).into_response())
}

async fn refresh(State(state): State<AppState>, session: Session) -> Result<Redirect, AppError> {
    let Some(snapshot) = ReviewSnapshot::fetch_if_unlocked(
        AccessGate::load(&session).await?,
        state.store.as_ref(),
    )
    .await
    else {
        return Ok(Redirect::to("/"));
    };
    snapshot.persist(&session).await?;
    Ok(Redirect::to("/dashboard"))
}

async fn export_records(
    State(state): State<AppState>,
    session: Session,
) -> Result<Response, AppError> {
    let Some(snapshot) = unlocked_snapshot(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };

    let bytes = export::write_workbook(&snapshot.records, state.display_offset)?;
    info!(rows = snapshot.records.len(), "exported student records");

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn records_json(
    State(state): State<AppState>,
    session: Session,
    Query(search): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let Some(snapshot) = unlocked_snapshot(&state, &session).await? else {
        return Ok(Redirect::to("/").into_response());
    };
    let rows: Vec<StudentRecord> = snapshot.filter(&search.q).into_iter().cloned().collect();
    Ok(Json(rows).into_response())
}
