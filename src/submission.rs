//! Validate-then-insert flow behind the registration form.
//!
//! The per-visitor form state lives in a [`RegistrationSession`]. It holds the
//! values typed so far, the in-flight marker that keeps a second submission
//! out, and the time of the last successful submission, which drives the
//! transient acknowledgment.
//!
//! The in-flight marker is a start time rather than a flag. A request that is
//! dropped while the insert is pending never gets to clear it, so a marker
//! older than [`IN_FLIGHT_TIMEOUT_SECS`] no longer blocks the session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{StoreError, StudentStore};
use crate::validation::{NewStudent, RegistrationForm, ValidationErrors};

/// Session key under which the form state lives.
pub const REGISTRATION_KEY: &str = "registration";

/// How long the success acknowledgment stays visible, in seconds.
pub const ACKNOWLEDGMENT_TTL_SECS: i64 = 3;

/// How long an unanswered submission keeps later ones out, in seconds.
pub const IN_FLIGHT_TIMEOUT_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Some field failed its rule. The store was not contacted.
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
    /// A submission from this session is already waiting on the store.
    #[error("a submission is already in progress")]
    InFlight,
    /// The store refused the insert. The form keeps its values for a retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSession {
    pub form: RegistrationForm,
    #[serde(default)]
    loading_since: Option<DateTime<Utc>>,
    #[serde(default)]
    acknowledged_at: Option<DateTime<Utc>>,
}

impl RegistrationSession {
    /// Whether a submission was started and has not been answered yet.
    pub fn is_loading(&self) -> bool {
        self.loading_since.is_some()
    }

    /// Whether a pending submission still blocks new ones at `now`.
    pub fn is_in_flight(&self, now: DateTime<Utc>) -> bool {
        self.loading_since
            .is_some_and(|at| now - at < Duration::seconds(IN_FLIGHT_TIMEOUT_SECS))
    }

    /// Whether the success banner should still be shown at `now`.
    pub fn acknowledgment_visible(&self, now: DateTime<Utc>) -> bool {
        self.acknowledged_at
            .is_some_and(|at| now >= at && now - at < Duration::seconds(ACKNOWLEDGMENT_TTL_SECS))
    }

    /// Drops an acknowledgment that has outlived [`ACKNOWLEDGMENT_TTL_SECS`].
    ///
    /// Returns `true` if anything changed.
    pub fn expire_acknowledgment(&mut self, now: DateTime<Utc>) -> bool {
        if self.acknowledged_at.is_some() && !self.acknowledgment_visible(now) {
            self.acknowledged_at = None;
            return true;
        }
        false
    }

    /// Replaces the form values, as typing would.
    pub fn edit(&mut self, form: RegistrationForm) {
        self.form = form.with_filtered_phone();
    }

    /// Validates the current values and marks the session as in flight from `now`.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<NewStudent, SubmitError> {
        if self.is_in_flight(now) {
            return Err(SubmitError::InFlight);
        }
        if let Some(started) = self.loading_since {
            warn!(%started, "abandoned submission marker expired");
        }
        let student = self.form.validate()?;
        self.loading_since = Some(now);
        Ok(student)
    }

    /// Records the store's answer for a submission started with [`begin`](Self::begin).
    pub fn finish(
        &mut self,
        outcome: Result<Uuid, StoreError>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, SubmitError> {
        self.loading_since = None;
        match outcome {
            Ok(id) => {
                self.form = RegistrationForm::default();
                self.acknowledged_at = Some(now);
                Ok(id)
            }
            Err(e) => Err(SubmitError::Store(e)),
        }
    }

    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(session
            .get::<Self>(REGISTRATION_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn persist(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(REGISTRATION_KEY, self).await
    }
}

/// Runs one submission against `store` without any session plumbing.
///
/// Exactly one insert is issued when validation passes; none otherwise. There
/// is no retry.
pub async fn submit(
    store: &dyn StudentStore,
    state: &mut RegistrationSession,
) -> Result<Uuid, SubmitError> {
    let student = state.begin(Utc::now())?;
    let outcome = store.insert(&student).await;
    report(&outcome);
    state.finish(outcome, Utc::now())
}

/// Same as [`submit`], but publishes the in-flight marker to the session
/// store before waiting on the insert so a concurrent request from the same
/// session sees it.
///
/// The outcome is saved to the session store before returning. The session
/// layer does not save on server-error responses, and a marker left behind
/// would refuse the retry.
pub async fn submit_in_session(
    store: &dyn StudentStore,
    session: &Session,
    state: &mut RegistrationSession,
) -> Result<Uuid, crate::error::AppError> {
    let student = state.begin(Utc::now())?;
    state.persist(session).await?;
    session.save().await?;

    let outcome = store.insert(&student).await;
    report(&outcome);
    let result = state.finish(outcome, Utc::now());
    state.persist(session).await?;
    session.save().await?;
    Ok(result?)
}

fn report(outcome: &Result<Uuid, StoreError>) {
    match outcome {
        Ok(id) => info!(%id, "student registration stored"),
        Err(e) => warn!(error = %e, "student registration failed"),
    }
}
