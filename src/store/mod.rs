//! Persistence ports.
//!
//! Services only ever talk to these traits. `memory` backs tests and the
//! `STORE=memory` dev mode; `mysql` is the production adapter. Operations
//! that must not race (cover uniqueness, session conflicts, activation) are
//! single trait methods so each adapter can make them atomic.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::error::{DatabaseError, ErrorKind};

use crate::models::{
    AuditEvent, CoverRequest, CoverStatus, Document, DocumentStatus, RoleKind, Session,
    TimetableTemplate, User, UserStatus,
};

pub mod memory;
pub mod mysql;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness or overlap constraint rejected the write.
    #[error("conflicting record exists")]
    Conflict,

    /// A stored value could not be mapped back into a domain type.
    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("storage backend error")]
    Backend(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::Conflict,
            _ => Self::Backend(error.into()),
        }
    }
}

impl From<crate::errors::CoreError> for StoreError {
    // Row mapping reuses the domain parsers (`FromStr` on the string enums).
    fn from(error: crate::errors::CoreError) -> Self {
        Self::Corrupt(error.to_string())
    }
}

// ── Filters ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role:   Option<RoleKind>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub template_id:   Option<String>,
    pub instructor_id: Option<String>,
    pub active_only:   bool,
}

/// Empty `statuses` means any status. Results are ordered by session time,
/// oldest first, unless `newest_first` is set.
#[derive(Debug, Clone, Default)]
pub struct CoverFilter {
    pub statuses:        Vec<CoverStatus>,
    pub session_ids:     Option<Vec<String>>,
    pub accepted_by:     Option<String>,
    pub starts_from:     Option<NaiveDateTime>,
    pub starts_before:   Option<NaiveDateTime>,
    pub cover_date_from: Option<NaiveDate>,
    pub cover_date_to:   Option<NaiveDate>,
    pub newest_first:    bool,
    pub limit:           Option<u32>,
}

impl CoverFilter {
    pub fn with_status(status: CoverStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    /// In-process evaluation, shared by the memory store.
    pub fn matches(&self, request: &CoverRequest) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&request.status))
            && self
                .session_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&request.session_id))
            && self
                .accepted_by
                .as_ref()
                .is_none_or(|id| request.accepted_by.as_ref() == Some(id))
            && self.starts_from.is_none_or(|t| request.session_date_time >= t)
            && self.starts_before.is_none_or(|t| request.session_date_time < t)
            && self.cover_date_from.is_none_or(|d| request.cover_date >= d)
            && self.cover_date_to.is_none_or(|d| request.cover_date <= d)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub instructor_id: Option<String>,
    pub status:        Option<DocumentStatus>,
}

// ── Ports ────────────────────────────────────────────────────

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, id: &str) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// `Conflict` when the email is taken.
    async fn insert(&self, user: &User) -> StoreResult<()>;
    async fn save(&self, user: &User) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
    /// Newest accounts first.
    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;

    // Login sessions are keyed by a digest of the cookie token.
    async fn create_login(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: NaiveDateTime,
    ) -> StoreResult<()>;
    async fn user_for_login(&self, token_hash: &str, now: NaiveDateTime)
        -> StoreResult<Option<User>>;
    async fn delete_login(&self, token_hash: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert(&self, template: &TimetableTemplate) -> StoreResult<()>;
    async fn find(&self, id: &str) -> StoreResult<Option<TimetableTemplate>>;
    /// Newest first.
    async fn list(&self) -> StoreResult<Vec<TimetableTemplate>>;
    async fn find_active(&self) -> StoreResult<Option<TimetableTemplate>>;
    /// Archives every active template and activates `id`, atomically.
    async fn activate(&self, id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, id: &str) -> StoreResult<Option<Session>>;
    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Session>>;
    /// Ordered by `(day_of_week, start_time)`.
    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>>;
    /// Inserts the session and bumps its template's session count, unless an
    /// active session of the same template overlaps it (`Conflict`). A missing
    /// template is `NotFound`.
    async fn insert_unless_conflicting(&self, session: &Session) -> StoreResult<()>;
}

#[async_trait]
pub trait CoverRequestStore: Send + Sync {
    async fn find(&self, id: &str) -> StoreResult<Option<CoverRequest>>;
    /// `Conflict` when a live request already holds the same
    /// `(session, cover_date)` slot.
    async fn insert_unique(&self, request: &CoverRequest) -> StoreResult<()>;
    /// Writes `request` only if the stored row is still in status `from`.
    /// A row that has moved on is `Conflict`; a missing row is `NotFound`.
    async fn transition(&self, request: &CoverRequest, from: CoverStatus) -> StoreResult<()>;
    async fn list(&self, filter: &CoverFilter) -> StoreResult<Vec<CoverRequest>>;
    async fn count(&self, filter: &CoverFilter) -> StoreResult<u64>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &Document) -> StoreResult<()>;
    async fn find(&self, id: &str) -> StoreResult<Option<Document>>;
    async fn save(&self, document: &Document) -> StoreResult<()>;
    /// Newest uploads first.
    async fn list(&self, filter: &DocumentFilter) -> StoreResult<Vec<Document>>;
}

/// Append-only audit trail. Callers go through [`crate::audit::emit`], which
/// logs and swallows failures.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> StoreResult<()>;
    /// Deletes events whose `retain_until` has passed. Returns rows removed.
    async fn purge_expired(&self, now: NaiveDateTime) -> StoreResult<u64>;
}

/// Best-effort fan-out to instructors who could take a cover request.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn notify_eligible_instructors(&self, request: &CoverRequest, session: &Session);
}

// ── Bundle ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct Stores {
    pub users:     Arc<dyn UserStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub sessions:  Arc<dyn SessionStore>,
    pub covers:    Arc<dyn CoverRequestStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub audit:     Arc<dyn AuditSink>,
    pub notifier:  Arc<dyn NotificationSender>,
}

impl Stores {
    /// Everything in process memory, with a logging notifier.
    pub fn in_memory() -> Self {
        let store = memory::MemoryStore::default();
        Self {
            users:     Arc::new(store.clone()),
            templates: Arc::new(store.clone()),
            sessions:  Arc::new(store.clone()),
            covers:    Arc::new(store.clone()),
            documents: Arc::new(store),
            audit:     Arc::new(memory::MemoryAuditSink::default()),
            notifier:  Arc::new(crate::notify::LogNotifier),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSender>) -> Self {
        self.notifier = notifier;
        self
    }
}
