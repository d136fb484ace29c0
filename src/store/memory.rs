//! In-process store used by the test suites and `STORE=memory`.
//!
//! All tables live behind one mutex, so every trait method is atomic with
//! respect to every other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{
    AuditSink, CoverFilter, CoverRequestStore, DocumentFilter, DocumentStore, SessionFilter,
    SessionStore, StoreError, StoreResult, TemplateStore, UserFilter, UserStore,
};
use crate::models::{
    AuditEvent, CoverRequest, CoverStatus, Document, Session, TemplateStatus, TimetableTemplate,
    User,
};

#[derive(Default)]
struct Tables {
    users:     Vec<User>,
    logins:    HashMap<String, (String, NaiveDateTime)>,
    templates: Vec<TimetableTemplate>,
    sessions:  Vec<Session>,
    covers:    Vec<CoverRequest>,
    documents: Vec<Document>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("memory store lock poisoned")))
    }
}

fn replace<T>(rows: &mut [T], row: &T, same: impl Fn(&T) -> bool) -> StoreResult<()>
where
    T: Clone,
{
    let slot = rows.iter_mut().find(|r| same(r)).ok_or(StoreError::NotFound)?;
    *slot = row.clone();
    Ok(())
}

// ── Users ────────────────────────────────────────────────────

#[async_trait]
impl UserStore for MemoryStore {
    async fn find(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.users.iter().any(|u| u.email == user.email || u.id == user.id) {
            return Err(StoreError::Conflict);
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        replace(&mut self.lock()?.users, user, |u| u.id == user.id)
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.logins.retain(|_, (user_id, _)| user_id != id);
        Ok(())
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.lock()?;
        let mut users: Vec<User> = tables
            .users
            .iter()
            .filter(|u| filter.role.is_none_or(|r| u.role.kind() == r))
            .filter(|u| filter.status.is_none_or(|s| u.status == s))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn create_login(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: NaiveDateTime,
    ) -> StoreResult<()> {
        self.lock()?
            .logins
            .insert(token_hash.to_owned(), (user_id.to_owned(), expires_at));
        Ok(())
    }

    async fn user_for_login(
        &self,
        token_hash: &str,
        now: NaiveDateTime,
    ) -> StoreResult<Option<User>> {
        let tables = self.lock()?;
        let Some((user_id, expires_at)) = tables.logins.get(token_hash) else {
            return Ok(None);
        };
        if *expires_at <= now {
            return Ok(None);
        }
        Ok(tables.users.iter().find(|u| &u.id == user_id).cloned())
    }

    async fn delete_login(&self, token_hash: &str) -> StoreResult<()> {
        self.lock()?.logins.remove(token_hash);
        Ok(())
    }
}

// ── Templates ────────────────────────────────────────────────

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert(&self, template: &TimetableTemplate) -> StoreResult<()> {
        self.lock()?.templates.push(template.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> StoreResult<Option<TimetableTemplate>> {
        Ok(self.lock()?.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<TimetableTemplate>> {
        let mut templates = self.lock()?.templates.clone();
        templates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(templates)
    }

    async fn find_active(&self) -> StoreResult<Option<TimetableTemplate>> {
        Ok(self
            .lock()?
            .templates
            .iter()
            .find(|t| t.status == TemplateStatus::Active)
            .cloned())
    }

    async fn activate(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if !tables.templates.iter().any(|t| t.id == id) {
            return Err(StoreError::NotFound);
        }
        for template in tables.templates.iter_mut() {
            if template.id == id {
                template.status = TemplateStatus::Active;
            } else if template.status == TemplateStatus::Active {
                template.status = TemplateStatus::Archived;
            }
        }
        Ok(())
    }
}

// ── Sessions ─────────────────────────────────────────────────

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.lock()?.sessions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Session>> {
        Ok(self
            .lock()?
            .sessions
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let tables = self.lock()?;
        let mut sessions: Vec<Session> = tables
            .sessions
            .iter()
            .filter(|s| filter.template_id.as_ref().is_none_or(|t| &s.template_id == t))
            .filter(|s| filter.instructor_id.as_deref().is_none_or(|i| s.is_taught_by(i)))
            .filter(|s| !filter.active_only || s.is_active)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| (s.day_of_week, s.window.start()));
        Ok(sessions)
    }

    async fn insert_unless_conflicting(&self, session: &Session) -> StoreResult<()> {
        let mut guard = self.lock()?;
        let tables = &mut *guard;
        let template = tables
            .templates
            .iter_mut()
            .find(|t| t.id == session.template_id)
            .ok_or(StoreError::NotFound)?;

        if tables.sessions.iter().any(|s| s.conflicts_with(session)) {
            return Err(StoreError::Conflict);
        }
        template.session_count += 1;
        tables.sessions.push(session.clone());
        Ok(())
    }
}

// ── Cover requests ───────────────────────────────────────────

#[async_trait]
impl CoverRequestStore for MemoryStore {
    async fn find(&self, id: &str) -> StoreResult<Option<CoverRequest>> {
        Ok(self.lock()?.covers.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_unique(&self, request: &CoverRequest) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let taken = tables.covers.iter().any(|c| {
            c.status.holds_slot()
                && c.session_id == request.session_id
                && c.cover_date == request.cover_date
        });
        if taken {
            return Err(StoreError::Conflict);
        }
        tables.covers.push(request.clone());
        Ok(())
    }

    async fn transition(&self, request: &CoverRequest, from: CoverStatus) -> StoreResult<()> {
        let mut tables = self.lock()?;
        let stored = tables
            .covers
            .iter()
            .find(|c| c.id == request.id)
            .ok_or(StoreError::NotFound)?;
        if stored.status != from {
            return Err(StoreError::Conflict);
        }
        replace(&mut tables.covers, request, |c| c.id == request.id)
    }

    async fn list(&self, filter: &CoverFilter) -> StoreResult<Vec<CoverRequest>> {
        let tables = self.lock()?;
        let mut covers: Vec<CoverRequest> = tables
            .covers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        covers.sort_by_key(|c| c.session_date_time);
        if filter.newest_first {
            covers.reverse();
        }
        if let Some(limit) = filter.limit {
            covers.truncate(limit as usize);
        }
        Ok(covers)
    }

    async fn count(&self, filter: &CoverFilter) -> StoreResult<u64> {
        let tables = self.lock()?;
        Ok(tables.covers.iter().filter(|c| filter.matches(c)).count() as u64)
    }
}

// ── Documents ────────────────────────────────────────────────

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: &Document) -> StoreResult<()> {
        self.lock()?.documents.push(document.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.lock()?.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn save(&self, document: &Document) -> StoreResult<()> {
        replace(&mut self.lock()?.documents, document, |d| d.id == document.id)
    }

    async fn list(&self, filter: &DocumentFilter) -> StoreResult<Vec<Document>> {
        let tables = self.lock()?;
        let mut documents: Vec<Document> = tables
            .documents
            .iter()
            .filter(|d| filter.instructor_id.as_ref().is_none_or(|i| &d.instructor_id == i))
            .filter(|d| filter.status.is_none_or(|s| d.status == s))
            .cloned()
            .collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }
}

// ── Audit ────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> StoreResult<()> {
        self.events
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("audit sink lock poisoned")))?
            .push(event.clone());
        Ok(())
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> StoreResult<u64> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| StoreError::Backend(anyhow::anyhow!("audit sink lock poisoned")))?;
        let before = events.len();
        events.retain(|e| e.retain_until >= now);
        Ok((before - events.len()) as u64)
    }
}
