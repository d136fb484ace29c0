use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySql, QueryBuilder};

use super::{from_json, parse, to_json, MySqlStore};
use crate::{
    models::{ClockTime, DayOfWeek, Session, TimeWindow, TimetableTemplate},
    store::{SessionFilter, SessionStore, StoreError, StoreResult, TemplateStore},
};

const TEMPLATE_COLUMNS: &str = "id, name, template_type, status, effective_from, effective_to, \
     session_count, created_by, created_at";

const SESSION_COLUMNS: &str = "id, template_id, class_name, description, day_of_week, start_time, \
     end_time, duration_minutes, max_participants, venue, required_qualifications, \
     assignment_type, permanent_instructor_id, is_active, created_by, created_at";

// ── Row types ────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id:             String,
    name:           String,
    template_type:  String,
    status:         String,
    effective_from: NaiveDate,
    effective_to:   NaiveDate,
    session_count:  u32,
    created_by:     String,
    created_at:     NaiveDateTime,
}

impl TryFrom<TemplateRow> for TimetableTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> StoreResult<Self> {
        Ok(TimetableTemplate {
            id:             row.id,
            name:           row.name,
            template_type:  parse(&row.template_type)?,
            status:         parse(&row.status)?,
            effective_from: row.effective_from,
            effective_to:   row.effective_to,
            session_count:  row.session_count,
            created_by:     row.created_by,
            created_at:     row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id:                      String,
    template_id:             String,
    class_name:              String,
    description:             Option<String>,
    day_of_week:             u8,
    start_time:              String,
    end_time:                String,
    duration_minutes:        u32,
    max_participants:        Option<u32>,
    venue:                   String,
    required_qualifications: String,
    assignment_type:         String,
    permanent_instructor_id: Option<String>,
    is_active:               bool,
    created_by:              String,
    created_at:              NaiveDateTime,
}

impl TryFrom<SessionRow> for Session {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> StoreResult<Self> {
        let window = TimeWindow::new(
            parse::<ClockTime>(&row.start_time)?,
            parse::<ClockTime>(&row.end_time)?,
        )?;
        Ok(Session {
            id:                      row.id,
            template_id:             row.template_id,
            class_name:              row.class_name,
            description:             row.description,
            day_of_week:             DayOfWeek::new(row.day_of_week)?,
            window,
            duration_minutes:        row.duration_minutes,
            max_participants:        row.max_participants,
            venue:                   row.venue,
            required_qualifications: from_json("required_qualifications", &row.required_qualifications)?,
            assignment_type:         parse(&row.assignment_type)?,
            permanent_instructor_id: row.permanent_instructor_id,
            is_active:               row.is_active,
            created_by:              row.created_by,
            created_at:              row.created_at,
        })
    }
}

fn into_sessions(rows: Vec<SessionRow>) -> StoreResult<Vec<Session>> {
    rows.into_iter().map(Session::try_from).collect()
}

// ── Templates ────────────────────────────────────────────────

#[async_trait]
impl TemplateStore for MySqlStore {
    async fn insert(&self, template: &TimetableTemplate) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO timetable_templates
                (id, name, template_type, status, effective_from, effective_to,
                 session_count, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(template.template_type.as_str())
        .bind(template.status.as_str())
        .bind(template.effective_from)
        .bind(template.effective_to)
        .bind(template.session_count)
        .bind(&template.created_by)
        .bind(template.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> StoreResult<Option<TimetableTemplate>> {
        sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM timetable_templates WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(TimetableTemplate::try_from)
        .transpose()
    }

    async fn list(&self) -> StoreResult<Vec<TimetableTemplate>> {
        sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM timetable_templates ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TimetableTemplate::try_from)
        .collect()
    }

    async fn find_active(&self) -> StoreResult<Option<TimetableTemplate>> {
        sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM timetable_templates
             WHERE status = 'active'
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?
        .map(TimetableTemplate::try_from)
        .transpose()
    }

    async fn activate(&self, id: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM timetable_templates WHERE id = ? FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        sqlx::query("UPDATE timetable_templates SET status = 'archived' WHERE status = 'active'")
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE timetable_templates SET status = 'active' WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

// ── Sessions ─────────────────────────────────────────────────

#[async_trait]
impl SessionStore for MySqlStore {
    async fn find(&self, id: &str) -> StoreResult<Option<Session>> {
        sqlx::query_as::<_, SessionRow>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Session::try_from)
            .transpose()
    }

    async fn find_many(&self, ids: &[String]) -> StoreResult<Vec<Session>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<MySql>::new(format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id IN ("));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows = query.build_query_as::<SessionRow>().fetch_all(&self.pool).await?;
        into_sessions(rows)
    }

    async fn list(&self, filter: &SessionFilter) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE (? IS NULL OR template_id = ?)
               AND (? IS NULL OR (assignment_type = 'permanent' AND permanent_instructor_id = ?))
               AND (? = FALSE OR is_active = TRUE)
             ORDER BY day_of_week, start_time"
        ))
        .bind(&filter.template_id)
        .bind(&filter.template_id)
        .bind(&filter.instructor_id)
        .bind(&filter.instructor_id)
        .bind(filter.active_only)
        .fetch_all(&self.pool)
        .await?;
        into_sessions(rows)
    }

    async fn insert_unless_conflicting(&self, session: &Session) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Locking the template row serialises concurrent inserts into it.
        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM timetable_templates WHERE id = ? FOR UPDATE")
                .bind(&session.template_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound);
        }

        let start = session.window.start().to_string();
        let end = session.window.end().to_string();
        let clash: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM sessions
                WHERE template_id = ? AND is_active = TRUE
                  AND day_of_week = ? AND venue = ?
                  AND start_time < ? AND ? < end_time
             )",
        )
        .bind(&session.template_id)
        .bind(session.day_of_week.value())
        .bind(&session.venue)
        .bind(&end)
        .bind(&start)
        .fetch_one(&mut *tx)
        .await?;
        if clash {
            return Err(StoreError::Conflict);
        }

        sqlx::query(
            "INSERT INTO sessions
                (id, template_id, class_name, description, day_of_week, start_time, end_time,
                 duration_minutes, max_participants, venue, required_qualifications,
                 assignment_type, permanent_instructor_id, is_active, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&session.id)
        .bind(&session.template_id)
        .bind(&session.class_name)
        .bind(&session.description)
        .bind(session.day_of_week.value())
        .bind(&start)
        .bind(&end)
        .bind(session.duration_minutes)
        .bind(session.max_participants)
        .bind(&session.venue)
        .bind(to_json(&session.required_qualifications)?)
        .bind(session.assignment_type.as_str())
        .bind(&session.permanent_instructor_id)
        .bind(session.is_active)
        .bind(&session.created_by)
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE timetable_templates SET session_count = session_count + 1 WHERE id = ?")
            .bind(&session.template_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
