use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySql, QueryBuilder};

use super::{parse, MySqlStore};
use crate::{
    models::{CoverRequest, CoverStatus},
    store::{CoverFilter, CoverRequestStore, StoreError, StoreResult},
};

const COVER_COLUMNS: &str = "id, session_id, cover_date, session_date_time, reason, urgency, status, \
     requested_by, requested_for, requested_at, accepted_by, accepted_at, confirmed_by, \
     confirmed_at, payment_rate, payment_status";

#[derive(sqlx::FromRow)]
struct CoverRow {
    id:                String,
    session_id:        String,
    cover_date:        NaiveDate,
    session_date_time: NaiveDateTime,
    reason:            Option<String>,
    urgency:           String,
    status:            String,
    requested_by:      String,
    requested_for:     Option<String>,
    requested_at:      NaiveDateTime,
    accepted_by:       Option<String>,
    accepted_at:       Option<NaiveDateTime>,
    confirmed_by:      Option<String>,
    confirmed_at:      Option<NaiveDateTime>,
    payment_rate:      Option<f64>,
    payment_status:    String,
}

impl TryFrom<CoverRow> for CoverRequest {
    type Error = StoreError;

    fn try_from(row: CoverRow) -> StoreResult<Self> {
        Ok(CoverRequest {
            id:                row.id,
            session_id:        row.session_id,
            cover_date:        row.cover_date,
            session_date_time: row.session_date_time,
            reason:            row.reason,
            urgency:           parse(&row.urgency)?,
            status:            parse(&row.status)?,
            requested_by:      row.requested_by,
            requested_for:     row.requested_for,
            requested_at:      row.requested_at,
            accepted_by:       row.accepted_by,
            accepted_at:       row.accepted_at,
            confirmed_by:      row.confirmed_by,
            confirmed_at:      row.confirmed_at,
            payment_rate:      row.payment_rate,
            payment_status:    parse(&row.payment_status)?,
        })
    }
}

/// Appends the filter's `WHERE` clause.
fn push_filter<'a>(query: &mut QueryBuilder<'a, MySql>, filter: &'a CoverFilter) {
    query.push(" WHERE 1 = 1");

    if !filter.statuses.is_empty() {
        query.push(" AND status IN (");
        let mut separated = query.separated(", ");
        for status in &filter.statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(")");
    }
    if let Some(ids) = &filter.session_ids {
        if ids.is_empty() {
            query.push(" AND 1 = 0");
        } else {
            query.push(" AND session_id IN (");
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
        }
    }
    if let Some(id) = &filter.accepted_by {
        query.push(" AND accepted_by = ").push_bind(id);
    }
    if let Some(at) = filter.starts_from {
        query.push(" AND session_date_time >= ").push_bind(at);
    }
    if let Some(at) = filter.starts_before {
        query.push(" AND session_date_time < ").push_bind(at);
    }
    if let Some(date) = filter.cover_date_from {
        query.push(" AND cover_date >= ").push_bind(date);
    }
    if let Some(date) = filter.cover_date_to {
        query.push(" AND cover_date <= ").push_bind(date);
    }
}

#[async_trait]
impl CoverRequestStore for MySqlStore {
    async fn find(&self, id: &str) -> StoreResult<Option<CoverRequest>> {
        sqlx::query_as::<_, CoverRow>(&format!("SELECT {COVER_COLUMNS} FROM cover_requests WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(CoverRequest::try_from)
            .transpose()
    }

    async fn insert_unique(&self, request: &CoverRequest) -> StoreResult<()> {
        // The unique key on the generated `active_slot` column rejects a
        // second live request for the same slot.
        sqlx::query(
            "INSERT INTO cover_requests
                (id, session_id, cover_date, session_date_time, reason, urgency, status,
                 requested_by, requested_for, requested_at, accepted_by, accepted_at,
                 confirmed_by, confirmed_at, payment_rate, payment_status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id)
        .bind(&request.session_id)
        .bind(request.cover_date)
        .bind(request.session_date_time)
        .bind(&request.reason)
        .bind(request.urgency.as_str())
        .bind(request.status.as_str())
        .bind(&request.requested_by)
        .bind(&request.requested_for)
        .bind(request.requested_at)
        .bind(&request.accepted_by)
        .bind(request.accepted_at)
        .bind(&request.confirmed_by)
        .bind(request.confirmed_at)
        .bind(request.payment_rate)
        .bind(request.payment_status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn transition(&self, request: &CoverRequest, from: CoverStatus) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE cover_requests SET
                reason = ?, urgency = ?, status = ?, accepted_by = ?, accepted_at = ?,
                confirmed_by = ?, confirmed_at = ?, payment_rate = ?, payment_status = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&request.reason)
        .bind(request.urgency.as_str())
        .bind(request.status.as_str())
        .bind(&request.accepted_by)
        .bind(request.accepted_at)
        .bind(&request.confirmed_by)
        .bind(request.confirmed_at)
        .bind(request.payment_rate)
        .bind(request.payment_status.as_str())
        .bind(&request.id)
        .bind(from.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT id FROM cover_requests WHERE id = ?")
                .bind(&request.id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            return Err(if exists { StoreError::Conflict } else { StoreError::NotFound });
        }
        Ok(())
    }

    async fn list(&self, filter: &CoverFilter) -> StoreResult<Vec<CoverRequest>> {
        let mut query = QueryBuilder::<MySql>::new(format!("SELECT {COVER_COLUMNS} FROM cover_requests"));
        push_filter(&mut query, filter);

        query.push(if filter.newest_first {
            " ORDER BY session_date_time DESC"
        } else {
            " ORDER BY session_date_time ASC"
        });
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        query
            .build_query_as::<CoverRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CoverRequest::try_from)
            .collect()
    }

    async fn count(&self, filter: &CoverFilter) -> StoreResult<u64> {
        let mut query = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM cover_requests");
        push_filter(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
