use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use super::{parse, MySqlStore};
use crate::{
    models::Document,
    store::{DocumentFilter, DocumentStore, StoreError, StoreResult},
};

const DOCUMENT_COLUMNS: &str = "id, instructor_id, document_type, qualification_type, file_name, \
     file_size, file_path, uploaded_at, status, reviewed_by, reviewed_at, review_notes, \
     issue_date, expiry_date, is_required, notes";

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id:                 String,
    instructor_id:      String,
    document_type:      String,
    qualification_type: Option<String>,
    file_name:          String,
    file_size:          u64,
    file_path:          String,
    uploaded_at:        NaiveDateTime,
    status:             String,
    reviewed_by:        Option<String>,
    reviewed_at:        Option<NaiveDateTime>,
    review_notes:       Option<String>,
    issue_date:         Option<NaiveDate>,
    expiry_date:        Option<NaiveDate>,
    is_required:        bool,
    notes:              Option<String>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> StoreResult<Self> {
        Ok(Document {
            id:                 row.id,
            instructor_id:      row.instructor_id,
            document_type:      parse(&row.document_type)?,
            qualification_type: row.qualification_type,
            file_name:          row.file_name,
            file_size:          row.file_size,
            file_path:          row.file_path,
            uploaded_at:        row.uploaded_at,
            status:             parse(&row.status)?,
            reviewed_by:        row.reviewed_by,
            reviewed_at:        row.reviewed_at,
            review_notes:       row.review_notes,
            issue_date:         row.issue_date,
            expiry_date:        row.expiry_date,
            is_required:        row.is_required,
            notes:              row.notes,
        })
    }
}

#[async_trait]
impl DocumentStore for MySqlStore {
    async fn insert(&self, document: &Document) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents
                (id, instructor_id, document_type, qualification_type, file_name, file_size,
                 file_path, uploaded_at, status, reviewed_by, reviewed_at, review_notes,
                 issue_date, expiry_date, is_required, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.id)
        .bind(&document.instructor_id)
        .bind(document.document_type.as_str())
        .bind(&document.qualification_type)
        .bind(&document.file_name)
        .bind(document.file_size)
        .bind(&document.file_path)
        .bind(document.uploaded_at)
        .bind(document.status.as_str())
        .bind(&document.reviewed_by)
        .bind(document.reviewed_at)
        .bind(&document.review_notes)
        .bind(document.issue_date)
        .bind(document.expiry_date)
        .bind(document.is_required)
        .bind(&document.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: &str) -> StoreResult<Option<Document>> {
        sqlx::query_as::<_, DocumentRow>(&format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Document::try_from)
            .transpose()
    }

    async fn save(&self, document: &Document) -> StoreResult<()> {
        sqlx::query(
            "UPDATE documents SET
                status = ?, reviewed_by = ?, reviewed_at = ?, review_notes = ?,
                issue_date = ?, expiry_date = ?, is_required = ?, notes = ?
             WHERE id = ?",
        )
        .bind(document.status.as_str())
        .bind(&document.reviewed_by)
        .bind(document.reviewed_at)
        .bind(&document.review_notes)
        .bind(document.issue_date)
        .bind(document.expiry_date)
        .bind(document.is_required)
        .bind(&document.notes)
        .bind(&document.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, filter: &DocumentFilter) -> StoreResult<Vec<Document>> {
        sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE (? IS NULL OR instructor_id = ?) AND (? IS NULL OR status = ?)
             ORDER BY uploaded_at DESC"
        ))
        .bind(&filter.instructor_id)
        .bind(&filter.instructor_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Document::try_from)
        .collect()
    }
}
