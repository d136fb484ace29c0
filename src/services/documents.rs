//! Instructor compliance documents. File bytes live with an external storage
//! collaborator; this module only tracks metadata and review state.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    errors::{CoreError, CoreResult},
    models::{
        document::{accepted_extension, MAX_DOCUMENT_BYTES},
        AuditContext, Document, DocumentStatus, DocumentType, User,
    },
    store::{DocumentFilter, Stores},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentUpload {
    pub document_type:      DocumentType,
    #[validate(length(max = 100))]
    pub qualification_type: Option<String>,
    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name:          String,
    pub file_size:          u64,
    /// Storage key returned by the upload collaborator.
    #[validate(length(min = 1, max = 500))]
    pub file_path:          String,
    pub issue_date:         Option<NaiveDate>,
    pub expiry_date:        Option<NaiveDate>,
    #[serde(default = "required_by_default")]
    pub is_required:        bool,
    #[validate(length(max = 1000))]
    pub notes:              Option<String>,
}

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DocumentReview {
    pub decision: ReviewDecision,
    #[validate(length(max = 1000))]
    pub notes:    Option<String>,
}

pub async fn upload(
    stores: &Stores,
    instructor: &User,
    input: DocumentUpload,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<Document> {
    input.validate()?;

    if accepted_extension(&input.file_name).is_none() {
        return Err(CoreError::InvalidInput(
            "Only PDF, JPG and PNG files are allowed".into(),
        ));
    }
    if input.file_size == 0 || input.file_size > MAX_DOCUMENT_BYTES {
        return Err(CoreError::InvalidInput("File must be between 1 byte and 10 MB".into()));
    }
    if let (Some(issued), Some(expires)) = (input.issue_date, input.expiry_date) {
        if expires < issued {
            return Err(CoreError::InvalidInput("Expiry date is before issue date".into()));
        }
    }

    let document = Document {
        id:                 Uuid::new_v4().to_string(),
        instructor_id:      instructor.id.clone(),
        document_type:      input.document_type,
        qualification_type: input.qualification_type,
        file_name:          input.file_name,
        file_size:          input.file_size,
        file_path:          input.file_path,
        uploaded_at:        now,
        status:             DocumentStatus::Pending,
        reviewed_by:        None,
        reviewed_at:        None,
        review_notes:       None,
        issue_date:         input.issue_date,
        expiry_date:        input.expiry_date,
        is_required:        input.is_required,
        notes:              input.notes,
    };
    stores.documents.insert(&document).await?;

    audit::emit(
        stores,
        ctx,
        "document_uploaded",
        "Document",
        &document.id,
        json!({ "document_type": document.document_type, "file_name": document.file_name }),
        now,
    )
    .await;
    Ok(document)
}

pub async fn review(
    stores: &Stores,
    id: &str,
    input: DocumentReview,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<Document> {
    input.validate()?;

    let mut document = stores.documents.find(id).await?.ok_or(CoreError::DocumentNotFound)?;
    let (status, action) = match input.decision {
        ReviewDecision::Approve => (DocumentStatus::Approved, "document_approved"),
        ReviewDecision::Reject => (DocumentStatus::Rejected, "document_rejected"),
    };

    document.status = status;
    document.reviewed_by = ctx.performed_by.clone();
    document.reviewed_at = Some(now);
    document.review_notes = input.notes;
    document.apply_lazy_expiry(now.date());
    stores.documents.save(&document).await?;

    audit::emit(
        stores,
        ctx,
        action,
        "Document",
        &document.id,
        json!({ "instructor_id": document.instructor_id, "status": document.status }),
        now,
    )
    .await;
    Ok(document)
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document:          Document,
    pub is_expired:        bool,
    pub is_expiring_soon:  bool,
}

#[derive(Debug, Default, Serialize)]
pub struct InstructorDocuments {
    pub documents:     Vec<DocumentView>,
    pub approved:      usize,
    pub pending:       usize,
    pub rejected:      usize,
    pub expired:       usize,
    pub expiring_soon: usize,
}

/// An instructor's documents, newest first. Approved documents found past
/// their expiry are persisted as expired on the way out.
pub async fn list_for_instructor(
    stores: &Stores,
    instructor_id: &str,
    now: NaiveDateTime,
) -> CoreResult<InstructorDocuments> {
    let today = now.date();
    let stored = stores
        .documents
        .list(&DocumentFilter {
            instructor_id: Some(instructor_id.to_owned()),
            ..DocumentFilter::default()
        })
        .await?;

    let mut out = InstructorDocuments::default();
    for mut document in stored {
        let before = document.status;
        document.apply_lazy_expiry(today);
        if document.status != before {
            stores.documents.save(&document).await?;
        }

        let view = DocumentView {
            is_expired:       document.is_expired(today),
            is_expiring_soon: document.is_expiring_soon(today),
            document,
        };

        match view.document.status {
            DocumentStatus::Approved => out.approved += 1,
            DocumentStatus::Pending => out.pending += 1,
            DocumentStatus::Rejected => out.rejected += 1,
            DocumentStatus::Expired => out.expired += 1,
        }
        if view.is_expiring_soon && view.document.status == DocumentStatus::Approved {
            out.expiring_soon += 1;
        }
        out.documents.push(view);
    }
    Ok(out)
}

/// Review queue for admins.
pub async fn list_pending(stores: &Stores) -> CoreResult<Vec<Document>> {
    Ok(stores
        .documents
        .list(&DocumentFilter {
            status: Some(DocumentStatus::Pending),
            ..DocumentFilter::default()
        })
        .await?)
}
