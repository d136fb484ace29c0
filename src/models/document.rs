use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Documents inside this many days of expiry are flagged as expiring soon.
pub const EXPIRY_WARNING_DAYS: u64 = 30;

pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

string_enum!(
    DocumentType {
        Qualification => "qualification",
        Insurance     => "insurance",
        DbsCheck      => "dbs_check",
    }
);

string_enum!(
    DocumentStatus {
        Pending  => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Expired  => "expired",
    }
);

#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id:                 String,
    pub instructor_id:      String,
    pub document_type:      DocumentType,
    pub qualification_type: Option<String>,
    pub file_name:          String,
    pub file_size:          u64,
    pub file_path:          String,
    pub uploaded_at:        NaiveDateTime,
    pub status:             DocumentStatus,
    pub reviewed_by:        Option<String>,
    pub reviewed_at:        Option<NaiveDateTime>,
    pub review_notes:       Option<String>,
    pub issue_date:         Option<NaiveDate>,
    pub expiry_date:        Option<NaiveDate>,
    pub is_required:        bool,
    pub notes:              Option<String>,
}

impl Document {
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }

    pub fn is_expiring_soon(&self, today: NaiveDate) -> bool {
        let horizon = today + Days::new(EXPIRY_WARNING_DAYS);
        self.expiry_date
            .is_some_and(|expiry| expiry >= today && expiry <= horizon)
    }

    /// Approved documents past their expiry are stored as expired.
    pub fn apply_lazy_expiry(&mut self, today: NaiveDate) {
        if self.status == DocumentStatus::Approved && self.is_expired(today) {
            self.status = DocumentStatus::Expired;
        }
    }
}

/// Lower-cased extension of `file_name` if it is one we accept.
pub fn accepted_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    fn document(expiry: Option<NaiveDate>) -> Document {
        Document {
            id:                 "doc-1".into(),
            instructor_id:      "alice".into(),
            document_type:      DocumentType::Insurance,
            qualification_type: None,
            file_name:          "insurance.pdf".into(),
            file_size:          2048,
            file_path:          "uploads/documents/insurance.pdf".into(),
            uploaded_at:        date(1, 5).and_hms_opt(9, 0, 0).unwrap(),
            status:             DocumentStatus::Approved,
            reviewed_by:        None,
            reviewed_at:        None,
            review_notes:       None,
            issue_date:         None,
            expiry_date:        expiry,
            is_required:        true,
            notes:              None,
        }
    }

    #[test]
    fn expiry_flags() {
        let today = date(3, 1);
        let expired = document(Some(date(2, 28)));
        assert!(expired.is_expired(today));
        assert!(!expired.is_expiring_soon(today));

        let soon = document(Some(date(3, 31)));
        assert!(!soon.is_expired(today));
        assert!(soon.is_expiring_soon(today));

        let later = document(Some(date(4, 1)));
        assert!(!later.is_expiring_soon(today));

        let none = document(None);
        assert!(!none.is_expired(today) && !none.is_expiring_soon(today));
    }

    #[test]
    fn approved_documents_lapse_on_save() {
        let mut doc = document(Some(date(2, 28)));
        doc.apply_lazy_expiry(date(3, 1));
        assert_eq!(doc.status, DocumentStatus::Expired);

        let mut pending = document(Some(date(2, 28)));
        pending.status = DocumentStatus::Pending;
        pending.apply_lazy_expiry(date(3, 1));
        assert_eq!(pending.status, DocumentStatus::Pending);
    }

    #[test]
    fn only_known_extensions_are_accepted() {
        assert_eq!(accepted_extension("Cert.PDF").as_deref(), Some("pdf"));
        assert!(accepted_extension("notes.docx").is_none());
        assert!(accepted_extension("README").is_none());
    }
}
