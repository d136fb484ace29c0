//! Error types.
//!
//! `CoreError` is what the scheduling and cover services return for expected
//! business-rule violations; only `CoreError::Store` / `CoreError::Internal`
//! are faults. `AppError` is the HTTP-facing wrapper that renders a JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Coarse classification of a [`CoreError`], used by callers that only care
/// about the category (the HTTP layer maps these to status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    Forbidden,
    Unauthenticated,
    InvalidInput,
    Temporal,
    Fault,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // ── NotFound ──────────────────────────────────────────────
    #[error("Timetable template not found")]
    TemplateNotFound,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Cover request not found")]
    CoverRequestNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Document not found")]
    DocumentNotFound,

    // ── InvalidState ──────────────────────────────────────────
    #[error("Template is already active")]
    AlreadyActive,
    #[error("This cover request is no longer available")]
    NotOpen,
    #[error("Only accepted cover requests can be confirmed or declined")]
    NotAccepted,
    #[error("Cover request is already closed")]
    AlreadyClosed,

    // ── Conflict ──────────────────────────────────────────────
    #[error("Session time conflicts with existing session in the same venue")]
    SessionConflict,
    #[error("Cover request already exists for this session on this date")]
    DuplicateRequest,
    #[error("An account with this email already exists")]
    EmailTaken,

    // ── Forbidden ─────────────────────────────────────────────
    #[error("Session not found or not assigned to you")]
    NotYourSession,
    #[error("You cannot accept your own cover request")]
    SelfAcceptance,
    #[error("You do not meet the qualification requirements for this session")]
    Unqualified,
    #[error("Your account is pending admin approval")]
    NotApproved,

    // ── Unauthenticated ───────────────────────────────────────
    #[error("Invalid email or password")]
    InvalidCredentials,

    // ── InvalidInput ──────────────────────────────────────────
    #[error("Cannot request cover for past dates")]
    PastDate,
    #[error("End time must be after start time")]
    InvalidTimeRange,
    #[error("{0}")]
    InvalidInput(String),

    // ── Temporal ──────────────────────────────────────────────
    #[error("Cannot request cover for sessions that have already started or passed")]
    TooLate,
    #[error("This session has already passed")]
    SessionPassed,

    // ── Fault ─────────────────────────────────────────────────
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateNotFound
            | Self::SessionNotFound
            | Self::CoverRequestNotFound
            | Self::UserNotFound
            | Self::DocumentNotFound => ErrorKind::NotFound,
            Self::AlreadyActive | Self::NotOpen | Self::NotAccepted | Self::AlreadyClosed => {
                ErrorKind::InvalidState
            }
            Self::SessionConflict | Self::DuplicateRequest | Self::EmailTaken => ErrorKind::Conflict,
            Self::NotYourSession | Self::SelfAcceptance | Self::Unqualified | Self::NotApproved => {
                ErrorKind::Forbidden
            }
            Self::InvalidCredentials => ErrorKind::Unauthenticated,
            Self::PastDate | Self::InvalidTimeRange | Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::TooLate | Self::SessionPassed => ErrorKind::Temporal,
            Self::Store(_) | Self::Internal(_) => ErrorKind::Fault,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<validator::ValidationErrors> for CoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidInput(errors.to_string())
    }
}

// ── HTTP ─────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Core(CoreError::Store(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden    => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::Core(err) => {
                let status = match err.kind() {
                    ErrorKind::NotFound        => StatusCode::NOT_FOUND,
                    ErrorKind::InvalidState    => StatusCode::CONFLICT,
                    ErrorKind::Conflict        => StatusCode::CONFLICT,
                    ErrorKind::Forbidden       => StatusCode::FORBIDDEN,
                    ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                    ErrorKind::InvalidInput    => StatusCode::BAD_REQUEST,
                    ErrorKind::Temporal        => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Fault           => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = ?err, "Core operation failed");
                    (status, "Internal server error".to_owned())
                } else {
                    (status, err.to_string())
                }
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_owned())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_are_not_faults() {
        assert_eq!(CoreError::DuplicateRequest.kind(), ErrorKind::Conflict);
        assert_eq!(CoreError::NotOpen.kind(), ErrorKind::InvalidState);
        assert_eq!(CoreError::SelfAcceptance.kind(), ErrorKind::Forbidden);
        assert_eq!(CoreError::PastDate.kind(), ErrorKind::InvalidInput);
        assert_eq!(CoreError::SessionPassed.kind(), ErrorKind::Temporal);
        assert_eq!(CoreError::Store(StoreError::NotFound).kind(), ErrorKind::Fault);
    }

    #[test]
    fn core_errors_map_to_http_status() {
        let resp = AppError::from(CoreError::SessionConflict).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::from(CoreError::Unqualified).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = AppError::from(CoreError::TooLate).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
