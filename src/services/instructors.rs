//! Accounts: instructor registration and approval, and login sessions.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    auth::{generate_token, hash_password, token_digest, verify_password},
    errors::{CoreError, CoreResult},
    models::{
        user::{EmergencyContact, Profile},
        AuditContext, InstructorData, Role, RoleKind, User, UserStatus,
    },
    store::{StoreError, Stores, UserFilter},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(email(message = "Please provide a valid email"))]
    pub email:             String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password:          String,
    #[validate(length(min = 1, max = 50, message = "First name is required"))]
    pub first_name:        String,
    #[validate(length(min = 1, max = 50, message = "Last name is required"))]
    pub last_name:         String,
    #[validate(length(max = 30))]
    pub phone:             Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QualificationsUpdate {
    pub qualifications: Vec<String>,
    #[validate(range(min = 0.0, message = "Hourly rate cannot be negative"))]
    pub hourly_rate:    Option<f64>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn load_instructor(stores: &Stores, id: &str) -> CoreResult<User> {
    let user = stores.users.find(id).await?.ok_or(CoreError::UserNotFound)?;
    if user.is_admin() {
        return Err(CoreError::InvalidInput("User is not an instructor".into()));
    }
    Ok(user)
}

fn user_details(user: &User) -> serde_json::Value {
    json!({
        "instructor_email": user.email,
        "instructor_name": user.profile.full_name(),
    })
}

/// Creates a `pending` instructor account.
pub async fn register(
    stores: &Stores,
    input: Registration,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<User> {
    input.validate()?;

    let email = normalize_email(&input.email);
    if stores.users.find_by_email(&email).await?.is_some() {
        return Err(CoreError::EmailTaken);
    }

    let user = User {
        id:            Uuid::new_v4().to_string(),
        email,
        password_hash: hash_password(&input.password)?,
        status:        UserStatus::Pending,
        profile:       Profile {
            first_name:        input.first_name.trim().to_owned(),
            last_name:         input.last_name.trim().to_owned(),
            phone:             input.phone.filter(|p| !p.trim().is_empty()),
            emergency_contact: input.emergency_contact,
        },
        role:          Role::Instructor(InstructorData::default()),
        approved_at:   None,
        approved_by:   None,
        created_at:    now,
    };

    // The unique index closes the race between the lookup above and this insert.
    stores.users.insert(&user).await.map_err(|err| match err {
        StoreError::Conflict => CoreError::EmailTaken,
        other => other.into(),
    })?;

    let ctx = AuditContext {
        performed_by: Some(user.id.clone()),
        ..ctx.clone()
    };
    audit::emit(stores, &ctx, "user_registered", "User", &user.id, json!({ "email": user.email }), now).await;

    tracing::info!(user = %user.id, "Instructor registered");
    Ok(user)
}

async fn set_status(
    stores: &Stores,
    id: &str,
    status: UserStatus,
    action: &str,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<User> {
    let mut user = load_instructor(stores, id).await?;
    user.status = status;
    if status == UserStatus::Approved {
        user.approved_at = Some(now);
        user.approved_by = ctx.performed_by.clone();
    }
    stores.users.save(&user).await?;

    audit::emit(stores, ctx, action, "User", &user.id, user_details(&user), now).await;
    Ok(user)
}

pub async fn approve(stores: &Stores, id: &str, ctx: &AuditContext, now: NaiveDateTime) -> CoreResult<User> {
    set_status(stores, id, UserStatus::Approved, "instructor_approved", ctx, now).await
}

pub async fn reject(stores: &Stores, id: &str, ctx: &AuditContext, now: NaiveDateTime) -> CoreResult<User> {
    set_status(stores, id, UserStatus::Rejected, "instructor_rejected", ctx, now).await
}

pub async fn suspend(stores: &Stores, id: &str, ctx: &AuditContext, now: NaiveDateTime) -> CoreResult<User> {
    set_status(stores, id, UserStatus::Suspended, "instructor_suspended", ctx, now).await
}

pub async fn update_qualifications(
    stores: &Stores,
    id: &str,
    input: QualificationsUpdate,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<User> {
    input.validate()?;

    let mut user = load_instructor(stores, id).await?;
    let qualifications: Vec<String> = input
        .qualifications
        .iter()
        .map(|q| q.trim().to_owned())
        .filter(|q| !q.is_empty())
        .collect();

    if let Some(data) = user.instructor_mut() {
        data.qualifications = qualifications.clone();
        if input.hourly_rate.is_some() {
            data.hourly_rate = input.hourly_rate;
        }
    }
    stores.users.save(&user).await?;

    audit::emit(
        stores,
        ctx,
        "instructor_qualifications_updated",
        "User",
        &user.id,
        json!({ "qualifications": qualifications, "hourly_rate": user.hourly_rate() }),
        now,
    )
    .await;
    Ok(user)
}

/// Hard delete. The audit event is written first so the trail survives.
pub async fn delete(stores: &Stores, id: &str, ctx: &AuditContext, now: NaiveDateTime) -> CoreResult<()> {
    let user = load_instructor(stores, id).await?;

    let mut details = user_details(&user);
    details["instructor_status"] = json!(user.status);
    audit::emit(stores, ctx, "instructor_deleted", "User", &user.id, details, now).await;

    stores.users.delete(&user.id).await.map_err(|err| match err {
        StoreError::NotFound => CoreError::UserNotFound,
        other => other.into(),
    })?;
    tracing::info!(user = %user.id, "Instructor deleted");
    Ok(())
}

#[derive(Debug, Default, Serialize)]
pub struct InstructorDirectory {
    pub pending:   Vec<User>,
    pub approved:  Vec<User>,
    pub rejected:  Vec<User>,
    pub suspended: Vec<User>,
}

pub async fn list_instructors(stores: &Stores) -> CoreResult<InstructorDirectory> {
    let all = stores
        .users
        .list(&UserFilter {
            role: Some(RoleKind::Instructor),
            ..UserFilter::default()
        })
        .await?;

    let mut directory = InstructorDirectory::default();
    for user in all {
        match user.status {
            UserStatus::Pending => directory.pending.push(user),
            UserStatus::Approved => directory.approved.push(user),
            UserStatus::Rejected => directory.rejected.push(user),
            UserStatus::Suspended => directory.suspended.push(user),
        }
    }
    Ok(directory)
}

// ── Login sessions ────────────────────────────────────────────

#[derive(Debug)]
pub struct LoginOutcome {
    pub user:  User,
    /// Raw token for the cookie; only its digest is stored.
    pub token: String,
}

pub async fn login(
    stores: &Stores,
    email: &str,
    password: &str,
    session_days: i64,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<LoginOutcome> {
    let user = stores
        .users
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or(CoreError::InvalidCredentials)?;

    verify_password(password, &user.password_hash)?;
    ensure_approved(&user)?;

    let token = generate_token();
    stores
        .users
        .create_login(&token_digest(&token), &user.id, now + Duration::days(session_days))
        .await?;

    let ctx = AuditContext {
        performed_by: Some(user.id.clone()),
        ..ctx.clone()
    };
    audit::emit(stores, &ctx, "user_login", "User", &user.id, json!({}), now).await;

    Ok(LoginOutcome { user, token })
}

pub async fn logout(stores: &Stores, token: &str) -> CoreResult<()> {
    stores.users.delete_login(&token_digest(token)).await?;
    Ok(())
}

/// Resolves a session cookie to its user, if the session is live.
pub async fn user_for_token(stores: &Stores, token: &str, now: NaiveDateTime) -> CoreResult<Option<User>> {
    Ok(stores.users.user_for_login(&token_digest(token), now).await?)
}

/// Instructors may only act once an admin has approved them. Admins pass.
pub fn ensure_approved(user: &User) -> CoreResult<()> {
    if user.is_admin() || user.is_approved() {
        Ok(())
    } else {
        Err(CoreError::NotApproved)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email:             email.into(),
            password:          "swim-fast-2024".into(),
            first_name:        "Alice".into(),
            last_name:         "Jones".into(),
            phone:             None,
            emergency_contact: None,
        }
    }

    #[tokio::test]
    async fn registration_is_pending_with_defaults() {
        let stores = Stores::in_memory();
        let user = register(&stores, registration("Alice@Example.com"), &AuditContext::default(), now())
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.status, UserStatus::Pending);
        let data = user.instructor().unwrap();
        assert!(data.qualifications.is_empty());
        assert_eq!(data.stats.reliability_score, 5);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let stores = Stores::in_memory();
        register(&stores, registration("alice@example.com"), &AuditContext::default(), now())
            .await
            .unwrap();
        let err = register(&stores, registration("ALICE@example.com"), &AuditContext::default(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmailTaken));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let stores = Stores::in_memory();
        let mut input = registration("bob@example.com");
        input.password = "short".into();
        let err = register(&stores, input, &AuditContext::default(), now()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn login_requires_approval() {
        let stores = Stores::in_memory();
        let user = register(&stores, registration("alice@example.com"), &AuditContext::default(), now())
            .await
            .unwrap();

        let pending = login(&stores, "alice@example.com", "swim-fast-2024", 7, &AuditContext::default(), now()).await;
        assert!(matches!(pending, Err(CoreError::NotApproved)));

        approve(&stores, &user.id, &AuditContext::user("admin"), now()).await.unwrap();
        let wrong = login(&stores, "alice@example.com", "nope-nope", 7, &AuditContext::default(), now()).await;
        assert!(matches!(wrong, Err(CoreError::InvalidCredentials)));

        let outcome = login(&stores, "alice@example.com", "swim-fast-2024", 7, &AuditContext::default(), now())
            .await
            .unwrap();
        let resolved = user_for_token(&stores, &outcome.token, now()).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id.clone()));

        let expired = user_for_token(&stores, &outcome.token, now() + Duration::days(8)).await.unwrap();
        assert!(expired.is_none());

        logout(&stores, &outcome.token).await.unwrap();
        assert!(user_for_token(&stores, &outcome.token, now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn qualifications_and_directory() {
        let stores = Stores::in_memory();
        let admin = AuditContext::user("admin");
        let alice = register(&stores, registration("alice@example.com"), &AuditContext::default(), now())
            .await
            .unwrap();
        let bob = register(&stores, registration("bob@example.com"), &AuditContext::default(), now())
            .await
            .unwrap();

        approve(&stores, &alice.id, &admin, now()).await.unwrap();
        suspend(&stores, &bob.id, &admin, now()).await.unwrap();
        let updated = update_qualifications(
            &stores,
            &alice.id,
            QualificationsUpdate {
                qualifications: vec![" Swimming Teacher ".into(), "".into()],
                hourly_rate:    Some(22.5),
            },
            &admin,
            now(),
        )
        .await
        .unwrap();
        assert_eq!(updated.qualifications(), ["Swimming Teacher".to_string()]);
        assert_eq!(updated.hourly_rate(), Some(22.5));
        assert_eq!(updated.approved_by.as_deref(), Some("admin"));

        let directory = list_instructors(&stores).await.unwrap();
        assert_eq!(directory.approved.len(), 1);
        assert_eq!(directory.suspended.len(), 1);

        delete(&stores, &bob.id, &admin, now()).await.unwrap();
        assert!(matches!(
            delete(&stores, &bob.id, &admin, now()).await,
            Err(CoreError::UserNotFound)
        ));
    }
}
