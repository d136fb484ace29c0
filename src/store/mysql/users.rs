use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::{from_json, parse, to_json, MySqlStore};
use crate::{
    models::{
        user::{EmergencyContact, InstructorStats, Preferences, Profile},
        InstructorData, Role, RoleKind, User,
    },
    store::{StoreError, StoreResult, UserFilter, UserStore},
};

const USER_COLUMNS: &str = "id, email, password_hash, role, status, first_name, last_name, phone, \
     emergency_contact, qualifications, hourly_rate, max_hours_per_week, preferences, stats, \
     approved_at, approved_by, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id:                 String,
    email:              String,
    password_hash:      String,
    role:               String,
    status:             String,
    first_name:         String,
    last_name:          String,
    phone:              Option<String>,
    emergency_contact:  Option<String>,
    qualifications:     Option<String>,
    hourly_rate:        Option<f64>,
    max_hours_per_week: Option<u32>,
    preferences:        Option<String>,
    stats:              Option<String>,
    approved_at:        Option<NaiveDateTime>,
    approved_by:        Option<String>,
    created_at:         NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> StoreResult<Self> {
        let emergency_contact: Option<EmergencyContact> = row
            .emergency_contact
            .as_deref()
            .map(|json| from_json("emergency_contact", json))
            .transpose()?;

        let role = match parse::<RoleKind>(&row.role)? {
            RoleKind::Admin => Role::Admin,
            RoleKind::Instructor => Role::Instructor(InstructorData {
                qualifications:     row
                    .qualifications
                    .as_deref()
                    .map(|json| from_json("qualifications", json))
                    .transpose()?
                    .unwrap_or_default(),
                hourly_rate:        row.hourly_rate,
                max_hours_per_week: row.max_hours_per_week,
                preferences:        row
                    .preferences
                    .as_deref()
                    .map(|json| from_json::<Preferences>("preferences", json))
                    .transpose()?
                    .unwrap_or_default(),
                stats:              row
                    .stats
                    .as_deref()
                    .map(|json| from_json::<InstructorStats>("stats", json))
                    .transpose()?
                    .unwrap_or_default(),
            }),
        };

        Ok(User {
            id:            row.id,
            email:         row.email,
            password_hash: row.password_hash,
            status:        parse(&row.status)?,
            profile:       Profile {
                first_name: row.first_name,
                last_name:  row.last_name,
                phone:      row.phone,
                emergency_contact,
            },
            role,
            approved_at:   row.approved_at,
            approved_by:   row.approved_by,
            created_at:    row.created_at,
        })
    }
}

/// Instructor-only columns, `None` for admins.
struct InstructorColumns {
    qualifications:     Option<String>,
    hourly_rate:        Option<f64>,
    max_hours_per_week: Option<u32>,
    preferences:        Option<String>,
    stats:              Option<String>,
}

impl InstructorColumns {
    fn of(user: &User) -> StoreResult<Self> {
        Ok(match user.instructor() {
            Some(data) => Self {
                qualifications:     Some(to_json(&data.qualifications)?),
                hourly_rate:        data.hourly_rate,
                max_hours_per_week: data.max_hours_per_week,
                preferences:        Some(to_json(&data.preferences)?),
                stats:              Some(to_json(&data.stats)?),
            },
            None => Self {
                qualifications:     None,
                hourly_rate:        None,
                max_hours_per_week: None,
                preferences:        None,
                stats:              None,
            },
        })
    }
}

fn emergency_json(user: &User) -> StoreResult<Option<String>> {
    user.profile.emergency_contact.as_ref().map(to_json).transpose()
}

fn into_users(rows: Vec<UserRow>) -> StoreResult<Vec<User>> {
    rows.into_iter().map(User::try_from).collect()
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn find(&self, id: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn insert(&self, user: &User) -> StoreResult<()> {
        let extra = InstructorColumns::of(user)?;
        sqlx::query(
            "INSERT INTO users
                (id, email, password_hash, role, status, first_name, last_name, phone,
                 emergency_contact, qualifications, hourly_rate, max_hours_per_week,
                 preferences, stats, approved_at, approved_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.kind().as_str())
        .bind(user.status.as_str())
        .bind(&user.profile.first_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.phone)
        .bind(emergency_json(user)?)
        .bind(extra.qualifications)
        .bind(extra.hourly_rate)
        .bind(extra.max_hours_per_week)
        .bind(extra.preferences)
        .bind(extra.stats)
        .bind(user.approved_at)
        .bind(&user.approved_by)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        let extra = InstructorColumns::of(user)?;
        let result = sqlx::query(
            "UPDATE users SET
                email = ?, password_hash = ?, status = ?, first_name = ?, last_name = ?,
                phone = ?, emergency_contact = ?, qualifications = ?, hourly_rate = ?,
                max_hours_per_week = ?, preferences = ?, stats = ?, approved_at = ?,
                approved_by = ?
             WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(&user.profile.first_name)
        .bind(&user.profile.last_name)
        .bind(&user.profile.phone)
        .bind(emergency_json(user)?)
        .bind(extra.qualifications)
        .bind(extra.hourly_rate)
        .bind(extra.max_hours_per_week)
        .bind(extra.preferences)
        .bind(extra.stats)
        .bind(user.approved_at)
        .bind(&user.approved_by)
        .bind(&user.id)
        .execute(&self.pool)
        .await?;

        // MySQL reports changed rows, so an identical save affects zero rows.
        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(&user.id)
                .fetch_one(&self.pool)
                .await?;
            if !exists {
                return Err(StoreError::NotFound);
            }
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE (? IS NULL OR role = ?) AND (? IS NULL OR status = ?)
             ORDER BY created_at DESC"
        ))
        .bind(filter.role.map(|r| r.as_str()))
        .bind(filter.role.map(|r| r.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        into_users(rows)
    }

    async fn create_login(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: NaiveDateTime,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO user_sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_login(&self, token_hash: &str, now: NaiveDateTime) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT u.* FROM user_sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > ?",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn delete_login(&self, token_hash: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM user_sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
