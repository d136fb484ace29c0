use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::Config;
use crate::models::user::{Profile, Role, User, UserStatus};
use crate::store::Stores;

/// Seeds the admin account from `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD`.
/// Safe to call on every startup; existence is checked before inserting.
pub async fn seed_admin(stores: &Stores, config: &Config, now: NaiveDateTime) -> anyhow::Result<()> {
    if config.seed_admin_password.is_empty() {
        tracing::info!("SEED_ADMIN_PASSWORD not set; skipping admin seed");
        return Ok(());
    }

    let email = config.seed_admin_email.trim().to_lowercase();
    let hash = hash_password(&config.seed_admin_password)?;

    match stores.users.find_by_email(&email).await? {
        Some(mut existing) => {
            // Keep seeded credentials consistent for local/dev access.
            if config.is_development() {
                existing.password_hash = hash;
                stores.users.save(&existing).await?;
                tracing::info!(%email, "Updated seeded admin password");
            }
        }

        None => {
            let admin = User {
                id:            Uuid::new_v4().to_string(),
                email:         email.clone(),
                password_hash: hash,
                status:        UserStatus::Approved,
                profile:       Profile {
                    first_name:        "Centre".into(),
                    last_name:         "Admin".into(),
                    phone:             None,
                    emergency_contact: None,
                },
                role:          Role::Admin,
                approved_at:   Some(now),
                approved_by:   None,
                created_at:    now,
            };
            stores.users.insert(&admin).await?;
            tracing::info!(%email, "Seeded admin account");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[tokio::test]
    async fn seeds_once() {
        let stores = Stores::in_memory();
        let mut config = Config::in_memory();
        config.seed_admin_password = "change-me-please".into();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();

        seed_admin(&stores, &config, now).await.unwrap();
        seed_admin(&stores, &config, now).await.unwrap();

        let admin = stores.users.find_by_email("admin@leisure.local").await.unwrap().unwrap();
        assert!(admin.is_admin());
        assert!(admin.is_approved());
    }
}
