//! MySQL adapter. One pool-backed [`MySqlStore`] implements every port.

use std::{str::FromStr, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};

use super::{StoreError, StoreResult, Stores};
use crate::{
    config::Config,
    db::Db,
    notify::{LogNotifier, SmtpNotifier},
};

mod audit;
mod cover;
mod documents;
mod timetable;
mod users;

#[derive(Clone)]
pub struct MySqlStore {
    pool: Db,
}

impl MySqlStore {
    pub fn new(pool: Db) -> Self {
        Self { pool }
    }
}

/// Production store bundle. Notifications go out by email when SMTP is
/// configured and are only logged otherwise.
pub fn stores(pool: Db, config: &Config) -> Stores {
    let store = MySqlStore::new(pool);
    let users: Arc<dyn super::UserStore> = Arc::new(store.clone());

    let notifier: Arc<dyn super::NotificationSender> = if !config.smtp_configured() {
        tracing::warn!("SMTP_HOST not set; cover notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        match SmtpNotifier::new(config, users.clone()) {
            Ok(smtp) => Arc::new(smtp),
            Err(err) => {
                tracing::error!(error = %err, "SMTP misconfigured; cover notifications will only be logged");
                Arc::new(LogNotifier)
            }
        }
    };

    Stores {
        users,
        templates: Arc::new(store.clone()),
        sessions: Arc::new(store.clone()),
        covers: Arc::new(store.clone()),
        documents: Arc::new(store.clone()),
        audit: Arc::new(store),
        notifier,
    }
}

// ── Column helpers ───────────────────────────────────────────

fn parse<T>(value: &str) -> StoreResult<T>
where
    T: FromStr,
    StoreError: From<T::Err>,
{
    Ok(value.parse::<T>()?)
}

fn from_json<T: DeserializeOwned>(column: &str, value: &str) -> StoreResult<T> {
    serde_json::from_str(value).map_err(|e| StoreError::Corrupt(format!("{column}: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(e.into()))
}
