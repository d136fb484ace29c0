//! Cover-opportunity notifications.
//!
//! If SMTP is not configured (empty `smtp_host`), `LogNotifier` is used and
//! the fan-out is only logged. `SmtpNotifier` mails from a background task,
//! so callers never wait on the mail server.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::Config,
    models::{
        user::{is_eligible, DigestPreference},
        CoverRequest, RoleKind, Session, User, UserStatus,
    },
    store::{NotificationSender, UserFilter, UserStore},
};

pub struct LogNotifier;

#[async_trait]
impl NotificationSender for LogNotifier {
    async fn notify_eligible_instructors(&self, request: &CoverRequest, session: &Session) {
        tracing::info!(
            cover_request = %request.id,
            class = %session.class_name,
            date = %request.cover_date,
            urgency = %request.urgency,
            "Cover request open; notifications not configured"
        );
    }
}

/// Instructors to tell about `request`: qualified, not opted out, and not
/// the one the cover is for. `instructors` should already be approved.
pub fn recipients(instructors: Vec<User>, request: &CoverRequest, session: &Session) -> Vec<User> {
    instructors
        .into_iter()
        .filter(|user| request.requested_for.as_deref() != Some(user.id.as_str()))
        .filter(|user| {
            user.instructor().is_some_and(|data| {
                data.preferences.email_digest != DigestPreference::Off
                    && is_eligible(&data.qualifications, &session.required_qualifications)
            })
        })
        .collect()
}

/// Emails every approved, qualified instructor who has not opted out.
pub struct SmtpNotifier {
    mailer: Arc<Mailer>,
}

struct Mailer {
    from:      Mailbox,
    base_url:  String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    users:     Arc<dyn UserStore>,
}

impl SmtpNotifier {
    /// Builds the SMTP transport once. Fails on a bad relay host or sender.
    pub fn new(config: &Config, users: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let from: Mailbox = config
            .smtp_from
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid SMTP_FROM address"))?;

        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow::anyhow!("SMTP relay error: {e}"))?
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        Ok(Self {
            mailer: Arc::new(Mailer {
                from,
                base_url: config.app_base_url.clone(),
                transport,
                users,
            }),
        })
    }
}

impl Mailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().map_err(|_| anyhow::anyhow!("Invalid email address {to}"))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .map_err(|e| anyhow::anyhow!("Failed to build email: {e}"))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send email: {e}"))?;
        Ok(())
    }

    async fn fan_out(&self, request: CoverRequest, session: Session) {
        let filter = UserFilter {
            role:   Some(RoleKind::Instructor),
            status: Some(UserStatus::Approved),
        };
        let instructors = match self.users.list(&filter).await {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(error = %err, cover_request = %request.id, "Could not load instructors to notify");
                return;
            }
        };

        let subject = format!("Cover needed: {} on {}", session.class_name, request.cover_date);
        let body = format!(
            "Hi,\n\nCover is needed for {} at {} on {} ({}-{}).\nUrgency: {}\n\nLog in to accept: {}/instructor/open-cover\n\nLeisure Centre Cover",
            session.class_name,
            session.venue,
            request.cover_date.format("%A %-d %B %Y"),
            session.window.start(),
            session.window.end(),
            request.urgency,
            self.base_url,
        );

        let mut sent = 0usize;
        for instructor in recipients(instructors, &request, &session) {
            match self.send(&instructor.email, &subject, &body).await {
                Ok(()) => sent += 1,
                Err(err) => {
                    tracing::warn!(error = %err, to = %instructor.email, "Cover notification failed")
                }
            }
        }

        tracing::info!(cover_request = %request.id, sent, "Cover notifications sent");
    }
}

#[async_trait]
impl NotificationSender for SmtpNotifier {
    async fn notify_eligible_instructors(&self, request: &CoverRequest, session: &Session) {
        let mailer = Arc::clone(&self.mailer);
        let request = request.clone();
        let session = session.clone();
        tokio::spawn(async move { mailer.fan_out(request, session).await });
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        models::{
            user::{Preferences, Profile, Role},
            AssignmentType, DayOfWeek, InstructorData, PaymentStatus, TimeWindow, Urgency,
        },
        store::Stores,
    };

    fn at(day: u32, hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn instructor(id: &str, quals: &[&str], digest: DigestPreference) -> User {
        User {
            id:            id.into(),
            email:         format!("{id}@example.com"),
            password_hash: String::new(),
            status:        UserStatus::Approved,
            profile:       Profile {
                first_name:        id.into(),
                last_name:         "Test".into(),
                phone:             None,
                emergency_contact: None,
            },
            role:          Role::Instructor(InstructorData {
                qualifications: quals.iter().map(|q| q.to_string()).collect(),
                preferences:    Preferences {
                    email_digest: digest,
                    ..Preferences::default()
                },
                ..InstructorData::default()
            }),
            approved_at:   None,
            approved_by:   None,
            created_at:    at(1, 0),
        }
    }

    fn pool_session() -> Session {
        let window = TimeWindow::parse("09:00", "10:00").unwrap();
        Session {
            id:                      "s-1".into(),
            template_id:             "t-1".into(),
            class_name:              "Aqua Fit".into(),
            description:             None,
            day_of_week:             DayOfWeek::MONDAY,
            window,
            duration_minutes:        window.duration_minutes(),
            max_participants:        None,
            venue:                   "Main Pool".into(),
            required_qualifications: vec!["swimming".into()],
            assignment_type:         AssignmentType::Permanent,
            permanent_instructor_id: Some("alice".into()),
            is_active:               true,
            created_by:              "admin".into(),
            created_at:              at(1, 0),
        }
    }

    fn open_request() -> CoverRequest {
        CoverRequest {
            id:                "c-1".into(),
            session_id:        "s-1".into(),
            cover_date:        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            session_date_time: at(11, 9),
            reason:            None,
            urgency:           Urgency::Normal,
            status:            crate::models::CoverStatus::Open,
            requested_by:      "admin".into(),
            requested_for:     Some("alice".into()),
            requested_at:      at(1, 0),
            accepted_by:       None,
            accepted_at:       None,
            confirmed_by:      None,
            confirmed_at:      None,
            payment_rate:      None,
            payment_status:    PaymentStatus::Pending,
        }
    }

    #[test]
    fn recipients_skip_owner_opt_outs_and_unqualified() {
        let everyone = vec![
            instructor("alice", &["Swimming Teacher"], DigestPreference::Immediate),
            instructor("bob", &["Swimming Teacher"], DigestPreference::Immediate),
            instructor("carol", &["Swimming Coach"], DigestPreference::Off),
            instructor("dave", &["Pilates"], DigestPreference::Immediate),
        ];
        let picked: Vec<String> = recipients(everyone, &open_request(), &pool_session())
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(picked, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn notifying_does_not_wait_for_the_mail_server() {
        let stores = Stores::in_memory();
        stores
            .users
            .insert(&instructor("bob", &["Swimming Teacher"], DigestPreference::Immediate))
            .await
            .unwrap();

        let mut config = Config::in_memory();
        // Non-routable address: a real connect attempt would hang until timeout.
        config.smtp_host = "10.255.255.1".into();
        config.smtp_from = "cover@leisure.test".into();
        let notifier = SmtpNotifier::new(&config, stores.users.clone()).unwrap();

        let started = std::time::Instant::now();
        notifier.notify_eligible_instructors(&open_request(), &pool_session()).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn bad_sender_address_is_rejected_up_front() {
        let stores = Stores::in_memory();
        let mut config = Config::in_memory();
        config.smtp_host = "smtp.example.com".into();
        config.smtp_from = "not an address".into();
        assert!(SmtpNotifier::new(&config, stores.users).is_err());
    }
}
