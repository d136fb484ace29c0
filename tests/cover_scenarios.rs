//! End-to-end cover scenarios against the in-memory store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use leisure_cover::{
    errors::CoreError,
    models::{AssignmentType, AuditContext, AuditEvent, CoverStatus, DayOfWeek, TemplateType, User},
    services::{
        cover::{self, InstructorCoverRequest, NewCoverRequest},
        eligibility,
        instructors::{self, QualificationsUpdate, Registration},
        stats,
        timetable::{self, NewSession, NewTemplate},
    },
    store::{AuditSink, StoreError, StoreResult, Stores},
};

fn at(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn admin() -> AuditContext {
    AuditContext::user("admin")
}

async fn approved_instructor(stores: &Stores, name: &str, quals: &[&str]) -> User {
    let user = instructors::register(
        stores,
        Registration {
            email:             format!("{}@leisure.test", name.to_lowercase()),
            password:          "correct-horse-battery".into(),
            first_name:        name.into(),
            last_name:         "Tester".into(),
            phone:             None,
            emergency_contact: None,
        },
        &AuditContext::default(),
        at(1, 1, 9),
    )
    .await
    .unwrap();

    instructors::approve(stores, &user.id, &admin(), at(1, 1, 10)).await.unwrap();
    instructors::update_qualifications(
        stores,
        &user.id,
        QualificationsUpdate {
            qualifications: quals.iter().map(|q| q.to_string()).collect(),
            hourly_rate:    None,
        },
        &admin(),
        at(1, 1, 10),
    )
    .await
    .unwrap()
}

struct Centre {
    stores:  Stores,
    alice:   User,
    bob:     User,
    carol:   User,
    session: String,
}

/// Template T (2024), active, with Session S on Mondays 09:00-10:00 in the
/// pool, permanently taught by Alice.
async fn centre(stores: Stores) -> Centre {
    let alice = approved_instructor(&stores, "Alice", &["Swimming Teacher"]).await;
    let bob = approved_instructor(&stores, "Bob", &["Swimming Teacher", "Lifeguard"]).await;
    let carol = approved_instructor(&stores, "Carol", &["Senior Swimming Coach"]).await;

    let template = timetable::create_template(
        &stores,
        NewTemplate {
            name:           "2024".into(),
            template_type:  TemplateType::Weekly,
            effective_from: date(1, 1),
            effective_to:   Some(date(12, 31)),
        },
        &admin(),
        at(1, 1, 11),
    )
    .await
    .unwrap();
    timetable::activate_template(&stores, &template.id, &admin(), at(1, 1, 11)).await.unwrap();

    let session = timetable::add_session(
        &stores,
        &template.id,
        NewSession {
            class_name:              "Aqua Fit".into(),
            description:             None,
            day_of_week:             DayOfWeek::MONDAY,
            start_time:              "09:00".into(),
            end_time:                "10:00".into(),
            venue:                   "Pool".into(),
            max_participants:        Some(20),
            assignment_type:         AssignmentType::Permanent,
            permanent_instructor_id: Some(alice.id.clone()),
            required_qualifications: vec!["swimming".into()],
        },
        &admin(),
        at(1, 1, 12),
    )
    .await
    .unwrap();

    Centre {
        stores,
        alice,
        bob,
        carol,
        session: session.id,
    }
}

fn cover_on(session: &str, on: NaiveDate) -> NewCoverRequest {
    NewCoverRequest {
        session_id:   session.to_owned(),
        cover_date:   on,
        urgency:      None,
        reason:       Some("Holiday".into()),
        payment_rate: None,
    }
}

#[tokio::test]
async fn happy_path_counts_towards_bobs_march() {
    let c = centre(Stores::in_memory()).await;

    let request = cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 8))
        .await
        .unwrap();
    assert_eq!(request.requested_for.as_deref(), Some(c.alice.id.as_str()));

    let bob_ctx = AuditContext::user(c.bob.id.clone());
    cover::accept(&c.stores, &request.id, &c.bob, &bob_ctx, at(3, 2, 9)).await.unwrap();
    let confirmed = cover::confirm(&c.stores, &request.id, &admin(), at(3, 2, 10)).await.unwrap();
    assert_eq!(confirmed.status, CoverStatus::Confirmed);
    assert_eq!(confirmed.accepted_by.as_deref(), Some(c.bob.id.as_str()));

    let report = stats::instructor_stats(&c.stores, &c.bob, 25.0, at(3, 20, 12)).await.unwrap();
    let march = report.current_month.expect("March bucket");
    assert_eq!(march.key, "2024-03");
    assert_eq!(march.covers, 1);
    assert_eq!(march.sessions, 0);
    assert!((march.hours - 1.0).abs() < 1e-9);
    assert!((march.earnings - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn duplicate_request_is_rejected_while_open() {
    let c = centre(Stores::in_memory()).await;

    cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 8))
        .await
        .unwrap();
    let again = cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 9)).await;
    assert!(matches!(again, Err(CoreError::DuplicateRequest)));

    let by_alice = cover::request_by_instructor(
        &c.stores,
        &c.alice,
        InstructorCoverRequest {
            session_id: c.session.clone(),
            cover_date: date(3, 4),
            reason:     None,
        },
        &AuditContext::user(c.alice.id.clone()),
        at(3, 1, 9),
    )
    .await;
    assert!(matches!(by_alice, Err(CoreError::DuplicateRequest)));
}

#[tokio::test]
async fn decline_reopens_for_carol() {
    let c = centre(Stores::in_memory()).await;
    let request = cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 8))
        .await
        .unwrap();

    cover::accept(&c.stores, &request.id, &c.bob, &AuditContext::user(c.bob.id.clone()), at(3, 2, 9))
        .await
        .unwrap();
    let reopened = cover::decline(&c.stores, &request.id, &admin(), at(3, 2, 10)).await.unwrap();
    assert_eq!(reopened.status, CoverStatus::Open);
    assert!(reopened.accepted_by.is_none());
    assert!(reopened.accepted_at.is_none());

    let open = eligibility::list_open_opportunities(&c.stores, &c.carol, at(3, 2, 11)).await.unwrap();
    assert_eq!(open.open_requests.len(), 1);

    let taken = cover::accept(&c.stores, &request.id, &c.carol, &AuditContext::user(c.carol.id.clone()), at(3, 2, 11))
        .await
        .unwrap();
    assert_eq!(taken.accepted_by.as_deref(), Some(c.carol.id.as_str()));
}

#[tokio::test]
async fn past_date_is_rejected() {
    let c = centre(Stores::in_memory()).await;
    let err = cover::create(&c.stores, cover_on(&c.session, date(2, 26)), &admin(), at(3, 1, 8))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PastDate));
}

#[tokio::test]
async fn guards_on_who_may_act() {
    let c = centre(Stores::in_memory()).await;

    let not_mine = cover::request_by_instructor(
        &c.stores,
        &c.bob,
        InstructorCoverRequest {
            session_id: c.session.clone(),
            cover_date: date(3, 11),
            reason:     None,
        },
        &AuditContext::user(c.bob.id.clone()),
        at(3, 1, 8),
    )
    .await;
    assert!(matches!(not_mine, Err(CoreError::NotYourSession)));

    let request = cover::create(&c.stores, cover_on(&c.session, date(3, 11)), &admin(), at(3, 1, 8))
        .await
        .unwrap();
    let own = cover::accept(&c.stores, &request.id, &c.alice, &AuditContext::user(c.alice.id.clone()), at(3, 1, 9)).await;
    assert!(matches!(own, Err(CoreError::SelfAcceptance)));

    let late = cover::accept(&c.stores, &request.id, &c.bob, &AuditContext::user(c.bob.id.clone()), at(3, 11, 10)).await;
    assert!(matches!(late, Err(CoreError::SessionPassed)));
}

#[tokio::test]
async fn confirmed_requests_cannot_be_cancelled() {
    let c = centre(Stores::in_memory()).await;
    let request = cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 8))
        .await
        .unwrap();
    cover::accept(&c.stores, &request.id, &c.bob, &AuditContext::user(c.bob.id.clone()), at(3, 2, 9))
        .await
        .unwrap();
    cover::confirm(&c.stores, &request.id, &admin(), at(3, 2, 10)).await.unwrap();

    let err = cover::cancel(&c.stores, &request.id, &admin(), at(3, 2, 11)).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyClosed));

    let completed = cover::complete_past_confirmed(&c.stores, at(3, 4, 12)).await.unwrap();
    assert_eq!(completed, 1);
    let stored = c.stores.covers.find(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CoverStatus::Completed);
}

struct BrokenSink;

#[async_trait]
impl AuditSink for BrokenSink {
    async fn record(&self, _event: &AuditEvent) -> StoreResult<()> {
        Err(StoreError::Backend(anyhow::anyhow!("audit table unavailable")))
    }

    async fn purge_expired(&self, _now: NaiveDateTime) -> StoreResult<u64> {
        Ok(0)
    }
}

#[tokio::test]
async fn failing_audit_sink_does_not_fail_operations() {
    let c = centre(Stores::in_memory().with_audit(Arc::new(BrokenSink))).await;

    let request = cover::create(&c.stores, cover_on(&c.session, date(3, 4)), &admin(), at(3, 1, 8))
        .await
        .unwrap();
    cover::accept(&c.stores, &request.id, &c.bob, &AuditContext::user(c.bob.id.clone()), at(3, 2, 9))
        .await
        .unwrap();
    let confirmed = cover::confirm(&c.stores, &request.id, &admin(), at(3, 2, 10)).await.unwrap();
    assert_eq!(confirmed.status, CoverStatus::Confirmed);
}
