//! Timetable templates and their recurring sessions.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    errors::{CoreError, CoreResult},
    models::{
        timetable::endless_end, AssignmentType, AuditContext, DayOfWeek, RoleKind, Session,
        TemplateStatus, TemplateType, TimeWindow, TimetableTemplate, User, UserStatus,
    },
    store::{SessionFilter, StoreError, Stores, UserFilter},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTemplate {
    #[validate(length(min = 1, max = 100, message = "Template name is required"))]
    pub name:           String,
    #[serde(rename = "type")]
    pub template_type:  TemplateType,
    pub effective_from: NaiveDate,
    /// `None` creates an endless template.
    pub effective_to:   Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSession {
    #[validate(length(min = 1, max = 100, message = "Class name is required"))]
    pub class_name:              String,
    #[validate(length(max = 500))]
    pub description:             Option<String>,
    pub day_of_week:             DayOfWeek,
    pub start_time:              String,
    pub end_time:                String,
    #[validate(length(min = 1, max = 100, message = "Venue is required"))]
    pub venue:                   String,
    #[validate(range(min = 1))]
    pub max_participants:        Option<u32>,
    #[serde(default)]
    pub assignment_type:         AssignmentType,
    pub permanent_instructor_id: Option<String>,
    #[serde(default)]
    pub required_qualifications: Vec<String>,
}

pub async fn create_template(
    stores: &Stores,
    input: NewTemplate,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<TimetableTemplate> {
    input.validate()?;

    let endless = input.effective_to.is_none();
    let effective_to = input
        .effective_to
        .unwrap_or_else(|| endless_end(input.effective_from));
    if input.effective_from >= effective_to {
        return Err(CoreError::InvalidTimeRange);
    }

    if endless {
        if let Some(active) = stores.templates.find_active().await? {
            if active.ranges_overlap(input.effective_from, effective_to) {
                return Err(CoreError::InvalidInput(
                    "Templates that overlap with the current active template must have an end date"
                        .into(),
                ));
            }
        }
    }

    let template = TimetableTemplate {
        id:             Uuid::new_v4().to_string(),
        name:           input.name.trim().to_owned(),
        template_type:  input.template_type,
        status:         TemplateStatus::Draft,
        effective_from: input.effective_from,
        effective_to,
        session_count:  0,
        created_by:     ctx.performed_by.clone().unwrap_or_default(),
        created_at:     now,
    };
    stores.templates.insert(&template).await?;

    audit::emit(
        stores,
        ctx,
        "timetable_template_created",
        "TimetableTemplate",
        &template.id,
        json!({
            "template_name": template.name,
            "template_type": template.template_type,
            "is_endless": endless,
        }),
        now,
    )
    .await;

    tracing::info!(template = %template.id, name = %template.name, "Timetable template created");
    Ok(template)
}

pub async fn add_session(
    stores: &Stores,
    template_id: &str,
    input: NewSession,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<Session> {
    input.validate()?;

    let template = stores
        .templates
        .find(template_id)
        .await?
        .ok_or(CoreError::TemplateNotFound)?;

    let window = TimeWindow::parse(&input.start_time, &input.end_time)?;

    let permanent_instructor_id = match input.assignment_type {
        AssignmentType::Permanent => {
            let id = input.permanent_instructor_id.ok_or_else(|| {
                CoreError::InvalidInput("A permanent session needs an instructor".into())
            })?;
            let instructor = stores.users.find(&id).await?.ok_or(CoreError::UserNotFound)?;
            if instructor.is_admin() {
                return Err(CoreError::InvalidInput("User is not an instructor".into()));
            }
            Some(id)
        }
        AssignmentType::Open | AssignmentType::CoverNeeded => None,
    };

    let session = Session {
        id:                      Uuid::new_v4().to_string(),
        template_id:             template.id.clone(),
        class_name:              input.class_name.trim().to_owned(),
        description:             input.description.filter(|d| !d.trim().is_empty()),
        day_of_week:             input.day_of_week,
        window,
        duration_minutes:        window.duration_minutes(),
        max_participants:        input.max_participants,
        venue:                   input.venue.trim().to_owned(),
        required_qualifications: input
            .required_qualifications
            .iter()
            .map(|q| q.trim().to_owned())
            .filter(|q| !q.is_empty())
            .collect(),
        assignment_type:         input.assignment_type,
        permanent_instructor_id,
        is_active:               true,
        created_by:              ctx.performed_by.clone().unwrap_or_default(),
        created_at:              now,
    };

    match stores.sessions.insert_unless_conflicting(&session).await {
        Ok(()) => {}
        Err(StoreError::Conflict) => return Err(CoreError::SessionConflict),
        Err(StoreError::NotFound) => return Err(CoreError::TemplateNotFound),
        Err(err) => return Err(err.into()),
    }

    audit::emit(
        stores,
        ctx,
        "session_created",
        "Session",
        &session.id,
        json!({
            "session_name": session.class_name,
            "template_name": template.name,
        }),
        now,
    )
    .await;

    Ok(session)
}

pub async fn activate_template(
    stores: &Stores,
    template_id: &str,
    ctx: &AuditContext,
    now: NaiveDateTime,
) -> CoreResult<TimetableTemplate> {
    let mut template = stores
        .templates
        .find(template_id)
        .await?
        .ok_or(CoreError::TemplateNotFound)?;

    if template.is_active() {
        return Err(CoreError::AlreadyActive);
    }

    stores.templates.activate(&template.id).await.map_err(|err| match err {
        StoreError::NotFound => CoreError::TemplateNotFound,
        other => other.into(),
    })?;
    template.status = TemplateStatus::Active;

    audit::emit(
        stores,
        ctx,
        "timetable_activated",
        "TimetableTemplate",
        &template.id,
        json!({ "template_name": template.name }),
        now,
    )
    .await;

    tracing::info!(template = %template.id, "Timetable template activated");
    Ok(template)
}

/// The single active template, read fresh from the store on every call.
pub async fn find_active(stores: &Stores) -> CoreResult<Option<TimetableTemplate>> {
    Ok(stores.templates.find_active().await?)
}

pub async fn list_templates(stores: &Stores) -> CoreResult<Vec<TimetableTemplate>> {
    Ok(stores.templates.list().await?)
}

#[derive(Debug, Serialize)]
pub struct TemplateDetail {
    pub template:              TimetableTemplate,
    pub sessions:              Vec<Session>,
    /// Approved instructors who can be given permanent sessions.
    pub available_instructors: Vec<User>,
}

pub async fn template_detail(stores: &Stores, template_id: &str) -> CoreResult<TemplateDetail> {
    let template = stores
        .templates
        .find(template_id)
        .await?
        .ok_or(CoreError::TemplateNotFound)?;

    let sessions = stores
        .sessions
        .list(&SessionFilter {
            template_id: Some(template.id.clone()),
            active_only: true,
            ..SessionFilter::default()
        })
        .await?;

    let mut available_instructors = stores
        .users
        .list(&UserFilter {
            role:   Some(RoleKind::Instructor),
            status: Some(UserStatus::Approved),
        })
        .await?;
    available_instructors.sort_by(|a, b| a.profile.first_name.cmp(&b.profile.first_name));

    Ok(TemplateDetail {
        template,
        sessions,
        available_instructors,
    })
}

/// Active sessions of the active template, with the template itself.
pub async fn active_sessions(
    stores: &Stores,
) -> CoreResult<Option<(TimetableTemplate, Vec<Session>)>> {
    let Some(template) = stores.templates.find_active().await? else {
        return Ok(None);
    };
    let sessions = stores
        .sessions
        .list(&SessionFilter {
            template_id: Some(template.id.clone()),
            active_only: true,
            ..SessionFilter::default()
        })
        .await?;
    Ok(Some((template, sessions)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn template_input(to: Option<NaiveDate>) -> NewTemplate {
        NewTemplate {
            name:           "Spring 2024".into(),
            template_type:  TemplateType::Weekly,
            effective_from: date(2024, 1, 1),
            effective_to:   to,
        }
    }

    fn session_input(day: DayOfWeek, start: &str, end: &str, venue: &str) -> NewSession {
        NewSession {
            class_name:              "Aqua Fit".into(),
            description:             None,
            day_of_week:             day,
            start_time:              start.into(),
            end_time:                end.into(),
            venue:                   venue.into(),
            max_participants:        Some(20),
            assignment_type:         AssignmentType::Open,
            permanent_instructor_id: None,
            required_qualifications: vec![],
        }
    }

    fn admin() -> AuditContext {
        AuditContext::user("admin")
    }

    #[tokio::test]
    async fn endless_template_gets_century_end_date() {
        let stores = Stores::in_memory();
        let template = create_template(&stores, template_input(None), &admin(), now())
            .await
            .unwrap();
        assert_eq!(template.effective_to, date(2124, 1, 1));
        assert_eq!(template.status, TemplateStatus::Draft);
    }

    #[tokio::test]
    async fn inverted_date_range_is_rejected() {
        let stores = Stores::in_memory();
        let err = create_template(&stores, template_input(Some(date(2024, 1, 1))), &admin(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimeRange));
    }

    #[tokio::test]
    async fn endless_template_overlapping_active_is_rejected() {
        let stores = Stores::in_memory();
        let first = create_template(&stores, template_input(Some(date(2024, 6, 30))), &admin(), now())
            .await
            .unwrap();
        activate_template(&stores, &first.id, &admin(), now()).await.unwrap();

        let err = create_template(&stores, template_input(None), &admin(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));

        let bounded = create_template(&stores, template_input(Some(date(2024, 3, 1))), &admin(), now()).await;
        assert!(bounded.is_ok());
    }

    #[tokio::test]
    async fn overlapping_session_in_same_venue_conflicts() {
        let stores = Stores::in_memory();
        let template = create_template(&stores, template_input(None), &admin(), now())
            .await
            .unwrap();

        add_session(&stores, &template.id, session_input(DayOfWeek::MONDAY, "09:00", "10:00", "Main Pool"), &admin(), now())
            .await
            .unwrap();

        let clash = add_session(&stores, &template.id, session_input(DayOfWeek::MONDAY, "09:30", "10:30", "Main Pool"), &admin(), now()).await;
        assert!(matches!(clash, Err(CoreError::SessionConflict)));

        // adjacent, other venue, other day
        for input in [
            session_input(DayOfWeek::MONDAY, "10:00", "11:00", "Main Pool"),
            session_input(DayOfWeek::MONDAY, "09:30", "10:30", "Studio 1"),
            session_input(DayOfWeek::TUESDAY, "09:30", "10:30", "Main Pool"),
        ] {
            add_session(&stores, &template.id, input, &admin(), now()).await.unwrap();
        }

        let stored = stores.templates.find(&template.id).await.unwrap().unwrap();
        assert_eq!(stored.session_count, 4);
    }

    #[tokio::test]
    async fn session_on_missing_template_is_not_found() {
        let stores = Stores::in_memory();
        let err = add_session(&stores, "nope", session_input(DayOfWeek::MONDAY, "09:00", "10:00", "Gym"), &admin(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TemplateNotFound));
    }

    #[tokio::test]
    async fn zero_length_session_is_rejected() {
        let stores = Stores::in_memory();
        let template = create_template(&stores, template_input(None), &admin(), now())
            .await
            .unwrap();
        let err = add_session(&stores, &template.id, session_input(DayOfWeek::MONDAY, "09:00", "09:00", "Gym"), &admin(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTimeRange));
    }

    #[tokio::test]
    async fn activation_keeps_a_single_active_template() {
        let stores = Stores::in_memory();
        let a = create_template(&stores, template_input(Some(date(2024, 6, 30))), &admin(), now())
            .await
            .unwrap();
        let b = create_template(&stores, template_input(Some(date(2024, 12, 31))), &admin(), now())
            .await
            .unwrap();

        activate_template(&stores, &a.id, &admin(), now()).await.unwrap();
        assert!(matches!(
            activate_template(&stores, &a.id, &admin(), now()).await,
            Err(CoreError::AlreadyActive)
        ));
        activate_template(&stores, &b.id, &admin(), now()).await.unwrap();

        let all = list_templates(&stores).await.unwrap();
        let active: Vec<_> = all.iter().filter(|t| t.is_active()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b.id);
        assert_eq!(find_active(&stores).await.unwrap().unwrap().id, b.id);

        let archived = stores.templates.find(&a.id).await.unwrap().unwrap();
        assert_eq!(archived.status, TemplateStatus::Archived);
    }
}
