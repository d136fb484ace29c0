//! An instructor's own timetable, one Monday-to-Sunday week at a time.

use std::collections::HashMap;

use chrono::{Datelike, Days, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    errors::{CoreError, CoreResult},
    models::{CoverRequest, CoverStatus, DayOfWeek, Session, User},
    store::{CoverFilter, SessionFilter, Stores},
};

#[derive(Debug, Clone, Serialize)]
pub struct WeekEntry {
    pub date:              NaiveDate,
    pub starts_at:         NaiveDateTime,
    pub session:           Session,
    /// The live (open, accepted or confirmed) request for this date.
    pub cover_request:     Option<CoverRequest>,
    pub is_past:           bool,
    pub is_same_day:       bool,
    pub can_request_cover: bool,
    /// Minutes until start, for sessions later today.
    pub minutes_until:     Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekView {
    pub week_offset:     i32,
    pub start_of_week:   NaiveDate,
    pub end_of_week:     NaiveDate,
    pub sessions:        Vec<WeekEntry>,
    pub can_go_previous: bool,
    pub can_go_next:     bool,
}

/// How far either way the view may page from the current week.
pub const MAX_WEEK_OFFSET: i32 = 520;

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

pub async fn week_view(
    stores: &Stores,
    instructor: &User,
    now: NaiveDateTime,
    week_offset: i32,
) -> CoreResult<WeekView> {
    if !(-MAX_WEEK_OFFSET..=MAX_WEEK_OFFSET).contains(&week_offset) {
        return Err(CoreError::InvalidInput(format!(
            "week_offset must be between -{MAX_WEEK_OFFSET} and {MAX_WEEK_OFFSET}"
        )));
    }
    let out_of_range = || CoreError::InvalidInput("week_offset is out of range".into());

    let today = now.date();
    let start_of_week = week_start(today)
        .checked_add_signed(Duration::weeks(i64::from(week_offset)))
        .ok_or_else(out_of_range)?;
    let end_of_week = start_of_week
        .checked_add_days(Days::new(6))
        .ok_or_else(out_of_range)?;

    let mut view = WeekView {
        week_offset,
        start_of_week,
        end_of_week,
        sessions: Vec::new(),
        can_go_previous: false,
        can_go_next: false,
    };

    let Some(template) = stores.templates.find_active().await? else {
        return Ok(view);
    };
    view.can_go_previous = start_of_week
        .checked_sub_days(Days::new(7))
        .is_some_and(|prev| prev >= template.effective_from);
    view.can_go_next = end_of_week
        .checked_add_days(Days::new(7))
        .is_some_and(|next| next <= template.effective_to);

    let sessions = stores
        .sessions
        .list(&SessionFilter {
            template_id:   Some(template.id.clone()),
            instructor_id: Some(instructor.id.clone()),
            active_only:   true,
        })
        .await?;
    if sessions.is_empty() {
        return Ok(view);
    }

    let live = stores
        .covers
        .list(&CoverFilter {
            statuses:        CoverStatus::ALL.into_iter().filter(|s| s.holds_slot()).collect(),
            session_ids:     Some(sessions.iter().map(|s| s.id.clone()).collect()),
            cover_date_from: Some(start_of_week),
            cover_date_to:   Some(end_of_week),
            ..CoverFilter::default()
        })
        .await?;
    let mut by_slot: HashMap<(String, NaiveDate), CoverRequest> = live
        .into_iter()
        .map(|r| ((r.session_id.clone(), r.cover_date), r))
        .collect();

    for date in start_of_week.iter_days().take(7) {
        let day = DayOfWeek::of(date);
        for session in sessions.iter().filter(|s| s.day_of_week == day) {
            let starts_at = session.starts_at(date);
            let cover_request = by_slot.remove(&(session.id.clone(), date));
            let is_past = starts_at < now;
            let is_same_day = date == today;

            view.sessions.push(WeekEntry {
                date,
                starts_at,
                session: session.clone(),
                can_request_cover: !is_past && cover_request.is_none(),
                cover_request,
                is_past,
                is_same_day,
                minutes_until: (is_same_day && !is_past).then(|| (starts_at - now).num_minutes()),
            });
        }
    }

    Ok(view)
}
