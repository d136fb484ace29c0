//! Hours and estimated earnings per instructor, bucketed by calendar month.
//!
//! Figures are informational only and never feed payroll.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{
    errors::CoreResult,
    models::{CoverRequest, CoverStatus, DayOfWeek, Session, TimetableTemplate, User},
    store::{CoverFilter, SessionFilter, Stores},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    Permanent,
    Cover,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakdownLine {
    /// Session id for permanent work, cover request id for covers.
    pub source_id:    String,
    pub session_name: String,
    #[serde(rename = "type")]
    pub kind:         WorkKind,
    pub count:        u32,
    pub hours:        f64,
    pub earnings:     f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthStats {
    /// `YYYY-MM`
    pub key:        String,
    pub month_name: String,
    pub sessions:   u32,
    pub covers:     u32,
    pub hours:      f64,
    pub earnings:   f64,
    pub breakdown:  Vec<BreakdownLine>,
}

impl MonthStats {
    fn new(date: NaiveDate) -> Self {
        Self {
            key:        month_key(date),
            month_name: date.format("%B %Y").to_string(),
            sessions:   0,
            covers:     0,
            hours:      0.0,
            earnings:   0.0,
            breakdown:  Vec::new(),
        }
    }

    fn add(&mut self, source_id: &str, session_name: &str, kind: WorkKind, hours: f64, rate: f64) {
        let earnings = hours * rate;
        match kind {
            WorkKind::Permanent => self.sessions += 1,
            WorkKind::Cover => self.covers += 1,
        }
        self.hours += hours;
        self.earnings += earnings;

        let line = match self
            .breakdown
            .iter_mut()
            .position(|l| l.kind == kind && l.source_id == source_id)
        {
            Some(i) => &mut self.breakdown[i],
            None => {
                self.breakdown.push(BreakdownLine {
                    source_id:    source_id.to_owned(),
                    session_name: session_name.to_owned(),
                    kind,
                    count:        0,
                    hours:        0.0,
                    earnings:     0.0,
                });
                let last = self.breakdown.len() - 1;
                &mut self.breakdown[last]
            }
        };
        line.count += 1;
        line.hours += hours;
        line.earnings += earnings;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsReport {
    pub total_hours:     f64,
    pub total_sessions:  u32,
    pub total_covers:    u32,
    pub total_earnings:  f64,
    pub current_month:   Option<MonthStats>,
    /// Newest first.
    pub previous_months: Vec<MonthStats>,
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn bucket(months: &mut BTreeMap<String, MonthStats>, date: NaiveDate) -> &mut MonthStats {
    months
        .entry(month_key(date))
        .or_insert_with(|| MonthStats::new(date))
}

/// Builds the report from already-loaded data. `permanent` pairs each of the
/// instructor's active permanent sessions with its template; `covers` holds
/// the confirmed or completed covers they taught.
pub fn aggregate(
    permanent: &[(Session, TimetableTemplate)],
    covers: &[(CoverRequest, Session)],
    hourly_rate: Option<f64>,
    fallback_rate: f64,
    now: NaiveDateTime,
) -> EarningsReport {
    let rate = hourly_rate.unwrap_or(fallback_rate);
    let mut months: BTreeMap<String, MonthStats> = BTreeMap::new();

    for (session, template) in permanent {
        let last = template.last_date_until(now.date());
        for date in template.effective_from.iter_days().take_while(|d| *d <= last) {
            if DayOfWeek::of(date) != session.day_of_week || session.starts_at(date) >= now {
                continue;
            }
            bucket(&mut months, date).add(&session.id, &session.class_name, WorkKind::Permanent, session.hours(), rate);
        }
    }

    for (cover, session) in covers {
        if !matches!(cover.status, CoverStatus::Confirmed | CoverStatus::Completed)
            || cover.session_date_time >= now
        {
            continue;
        }
        let cover_rate = cover.payment_rate.unwrap_or(rate);
        bucket(&mut months, cover.cover_date).add(&cover.id, &session.class_name, WorkKind::Cover, session.hours(), cover_rate);
    }

    let current_key = month_key(now.date());
    let current_month = months.remove(&current_key);
    let previous_months: Vec<MonthStats> = months.into_values().rev().collect();

    let all = current_month.iter().chain(previous_months.iter());
    let (mut total_hours, mut total_sessions, mut total_covers, mut total_earnings) = (0.0, 0, 0, 0.0);
    for month in all {
        total_hours += month.hours;
        total_sessions += month.sessions;
        total_covers += month.covers;
        total_earnings += month.earnings;
    }

    EarningsReport {
        total_hours,
        total_sessions,
        total_covers,
        total_earnings,
        current_month,
        previous_months,
    }
}

/// Loads everything `aggregate` needs for `instructor`.
pub async fn instructor_stats(
    stores: &Stores,
    instructor: &User,
    fallback_rate: f64,
    now: NaiveDateTime,
) -> CoreResult<EarningsReport> {
    let sessions = stores
        .sessions
        .list(&SessionFilter {
            instructor_id: Some(instructor.id.clone()),
            active_only:   true,
            ..SessionFilter::default()
        })
        .await?;

    let mut templates: HashMap<String, Option<TimetableTemplate>> = HashMap::new();
    let mut permanent = Vec::with_capacity(sessions.len());
    for session in sessions {
        if !templates.contains_key(&session.template_id) {
            let found = stores.templates.find(&session.template_id).await?;
            templates.insert(session.template_id.clone(), found);
        }
        if let Some(Some(template)) = templates.get(&session.template_id) {
            permanent.push((session, template.clone()));
        }
    }

    let taught = stores
        .covers
        .list(&CoverFilter {
            statuses:      vec![CoverStatus::Confirmed, CoverStatus::Completed],
            accepted_by:   Some(instructor.id.clone()),
            starts_before: Some(now),
            ..CoverFilter::default()
        })
        .await?;
    let covers: Vec<(CoverRequest, Session)> = super::attach_sessions(stores, taught)
        .await?
        .into_iter()
        .map(|view| (view.request, view.session))
        .collect();

    Ok(aggregate(&permanent, &covers, instructor.hourly_rate(), fallback_rate, now))
}
