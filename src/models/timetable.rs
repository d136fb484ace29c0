use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::time::{self, DayOfWeek, TimeWindow};

/// Endless templates run for a century from their start date.
pub const ENDLESS_TEMPLATE_MONTHS: u32 = 1200;

string_enum!(
    TemplateType {
        Weekly   => "weekly",
        BiWeekly => "bi-weekly",
    }
);

string_enum!(
    TemplateStatus {
        Draft    => "draft",
        Active   => "active",
        Archived => "archived",
    }
);

string_enum!(
    AssignmentType {
        Permanent   => "permanent",
        Open        => "open",
        CoverNeeded => "cover_needed",
    }
);

impl Default for AssignmentType {
    fn default() -> Self {
        Self::Open
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimetableTemplate {
    pub id:             String,
    pub name:           String,
    #[serde(rename = "type")]
    pub template_type:  TemplateType,
    pub status:         TemplateStatus,
    pub effective_from: NaiveDate,
    pub effective_to:   NaiveDate,
    pub session_count:  u32,
    pub created_by:     String,
    pub created_at:     NaiveDateTime,
}

impl TimetableTemplate {
    pub fn is_active(&self) -> bool {
        self.status == TemplateStatus::Active
    }

    /// Last date the template covers, clamped to `today`.
    pub fn last_date_until(&self, today: NaiveDate) -> NaiveDate {
        self.effective_to.min(today)
    }

    pub fn ranges_overlap(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.effective_from <= to && from <= self.effective_to
    }
}

/// End date for a template created without one.
pub fn endless_end(from: NaiveDate) -> NaiveDate {
    from.checked_add_months(Months::new(ENDLESS_TEMPLATE_MONTHS))
        .unwrap_or(NaiveDate::MAX)
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id:                      String,
    pub template_id:             String,
    pub class_name:              String,
    pub description:             Option<String>,
    pub day_of_week:             DayOfWeek,
    #[serde(flatten)]
    pub window:                  TimeWindow,
    pub duration_minutes:        u32,
    pub max_participants:        Option<u32>,
    pub venue:                   String,
    pub required_qualifications: Vec<String>,
    pub assignment_type:         AssignmentType,
    pub permanent_instructor_id: Option<String>,
    pub is_active:               bool,
    pub created_by:              String,
    pub created_at:              NaiveDateTime,
}

impl Session {
    pub fn conflicts_with(&self, other: &Session) -> bool {
        self.is_active
            && other.is_active
            && self.template_id == other.template_id
            && time::overlaps(
                self.day_of_week,
                &self.window,
                &self.venue,
                other.day_of_week,
                &other.window,
                &other.venue,
            )
    }

    /// The moment this session starts on `date`.
    pub fn starts_at(&self, date: NaiveDate) -> NaiveDateTime {
        self.window.start().on(date)
    }

    pub fn hours(&self) -> f64 {
        f64::from(self.duration_minutes) / 60.0
    }

    pub fn is_taught_by(&self, instructor_id: &str) -> bool {
        self.assignment_type == AssignmentType::Permanent
            && self.permanent_instructor_id.as_deref() == Some(instructor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endless_templates_run_a_century() {
        let from = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(endless_end(from), NaiveDate::from_ymd_opt(2124, 2, 29).unwrap());
    }

    #[test]
    fn template_type_uses_hyphenated_wire_name() {
        assert_eq!(TemplateType::BiWeekly.as_str(), "bi-weekly");
        assert_eq!("bi-weekly".parse::<TemplateType>().unwrap(), TemplateType::BiWeekly);
        assert_eq!(serde_json::to_value(TemplateType::Weekly).unwrap(), "weekly");
    }
}
