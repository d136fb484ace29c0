//! Cover requests and their state machine.
//!
//! ```text
//! open ──accept──▶ accepted ──confirm──▶ confirmed ──(session passes)──▶ completed
//!  ▲                  │
//!  └─────decline──────┘
//! open | accepted ──cancel──▶ cancelled
//! ```
//!
//! The transition methods are pure: they check the guard, mutate `self` and
//! leave persistence and auditing to the caller.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::user::is_eligible;
use crate::errors::{CoreError, CoreResult};

string_enum!(
    Urgency {
        Urgent         => "urgent",
        Normal         => "normal",
        AdvancePlanned => "advance_planned",
    }
);

impl Urgency {
    /// Sort key: most urgent first.
    pub fn rank(self) -> u8 {
        match self {
            Urgency::Urgent => 0,
            Urgency::Normal => 1,
            Urgency::AdvancePlanned => 2,
        }
    }

    /// Urgency from how far ahead of the session the request is raised.
    pub fn from_lead_time(now: NaiveDateTime, session_at: NaiveDateTime) -> Self {
        let hours = (session_at - now).num_minutes() as f64 / 60.0;
        if hours < 24.0 {
            Urgency::Urgent
        } else if hours < 72.0 {
            Urgency::Normal
        } else {
            Urgency::AdvancePlanned
        }
    }
}

impl Default for Urgency {
    fn default() -> Self {
        Self::Normal
    }
}

string_enum!(
    CoverStatus {
        Open      => "open",
        Accepted  => "accepted",
        Confirmed => "confirmed",
        Cancelled => "cancelled",
        Completed => "completed",
    }
);

impl CoverStatus {
    pub const ALL: [CoverStatus; 5] = [
        CoverStatus::Open,
        CoverStatus::Accepted,
        CoverStatus::Confirmed,
        CoverStatus::Cancelled,
        CoverStatus::Completed,
    ];

    /// Statuses that occupy the `(session, cover_date)` slot.
    pub fn holds_slot(self) -> bool {
        matches!(self, CoverStatus::Open | CoverStatus::Accepted | CoverStatus::Confirmed)
    }
}

string_enum!(
    PaymentStatus {
        Pending  => "pending",
        Approved => "approved",
        Paid     => "paid",
    }
);

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CoverRequest {
    pub id:                String,
    pub session_id:        String,
    pub cover_date:        NaiveDate,
    pub session_date_time: NaiveDateTime,
    pub reason:            Option<String>,
    pub urgency:           Urgency,
    pub status:            CoverStatus,
    pub requested_by:      String,
    pub requested_for:     Option<String>,
    pub requested_at:      NaiveDateTime,
    pub accepted_by:       Option<String>,
    pub accepted_at:       Option<NaiveDateTime>,
    pub confirmed_by:      Option<String>,
    pub confirmed_at:      Option<NaiveDateTime>,
    pub payment_rate:      Option<f64>,
    pub payment_status:    PaymentStatus,
}

impl CoverRequest {
    pub fn is_past_due(&self, now: NaiveDateTime) -> bool {
        self.session_date_time < now
    }

    pub fn accept(
        &mut self,
        instructor_id: &str,
        instructor_quals: &[String],
        required_quals: &[String],
        now: NaiveDateTime,
    ) -> CoreResult<()> {
        if self.status != CoverStatus::Open {
            return Err(CoreError::NotOpen);
        }
        if self.requested_for.as_deref() == Some(instructor_id) {
            return Err(CoreError::SelfAcceptance);
        }
        if self.is_past_due(now) {
            return Err(CoreError::SessionPassed);
        }
        if !is_eligible(instructor_quals, required_quals) {
            return Err(CoreError::Unqualified);
        }

        self.status = CoverStatus::Accepted;
        self.accepted_by = Some(instructor_id.to_owned());
        self.accepted_at = Some(now);
        Ok(())
    }

    pub fn confirm(&mut self, admin_id: &str, now: NaiveDateTime) -> CoreResult<()> {
        if self.status != CoverStatus::Accepted {
            return Err(CoreError::NotAccepted);
        }
        self.status = CoverStatus::Confirmed;
        self.confirmed_by = Some(admin_id.to_owned());
        self.confirmed_at = Some(now);
        Ok(())
    }

    /// Re-opens an accepted request. Returns the instructor whose acceptance
    /// was declined.
    pub fn decline(&mut self) -> CoreResult<Option<String>> {
        if self.status != CoverStatus::Accepted {
            return Err(CoreError::NotAccepted);
        }
        self.status = CoverStatus::Open;
        self.accepted_at = None;
        Ok(self.accepted_by.take())
    }

    pub fn cancel(&mut self) -> CoreResult<()> {
        match self.status {
            CoverStatus::Open | CoverStatus::Accepted => {
                self.status = CoverStatus::Cancelled;
                Ok(())
            }
            CoverStatus::Confirmed | CoverStatus::Cancelled | CoverStatus::Completed => {
                Err(CoreError::AlreadyClosed)
            }
        }
    }

    /// Marks a confirmed cover whose session has passed as completed.
    pub fn complete(&mut self, now: NaiveDateTime) -> CoreResult<()> {
        if self.status != CoverStatus::Confirmed {
            return Err(CoreError::InvalidInput(
                "Only confirmed cover requests can be completed".into(),
            ));
        }
        if !self.is_past_due(now) {
            return Err(CoreError::InvalidInput(
                "Cover request session has not happened yet".into(),
            ));
        }
        self.status = CoverStatus::Completed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn request() -> CoverRequest {
        CoverRequest {
            id:                "cr-1".into(),
            session_id:        "s-1".into(),
            cover_date:        NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            session_date_time: at(11, 9),
            reason:            Some("Holiday".into()),
            urgency:           Urgency::Normal,
            status:            CoverStatus::Open,
            requested_by:      "admin".into(),
            requested_for:     Some("alice".into()),
            requested_at:      at(1, 8),
            accepted_by:       None,
            accepted_at:       None,
            confirmed_by:      None,
            confirmed_at:      None,
            payment_rate:      None,
            payment_status:    PaymentStatus::Pending,
        }
    }

    fn quals(list: &[&str]) -> Vec<String> {
        list.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn accept_then_confirm() {
        let mut req = request();
        req.accept("bob", &quals(&["Swimming Teacher"]), &quals(&["swimming"]), at(2, 8))
            .unwrap();
        assert_eq!(req.status, CoverStatus::Accepted);
        assert_eq!(req.accepted_by.as_deref(), Some("bob"));

        req.confirm("admin", at(3, 8)).unwrap();
        assert_eq!(req.status, CoverStatus::Confirmed);
        assert_eq!(req.confirmed_at, Some(at(3, 8)));
    }

    #[test]
    fn accept_guards_run_in_order() {
        let mut req = request();
        assert!(matches!(
            req.accept("alice", &[], &[], at(2, 8)),
            Err(CoreError::SelfAcceptance)
        ));
        assert!(matches!(
            req.accept("bob", &[], &[], at(12, 8)),
            Err(CoreError::SessionPassed)
        ));
        assert!(matches!(
            req.accept("bob", &quals(&["Yoga"]), &quals(&["Lifeguard"]), at(2, 8)),
            Err(CoreError::Unqualified)
        ));

        req.status = CoverStatus::Cancelled;
        assert!(matches!(req.accept("bob", &[], &[], at(2, 8)), Err(CoreError::NotOpen)));
    }

    #[test]
    fn decline_reopens_and_clears_acceptance() {
        let mut req = request();
        req.accept("bob", &[], &[], at(2, 8)).unwrap();
        let declined = req.decline().unwrap();
        assert_eq!(declined.as_deref(), Some("bob"));
        assert_eq!(req.status, CoverStatus::Open);
        assert!(req.accepted_by.is_none());
        assert!(req.accepted_at.is_none());
    }

    #[test]
    fn closed_requests_reject_every_transition() {
        for status in [CoverStatus::Cancelled, CoverStatus::Completed] {
            let mut req = request();
            req.status = status;
            assert!(req.accept("bob", &[], &[], at(2, 8)).is_err());
            assert!(req.confirm("admin", at(2, 8)).is_err());
            assert!(req.decline().is_err());
            assert!(matches!(req.cancel(), Err(CoreError::AlreadyClosed)));
            assert_eq!(req.status, status);
        }
    }

    #[test]
    fn confirmed_cannot_be_cancelled_but_completes_after_session() {
        let mut req = request();
        req.status = CoverStatus::Confirmed;
        assert!(matches!(req.cancel(), Err(CoreError::AlreadyClosed)));
        assert!(req.complete(at(10, 8)).is_err());
        req.complete(at(11, 10)).unwrap();
        assert_eq!(req.status, CoverStatus::Completed);
    }

    #[test]
    fn urgency_follows_lead_time() {
        let session = at(11, 9);
        assert_eq!(Urgency::from_lead_time(at(10, 10), session), Urgency::Urgent);
        assert_eq!(Urgency::from_lead_time(at(10, 9), session), Urgency::Normal);
        assert_eq!(Urgency::from_lead_time(at(8, 10), session), Urgency::Normal);
        assert_eq!(Urgency::from_lead_time(at(8, 9), session), Urgency::AdvancePlanned);
        assert!(Urgency::Urgent.rank() < Urgency::Normal.rank());
        assert!(Urgency::Normal.rank() < Urgency::AdvancePlanned.rank());
    }

    #[test]
    fn only_live_statuses_hold_the_slot() {
        let holding: Vec<_> = CoverStatus::ALL.into_iter().filter(|s| s.holds_slot()).collect();
        assert_eq!(
            holding,
            vec![CoverStatus::Open, CoverStatus::Accepted, CoverStatus::Confirmed]
        );
    }
}
