use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

string_enum!(
    /// Approval status of an account.
    UserStatus {
        Pending   => "pending",
        Approved  => "approved",
        Rejected  => "rejected",
        Suspended => "suspended",
    }
);

string_enum!(
    /// How often an instructor wants cover-opportunity emails.
    DigestPreference {
        Immediate => "immediate",
        Daily     => "daily",
        Weekly    => "weekly",
        Off       => "off",
    }
);

string_enum!(
    RoleKind {
        Admin      => "admin",
        Instructor => "instructor",
    }
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name:         String,
    pub phone:        String,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name:        String,
    pub last_name:         String,
    pub phone:             Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub email_digest:     DigestPreference,
    pub cover_types:      Vec<String>,
    pub min_notice_hours: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            email_digest:     DigestPreference::Immediate,
            cover_types:      Vec::new(),
            min_notice_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorStats {
    pub total_hours_worked:         f64,
    pub sessions_this_month:        u32,
    pub covers_accepted_this_month: u32,
    /// 1 (poor) to 5 (excellent).
    pub reliability_score:          u8,
    pub last_active:                Option<NaiveDateTime>,
}

impl Default for InstructorStats {
    fn default() -> Self {
        Self {
            total_hours_worked:         0.0,
            sessions_this_month:        0,
            covers_accepted_this_month: 0,
            reliability_score:          5,
            last_active:                None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstructorData {
    pub qualifications:     Vec<String>,
    pub hourly_rate:        Option<f64>,
    pub max_hours_per_week: Option<u32>,
    pub preferences:        Preferences,
    pub stats:              InstructorStats,
}

/// Qualification match between an instructor and a session. True when
/// nothing is required, or when any required and any held qualification
/// contain one another (case-insensitive). "Swimming Teacher Level 2"
/// satisfies "swimming", and "Yoga" satisfies "Yoga Instructor".
pub fn is_eligible(instructor_quals: &[String], required_quals: &[String]) -> bool {
    if required_quals.is_empty() {
        return true;
    }
    let held: Vec<String> = instructor_quals.iter().map(|q| q.to_lowercase()).collect();
    required_quals.iter().any(|required| {
        let required = required.to_lowercase();
        held.iter()
            .any(|q| q.contains(&required) || required.contains(q.as_str()))
    })
}

/// Admins carry no extra data; instructors carry their qualifications and
/// working preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor(InstructorData),
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Admin => RoleKind::Admin,
            Role::Instructor(_) => RoleKind::Instructor,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id:            String,
    pub email:         String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub status:        UserStatus,
    pub profile:       Profile,
    #[serde(flatten)]
    pub role:          Role,
    pub approved_at:   Option<NaiveDateTime>,
    pub approved_by:   Option<String>,
    pub created_at:    NaiveDateTime,
}

impl User {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }

    pub fn is_approved(&self) -> bool {
        self.status == UserStatus::Approved
    }

    pub fn instructor(&self) -> Option<&InstructorData> {
        match &self.role {
            Role::Instructor(data) => Some(data),
            Role::Admin => None,
        }
    }

    pub fn instructor_mut(&mut self) -> Option<&mut InstructorData> {
        match &mut self.role {
            Role::Instructor(data) => Some(data),
            Role::Admin => None,
        }
    }

    /// Qualifications of an instructor; admins have none.
    pub fn qualifications(&self) -> &[String] {
        self.instructor()
            .map(|data| data.qualifications.as_slice())
            .unwrap_or(&[])
    }

    pub fn hourly_rate(&self) -> Option<f64> {
        self.instructor().and_then(|data| data.hourly_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_as_tag_with_flattened_data() {
        let role = Role::Instructor(InstructorData {
            qualifications: vec!["Swimming Teacher".into()],
            ..InstructorData::default()
        });
        let value = serde_json::to_value(&role).unwrap();
        assert_eq!(value["role"], "instructor");
        assert_eq!(value["qualifications"][0], "Swimming Teacher");
        assert_eq!(value["preferences"]["min_notice_hours"], 24);

        let admin = serde_json::to_value(Role::Admin).unwrap();
        assert_eq!(admin["role"], "admin");
    }

    fn quals(list: &[&str]) -> Vec<String> {
        list.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn nothing_required_means_everyone_qualifies() {
        assert!(is_eligible(&[], &[]));
        assert!(is_eligible(&quals(&["Yoga"]), &[]));
    }

    #[test]
    fn substring_match_in_either_direction() {
        assert!(is_eligible(&quals(&["Swimming Teacher Level 2"]), &quals(&["swimming"])));
        assert!(is_eligible(&quals(&["yoga"]), &quals(&["Yoga Instructor"])));
        assert!(is_eligible(
            &quals(&["First Aid", "Spin"]),
            &quals(&["Lifeguard", "SPIN"])
        ));
    }

    #[test]
    fn unrelated_or_missing_qualifications_fail() {
        assert!(!is_eligible(&quals(&["Pilates"]), &quals(&["Lifeguard"])));
        assert!(!is_eligible(&[], &quals(&["Lifeguard"])));
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("suspended".parse::<UserStatus>().unwrap(), UserStatus::Suspended);
        assert!("banned".parse::<UserStatus>().is_err());
    }
}
