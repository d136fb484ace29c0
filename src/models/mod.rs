//! Domain types. Everything here is storage-agnostic: the `store` adapters
//! translate to and from rows.

/// Declares a string-backed enum with `as_str`, `Display`, `FromStr` and
/// serde support using the same wire spelling as the database column.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::errors::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok(Self::$variant), )+
                    other => Err(crate::errors::CoreError::InvalidInput(format!(
                        "Invalid {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

pub mod audit;
pub mod cover;
pub mod document;
pub mod time;
pub mod timetable;
pub mod user;

pub use audit::{AuditContext, AuditEvent};
pub use cover::{CoverRequest, CoverStatus, PaymentStatus, Urgency};
pub use document::{Document, DocumentStatus, DocumentType};
pub use time::{ClockTime, DayOfWeek, TimeWindow};
pub use timetable::{AssignmentType, Session, TemplateStatus, TemplateType, TimetableTemplate};
pub use user::{InstructorData, Role, RoleKind, User, UserStatus};
