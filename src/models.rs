use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::IdentityProvider;
use crate::scheduling::SchedulingEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SchedulingEngine>,
    pub identity: Arc<dyn IdentityProvider>,
}

/* -------------------------
   Enumerations
--------------------------*/

/// Stored as smallint:
/// 0 checkup, 1 cleaning, 2 filling, 3 extraction, 4 root-canal, 5 crown, 6 consultation, 7 other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "kebab-case")]
#[repr(i16)]
pub enum Category {
    Checkup = 0,
    Cleaning = 1,
    Filling = 2,
    Extraction = 3,
    RootCanal = 4,
    Crown = 5,
    Consultation = 6,
    Other = 7,
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "checkup" => Self::Checkup,
            "cleaning" => Self::Cleaning,
            "filling" => Self::Filling,
            "extraction" => Self::Extraction,
            "root-canal" => Self::RootCanal,
            "crown" => Self::Crown,
            "consultation" => Self::Consultation,
            "other" => Self::Other,
            _ => return None,
        })
    }
}

/// Stored as smallint:
/// 0 scheduled, 1 confirmed, 2 completed, 3 cancelled, 4 no-show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "kebab-case")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
    NoShow = 4,
}

impl AppointmentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "scheduled" => Self::Scheduled,
            "confirmed" => Self::Confirmed,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "no-show" => Self::NoShow,
            _ => return None,
        })
    }
}

/// Stored as smallint: 0 pending, 1 partial, 2 paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[serde(rename_all = "kebab-case")]
#[repr(i16)]
pub enum PaymentStatus {
    #[default]
    Pending = 0,
    Partial = 1,
    Paid = 2,
}

impl PaymentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "pending" => Self::Pending,
            "partial" => Self::Partial,
            "paid" => Self::Paid,
            _ => return None,
        })
    }
}

/* -------------------------
   Entity
--------------------------*/

/// Cached payment summary. The ledger's transaction log is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub practitioner_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub category: Category,
    pub status: AppointmentStatus,
    pub color_code: Option<String>,
    pub payment: Payment,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub practitioner_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub category: Category,
    pub status: AppointmentStatus,
    pub color_code: Option<String>,
    pub payment_amount_cents: i64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub payment_notes: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(r: AppointmentRow) -> Self {
        Appointment {
            appointment_id: r.appointment_id,
            practitioner_id: r.practitioner_id,
            subject_id: r.subject_id,
            start_time: r.start_time,
            end_time: r.end_time,
            duration_minutes: i64::from(r.duration_minutes),
            category: r.category,
            status: r.status,
            color_code: r.color_code,
            payment: Payment {
                amount_cents: r.payment_amount_cents,
                status: r.payment_status,
                method: r.payment_method,
                notes: r.payment_notes,
            },
            notes: r.notes,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_serialize_kebab_case() {
        assert_eq!(serde_json::to_string(&Category::RootCanal).unwrap(), "\"root-canal\"");
        assert_eq!(serde_json::to_string(&AppointmentStatus::NoShow).unwrap(), "\"no-show\"");
        assert_eq!(serde_json::to_string(&PaymentStatus::Paid).unwrap(), "\"paid\"");
    }

    #[test]
    fn parse_rejects_unknown_values() {
        assert_eq!(Category::parse("root-canal"), Some(Category::RootCanal));
        assert_eq!(Category::parse("whitening"), None);
        assert_eq!(AppointmentStatus::parse("no-show"), Some(AppointmentStatus::NoShow));
        assert_eq!(AppointmentStatus::parse("done"), None);
        assert_eq!(PaymentStatus::parse("partial"), Some(PaymentStatus::Partial));
        assert_eq!(PaymentStatus::parse(""), None);
    }
}
