mod conflict;
mod error;
mod ledger;
mod locks;
pub mod timegrid;

pub use conflict::overlaps;
pub use error::SchedulingError;
pub use ledger::{apply_to_payment, LedgerEvent, LedgerEventType};

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::auth::{authorize, Caller, Capability};
use crate::models::{Appointment, AppointmentStatus, Category, Payment, PaymentStatus};
use crate::store::{AppointmentStore, StoreError};

use conflict::ensure_free;
use locks::PractitionerLocks;
use timegrid::{duration_minutes, parse_instant, parse_snapped, resolve_zone, start_of_day};

pub const MAX_WEEK_VIEW_DAYS: i64 = 14;

/// Longest bookable slot.
pub const MAX_SLOT_MINUTES: i64 = 24 * 60;

/* ============================================================
   Inputs / outputs
   ============================================================ */

/// Normalized slot: both ends on the 5-minute grid, duration derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProposedSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentInput {
    pub amount_cents: Option<i64>,
    pub status: Option<String>,
    pub method: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAppointment {
    pub practitioner_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub timezone: Option<String>,
    pub category: Option<String>,
    pub payment: Option<PaymentInput>,
    pub color_code: Option<String>,
    pub notes: Option<String>,
}

/// Partial update. For nullable fields, `Some(None)` clears and `None` leaves untouched.
/// `timezone` only interprets `start_time`/`end_time`; it is not stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentPatch {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub timezone: Option<String>,
    pub status: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub color_code: Option<Option<String>>,
    pub payment: Option<PaymentInput>,
}

impl AppointmentPatch {
    fn touches_time(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Only called when the field is present: null => Some(None), value => Some(Some(v)).
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/* ============================================================
   Field validation
   ============================================================ */

fn required<T>(value: Option<T>, field: &str) -> Result<T, SchedulingError> {
    value.ok_or_else(|| SchedulingError::validation(format!("{field} is required")))
}

fn required_id(value: Option<Uuid>, field: &str) -> Result<Uuid, SchedulingError> {
    match value {
        Some(id) if !id.is_nil() => Ok(id),
        _ => Err(SchedulingError::validation(format!("{field} is required"))),
    }
}

fn parse_category(raw: &str) -> Result<Category, SchedulingError> {
    Category::parse(raw).ok_or_else(|| SchedulingError::validation(format!("invalid category: {raw}")))
}

fn parse_status(raw: &str) -> Result<AppointmentStatus, SchedulingError> {
    AppointmentStatus::parse(raw)
        .ok_or_else(|| SchedulingError::validation(format!("invalid status: {raw}")))
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Validates `input` and merges it onto `payment`.
fn merge_payment(payment: &mut Payment, input: PaymentInput) -> Result<(), SchedulingError> {
    if let Some(amount) = input.amount_cents {
        if amount < 0 {
            return Err(SchedulingError::validation("payment.amount_cents must be >= 0"));
        }
        payment.amount_cents = amount;
    }
    if let Some(raw) = input.status.as_deref() {
        payment.status = PaymentStatus::parse(raw)
            .ok_or_else(|| SchedulingError::validation(format!("invalid payment.status: {raw}")))?;
    }
    if input.method.is_some() {
        payment.method = non_blank(input.method);
    }
    if input.notes.is_some() {
        payment.notes = non_blank(input.notes);
    }
    Ok(())
}

fn ensure_ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidRange { start, end });
    }
    Ok(())
}

fn ensure_bookable(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    ensure_ordered(start, end)?;
    if duration_minutes(start, end) > MAX_SLOT_MINUTES {
        return Err(SchedulingError::validation(format!(
            "appointment cannot exceed {MAX_SLOT_MINUTES} minutes"
        )));
    }
    Ok(())
}

/* ============================================================
   Engine
   ============================================================ */

/// Validates, normalizes and persists appointment slots. No two appointments of one
/// practitioner may intersect; every mutation runs under that practitioner's lock.
pub struct SchedulingEngine {
    store: Arc<dyn AppointmentStore>,
    locks: PractitionerLocks,
    default_tz: Tz,
}

impl SchedulingEngine {
    pub fn new(store: Arc<dyn AppointmentStore>, default_tz: Tz) -> Self {
        Self {
            store,
            locks: PractitionerLocks::default(),
            default_tz,
        }
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_tz
    }

    fn zone(&self, timezone: Option<&str>) -> Result<Tz, SchedulingError> {
        resolve_zone(timezone, self.default_tz)
    }

    /// Parse in `tz`, snap both ends, and require `end > start` after snapping.
    fn normalize_window(
        &self,
        start: &str,
        end: &str,
        tz: Tz,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), SchedulingError> {
        let start = parse_snapped(start, tz)?;
        let end = parse_snapped(end, tz)?;
        ensure_bookable(start, end)?;
        tracing::debug!(%start, %end, tz = tz.name(), "normalized slot");
        Ok((start, end))
    }

    async fn check_slot(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<ProposedSlot, SchedulingError> {
        let existing = self
            .store
            .find_overlapping(practitioner_id, start, end, exclude)
            .await?;
        tracing::debug!(practitioner_id = %practitioner_id, candidates = existing.len(), "conflict scan");

        if let Err(e) = ensure_free(&existing, start, end) {
            tracing::warn!(practitioner_id = %practitioner_id, %start, %end, "slot rejected: {e}");
            return Err(e);
        }

        Ok(ProposedSlot {
            start_time: start,
            end_time: end,
            duration_minutes: duration_minutes(start, end),
        })
    }

    /// The store refused a write as overlapping (another process won the race).
    /// Re-run the scan so the caller learns which record holds the slot.
    async fn explain_overlap(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> SchedulingError {
        match self.check_slot(practitioner_id, start, end, exclude).await {
            Err(e) => e,
            Ok(_) => SchedulingError::Store(StoreError::Overlap),
        }
    }

    /// Pure validation of a slot against the records persisted right now.
    pub async fn propose_slot(
        &self,
        practitioner_id: Uuid,
        start: &str,
        end: &str,
        timezone: Option<&str>,
    ) -> Result<ProposedSlot, SchedulingError> {
        let tz = self.zone(timezone)?;
        let (start, end) = self.normalize_window(start, end, tz)?;
        self.check_slot(practitioner_id, start, end, None).await
    }

    pub async fn create_appointment(
        &self,
        caller: &Caller,
        req: NewAppointment,
    ) -> Result<Appointment, SchedulingError> {
        authorize(caller, Capability::Create)?;

        let practitioner_id = required_id(req.practitioner_id, "practitioner_id")?;
        let subject_id = required_id(req.subject_id, "subject_id")?;
        let start_raw = required(req.start_time, "start_time")?;
        let end_raw = required(req.end_time, "end_time")?;
        let category = parse_category(&required(req.category, "category")?)?;

        let mut payment = Payment::default();
        if let Some(input) = req.payment {
            merge_payment(&mut payment, input)?;
        }

        let tz = self.zone(req.timezone.as_deref())?;
        let (start, end) = self.normalize_window(&start_raw, &end_raw, tz)?;

        let _guard = self.locks.acquire(practitioner_id).await;
        let slot = self.check_slot(practitioner_id, start, end, None).await?;

        let now = Utc::now();
        let appointment = Appointment {
            appointment_id: Uuid::new_v4(),
            practitioner_id,
            subject_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            duration_minutes: slot.duration_minutes,
            category,
            status: AppointmentStatus::Scheduled,
            color_code: non_blank(req.color_code),
            payment,
            notes: non_blank(req.notes),
            created_by: caller.user_id,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(&appointment).await {
            Ok(()) => {}
            Err(StoreError::Overlap) => {
                return Err(self.explain_overlap(practitioner_id, start, end, None).await);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            appointment_id = %appointment.appointment_id,
            practitioner_id = %practitioner_id,
            created_by = %caller.user_id,
            start = %appointment.start_time,
            end = %appointment.end_time,
            "appointment created"
        );
        Ok(appointment)
    }

    /// The patch's time fields are read in `patch.timezone`; when absent, in
    /// `timezone`, then in the engine default.
    pub async fn update_appointment(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        patch: AppointmentPatch,
        timezone: Option<&str>,
    ) -> Result<Appointment, SchedulingError> {
        authorize(caller, Capability::Update)?;

        // Enum and zone validation needs no lock.
        let status = patch.status.as_deref().map(parse_status).transpose()?;
        let category = patch.category.as_deref().map(parse_category).transpose()?;
        let tz = self.zone(patch.timezone.as_deref().or(timezone))?;

        let practitioner_id = self.load(appointment_id).await?.practitioner_id;
        let _guard = self.locks.acquire(practitioner_id).await;
        // Re-read under the lock: the record may have moved or vanished meanwhile.
        let mut appointment = self.load(appointment_id).await?;

        if patch.touches_time() {
            if appointment.status == AppointmentStatus::Cancelled {
                return Err(SchedulingError::validation(
                    "cancelled appointments cannot be rescheduled",
                ));
            }
            let start = match patch.start_time.as_deref() {
                Some(raw) => parse_snapped(raw, tz)?,
                None => appointment.start_time,
            };
            let end = match patch.end_time.as_deref() {
                Some(raw) => parse_snapped(raw, tz)?,
                None => appointment.end_time,
            };
            ensure_bookable(start, end)?;
            let slot = self
                .check_slot(practitioner_id, start, end, Some(appointment_id))
                .await?;
            appointment.start_time = slot.start_time;
            appointment.end_time = slot.end_time;
        }

        if let Some(status) = status {
            appointment.status = status;
        }
        if let Some(category) = category {
            appointment.category = category;
        }
        if let Some(notes) = patch.notes {
            appointment.notes = non_blank(notes);
        }
        if let Some(color_code) = patch.color_code {
            appointment.color_code = non_blank(color_code);
        }
        if let Some(input) = patch.payment {
            merge_payment(&mut appointment.payment, input)?;
        }

        appointment.duration_minutes = duration_minutes(appointment.start_time, appointment.end_time);
        appointment.updated_at = Utc::now();

        match self.store.update(&appointment).await {
            Ok(true) => {}
            Ok(false) => return Err(SchedulingError::NotFound(appointment_id)),
            Err(StoreError::Overlap) => {
                return Err(self
                    .explain_overlap(
                        practitioner_id,
                        appointment.start_time,
                        appointment.end_time,
                        Some(appointment_id),
                    )
                    .await);
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            appointment_id = %appointment_id,
            updated_by = %caller.user_id,
            status = ?appointment.status,
            "appointment updated"
        );
        Ok(appointment)
    }

    /// Hard delete. Ledger transactions referencing the id are left in place.
    pub async fn delete_appointment(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
    ) -> Result<(), SchedulingError> {
        authorize(caller, Capability::Delete)?;

        if !self.store.delete(appointment_id).await? {
            return Err(SchedulingError::NotFound(appointment_id));
        }
        tracing::info!(appointment_id = %appointment_id, deleted_by = %caller.user_id, "appointment deleted");
        Ok(())
    }

    pub async fn get_appointment(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        authorize(caller, Capability::Read)?;
        self.load(appointment_id).await
    }

    /// All appointments intersecting `[start, end)`, optionally for one practitioner.
    pub async fn query_range(
        &self,
        caller: &Caller,
        start: &str,
        end: &str,
        timezone: Option<&str>,
        practitioner_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        authorize(caller, Capability::Read)?;

        let tz = self.zone(timezone)?;
        let start = parse_instant(start, tz)?;
        let end = parse_instant(end, tz)?;
        ensure_ordered(start, end)?;

        Ok(self.store.query_range(start, end, practitioner_id).await?)
    }

    /// `days` calendar days starting at local midnight of `start_date` in the zone.
    pub async fn week_view(
        &self,
        caller: &Caller,
        start_date: NaiveDate,
        days: i64,
        timezone: Option<&str>,
        practitioner_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        authorize(caller, Capability::Read)?;

        if !(1..=MAX_WEEK_VIEW_DAYS).contains(&days) {
            return Err(SchedulingError::validation(format!(
                "days must be between 1 and {MAX_WEEK_VIEW_DAYS}"
            )));
        }
        let tz = self.zone(timezone)?;

        let end_date = start_date
            .checked_add_signed(TimeDelta::days(days))
            .ok_or_else(|| SchedulingError::validation("start date out of range"))?;
        let start = start_of_day(start_date, tz)
            .ok_or_else(|| SchedulingError::validation("start date out of range"))?;
        let end = start_of_day(end_date, tz)
            .ok_or_else(|| SchedulingError::validation("start date out of range"))?;

        Ok(self.store.query_range(start, end, practitioner_id).await?)
    }

    /// Entry point for the ledger: refresh the cached payment summary.
    pub async fn apply_ledger_event(
        &self,
        appointment_id: Uuid,
        event: &LedgerEvent,
    ) -> Result<Appointment, SchedulingError> {
        if event.amount_cents < 0 {
            return Err(SchedulingError::validation("ledger amount must be >= 0"));
        }

        let practitioner_id = self.load(appointment_id).await?.practitioner_id;
        let _guard = self.locks.acquire(practitioner_id).await;
        let mut appointment = self.load(appointment_id).await?;

        apply_to_payment(&mut appointment.payment, event);
        appointment.updated_at = Utc::now();

        if !self.store.update(&appointment).await? {
            return Err(SchedulingError::NotFound(appointment_id));
        }

        tracing::info!(
            appointment_id = %appointment_id,
            kind = ?event.kind,
            amount_cents = event.amount_cents,
            cached_cents = appointment.payment.amount_cents,
            "ledger event applied"
        );
        Ok(appointment)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(SchedulingError::NotFound(appointment_id))
    }
}
