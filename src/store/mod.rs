mod memory;
mod postgres;

pub use memory::MemoryAppointmentStore;
pub use postgres::PgAppointmentStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Appointment;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
    /// The database rejected a write that would overlap another slot of the same practitioner.
    #[error("slot overlaps an existing appointment")]
    Overlap,
    #[error("{0} does not fit its column")]
    OutOfRange(&'static str),
}

/// Durable appointment records. Ranges are half-open: `[start, end)`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError>;

    /// Replaces the stored record with the same id. Returns false if none exists.
    async fn update(&self, appointment: &Appointment) -> Result<bool, StoreError>;

    /// Returns false if no record had this id.
    async fn delete(&self, appointment_id: Uuid) -> Result<bool, StoreError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Records of `practitioner_id` intersecting `[start, end)`, minus `exclude`.
    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Records intersecting `[start, end)`, ordered by start time.
    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        practitioner_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;
}
