use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AppointmentStore, StoreError};
use crate::models::Appointment;
use crate::scheduling::overlaps;

/// In-process store with the same range semantics as the Postgres backend.
#[derive(Default)]
pub struct MemoryAppointmentStore {
    rows: RwLock<BTreeMap<Uuid, Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut v: Vec<Appointment>) -> Vec<Appointment> {
    v.sort_by_key(|a| (a.start_time, a.appointment_id));
    v
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        // Mirrors the exclusion constraint on the appointment table.
        let clash = rows.values().any(|a| {
            a.practitioner_id == appointment.practitioner_id
                && overlaps(a.start_time, a.end_time, appointment.start_time, appointment.end_time)
        });
        if clash {
            return Err(StoreError::Overlap);
        }
        rows.insert(appointment.appointment_id, appointment.clone());
        Ok(())
    }

    async fn update(&self, appointment: &Appointment) -> Result<bool, StoreError> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&appointment.appointment_id) {
            return Ok(false);
        }
        let clash = rows.values().any(|a| {
            a.appointment_id != appointment.appointment_id
                && a.practitioner_id == appointment.practitioner_id
                && overlaps(a.start_time, a.end_time, appointment.start_time, appointment.end_time)
        });
        if clash {
            return Err(StoreError::Overlap);
        }
        rows.insert(appointment.appointment_id, appointment.clone());
        Ok(true)
    }

    async fn delete(&self, appointment_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.write().await.remove(&appointment_id).is_some())
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.rows.read().await.get(&appointment_id).cloned())
    }

    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let hits = rows
            .values()
            .filter(|a| a.practitioner_id == practitioner_id)
            .filter(|a| Some(a.appointment_id) != exclude)
            .filter(|a| overlaps(a.start_time, a.end_time, start, end))
            .cloned()
            .collect();
        Ok(sorted(hits))
    }

    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        practitioner_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let hits = rows
            .values()
            .filter(|a| practitioner_id.is_none_or(|p| a.practitioner_id == p))
            .filter(|a| overlaps(a.start_time, a.end_time, start, end))
            .cloned()
            .collect();
        Ok(sorted(hits))
    }
}
