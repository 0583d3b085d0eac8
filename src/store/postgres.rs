use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AppointmentStore, StoreError};
use crate::models::{Appointment, AppointmentRow};

const SELECT_COLUMNS: &str = r#"
    SELECT
      appointment_id,
      practitioner_id,
      subject_id,
      start_time,
      end_time,
      duration_minutes,
      category,
      status,
      color_code,
      payment_amount_cents,
      payment_status,
      payment_method,
      payment_notes,
      notes,
      created_by,
      created_at,
      updated_at
    FROM appointment
"#;

pub struct PgAppointmentStore {
    db: PgPool,
}

impl PgAppointmentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// SQLSTATE 23P01: exclusion_violation (appointment_no_overlap).
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23P01") {
            return StoreError::Overlap;
        }
    }
    StoreError::Database(e)
}

fn duration_column(a: &Appointment) -> Result<i32, StoreError> {
    i32::try_from(a.duration_minutes).map_err(|_| StoreError::OutOfRange("duration_minutes"))
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn insert(&self, a: &Appointment) -> Result<(), StoreError> {
        let duration = duration_column(a)?;
        sqlx::query(
            r#"
            INSERT INTO appointment (
              appointment_id,
              practitioner_id,
              subject_id,
              start_time,
              end_time,
              duration_minutes,
              category,
              status,
              color_code,
              payment_amount_cents,
              payment_status,
              payment_method,
              payment_notes,
              notes,
              created_by,
              created_at,
              updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
            "#,
        )
        .bind(a.appointment_id)
        .bind(a.practitioner_id)
        .bind(a.subject_id)
        .bind(a.start_time)
        .bind(a.end_time)
        .bind(duration)
        .bind(a.category)
        .bind(a.status)
        .bind(a.color_code.as_deref())
        .bind(a.payment.amount_cents)
        .bind(a.payment.status)
        .bind(a.payment.method.as_deref())
        .bind(a.payment.notes.as_deref())
        .bind(a.notes.as_deref())
        .bind(a.created_by)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&self.db)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn update(&self, a: &Appointment) -> Result<bool, StoreError> {
        let duration = duration_column(a)?;
        // created_by / created_at are never rewritten.
        let result = sqlx::query(
            r#"
            UPDATE appointment
            SET
              start_time = $2,
              end_time = $3,
              duration_minutes = $4,
              category = $5,
              status = $6,
              color_code = $7,
              payment_amount_cents = $8,
              payment_status = $9,
              payment_method = $10,
              payment_notes = $11,
              notes = $12,
              updated_at = $13
            WHERE appointment_id = $1
            "#,
        )
        .bind(a.appointment_id)
        .bind(a.start_time)
        .bind(a.end_time)
        .bind(duration)
        .bind(a.category)
        .bind(a.status)
        .bind(a.color_code.as_deref())
        .bind(a.payment.amount_cents)
        .bind(a.payment.status)
        .bind(a.payment.method.as_deref())
        .bind(a.payment.notes.as_deref())
        .bind(a.notes.as_deref())
        .bind(a.updated_at)
        .execute(&self.db)
        .await
        .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, appointment_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"DELETE FROM appointment WHERE appointment_id = $1"#)
            .bind(appointment_id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE appointment_id = $1");
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Appointment::from))
    }

    async fn find_overlapping(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        // Half-open intersection: existing.start < end AND start < existing.end
        let sql = format!(
            r#"{SELECT_COLUMNS}
            WHERE practitioner_id = $1
              AND start_time < $3
              AND end_time > $2
              AND ($4::uuid IS NULL OR appointment_id <> $4)
            ORDER BY start_time ASC, appointment_id ASC
            "#
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(practitioner_id)
            .bind(start)
            .bind(end)
            .bind(exclude)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        practitioner_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let sql = format!(
            r#"{SELECT_COLUMNS}
            WHERE start_time < $2
              AND end_time > $1
              AND ($3::uuid IS NULL OR practitioner_id = $3)
            ORDER BY start_time ASC, appointment_id ASC
            "#
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(start)
            .bind(end)
            .bind(practitioner_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }
}
