//! Link repository
//!
//! Writes the bill-reference fields on records owned by other subsystems.
//! Each operation touches exactly one row; idempotence comes from the
//! statements themselves (re-attach writes the same value, re-detach
//! matches nothing).

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use core_kernel::{BillId, StoreError};
use domain_billing::{LinkStore, LinkTarget};

use crate::error::map_sqlx;

/// PostgreSQL-backed link store
#[derive(Debug, Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn set_reference(
        &self,
        table: &str,
        key_column: &str,
        target_id: Uuid,
        bill: Option<Uuid>,
        expected_bill: Option<Uuid>,
    ) -> Result<u64, StoreError> {
        let sql = match expected_bill {
            None => format!("UPDATE {table} SET bill_id = $2 WHERE {key_column} = $1"),
            Some(_) => format!(
                "UPDATE {table} SET bill_id = $2 WHERE {key_column} = $1 AND bill_id = $3"
            ),
        };

        let mut query = sqlx::query(&sql).bind(target_id).bind(bill);
        if let Some(expected) = expected_bill {
            query = query.bind(expected);
        }

        let result = query.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn attach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError> {
        let bill_id = Uuid::from(bill);
        match target {
            LinkTarget::Appointment(id) => {
                let rows = self
                    .set_reference("appointments", "appointment_id", id.into(), Some(bill_id), None)
                    .await?;
                if rows == 0 {
                    return Err(StoreError::query(format!("appointment {id} does not exist")));
                }
            }
            LinkTarget::LabTest(id) => {
                let rows = self
                    .set_reference("lab_tests", "lab_test_id", id.into(), Some(bill_id), None)
                    .await?;
                if rows == 0 {
                    return Err(StoreError::query(format!("lab test {id} does not exist")));
                }
            }
            LinkTarget::Prescription(id) => {
                let rows = self
                    .set_reference("prescriptions", "prescription_id", id.into(), Some(bill_id), None)
                    .await?;
                if rows == 0 {
                    return Err(StoreError::query(format!("prescription {id} does not exist")));
                }
            }
            LinkTarget::Patient(id) => {
                sqlx::query(
                    "INSERT INTO patient_bills (patient_id, bill_id) VALUES ($1, $2) \
                     ON CONFLICT DO NOTHING",
                )
                .bind(Uuid::from(id))
                .bind(bill_id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx)?;
            }
        }
        Ok(())
    }

    async fn detach(&self, target: LinkTarget, bill: BillId) -> Result<(), StoreError> {
        let bill_id = Uuid::from(bill);
        match target {
            LinkTarget::Appointment(id) => {
                self.set_reference("appointments", "appointment_id", id.into(), None, Some(bill_id))
                    .await?;
            }
            LinkTarget::LabTest(id) => {
                self.set_reference("lab_tests", "lab_test_id", id.into(), None, Some(bill_id))
                    .await?;
            }
            LinkTarget::Prescription(id) => {
                self.set_reference("prescriptions", "prescription_id", id.into(), None, Some(bill_id))
                    .await?;
            }
            LinkTarget::Patient(id) => {
                sqlx::query("DELETE FROM patient_bills WHERE patient_id = $1 AND bill_id = $2")
                    .bind(Uuid::from(id))
                    .bind(bill_id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx)?;
            }
        }
        Ok(())
    }

    async fn referencing(&self, bill: BillId) -> Result<Vec<LinkTarget>, StoreError> {
        let rows = sqlx::query(
            "SELECT 'appointment' AS kind, appointment_id AS id FROM appointments WHERE bill_id = $1 \
             UNION ALL \
             SELECT 'lab_test', lab_test_id FROM lab_tests WHERE bill_id = $1 \
             UNION ALL \
             SELECT 'prescription', prescription_id FROM prescriptions WHERE bill_id = $1 \
             UNION ALL \
             SELECT 'patient', patient_id FROM patient_bills WHERE bill_id = $1",
        )
        .bind(Uuid::from(bill))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|row| {
                let kind: String = row.try_get("kind").map_err(map_sqlx)?;
                let id: Uuid = row.try_get("id").map_err(map_sqlx)?;
                match kind.as_str() {
                    "appointment" => Ok(LinkTarget::Appointment(id.into())),
                    "lab_test" => Ok(LinkTarget::LabTest(id.into())),
                    "prescription" => Ok(LinkTarget::Prescription(id.into())),
                    "patient" => Ok(LinkTarget::Patient(id.into())),
                    other => Err(StoreError::corrupt(format!("unknown link kind: {other}"))),
                }
            })
            .collect()
    }
}
