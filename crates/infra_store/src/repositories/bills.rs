//! Bill repository
//!
//! Bills are stored as one row per bill with line items as a JSONB
//! payload; the payment reference list is derived from the payments table
//! in recording order. All writes go through the version compare-and-swap
//! the domain mandates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use core_kernel::{BillId, DateRange, Money, PaymentId, StoreError};
use domain_billing::statistics::BillAggregates;
use domain_billing::{Bill, BillFilter, BillItem, BillStore};

use crate::error::map_sqlx;

const BILL_COLUMNS: &str = "bill_id, patient_id, created_by, items, discount, total_amount, \
     discounted_amount, remaining_amount, status, appointment_id, lab_tests, prescriptions, \
     notes, version, created_at, updated_at";

/// PostgreSQL-backed bill store
#[derive(Debug, Clone)]
pub struct PgBillStore {
    pool: PgPool,
}

impl PgBillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Payment ids per bill, in recording order
    async fn payment_ids(
        &self,
        bill_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<PaymentId>>, StoreError> {
        if bill_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT payment_id, bill_id FROM payments \
             WHERE bill_id = ANY($1) ORDER BY created_at, payment_id",
        )
        .bind(bill_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut by_bill: HashMap<Uuid, Vec<PaymentId>> = HashMap::new();
        for row in rows {
            let payment: Uuid = row.try_get("payment_id").map_err(map_sqlx)?;
            let bill: Uuid = row.try_get("bill_id").map_err(map_sqlx)?;
            by_bill.entry(bill).or_default().push(PaymentId::from(payment));
        }
        Ok(by_bill)
    }
}

#[async_trait]
impl BillStore for PgBillStore {
    async fn insert(&self, bill: &Bill) -> Result<(), StoreError> {
        let items = serde_json::to_value(&bill.items)
            .map_err(|e| StoreError::corrupt(e.to_string()))?;

        sqlx::query(
            "INSERT INTO bills (bill_id, patient_id, created_by, items, discount, \
             total_amount, discounted_amount, remaining_amount, status, appointment_id, \
             lab_tests, prescriptions, notes, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(Uuid::from(bill.id))
        .bind(Uuid::from(bill.patient))
        .bind(Uuid::from(bill.created_by))
        .bind(items)
        .bind(bill.discount.amount())
        .bind(bill.total_amount.amount())
        .bind(bill.discounted_amount.amount())
        .bind(bill.remaining_amount.amount())
        .bind(bill.status.as_str())
        .bind(bill.appointment.map(Uuid::from))
        .bind(bill.lab_tests.iter().copied().map(Uuid::from).collect::<Vec<_>>())
        .bind(bill.prescriptions.iter().copied().map(Uuid::from).collect::<Vec<_>>())
        .bind(bill.notes.as_deref())
        .bind(bill.version)
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn fetch(&self, id: BillId) -> Result<Option<Bill>, StoreError> {
        let sql = format!("SELECT {BILL_COLUMNS} FROM bills WHERE bill_id = $1");
        let row = sqlx::query_as::<_, BillRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        match row {
            Some(row) => {
                let payments = self
                    .payment_ids(&[row.bill_id])
                    .await?
                    .remove(&row.bill_id)
                    .unwrap_or_default();
                Ok(Some(row.into_bill(payments)?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, bill: &Bill, expected_version: i64) -> Result<bool, StoreError> {
        let items = serde_json::to_value(&bill.items)
            .map_err(|e| StoreError::corrupt(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE bills SET items = $2, discount = $3, total_amount = $4, \
             discounted_amount = $5, remaining_amount = $6, status = $7, notes = $8, \
             version = $9, updated_at = $10 \
             WHERE bill_id = $1 AND version = $11",
        )
        .bind(Uuid::from(bill.id))
        .bind(items)
        .bind(bill.discount.amount())
        .bind(bill.total_amount.amount())
        .bind(bill.discounted_amount.amount())
        .bind(bill.remaining_amount.amount())
        .bind(bill.status.as_str())
        .bind(bill.notes.as_deref())
        .bind(bill.version)
        .bind(bill.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: BillId, expected_version: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM bills WHERE bill_id = $1 AND version = $2")
            .bind(Uuid::from(id))
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &BillFilter) -> Result<Vec<Bill>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {BILL_COLUMNS} FROM bills WHERE TRUE"));

        if let Some(patient) = filter.patient {
            qb.push(" AND patient_id = ").push_bind(Uuid::from(patient));
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(start) = filter.created.start {
            qb.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.created.end {
            qb.push(" AND created_at <= ").push_bind(end);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows: Vec<BillRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.bill_id).collect();
        let mut payments = self.payment_ids(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let ids = payments.remove(&row.bill_id).unwrap_or_default();
                row.into_bill(ids)
            })
            .collect()
    }

    async fn aggregate(&self, range: &DateRange) -> Result<BillAggregates, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_bills, \
             COALESCE(SUM(total_amount), 0) AS total_amount, \
             COALESCE(SUM(discounted_amount), 0) AS discounted_amount, \
             COALESCE(SUM(discounted_amount - remaining_amount), 0) AS collected_amount, \
             COALESCE(SUM(remaining_amount), 0) AS pending_amount \
             FROM bills \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2)",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let total_bills: i64 = row.try_get("total_bills").map_err(map_sqlx)?;
        let total_amount: Decimal = row.try_get("total_amount").map_err(map_sqlx)?;
        let discounted_amount: Decimal = row.try_get("discounted_amount").map_err(map_sqlx)?;
        let collected_amount: Decimal = row.try_get("collected_amount").map_err(map_sqlx)?;
        let pending_amount: Decimal = row.try_get("pending_amount").map_err(map_sqlx)?;

        Ok(BillAggregates {
            total_bills: total_bills as u64,
            total_amount: Money::new(total_amount),
            discounted_amount: Money::new(discounted_amount),
            collected_amount: Money::new(collected_amount),
            pending_amount: Money::new(pending_amount),
        })
    }
}

/// One row of the bills table
#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    bill_id: Uuid,
    patient_id: Uuid,
    created_by: Uuid,
    items: serde_json::Value,
    discount: Decimal,
    total_amount: Decimal,
    discounted_amount: Decimal,
    remaining_amount: Decimal,
    status: String,
    appointment_id: Option<Uuid>,
    lab_tests: Vec<Uuid>,
    prescriptions: Vec<Uuid>,
    notes: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BillRow {
    fn into_bill(self, payments: Vec<PaymentId>) -> Result<Bill, StoreError> {
        let items: Vec<BillItem> = serde_json::from_value(self.items)
            .map_err(|e| StoreError::corrupt(format!("bill items payload: {e}")))?;
        let status = self
            .status
            .parse()
            .map_err(|e: String| StoreError::corrupt(e))?;

        Ok(Bill {
            id: BillId::from(self.bill_id),
            patient: self.patient_id.into(),
            created_by: self.created_by.into(),
            items,
            discount: Money::new(self.discount),
            total_amount: Money::new(self.total_amount),
            discounted_amount: Money::new(self.discounted_amount),
            remaining_amount: Money::new(self.remaining_amount),
            status,
            payments,
            appointment: self.appointment_id.map(Into::into),
            lab_tests: self.lab_tests.into_iter().map(Into::into).collect(),
            prescriptions: self.prescriptions.into_iter().map(Into::into).collect(),
            notes: self.notes,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_row() -> BillRow {
        BillRow {
            bill_id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            items: serde_json::json!([
                {"description": "Consultation", "category": "consultation", "amount": 100.0},
                {"description": "CBC panel", "category": "lab_test", "amount": 50.0}
            ]),
            discount: dec!(20),
            total_amount: dec!(150),
            discounted_amount: dec!(130),
            remaining_amount: dec!(130),
            status: "pending".to_string(),
            appointment_id: None,
            lab_tests: vec![Uuid::new_v4()],
            prescriptions: vec![],
            notes: None,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_bill() {
        let row = sample_row();
        let bill = row.into_bill(vec![]).unwrap();

        assert_eq!(bill.items.len(), 2);
        assert_eq!(bill.total_amount, Money::new(dec!(150)));
        assert_eq!(bill.lab_tests.len(), 1);
        assert!(bill.payments.is_empty());
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let mut row = sample_row();
        row.status = "settled".to_string();
        let err = row.into_bill(vec![]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn malformed_items_payload_is_corrupt() {
        let mut row = sample_row();
        row.items = serde_json::json!({"not": "a list"});
        let err = row.into_bill(vec![]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
