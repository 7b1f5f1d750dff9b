//! Payment repository
//!
//! Payment recording is the one multi-row atomic unit in the subsystem:
//! the payment insert and the owning bill's compare-and-swap commit run in
//! a single transaction, so either both land or neither does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use core_kernel::{BillId, DateRange, Money, StoreError};
use domain_billing::statistics::MethodTotals;
use domain_billing::{Bill, Payment, PaymentMethod, PaymentStore};

use crate::error::map_sqlx;

const PAYMENT_COLUMNS: &str = "payment_id, bill_id, patient_id, amount, payment_method, \
     transaction_id, notes, received_by, created_at";

/// PostgreSQL-backed payment store
#[derive(Debug, Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn record(
        &self,
        payment: &Payment,
        bill: &Bill,
        expected_version: i64,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // The partial unique index on (bill_id, transaction_id) turns a
        // replayed idempotency key into a conflict; DO NOTHING reports it
        // as zero rows so the caller can re-read and return the original.
        let inserted = sqlx::query(
            "INSERT INTO payments (payment_id, bill_id, patient_id, amount, payment_method, \
             transaction_id, notes, received_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::from(payment.id))
        .bind(Uuid::from(payment.bill))
        .bind(Uuid::from(payment.patient))
        .bind(payment.amount.amount())
        .bind(payment.method.as_str())
        .bind(payment.transaction_id.as_deref())
        .bind(payment.notes.as_deref())
        .bind(Uuid::from(payment.received_by))
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        let committed = sqlx::query(
            "UPDATE bills SET remaining_amount = $2, status = $3, version = $4, \
             updated_at = $5 WHERE bill_id = $1 AND version = $6",
        )
        .bind(Uuid::from(bill.id))
        .bind(bill.remaining_amount.amount())
        .bind(bill.status.as_str())
        .bind(bill.version)
        .bind(bill.updated_at)
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        if committed.rows_affected() == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn fetch_by_transaction(
        &self,
        bill: BillId,
        transaction_id: &str,
    ) -> Result<Option<Payment>, StoreError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE bill_id = $1 AND transaction_id = $2"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(Uuid::from(bill))
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;

        row.map(PaymentRow::into_payment).transpose()
    }

    async fn list_for_bill(&self, bill: BillId) -> Result<Vec<Payment>, StoreError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE bill_id = $1 ORDER BY created_at DESC, payment_id DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(Uuid::from(bill))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;

        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn total_for_bill(&self, bill: BillId) -> Result<Money, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM payments WHERE bill_id = $1",
        )
        .bind(Uuid::from(bill))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let total: Decimal = row.try_get("total").map_err(map_sqlx)?;
        Ok(Money::new(total))
    }

    async fn method_breakdown(&self, range: &DateRange) -> Result<Vec<MethodTotals>, StoreError> {
        let rows = sqlx::query(
            "SELECT payment_method, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount \
             FROM payments \
             WHERE ($1::timestamptz IS NULL OR created_at >= $1) \
             AND ($2::timestamptz IS NULL OR created_at <= $2) \
             GROUP BY payment_method ORDER BY payment_method",
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter()
            .map(|row| {
                let method: String = row.try_get("payment_method").map_err(map_sqlx)?;
                let count: i64 = row.try_get("count").map_err(map_sqlx)?;
                let amount: Decimal = row.try_get("amount").map_err(map_sqlx)?;
                Ok(MethodTotals {
                    method: method
                        .parse::<PaymentMethod>()
                        .map_err(StoreError::corrupt)?,
                    count: count as u64,
                    amount: Money::new(amount),
                })
            })
            .collect()
    }
}

/// One row of the payments table
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    bill_id: Uuid,
    patient_id: Uuid,
    amount: Decimal,
    payment_method: String,
    transaction_id: Option<String>,
    notes: Option<String>,
    received_by: Uuid,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> Result<Payment, StoreError> {
        Ok(Payment {
            id: self.payment_id.into(),
            bill: self.bill_id.into(),
            patient: self.patient_id.into(),
            amount: Money::new(self.amount),
            method: self
                .payment_method
                .parse::<PaymentMethod>()
                .map_err(StoreError::corrupt)?,
            transaction_id: self.transaction_id,
            notes: self.notes,
            received_by: self.received_by.into(),
            created_at: self.created_at,
        })
    }
}
