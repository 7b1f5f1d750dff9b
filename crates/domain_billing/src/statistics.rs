//! Reporting rollups over bills and payments
//!
//! The aggregator is read-only and runs independently of the mutating
//! services; an empty date range yields zeroed aggregates, not an error.

use serde::Serialize;
use std::sync::Arc;

use core_kernel::{DateRange, Money, PatientId};

use crate::bill::Bill;
use crate::error::LedgerError;
use crate::payment::PaymentMethod;
use crate::ports::{BillFilter, BillStore, PaymentStore};

/// Rollup over bills created in a date range
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BillAggregates {
    pub total_bills: u64,
    pub total_amount: Money,
    pub discounted_amount: Money,
    /// Sum of (discounted - remaining) across matched bills
    pub collected_amount: Money,
    /// Sum of remaining balances across matched bills
    pub pending_amount: Money,
}

/// Count and summed amount for one payment method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodTotals {
    pub method: PaymentMethod,
    pub count: u64,
    pub amount: Money,
}

/// The full statistics answer: bill rollup plus method breakdown
#[derive(Debug, Clone, Serialize)]
pub struct BillingStatistics {
    pub bills: BillAggregates,
    pub methods: Vec<MethodTotals>,
}

/// Read-only reporting over the ledger store
#[derive(Clone)]
pub struct StatisticsAggregator {
    bills: Arc<dyn BillStore>,
    payments: Arc<dyn PaymentStore>,
}

impl StatisticsAggregator {
    pub fn new(bills: Arc<dyn BillStore>, payments: Arc<dyn PaymentStore>) -> Self {
        Self { bills, payments }
    }

    /// Aggregates over bills and payments created in `[start, end]`,
    /// either bound open
    pub async fn billing_statistics(
        &self,
        range: DateRange,
    ) -> Result<BillingStatistics, LedgerError> {
        let bills = self.bills.aggregate(&range).await?;
        let methods = self.payments.method_breakdown(&range).await?;
        Ok(BillingStatistics { bills, methods })
    }

    /// All bills for a patient, newest first
    pub async fn patient_bills(&self, patient: PatientId) -> Result<Vec<Bill>, LedgerError> {
        let filter = BillFilter {
            patient: Some(patient),
            ..Default::default()
        };
        Ok(self.bills.list(&filter).await?)
    }
}
