//! Billing DTOs
//!
//! Wire shapes for the billing surface: camelCase field names, monetary
//! values as plain decimal numbers, and the `{status, data, message}`
//! envelope on every response.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::Money;
use domain_billing::{
    Bill, BillAggregates, BillItem, BillingStatistics, ItemCategory, Payment, PropagationReport,
};

/// The uniform response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BillItemDto {
    #[validate(length(min = 1, message = "item description must not be empty"))]
    pub description: String,
    /// Defaults to `other` when the caller does not classify the charge
    pub category: Option<ItemCategory>,
    pub amount: Decimal,
}

impl BillItemDto {
    pub fn into_domain(self) -> BillItem {
        BillItem {
            description: self.description,
            category: self.category.unwrap_or(ItemCategory::Other),
            amount: Money::new(self.amount),
        }
    }

    fn from_domain(item: &BillItem) -> Self {
        Self {
            description: item.description.clone(),
            category: Some(item.category),
            amount: item.amount.amount(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRequest {
    /// Required; optional in the wire shape so its absence surfaces as a
    /// validation error rather than a deserialization failure
    pub patient: Option<Uuid>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<BillItemDto>,
    pub discount: Option<Decimal>,
    pub appointment: Option<Uuid>,
    #[serde(default)]
    pub lab_tests: Vec<Uuid>,
    #[serde(default)]
    pub prescriptions: Vec<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBillRequest {
    #[validate(nested)]
    pub items: Option<Vec<BillItemDto>>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub payment_method: domain_billing::PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBillsQuery {
    pub patient: Option<Uuid>,
    pub status: Option<String>,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDto {
    pub id: Uuid,
    pub patient: Uuid,
    pub created_by: Uuid,
    pub items: Vec<BillItemDto>,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub discounted_amount: Decimal,
    pub remaining_amount: Decimal,
    pub status: String,
    pub payments: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<Uuid>,
    pub lab_tests: Vec<Uuid>,
    pub prescriptions: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Bill> for BillDto {
    fn from(bill: &Bill) -> Self {
        Self {
            id: (*bill.id.as_uuid()),
            patient: (*bill.patient.as_uuid()),
            created_by: (*bill.created_by.as_uuid()),
            items: bill.items.iter().map(BillItemDto::from_domain).collect(),
            discount: bill.discount.amount(),
            total_amount: bill.total_amount.amount(),
            discounted_amount: bill.discounted_amount.amount(),
            remaining_amount: bill.remaining_amount.amount(),
            status: bill.status.to_string(),
            payments: bill.payments.iter().map(|p| *p.as_uuid()).collect(),
            appointment: bill.appointment.map(|a| *a.as_uuid()),
            lab_tests: bill.lab_tests.iter().map(|l| *l.as_uuid()).collect(),
            prescriptions: bill.prescriptions.iter().map(|p| *p.as_uuid()).collect(),
            notes: bill.notes.clone(),
            created_at: bill.created_at,
            updated_at: bill.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub id: Uuid,
    pub bill: Uuid,
    pub patient: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub received_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentDto {
    fn from(payment: &Payment) -> Self {
        Self {
            id: (*payment.id.as_uuid()),
            bill: (*payment.bill.as_uuid()),
            patient: (*payment.patient.as_uuid()),
            amount: payment.amount.amount(),
            payment_method: payment.method.to_string(),
            transaction_id: payment.transaction_id.clone(),
            notes: payment.notes.clone(),
            received_by: (*payment.received_by.as_uuid()),
            created_at: payment.created_at,
        }
    }
}

/// The abbreviated bill state returned beside a recorded payment
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummaryDto {
    pub id: Uuid,
    pub remaining_amount: Decimal,
    pub status: String,
}

impl From<&Bill> for BillSummaryDto {
    fn from(bill: &Bill) -> Self {
        Self {
            id: (*bill.id.as_uuid()),
            remaining_amount: bill.remaining_amount.amount(),
            status: bill.status.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BillEnvelope {
    pub bill: BillDto,
}

#[derive(Debug, Serialize)]
pub struct BillsEnvelope {
    pub bills: Vec<BillDto>,
}

#[derive(Debug, Serialize)]
pub struct BillDetailsEnvelope {
    pub bill: BillDto,
    pub payments: Vec<PaymentDto>,
}

#[derive(Debug, Serialize)]
pub struct CreatedBillEnvelope {
    pub bill: BillDto,
    pub propagation: PropagationReport,
}

#[derive(Debug, Serialize)]
pub struct PaymentsEnvelope {
    pub payments: Vec<PaymentDto>,
}

#[derive(Debug, Serialize)]
pub struct PaymentEnvelope {
    pub payment: PaymentDto,
    pub bill: BillSummaryDto,
}

#[derive(Debug, Serialize)]
pub struct ReconcileEnvelope {
    pub propagation: PropagationReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillStatsDto {
    pub total_bills: u64,
    pub total_amount: Decimal,
    pub discounted_amount: Decimal,
    pub collected_amount: Decimal,
    pub pending_amount: Decimal,
}

impl From<&BillAggregates> for BillStatsDto {
    fn from(aggregates: &BillAggregates) -> Self {
        Self {
            total_bills: aggregates.total_bills,
            total_amount: aggregates.total_amount.amount(),
            discounted_amount: aggregates.discounted_amount.amount(),
            collected_amount: aggregates.collected_amount.amount(),
            pending_amount: aggregates.pending_amount.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodBreakdownDto {
    pub count: u64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsEnvelope {
    pub stats: BillStatsDto,
    pub payment_breakdown: std::collections::BTreeMap<String, MethodBreakdownDto>,
}

impl From<&BillingStatistics> for StatisticsEnvelope {
    fn from(statistics: &BillingStatistics) -> Self {
        let payment_breakdown = statistics
            .methods
            .iter()
            .map(|m| {
                (
                    m.method.to_string(),
                    MethodBreakdownDto {
                        count: m.count,
                        amount: m.amount.amount(),
                    },
                )
            })
            .collect();

        Self {
            stats: BillStatsDto::from(&statistics.bills),
            payment_breakdown,
        }
    }
}
