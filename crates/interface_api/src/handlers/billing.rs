//! Billing handlers
//!
//! Thin translations between the wire shapes and the domain services;
//! role gates mirror the route table of the original surface.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{DateRange, Money, Principal, Role};
use domain_billing::{BillFilter, BillPatch, BillStatus, NewBill, RecordPayment};

use crate::dto::billing::*;
use crate::error::ApiError;
use crate::handlers::require_role;
use crate::AppState;

/// Creates a bill and attaches it to the linked clinical records
pub async fn create_bill(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateBillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Staff, Role::Accountant])?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let patient = request
        .patient
        .ok_or_else(|| ApiError::Validation("patient is required".to_string()))?;

    let new = NewBill {
        patient: patient.into(),
        created_by: principal.user,
        items: request
            .items
            .into_iter()
            .map(BillItemDto::into_domain)
            .collect(),
        discount: request.discount.map(Money::new).unwrap_or(Money::ZERO),
        appointment: request.appointment.map(Into::into),
        lab_tests: request.lab_tests.into_iter().map(Into::into).collect(),
        prescriptions: request.prescriptions.into_iter().map(Into::into).collect(),
        notes: request.notes,
    };

    let creation = state.ledger.create_bill(new).await?;
    let complete = creation.propagation.is_complete();
    let body = CreatedBillEnvelope {
        bill: BillDto::from(&creation.bill),
        propagation: creation.propagation,
    };

    let response = if complete {
        ApiResponse::success(body)
    } else {
        ApiResponse::success_with_message(
            body,
            "Some linked records were not updated; retry via reconciliation",
        )
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Lists bills with optional patient/status/date filters, newest first
pub async fn list_bills(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListBillsQuery>,
) -> Result<Json<ApiResponse<BillsEnvelope>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Staff, Role::Accountant])?;

    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<BillStatus>())
        .transpose()
        .map_err(ApiError::Validation)?;

    let filter = BillFilter {
        patient: query.patient.map(Into::into),
        status,
        created: DateRange {
            start: query.min_date,
            end: query.max_date,
        },
    };

    let bills = state.ledger.list_bills(filter).await?;
    Ok(Json(ApiResponse::success(BillsEnvelope {
        bills: bills.iter().map(BillDto::from).collect(),
    })))
}

/// A single bill with its payments resolved
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BillDetailsEnvelope>>, ApiError> {
    let details = state.ledger.get_bill(id.into()).await?;
    Ok(Json(ApiResponse::success(BillDetailsEnvelope {
        bill: BillDto::from(&details.bill),
        payments: details.payments.iter().map(PaymentDto::from).collect(),
    })))
}

/// Applies an item/discount/notes patch, recomputing the derived fields
pub async fn update_bill(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBillRequest>,
) -> Result<Json<ApiResponse<BillEnvelope>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Accountant])?;
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let patch = BillPatch {
        items: request
            .items
            .map(|items| items.into_iter().map(BillItemDto::into_domain).collect()),
        discount: request.discount.map(Money::new),
        notes: request.notes,
    };

    let bill = state.ledger.update_bill(id.into(), patch).await?;
    Ok(Json(ApiResponse::success(BillEnvelope {
        bill: BillDto::from(&bill),
    })))
}

/// Deletes a bill with no payment history; detach outcomes are logged and
/// recoverable through reconciliation
pub async fn delete_bill(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&principal, &[Role::Admin])?;
    state.ledger.delete_bill(id.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Payments recorded for a bill, newest first
pub async fn bill_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentsEnvelope>>, ApiError> {
    let payments = state.recorder.bill_payments(id.into()).await?;
    Ok(Json(ApiResponse::success(PaymentsEnvelope {
        payments: payments.iter().map(PaymentDto::from).collect(),
    })))
}

/// Records a payment against a bill
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Staff, Role::Accountant])?;

    let record = RecordPayment {
        amount: Money::new(request.amount),
        method: request.payment_method,
        transaction_id: request.transaction_id,
        notes: request.notes,
        received_by: principal.user,
    };

    let receipt = state.recorder.record_payment(id.into(), record).await?;
    let body = PaymentEnvelope {
        payment: PaymentDto::from(&receipt.payment),
        bill: BillSummaryDto::from(&receipt.bill),
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::success(body))))
}

/// Resolves a bill for the external invoice renderer
pub async fn invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<BillDetailsEnvelope>>, ApiError> {
    let details = state.ledger.get_bill(id.into()).await?;
    Ok(Json(ApiResponse::success_with_message(
        BillDetailsEnvelope {
            bill: BillDto::from(&details.bill),
            payments: details.payments.iter().map(PaymentDto::from).collect(),
        },
        "Invoice rendering is handled by the document service",
    )))
}

/// Replays the link propagation intent for a bill
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReconcileEnvelope>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Accountant])?;

    let propagation = state.ledger.reconcile_links(id.into()).await?;
    let complete = propagation.is_complete();
    let body = ReconcileEnvelope { propagation };

    let response = if complete {
        ApiResponse::success(body)
    } else {
        ApiResponse::success_with_message(body, "Some links still need reconciliation")
    };
    Ok(Json(response))
}

/// All bills for one patient, newest first
pub async fn patient_bills(
    State(state): State<AppState>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BillsEnvelope>>, ApiError> {
    let bills = state.stats.patient_bills(patient_id.into()).await?;
    Ok(Json(ApiResponse::success(BillsEnvelope {
        bills: bills.iter().map(BillDto::from).collect(),
    })))
}

/// Billing rollups over an optional date range
pub async fn billing_statistics(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<ApiResponse<StatisticsEnvelope>>, ApiError> {
    require_role(&principal, &[Role::Admin, Role::Accountant])?;

    let range = DateRange {
        start: query.start_date,
        end: query.end_date,
    };
    let statistics = state.stats.billing_statistics(range).await?;
    Ok(Json(ApiResponse::success(StatisticsEnvelope::from(
        &statistics,
    ))))
}
