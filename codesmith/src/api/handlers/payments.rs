use crate::{
    api::{
        handlers::page,
        models::{
            payments::{
                ListPaymentsQuery, PaymentCreate, PaymentCreateResponse, PaymentResponse, PaymentReviewRequest, PaymentReviewResponse,
            },
            users::CurrentUser,
        },
    },
    auth::permissions::{can_read_all_resources, operation, resource, RequiresPermission},
    billing::payments::{self, PaymentReview, PaymentSubmission},
    db::handlers::Payments,
    errors::{Error, Result},
    types::{Operation, Permission, PaymentTransactionId, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};

/// Submit a payment to buy credits
#[utoipa::path(
    post,
    path = "/payments",
    tag = "payments",
    summary = "Submit a payment",
    description = "Manual methods (bank transfer, mobile wallet) create a pending payment awaiting admin review. \
                   Automated methods settle immediately and award one credit per whole currency unit.",
    request_body = PaymentCreate,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentCreateResponse),
        (status = 400, description = "Invalid payment method, amount or currency"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Credits could not be awarded"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn create_payment(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Payments, operation::CreateOwn>,
    Json(data): Json<PaymentCreate>,
) -> Result<(StatusCode, Json<PaymentCreateResponse>)> {
    let submission = PaymentSubmission {
        payment_method_id: data.payment_method_id,
        amount: data.amount,
        currency: data.currency,
        proof_reference: data.proof_reference,
        external_transaction_id: data.external_transaction_id,
    };

    let receipt = payments::submit_payment(&state, &current_user, &submission).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

/// List payments
#[utoipa::path(
    get,
    path = "/payments",
    tag = "payments",
    summary = "List payments",
    description = "Users see their own payments. Admins see all payments and may filter by status or user.",
    params(ListPaymentsQuery),
    responses(
        (status = 200, description = "Payments, newest first", body = [PaymentResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - cannot list other users' payments"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<PaymentResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);
    let has_read_all = can_read_all_resources(&current_user, Resource::Payments);

    if !has_read_all && query.user_id.is_some_and(|id| id != current_user.id) {
        return Err(Error::InsufficientPermissions {
            required: Permission::Allow(Resource::Payments, Operation::ReadAll),
            action: Operation::ReadAll,
            resource: "payments".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Payments::new(&mut conn);

    let payments = if has_read_all && query.user_id.is_none() {
        repo.list_all(query.status, skip, limit).await?
    } else {
        let user_id = query.user_id.unwrap_or(current_user.id);
        repo.list_user(user_id, query.status, skip, limit).await?
    };

    Ok(Json(payments.into_iter().map(PaymentResponse::from).collect()))
}

/// Get one payment
#[utoipa::path(
    get,
    path = "/payments/{id}",
    tag = "payments",
    summary = "Get payment",
    params(
        ("id" = String, Path, description = "Payment ID"),
    ),
    responses(
        (status = 200, description = "Payment", body = PaymentResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Payment not found"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentTransactionId>,
    current_user: CurrentUser,
) -> Result<Json<PaymentResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let payment = Payments::new(&mut conn).get_by_id(id).await?;

    match payment {
        Some(p) if p.user_id == current_user.id || can_read_all_resources(&current_user, Resource::Payments) => Ok(Json(p.into())),
        _ => Err(Error::NotFound {
            resource: "Payment".to_string(),
            id: id.to_string(),
        }),
    }
}

/// Approve or reject a pending payment
#[utoipa::path(
    post,
    path = "/payments/{id}/review",
    tag = "payments",
    summary = "Review a payment",
    description = "Approve or reject a pending manual payment (admin only). Approval awards credits exactly once; \
                   reviewing a payment that is no longer pending returns 409.",
    params(
        ("id" = String, Path, description = "Payment ID"),
    ),
    request_body = PaymentReviewRequest,
    responses(
        (status = 200, description = "Reviewed payment and outcome message", body = PaymentReviewResponse),
        (status = 400, description = "Invalid credit amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Payment not found"),
        (status = 409, description = "Payment already reviewed"),
        (status = 500, description = "Credits could not be awarded"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn review_payment(
    State(state): State<AppState>,
    Path(id): Path<PaymentTransactionId>,
    current_user: RequiresPermission<resource::Payments, operation::UpdateAll>,
    Json(data): Json<PaymentReviewRequest>,
) -> Result<Json<PaymentReviewResponse>> {
    let review = PaymentReview {
        decision: data.decision,
        admin_notes: data.admin_notes,
        credits_to_award: data.credits_to_award,
    };

    let payment = payments::review_payment(&state, &current_user, id, &review).await?;
    Ok(Json(payment.into()))
}
