use crate::{
    api::models::users::CurrentUser,
    db::{
        handlers::{AdminLogs, Credits, PaymentMethods, Payments, Repository},
        models::{
            admin_logs::AdminLogCreateDBRequest,
            credits::{CreditTransactionCreateDBRequest, CreditTransactionType},
            payments::{PaymentCreateDBRequest, PaymentDBResponse, PaymentReviewDBRequest, PaymentStatus},
        },
    },
    errors::{Error, Result},
    types::{PaymentMethodId, PaymentTransactionId},
    AppState,
};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgConnection;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    pub payment_method_id: PaymentMethodId,
    pub amount: Decimal,
    pub currency: String,
    pub proof_reference: Option<String>,
    pub external_transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: PaymentDBResponse,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    fn status(self) -> PaymentStatus {
        match self {
            ReviewDecision::Approve => PaymentStatus::Approved,
            ReviewDecision::Reject => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentReview {
    pub decision: ReviewDecision,
    pub admin_notes: Option<String>,
    /// Defaults to the whole-unit payment amount
    pub credits_to_award: Option<i64>,
}

/// Largest amount a NUMERIC(12, 2) column holds
// 999_999_999_999 at scale 2; `Decimal::new` is not const
const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// One credit per whole currency unit
pub fn credits_for_amount(amount: Decimal) -> Option<i64> {
    amount.floor().to_i64()
}

fn record_payment(state: &AppState, status: PaymentStatus) {
    if let Some(metrics) = &state.metrics {
        metrics.record_payment(status.as_str());
    }
}

/// Credit the balance and write the purchase entry referencing the payment
async fn award_credits(conn: &mut PgConnection, payment: &PaymentDBResponse, credits: i64, description: String) -> crate::db::errors::Result<i64> {
    let mut repo = Credits::new(conn);
    repo.ensure_balance(payment.user_id).await?;
    let entry = repo
        .apply(
            &CreditTransactionCreateDBRequest::new(payment.user_id, CreditTransactionType::Purchase, credits)
                .description(description)
                .reference(payment.id),
        )
        .await?;
    Ok(entry.balance_after)
}

/// Accept a top-up request.
///
/// Manual methods leave the payment `pending` for an admin. Automated methods are committed as
/// `processing` first, then settled and credited in one transaction; if settlement fails the
/// payment stays `processing` for follow-up.
#[instrument(skip(state, user, submission), fields(user_id = %user.id, method = %submission.payment_method_id), err)]
pub async fn submit_payment(state: &AppState, user: &CurrentUser, submission: &PaymentSubmission) -> Result<PaymentReceipt> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let method = PaymentMethods::new(&mut conn)
        .get_by_id(submission.payment_method_id)
        .await?
        .filter(|m| m.enabled)
        .ok_or_else(|| Error::InvalidMethod {
            method: submission.payment_method_id.to_string(),
        })?;

    if submission.amount < Decimal::ONE {
        return Err(Error::BadRequest {
            message: "Amount must be at least 1".to_string(),
        });
    }
    // Postgres would round extra digits on insert, so the stored amount could differ from the credited one
    if submission.amount.normalize().scale() > 2 {
        return Err(Error::BadRequest {
            message: "Amount must have at most two decimal places".to_string(),
        });
    }
    if submission.amount > MAX_AMOUNT {
        return Err(Error::BadRequest {
            message: format!("Amount must not exceed {MAX_AMOUNT}"),
        });
    }
    let currency = submission.currency.trim();
    if currency.is_empty() {
        return Err(Error::BadRequest {
            message: "Currency is required".to_string(),
        });
    }
    let credits = credits_for_amount(submission.amount).ok_or_else(|| Error::BadRequest {
        message: "Amount is too large".to_string(),
    })?;

    let manual = method.config.is_manual();
    let request = PaymentCreateDBRequest {
        user_id: user.id,
        payment_method_id: method.id,
        amount: submission.amount,
        currency: currency.to_uppercase(),
        status: if manual { PaymentStatus::Pending } else { PaymentStatus::Processing },
        external_transaction_id: submission.external_transaction_id.clone(),
        proof_reference: submission.proof_reference.clone(),
    };
    let payment = Payments::new(&mut conn).create(&request).await?;
    drop(conn);

    if manual {
        info!("Payment {} awaiting review", payment.id);
        record_payment(state, PaymentStatus::Pending);
        return Ok(PaymentReceipt {
            payment,
            message: "Payment submitted. Credits will be added once an admin approves it.".to_string(),
        });
    }

    let settled = async {
        let mut tx = state.db.begin().await?;
        award_credits(&mut tx, &payment, credits, format!("Payment via {}", method.display_name)).await?;
        let completed = Payments::new(&mut tx).mark_completed(payment.id, credits).await?;
        tx.commit().await?;
        Ok::<_, crate::db::errors::DbError>(completed)
    }
    .await;

    match settled {
        Ok(completed) => {
            info!("Payment {} completed, {} credits awarded", completed.id, credits);
            record_payment(state, PaymentStatus::Completed);
            if let Some(metrics) = &state.metrics {
                metrics.record_award("automated", credits);
            }
            Ok(PaymentReceipt {
                payment: completed,
                message: format!("Payment completed. {credits} credits added."),
            })
        }
        Err(e) => {
            error!("Payment {} left in processing, credits not awarded: {}", payment.id, e);
            Err(Error::AwardFailed { payment_id: payment.id })
        }
    }
}

/// Resolve a pending payment.
///
/// The payment row is locked for the whole review, so of two concurrent reviewers only the
/// first sees it pending; the other gets `Conflict`. Status change, award and audit entry
/// commit together.
#[instrument(skip(state, reviewer, review), fields(reviewer = %reviewer.id, decision = ?review.decision), err)]
pub async fn review_payment(
    state: &AppState,
    reviewer: &CurrentUser,
    payment_id: PaymentTransactionId,
    review: &PaymentReview,
) -> Result<PaymentDBResponse> {
    if !reviewer.is_admin() {
        return Err(Error::Forbidden {
            reason: "only admins can review payments".to_string(),
        });
    }
    if review.credits_to_award.is_some_and(|c| c < 0) {
        return Err(Error::BadRequest {
            message: "credits_to_award must not be negative".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let payment = Payments::new(&mut tx).get_for_update(payment_id).await?.ok_or_else(|| Error::NotFound {
        resource: "Payment".to_string(),
        id: payment_id.to_string(),
    })?;

    let next = review.decision.status();
    if !payment.status.can_transition_to(next) {
        return Err(Error::Conflict {
            message: format!("Payment {} is {} and can no longer be reviewed", payment.id, payment.status.as_str()),
        });
    }

    let credits = match review.decision {
        ReviewDecision::Approve => match review.credits_to_award {
            Some(credits) => credits,
            None => credits_for_amount(payment.amount).ok_or_else(|| Error::BadRequest {
                message: "Amount is too large".to_string(),
            })?,
        },
        ReviewDecision::Reject => 0,
    };

    let reviewed = Payments::new(&mut tx)
        .apply_review(
            payment.id,
            &PaymentReviewDBRequest {
                status: next,
                admin_notes: review.admin_notes.clone(),
                credits_awarded: credits,
                reviewed_by: reviewer.id,
            },
        )
        .await?;

    if credits > 0 {
        if let Err(e) = award_credits(&mut tx, &payment, credits, "Approved manual payment".to_string()).await {
            error!("Approval of payment {} rolled back, credits not awarded: {}", payment.id, e);
            return Err(Error::AwardFailed { payment_id: payment.id });
        }
    }

    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: reviewer.id,
            action: match review.decision {
                ReviewDecision::Approve => "payment_approved".to_string(),
                ReviewDecision::Reject => "payment_rejected".to_string(),
            },
            target_user_id: Some(payment.user_id),
            details: json!({
                "payment_id": payment.id,
                "amount": payment.amount,
                "currency": payment.currency,
                "credits_awarded": credits,
            }),
        })
        .await?;

    tx.commit().await.map_err(|e| {
        error!("Review of payment {} failed to commit: {}", payment.id, e);
        Error::AwardFailed { payment_id: payment.id }
    })?;

    info!("Payment {} {}, {} credits awarded", payment.id, next.as_str(), credits);
    record_payment(state, next);
    if credits > 0 {
        if let Some(metrics) = &state.metrics {
            metrics.record_award("review", credits);
        }
    }

    Ok(reviewed)
}
