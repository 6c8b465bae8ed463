use crate::{
    db::{
        errors::{DbError, Result},
        models::payments::{PaymentCreateDBRequest, PaymentDBResponse, PaymentReviewDBRequest, PaymentStatus},
    },
    types::{PaymentMethodId, PaymentTransactionId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection};
use std::collections::HashMap;

#[derive(Debug, Clone, FromRow)]
struct PaymentTransaction {
    id: PaymentTransactionId,
    user_id: UserId,
    payment_method_id: PaymentMethodId,
    amount: Decimal,
    currency: String,
    status: PaymentStatus,
    external_transaction_id: Option<String>,
    proof_reference: Option<String>,
    admin_notes: Option<String>,
    credits_awarded: i64,
    reviewed_by: Option<UserId>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentTransaction> for PaymentDBResponse {
    fn from(p: PaymentTransaction) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            payment_method_id: p.payment_method_id,
            amount: p.amount,
            currency: p.currency,
            status: p.status,
            external_transaction_id: p.external_transaction_id,
            proof_reference: p.proof_reference,
            admin_notes: p.admin_notes,
            credits_awarded: p.credits_awarded,
            reviewed_by: p.reviewed_by,
            reviewed_at: p.reviewed_at,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

const PAYMENT_COLUMNS: &str = "id, user_id, payment_method_id, amount, currency, status, external_transaction_id, \
                               proof_reference, admin_notes, credits_awarded, reviewed_by, reviewed_at, created_at, updated_at";

/// Payment transaction records.
///
/// Status changes are guarded in SQL on the current status, so a row only ever leaves
/// `pending` or `processing` once.
pub struct Payments<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Payments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    pub async fn create(&mut self, request: &PaymentCreateDBRequest) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(&format!(
            r#"
            INSERT INTO payment_transactions
                (user_id, payment_method_id, amount, currency, status, external_transaction_id, proof_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(request.user_id)
        .bind(request.payment_method_id)
        .bind(request.amount)
        .bind(&request.currency)
        .bind(request.status)
        .bind(&request.external_transaction_id)
        .bind(&request.proof_reference)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(PaymentDBResponse::from(payment))
    }

    pub async fn get_by_id(&mut self, id: PaymentTransactionId) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(&format!("SELECT {PAYMENT_COLUMNS} FROM payment_transactions WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(payment.map(PaymentDBResponse::from))
    }

    /// Fetch and row-lock a payment. Must be called inside a transaction; concurrent
    /// reviewers of the same payment serialize here.
    pub async fn get_for_update(&mut self, id: PaymentTransactionId) -> Result<Option<PaymentDBResponse>> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payment_transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payment.map(PaymentDBResponse::from))
    }

    /// Move an automated payment from `processing` to `completed`
    pub async fn mark_completed(&mut self, id: PaymentTransactionId, credits_awarded: i64) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(&format!(
            r#"
            UPDATE payment_transactions
            SET status = 'completed', credits_awarded = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(credits_awarded)
        .fetch_optional(&mut *self.db)
        .await?;

        payment.map(PaymentDBResponse::from).ok_or(DbError::NotFound)
    }

    /// Record an admin decision on a `pending` payment.
    ///
    /// Returns `NotFound` if the payment does not exist or is no longer pending.
    pub async fn apply_review(&mut self, id: PaymentTransactionId, review: &PaymentReviewDBRequest) -> Result<PaymentDBResponse> {
        let payment = sqlx::query_as::<_, PaymentTransaction>(&format!(
            r#"
            UPDATE payment_transactions
            SET status = $2,
                admin_notes = $3,
                credits_awarded = $4,
                reviewed_by = $5,
                reviewed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(review.status)
        .bind(&review.admin_notes)
        .bind(review.credits_awarded)
        .bind(review.reviewed_by)
        .fetch_optional(&mut *self.db)
        .await?;

        payment.map(PaymentDBResponse::from).ok_or(DbError::NotFound)
    }

    /// One user's payments, optionally restricted to one status
    pub async fn list_user(
        &mut self,
        user_id: UserId,
        status: Option<PaymentStatus>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<PaymentDBResponse>> {
        let payments = sqlx::query_as::<_, PaymentTransaction>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payment_transactions
            WHERE user_id = $1 AND ($2::payment_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            OFFSET $3 LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(status)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(payments.into_iter().map(PaymentDBResponse::from).collect())
    }

    /// All payments, optionally restricted to one status (admin review queue)
    pub async fn list_all(&mut self, status: Option<PaymentStatus>, skip: i64, limit: i64) -> Result<Vec<PaymentDBResponse>> {
        let payments = sqlx::query_as::<_, PaymentTransaction>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payment_transactions
            WHERE ($1::payment_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            OFFSET $2 LIMIT $3
            "#
        ))
        .bind(status)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(payments.into_iter().map(PaymentDBResponse::from).collect())
    }

    pub async fn count_by_status(&mut self) -> Result<HashMap<PaymentStatus, i64>> {
        let rows = sqlx::query_as::<_, (PaymentStatus, i64)>("SELECT status, COUNT(*) FROM payment_transactions GROUP BY status")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Sum of completed and approved payment amounts
    pub async fn settled_revenue(&mut self) -> Result<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM payment_transactions WHERE status IN ('completed', 'approved')",
        )
        .fetch_one(&mut *self.db)
        .await?;

        Ok(total)
    }
}
