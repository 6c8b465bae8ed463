use crate::{
    db::{
        errors::{DbError, Result},
        models::credits::{CreditBalanceDBResponse, CreditTransactionCreateDBRequest, CreditTransactionDBResponse, CreditTransactionType},
    },
    types::{CreditTransactionId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, FromRow, PgConnection};
use std::collections::HashMap;
use tracing::trace;
use uuid::Uuid;

// Database entity model for credit transaction
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransaction {
    pub id: CreditTransactionId,
    pub user_id: UserId,
    pub transaction_type: CreditTransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<CreditTransaction> for CreditTransactionDBResponse {
    fn from(tx: CreditTransaction) -> Self {
        Self {
            id: tx.id,
            user_id: tx.user_id,
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            balance_after: tx.balance_after,
            description: tx.description,
            reference_id: tx.reference_id,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct CreditBalance {
    user_id: UserId,
    amount: i64,
    updated_at: DateTime<Utc>,
}

impl From<CreditBalance> for CreditBalanceDBResponse {
    fn from(balance: CreditBalance) -> Self {
        Self {
            user_id: balance.user_id,
            amount: balance.amount,
            updated_at: balance.updated_at,
        }
    }
}

const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, balance_after, description, reference_id, created_at";

/// Balance accessor and transaction recorder.
///
/// `credit_balances` holds one row per user; `credits_transactions` is the append-only
/// ledger. Balance changes go through [`Credits::apply`], which writes both in one
/// database transaction.
pub struct Credits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Credits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create the balance row with zero credits if the user has none yet
    pub async fn ensure_balance(&mut self, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO credit_balances (user_id, amount) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    /// Current balance for a user. Fails with `NotFound` if the user was never provisioned.
    pub async fn get_balance(&mut self, user_id: UserId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT amount FROM credit_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)
    }

    pub async fn get_balance_row(&mut self, user_id: UserId) -> Result<Option<CreditBalanceDBResponse>> {
        let balance = sqlx::query_as::<_, CreditBalance>("SELECT user_id, amount, updated_at FROM credit_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(balance.map(CreditBalanceDBResponse::from))
    }

    /// Apply `delta` to the balance as a single conditional update.
    ///
    /// The non-negative guard lives in the WHERE clause, so two concurrent debits cannot both
    /// pass a stale check. Callers should prefer [`Credits::apply`], which also writes the
    /// ledger entry.
    pub async fn adjust_balance(&mut self, user_id: UserId, delta: i64) -> Result<i64> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE credit_balances
            SET amount = amount + $2, updated_at = NOW()
            WHERE user_id = $1 AND amount + $2 >= 0
            RETURNING amount
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .fetch_optional(&mut *self.db)
        .await?;

        if let Some(amount) = updated {
            return Ok(amount);
        }

        // Nothing updated: either the row is missing or the guard rejected the debit
        let available = sqlx::query_scalar::<_, i64>("SELECT amount FROM credit_balances WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        match available {
            None => Err(DbError::NotFound),
            Some(available) => Err(DbError::InsufficientFunds {
                requested: -delta,
                available,
            }),
        }
    }

    /// Adjust the balance and append the matching ledger entry atomically.
    ///
    /// Runs in its own transaction, or a savepoint when the connection is already inside one.
    pub async fn apply(&mut self, request: &CreditTransactionCreateDBRequest) -> Result<CreditTransactionDBResponse> {
        let mut tx = self.db.begin().await?;

        let balance_after = Credits::new(&mut tx).adjust_balance(request.user_id, request.amount).await?;
        trace!("Adjusted balance for user_id {} by {}", request.user_id, request.amount);

        let transaction = insert_transaction(&mut tx, request, balance_after).await?;

        tx.commit().await?;

        Ok(transaction)
    }

    /// Sum of all ledger amounts for a user; equals the balance when the ledger is consistent
    #[cfg(test)]
    pub async fn ledger_sum(&mut self, user_id: UserId) -> Result<i64> {
        let sum = sqlx::query_scalar::<_, i64>("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM credits_transactions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(sum)
    }

    pub async fn get_users_balances_bulk(&mut self, user_ids: &[UserId]) -> Result<HashMap<UserId, i64>> {
        let rows = sqlx::query_as::<_, (UserId, i64)>("SELECT user_id, amount FROM credit_balances WHERE user_id = ANY($1)")
            .bind(user_ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// List transactions for a specific user with pagination
    pub async fn list_user_transactions(&mut self, user_id: UserId, skip: i64, limit: i64) -> Result<Vec<CreditTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, CreditTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credits_transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions.into_iter().map(CreditTransactionDBResponse::from).collect())
    }

    /// List all transactions across all users (admin view)
    pub async fn list_all_transactions(&mut self, skip: i64, limit: i64) -> Result<Vec<CreditTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, CreditTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credits_transactions ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2"
        ))
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions.into_iter().map(CreditTransactionDBResponse::from).collect())
    }

    /// Get a single transaction by its ID
    pub async fn get_transaction_by_id(&mut self, transaction_id: CreditTransactionId) -> Result<Option<CreditTransactionDBResponse>> {
        let transaction = sqlx::query_as::<_, CreditTransaction>(&format!("SELECT {TRANSACTION_COLUMNS} FROM credits_transactions WHERE id = $1"))
            .bind(transaction_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(transaction.map(CreditTransactionDBResponse::from))
    }

    /// Ledger entries pointing at a payment or generation
    #[cfg(test)]
    pub async fn list_by_reference(&mut self, reference_id: Uuid) -> Result<Vec<CreditTransactionDBResponse>> {
        let transactions = sqlx::query_as::<_, CreditTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM credits_transactions WHERE reference_id = $1 ORDER BY created_at, id"
        ))
        .bind(reference_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(transactions.into_iter().map(CreditTransactionDBResponse::from).collect())
    }
}

async fn insert_transaction(
    conn: &mut PgConnection,
    request: &CreditTransactionCreateDBRequest,
    balance_after: i64,
) -> Result<CreditTransactionDBResponse> {
    let transaction = sqlx::query_as::<_, CreditTransaction>(&format!(
        r#"
        INSERT INTO credits_transactions (user_id, transaction_type, amount, balance_after, description, reference_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(request.user_id)
    .bind(request.transaction_type)
    .bind(request.amount)
    .bind(balance_after)
    .bind(&request.description)
    .bind(request.reference_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(CreditTransactionDBResponse::from(transaction))
}
