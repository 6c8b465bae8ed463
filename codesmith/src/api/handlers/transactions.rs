use crate::{
    api::{
        handlers::page,
        models::{
            transactions::{CreditTransactionCreate, CreditTransactionResponse, ListTransactionsQuery},
            users::CurrentUser,
        },
    },
    auth::permissions::{self, operation, resource, RequiresPermission},
    db::{
        handlers::{AdminLogs, Credits, Repository, Users},
        models::{
            admin_logs::AdminLogCreateDBRequest,
            credits::{CreditTransactionCreateDBRequest, CreditTransactionType},
        },
    },
    errors::{Error, Result},
    types::{CreditTransactionId, Operation, Permission, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;
use tracing::info;

/// Create a manual credit transaction
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    summary = "Create a credit transaction",
    description = "Adjust a user's balance by hand (admin only). Refunds must be positive; adjustments may be negative but cannot take the balance below zero.",
    request_body = CreditTransactionCreate,
    responses(
        (status = 201, description = "Transaction created successfully", body = CreditTransactionResponse),
        (status = 400, description = "Bad request - invalid amount or insufficient balance"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::Credits, operation::CreateAll>,
    Json(data): Json<CreditTransactionCreate>,
) -> Result<(StatusCode, Json<CreditTransactionResponse>)> {
    let transaction_type = CreditTransactionType::from(data.transaction_type);
    if !transaction_type.accepts(data.amount) {
        return Err(Error::BadRequest {
            message: match transaction_type {
                CreditTransactionType::AdminAdjustment => "Adjustment amount must not be zero".to_string(),
                _ => "Amount must be greater than zero".to_string(),
            },
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut tx).get_by_id(data.user_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "User".to_string(),
            id: data.user_id.to_string(),
        });
    }

    let mut request = CreditTransactionCreateDBRequest::new(data.user_id, transaction_type, data.amount);
    request.description = data.description;

    let mut credits = Credits::new(&mut tx);
    credits.ensure_balance(data.user_id).await?;
    let transaction = credits.apply(&request).await?;

    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: current_user.id,
            action: "credits_adjusted".to_string(),
            target_user_id: Some(data.user_id),
            details: json!({
                "transaction_id": transaction.id,
                "transaction_type": transaction.transaction_type,
                "amount": transaction.amount,
                "balance_after": transaction.balance_after,
            }),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(
        admin_id = %current_user.id,
        user_id = %data.user_id,
        amount = transaction.amount,
        "Manual credit transaction recorded"
    );
    if let Some(metrics) = &state.metrics {
        if transaction.amount > 0 {
            metrics.record_award("admin", transaction.amount);
        } else {
            metrics.record_debit(-transaction.amount);
        }
    }

    Ok((StatusCode::CREATED, Json(CreditTransactionResponse::from(transaction))))
}

/// Get a specific transaction by ID
#[utoipa::path(
    get,
    path = "/transactions/{transaction_id}",
    tag = "transactions",
    summary = "Get a specific transaction",
    description = "Get details of a specific credit transaction. Non-admin users can only access their own transactions.",
    params(
        ("transaction_id" = String, Path, description = "Transaction ID"),
    ),
    responses(
        (status = 200, description = "Transaction details", body = CreditTransactionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Transaction not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<CreditTransactionId>,
    current_user: CurrentUser,
) -> Result<Json<CreditTransactionResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Credits::new(&mut pool_conn);

    let has_read_all = permissions::has_permission(&current_user, Resource::Credits, Operation::ReadAll);

    match repo.get_transaction_by_id(transaction_id).await? {
        // Return 404 for other users' entries to avoid leaking existence
        Some(tx) if has_read_all || tx.user_id == current_user.id => Ok(Json(CreditTransactionResponse::from(tx))),
        _ => Err(Error::NotFound {
            resource: "Transaction".to_string(),
            id: transaction_id.to_string(),
        }),
    }
}

/// List credit transactions
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    summary = "List credit transactions",
    description = "List ledger entries, newest first. Non-admin users only see their own. Admins may filter by user_id.",
    params(
        ListTransactionsQuery
    ),
    responses(
        (status = 200, description = "List of transactions", body = [CreditTransactionResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - cannot access other users' transactions"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListTransactionsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<CreditTransactionResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);

    let has_read_all = permissions::has_permission(&current_user, Resource::Credits, Operation::ReadAll);

    let filter_user_id = match query.user_id {
        Some(requested_user_id) => {
            if !has_read_all && requested_user_id != current_user.id {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Allow(Resource::Credits, Operation::ReadAll),
                    action: Operation::ReadAll,
                    resource: "transactions".to_string(),
                });
            }
            Some(requested_user_id)
        }
        None if has_read_all => None,
        None => Some(current_user.id),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Credits::new(&mut pool_conn);

    let transactions = match filter_user_id {
        Some(user_id) => repo.list_user_transactions(user_id, skip, limit).await?,
        None => repo.list_all_transactions(skip, limit).await?,
    };

    Ok(Json(transactions.into_iter().map(CreditTransactionResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::users::Role, test_utils::*, types::UserId};
    use serde_json::json;
    use sqlx::PgPool;

    async fn first_transaction_id(pool: &PgPool, user_id: UserId) -> CreditTransactionId {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        Credits::new(&mut conn)
            .list_user_transactions(user_id, 0, 1)
            .await
            .expect("Failed to list transactions")[0]
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_can_adjust_credits(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let user = create_test_user(&pool, Role::User).await;
        let (name, value) = add_auth_headers(&admin);

        let response = app
            .post("/api/v1/transactions")
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "user_id": user.id,
                "transaction_type": "admin_adjustment",
                "amount": -20,
                "description": "Chargeback"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let transaction: CreditTransactionResponse = response.json();
        assert_eq!(transaction.user_id, user.id);
        assert_eq!(transaction.amount, -20);
        assert_eq!(transaction.balance_after, TEST_INITIAL_GRANT - 20);
        assert_eq!(get_test_balance(&pool, user.id).await, TEST_INITIAL_GRANT - 20);

        let refund: CreditTransactionResponse = app
            .post("/api/v1/transactions")
            .add_header(name, value)
            .json(&json!({ "user_id": user.id, "transaction_type": "refund", "amount": 5 }))
            .await
            .json();
        assert_eq!(refund.balance_after, TEST_INITIAL_GRANT - 15);

        let mut conn = pool.acquire().await.unwrap();
        let logs = AdminLogs::new(&mut conn).list(0, 10).await.unwrap();
        assert_eq!(logs.iter().filter(|l| l.action == "credits_adjusted").count(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_adjustment_rejects_invalid_amounts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let user = create_test_user(&pool, Role::User).await;
        let (name, value) = add_auth_headers(&admin);

        for body in [
            json!({ "user_id": user.id, "transaction_type": "admin_adjustment", "amount": 0 }),
            json!({ "user_id": user.id, "transaction_type": "refund", "amount": -5 }),
        ] {
            app.post("/api/v1/transactions")
                .add_header(name.clone(), value.clone())
                .json(&body)
                .await
                .assert_status_bad_request();
        }

        // Cannot take the balance below zero
        let response = app
            .post("/api/v1/transactions")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "user_id": user.id, "transaction_type": "admin_adjustment", "amount": -(TEST_INITIAL_GRANT + 1) }))
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "insufficient_funds");

        app.post("/api/v1/transactions")
            .add_header(name, value)
            .json(&json!({ "user_id": uuid::Uuid::new_v4(), "transaction_type": "refund", "amount": 5 }))
            .await
            .assert_status_not_found();

        assert_eq!(get_test_balance(&pool, user.id).await, TEST_INITIAL_GRANT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_standard_user_cannot_create_transaction(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let (name, value) = add_auth_headers(&user);

        app.post("/api/v1/transactions")
            .add_header(name, value)
            .json(&json!({ "user_id": user.id, "transaction_type": "refund", "amount": 100 }))
            .await
            .assert_status_forbidden();
        assert_eq!(get_test_balance(&pool, user.id).await, TEST_INITIAL_GRANT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_transaction_visibility(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user1 = create_test_user(&pool, Role::User).await;
        let user2 = create_test_user(&pool, Role::User).await;
        let admin = create_test_admin_user(&pool).await;
        let transaction_id = first_transaction_id(&pool, user1.id).await;
        let path = format!("/api/v1/transactions/{transaction_id}");

        let (name, value) = add_auth_headers(&user1);
        let response = app.get(&path).add_header(name, value).await;
        response.assert_status_ok();
        let transaction: CreditTransactionResponse = response.json();
        assert_eq!(transaction.id, transaction_id);
        assert_eq!(transaction.transaction_type, CreditTransactionType::Bonus);

        let (name, value) = add_auth_headers(&user2);
        app.get(&path).add_header(name, value).await.assert_status_not_found();

        let (name, value) = add_auth_headers(&admin);
        app.get(&path).add_header(name, value).await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_transactions_scoping(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user1 = create_test_user(&pool, Role::User).await;
        let user2 = create_test_user(&pool, Role::User).await;
        let admin = create_test_admin_user(&pool).await;

        let (name, value) = add_auth_headers(&user1);
        let own: Vec<CreditTransactionResponse> = app.get("/api/v1/transactions").add_header(name.clone(), value.clone()).await.json();
        assert!(!own.is_empty());
        assert!(own.iter().all(|t| t.user_id == user1.id));

        app.get(&format!("/api/v1/transactions?user_id={}", user2.id))
            .add_header(name, value)
            .await
            .assert_status_forbidden();

        let (name, value) = add_auth_headers(&admin);
        let all: Vec<CreditTransactionResponse> = app.get("/api/v1/transactions").add_header(name.clone(), value.clone()).await.json();
        assert!(all.iter().any(|t| t.user_id == user1.id));
        assert!(all.iter().any(|t| t.user_id == user2.id));

        let filtered: Vec<CreditTransactionResponse> = app
            .get(&format!("/api/v1/transactions?user_id={}", user2.id))
            .add_header(name, value)
            .await
            .json();
        assert!(filtered.iter().all(|t| t.user_id == user2.id));
    }
}
