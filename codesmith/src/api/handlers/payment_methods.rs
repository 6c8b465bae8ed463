use crate::{
    api::models::{
        payment_methods::{ListPaymentMethodsQuery, PaymentMethodCreate, PaymentMethodResponse, PaymentMethodUpdate},
        users::CurrentUser,
    },
    auth::permissions::{can_read_all_resources, operation, resource, RequiresPermission},
    db::{
        errors::DbError,
        handlers::{AdminLogs, PaymentMethodFilter, PaymentMethods, Repository},
        models::{
            admin_logs::AdminLogCreateDBRequest,
            payment_methods::{PaymentMethodCreateDBRequest, PaymentMethodUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    types::{PaymentMethodId, Resource},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::json;

/// List payment methods
#[utoipa::path(
    get,
    path = "/payment-methods",
    tag = "payment_methods",
    summary = "List payment methods",
    description = "Enabled methods with their payment instructions. Admins may pass include_disabled=true to see every method.",
    params(ListPaymentMethodsQuery),
    responses(
        (status = 200, description = "Payment methods", body = [PaymentMethodResponse]),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_payment_methods(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentMethodsQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<PaymentMethodResponse>>> {
    // Non-admins silently get the enabled subset
    let include_disabled = query.include_disabled.unwrap_or(false) && can_read_all_resources(&current_user, Resource::PaymentMethods);
    let filter = if include_disabled {
        PaymentMethodFilter::default()
    } else {
        PaymentMethodFilter::enabled_only()
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let methods = PaymentMethods::new(&mut conn).list(&filter).await?;

    Ok(Json(methods.into_iter().map(PaymentMethodResponse::from).collect()))
}

/// Register a new payment method
#[utoipa::path(
    post,
    path = "/payment-methods",
    tag = "payment_methods",
    summary = "Create payment method",
    request_body = PaymentMethodCreate,
    responses(
        (status = 201, description = "Payment method created", body = PaymentMethodResponse),
        (status = 400, description = "Bad request - blank name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "A method with this name already exists"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn create_payment_method(
    State(state): State<AppState>,
    current_user: RequiresPermission<resource::PaymentMethods, operation::CreateAll>,
    Json(data): Json<PaymentMethodCreate>,
) -> Result<(StatusCode, Json<PaymentMethodResponse>)> {
    let name = data.name.trim();
    if name.is_empty() || data.display_name.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "name and display_name must not be blank".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let method = PaymentMethods::new(&mut tx)
        .create(&PaymentMethodCreateDBRequest {
            name: name.to_string(),
            display_name: data.display_name.trim().to_string(),
            enabled: data.enabled,
            config: data.config,
        })
        .await
        .map_err(|e| match e {
            DbError::UniqueViolation { .. } => Error::Conflict {
                message: format!("Payment method {name} already exists"),
            },
            other => other.into(),
        })?;

    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: current_user.id,
            action: "payment_method_created".to_string(),
            target_user_id: None,
            details: json!({ "payment_method_id": method.id, "name": method.name, "enabled": method.enabled }),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(method.into())))
}

/// Enable, disable or edit a payment method
#[utoipa::path(
    patch,
    path = "/payment-methods/{id}",
    tag = "payment_methods",
    summary = "Update payment method",
    params(
        ("id" = String, Path, description = "Payment method ID"),
    ),
    request_body = PaymentMethodUpdate,
    responses(
        (status = 200, description = "Updated payment method", body = PaymentMethodResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Payment method not found"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn update_payment_method(
    State(state): State<AppState>,
    Path(id): Path<PaymentMethodId>,
    current_user: RequiresPermission<resource::PaymentMethods, operation::UpdateAll>,
    Json(data): Json<PaymentMethodUpdate>,
) -> Result<Json<PaymentMethodResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let method = PaymentMethods::new(&mut tx)
        .update(
            id,
            &PaymentMethodUpdateDBRequest {
                display_name: data.display_name,
                enabled: data.enabled,
                config: data.config,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "Payment method".to_string(),
                id: id.to_string(),
            },
            other => other.into(),
        })?;

    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: current_user.id,
            action: "payment_method_updated".to_string(),
            target_user_id: None,
            details: json!({ "payment_method_id": method.id, "name": method.name, "enabled": method.enabled }),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(method.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::users::Role, test_utils::*};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_seeded_methods_are_listed(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::User).await;
        let (name, value) = add_auth_headers(&user);

        let methods: Vec<PaymentMethodResponse> = app.get("/api/v1/payment-methods").add_header(name, value).await.json();
        let names: Vec<&str> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["bank_transfer", "card"]);
        assert!(methods[0].manual);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_manages_methods(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let user = create_test_user(&pool, Role::User).await;
        let (admin_h, admin_v) = add_auth_headers(&admin);
        let (user_h, user_v) = add_auth_headers(&user);

        let body = json!({
            "name": "wallet",
            "display_name": "Mobile Wallet",
            "config": { "kind": "mobile_wallet", "provider": "M-Pesa", "merchant_number": "555123" }
        });

        app.post("/api/v1/payment-methods")
            .add_header(user_h.clone(), user_v.clone())
            .json(&body)
            .await
            .assert_status_forbidden();

        let response = app.post("/api/v1/payment-methods").add_header(admin_h.clone(), admin_v.clone()).json(&body).await;
        response.assert_status(StatusCode::CREATED);
        let created: PaymentMethodResponse = response.json();
        assert!(created.enabled);
        assert!(created.manual);

        app.post("/api/v1/payment-methods")
            .add_header(admin_h.clone(), admin_v.clone())
            .json(&body)
            .await
            .assert_status(StatusCode::CONFLICT);

        let disabled: PaymentMethodResponse = app
            .patch(&format!("/api/v1/payment-methods/{}", created.id))
            .add_header(admin_h.clone(), admin_v.clone())
            .json(&json!({ "enabled": false }))
            .await
            .json();
        assert!(!disabled.enabled);
        assert_eq!(disabled.display_name, "Mobile Wallet");

        // Disabled methods are hidden from users, even when they ask for them
        let visible: Vec<PaymentMethodResponse> = app
            .get("/api/v1/payment-methods?include_disabled=true")
            .add_header(user_h, user_v)
            .await
            .json();
        assert!(visible.iter().all(|m| m.name != "wallet"));

        let all: Vec<PaymentMethodResponse> = app
            .get("/api/v1/payment-methods?include_disabled=true")
            .add_header(admin_h.clone(), admin_v.clone())
            .await
            .json();
        assert!(all.iter().any(|m| m.name == "wallet"));

        app.patch(&format!("/api/v1/payment-methods/{}", uuid::Uuid::new_v4()))
            .add_header(admin_h, admin_v)
            .json(&json!({ "enabled": true }))
            .await
            .assert_status_not_found();

        let mut conn = pool.acquire().await.unwrap();
        let logs = AdminLogs::new(&mut conn).list(0, 10).await.unwrap();
        assert!(logs.iter().any(|l| l.action == "payment_method_created"));
        assert!(logs.iter().any(|l| l.action == "payment_method_updated"));
    }
}
