use crate::{
    api::{
        handlers::page,
        models::users::{CurrentUser, GetUserQuery, ListUsersQuery, Role, UserResponse, UserUpdate},
    },
    auth::permissions::{self as permissions, can_read_all_resources, can_read_own_resource, operation, resource, RequiresPermission},
    db::{
        handlers::{users::UserFilter, AdminLogs, Credits, Repository, Users},
        models::{admin_logs::AdminLogCreateDBRequest, users::UserUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{Operation, Permission, Resource, UserId, UserIdOrCurrent},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::json;
use tracing::info;

fn includes_billing(include: Option<&str>) -> bool {
    include.unwrap_or("").split(',').map(str::trim).any(|s| s == "billing")
}

// GET /users - List users (admin only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    description = "List all users (admin only)",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "List of users", body = [UserResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    current_user: RequiresPermission<resource::Users, operation::ReadAll>,
) -> Result<Json<Vec<UserResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let users = Users::new(&mut conn).list(&UserFilter::new(skip, limit)).await?;

    let can_view_billing = permissions::has_permission(&current_user, Resource::Credits, Operation::ReadAll);
    let balances_map = if includes_billing(query.include.as_deref()) && can_view_billing {
        let user_ids: Vec<_> = users.iter().map(|u| u.id).collect();
        Some(Credits::new(&mut conn).get_users_balances_bulk(&user_ids).await?)
    } else {
        None
    };

    let response_users = users
        .into_iter()
        .map(|user| {
            let response_user = UserResponse::from(user);
            match &balances_map {
                Some(balances) => {
                    let balance = balances.get(&response_user.id).copied().unwrap_or(0);
                    response_user.with_credit_balance(balance)
                }
                None => response_user,
            }
        })
        .collect();

    Ok(Json(response_users))
}

// GET /users/{user_id} - Get specific user (admin only) or current user
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Get user",
    description = "Get a specific user by ID, or the caller with 'current'",
    params(
        ("user_id" = String, Path, description = "User ID (UUID) or 'current' for current user"),
        GetUserQuery,
    ),
    responses(
        (status = 200, description = "User information", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - can only view own user data unless admin"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserIdOrCurrent>,
    Query(query): Query<GetUserQuery>,
    // Can't use RequiresPermission here because we need conditional logic for own vs other users
    current_user: CurrentUser,
) -> Result<Json<UserResponse>> {
    let target_user_id = match user_id {
        UserIdOrCurrent::Current(_) => current_user.id,
        UserIdOrCurrent::Id(uuid) => {
            if !can_read_all_resources(&current_user, Resource::Users) && !can_read_own_resource(&current_user, Resource::Users, uuid) {
                return Err(Error::InsufficientPermissions {
                    required: Permission::Any(vec![
                        Permission::Allow(Resource::Users, Operation::ReadAll),
                        Permission::Allow(Resource::Users, Operation::ReadOwn),
                    ]),
                    action: Operation::ReadAll,
                    resource: format!("user data for user {uuid}"),
                });
            }
            uuid
        }
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_by_id(target_user_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: target_user_id.to_string(),
        })?;

    let mut response = UserResponse::from(user);

    // Billing is included for admins, or for callers reading their own account
    if includes_billing(query.include.as_deref())
        && (permissions::has_permission(&current_user, Resource::Credits, Operation::ReadAll)
            || (target_user_id == current_user.id && permissions::has_permission(&current_user, Resource::Credits, Operation::ReadOwn)))
    {
        let balance = Credits::new(&mut pool_conn)
            .get_balance_row(target_user_id)
            .await?
            .map_or(0, |b| b.amount);
        response = response.with_credit_balance(balance);
    }

    Ok(Json(response))
}

// PATCH /users/{user_id} - Update user (admin only)
#[utoipa::path(
    patch,
    path = "/users/{user_id}",
    tag = "users",
    summary = "Update user",
    description = "Change a user's display name, role or ban status (admin only). Admins cannot demote or ban themselves.",
    params(
        ("user_id" = String, Path, description = "User ID to update"),
    ),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated successfully", body = UserResponse),
        (status = 400, description = "Bad request - cannot demote or ban yourself"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin access required"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: RequiresPermission<resource::Users, operation::UpdateAll>,
    Json(user_data): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    if user_id == current_user.id {
        if user_data.is_banned == Some(true) {
            return Err(Error::BadRequest {
                message: "You cannot ban your own account".to_string(),
            });
        }
        if user_data.role.is_some_and(|role| role != Role::Admin) {
            return Err(Error::BadRequest {
                message: "You cannot remove your own admin role".to_string(),
            });
        }
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let db_request = UserUpdateDBRequest {
        display_name: user_data.display_name,
        role: user_data.role,
        is_banned: user_data.is_banned,
    };
    let user = Users::new(&mut tx).update(user_id, &db_request).await?;

    AdminLogs::new(&mut tx)
        .create(&AdminLogCreateDBRequest {
            admin_id: current_user.id,
            action: "user_updated".to_string(),
            target_user_id: Some(user_id),
            details: json!({
                "display_name": db_request.display_name,
                "role": db_request.role,
                "is_banned": db_request.is_banned,
            }),
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(admin_id = %current_user.id, %user_id, banned = user.is_banned, "User updated");
    Ok(Json(UserResponse::from(user)))
}
