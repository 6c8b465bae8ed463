use crate::{
    api::{
        handlers::page,
        models::admin_logs::{AdminLogResponse, ListAdminLogsQuery},
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::handlers::AdminLogs,
    errors::{Error, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
};

/// Audit trail of admin actions, newest first
#[utoipa::path(
    get,
    path = "/admin-logs",
    tag = "admin",
    summary = "List admin actions",
    params(ListAdminLogsQuery),
    responses(
        (status = 200, description = "Admin log entries", body = [AdminLogResponse]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn list_admin_logs(
    State(state): State<AppState>,
    Query(query): Query<ListAdminLogsQuery>,
    _: RequiresPermission<resource::AdminLogs, operation::ReadAll>,
) -> Result<Json<Vec<AdminLogResponse>>> {
    let (skip, limit) = page(query.skip, query.limit);
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let logs = AdminLogs::new(&mut conn).list(skip, limit).await?;

    Ok(Json(logs.into_iter().map(AdminLogResponse::from).collect()))
}
