use crate::{
    api::models::stats::StatsResponse,
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{Generations, Payments, Users},
        models::payments::PaymentStatus,
    },
    errors::{Error, Result},
    AppState,
};
use axum::{extract::State, response::Json};

/// Usage overview for the admin console
#[utoipa::path(
    get,
    path = "/stats",
    tag = "admin",
    summary = "Platform statistics",
    description = "User, generation and payment totals (admin only)",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
    ),
    security(
        ("BearerAuth" = [])
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    _: RequiresPermission<resource::Stats, operation::ReadAll>,
) -> Result<Json<StatsResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let total_users = Users::new(&mut conn).count().await?;
    let total_generations = Generations::new(&mut conn).count().await?;

    let mut payments = Payments::new(&mut conn);
    let counts = payments.count_by_status().await?;
    let settled_revenue = payments.settled_revenue().await?;

    Ok(Json(StatsResponse {
        total_users,
        total_generations,
        pending_payments: counts.get(&PaymentStatus::Pending).copied().unwrap_or(0),
        payments_by_status: counts.into_iter().map(|(status, n)| (status.as_str().to_string(), n)).collect(),
        settled_revenue,
    }))
}
