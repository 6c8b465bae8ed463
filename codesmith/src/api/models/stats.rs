use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Usage overview for the admin console
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_generations: i64,
    pub pending_payments: i64,
    /// Payment counts keyed by status
    pub payments_by_status: BTreeMap<String, i64>,
    /// Sum of completed and approved payment amounts
    #[schema(value_type = f64)]
    pub settled_revenue: Decimal,
}
