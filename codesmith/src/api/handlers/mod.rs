pub mod admin_logs;
pub mod generations;
pub mod payment_methods;
pub mod payments;
pub mod settings;
pub mod stats;
pub mod transactions;
pub mod users;

/// Clamp pagination parameters to sane bounds
pub(crate) fn page(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (skip.unwrap_or(0).max(0), limit.unwrap_or(100).clamp(1, 1000))
}
