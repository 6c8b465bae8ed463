pub mod admin_logs;
pub mod generations;
pub mod payment_methods;
pub mod payments;
pub mod settings;
pub mod stats;
pub mod transactions;
pub mod users;
