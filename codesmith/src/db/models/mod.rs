//! Database request/response models.
//!
//! These are distinct from the API models in `crate::api::models` so the storage and wire
//! representations can evolve independently.

pub mod admin_logs;
pub mod credits;
pub mod generations;
pub mod payment_methods;
pub mod payments;
pub mod users;
