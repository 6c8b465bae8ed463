//! Credit accounting rules and the workflows that move credits.
//!
//! - [`cost`]: what a generation costs
//! - [`generation`]: quote, call the provider, debit, persist
//! - [`payments`]: payment intake and admin review

pub mod cost;
pub mod generation;
pub mod payments;
