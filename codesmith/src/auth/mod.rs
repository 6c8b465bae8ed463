//! Request authentication and authorization.
//!
//! Identity comes from a bearer JWT issued by the external identity provider
//! ([`current_user`]); what the caller may do is decided by role in [`permissions`].

pub mod current_user;
pub mod permissions;
