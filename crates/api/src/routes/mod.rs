//! HTTP route handlers.

pub mod health;
pub mod identity;
pub mod invitations;
pub mod referrals;
