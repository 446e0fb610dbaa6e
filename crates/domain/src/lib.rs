//! Domain layer for the Borrower Identity service.
//!
//! This crate contains:
//! - Domain models (InvitationToken, ReferralToken, UserMapping)
//! - Business logic services (token validation, identity linking, session bootstrap)
//! - Domain error types

pub mod models;
pub mod services;
