//! Shared utilities and common types for the Borrower Identity service.
//!
//! This crate provides functionality used across all other crates:
//! - Auth-provider JWT verification (RS256)
//! - Opaque token generation for invitations and referrals
//! - Common validation logic

pub mod jwt;
pub mod token;
pub mod validation;
