//! Domain models for the Borrower Identity service.

pub mod identity;
pub mod invitation_token;
pub mod referral_token;
pub mod user_mapping;

pub use identity::ExternalIdentity;
pub use invitation_token::{InvitationGrant, InvitationToken, InvitationTokenError};
pub use referral_token::{ReferralGrant, ReferralToken, ReferralTokenError};
pub use user_mapping::UserMapping;
