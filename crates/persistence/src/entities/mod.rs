//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod invitation_token;
pub mod referral_token;
pub mod user_mapping;

pub use invitation_token::InvitationTokenEntity;
pub use referral_token::ReferralTokenEntity;
pub use user_mapping::UserMappingEntity;
