//! Repository implementations of the domain store traits.

pub mod invitation_token;
pub mod referral_token;
pub mod user_mapping;

pub use invitation_token::InvitationTokenRepository;
pub use referral_token::ReferralTokenRepository;
pub use user_mapping::UserMappingRepository;
