//! Domain services for the Borrower Identity service.
//!
//! Services contain business logic that operates on domain models and the
//! store traits; persistence provides the PostgreSQL implementations.

pub mod identity_linker;
pub mod session;
pub mod store;
pub mod token_validation;

pub use identity_linker::{IdentityLinker, LinkError, LinkOutcome};
pub use session::{SessionBootstrapper, SessionError, SessionResolution};
pub use store::{
    InvitationTokenStore, MappingConflict, MappingStore, MemoryIdentityStore, ReferralTokenStore,
    StoreError,
};
pub use token_validation::{InvitationValidateError, ReferralValidateError, TokenValidator};
