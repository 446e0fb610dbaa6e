//! External service clients.

pub mod crm;

pub use crm::{CrmClient, CrmError};
