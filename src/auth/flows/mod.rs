//! Authentication flows.
//!
//! High-level flows that combine password verification, token issuance and
//! the credential store.

mod authenticator;
mod reset;
mod rotation;
mod types;

pub use authenticator::{CredentialAuthenticator, UNKNOWN_DEVICE};
pub use reset::{PasswordResetFlow, ResetFlowConfig};
pub use rotation::SessionRotator;
pub use types::*;
