//! Credential-and-authorization core of the membership service.
//!
//! Two cooperating subsystems:
//!
//! - [`authorization`]: declarative policy descriptors attached to actions,
//!   lazily resolving to one credential validator instance per descriptor.
//! - [`services::UserProvider`]: the credential lifecycle manager — password
//!   change, forgotten-password recovery, security questions, lockout and
//!   expiry policy — on top of an external [`store::UserStore`].
//!
//! Persistence, transport and the hashing primitive are collaborator
//! contracts, not implementations; see [`store`] and
//! [`utils::SecretDigester`].

pub mod authorization;
pub mod config;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use authorization::{
    AuthorizationError, AuthorizationMode, AuthorizationPolicy, CredentialValidator,
    PolicyRegistry, ValidatorRegistry,
};
pub use config::MembershipConfig;
pub use models::{PasswordOptions, PasswordResetTicket, User};
pub use services::{PolicyService, ServiceError, UserProvider};
pub use store::{MemoryUserStore, Paging, UserStore};
