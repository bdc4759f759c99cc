//! Core types for provisioning the pokemon battle database: layered settings,
//! the failure taxonomy, the [`DocumentStore`] seam and the ordered bootstrap.

pub mod bootstrap;
pub mod error;
pub mod settings;
pub mod store;
pub mod verify;

pub use bootstrap::{Bootstrap, BootstrapReport, Step, STEP_ORDER};
pub use error::{BootstrapError, ResourceKind};
pub use store::{Credential, DocumentStore, NewUser, RoleGrant, READ_WRITE_ROLE};
pub use verify::{verify, VerifyReport};
