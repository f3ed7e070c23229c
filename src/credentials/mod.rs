//! Per-organization identity and signing material

pub mod loader;

pub use loader::{CredentialLoader, OrgIdentity, OrgSigner};
