//! Custody Gateway - evidence custody pipeline
//!
//! A multi-organization gateway between a route layer and two external
//! systems: a permissioned ledger recording chain-of-custody transactions,
//! and an untrusted content-addressed store holding encrypted evidence
//! packages.
//!
//! ## Services
//!
//! - **Keys**: per-object key derivation from one master secret
//! - **Crypto**: authenticated envelope sealing and content digests
//! - **Store**: content-addressed package upload/download with pinning
//! - **Credentials**: per-tenant identity and signing material
//! - **Ledger**: connection registry with per-phase deadline dispatch
//! - **Pipeline**: register / retrieve / verify orchestration

pub mod config;
pub mod credentials;
pub mod crypto;
pub mod keys;
pub mod ledger;
pub mod pipeline;
pub mod store;
pub mod types;

pub use config::Args;
pub use pipeline::CustodyPipeline;
pub use types::{CustodyError, Result};
