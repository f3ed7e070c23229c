//! Shared types for the custody gateway

pub mod error;

pub use error::{CustodyError, Result, TxPhase};
