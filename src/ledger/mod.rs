//! Ledger connection registry and transaction dispatch
//!
//! One authenticated channel per tenant organization, a resolution step that
//! picks the right tenant identity per request, and deadline-bound dispatch
//! for read-only and read-write operations.

pub mod channel;
pub mod connection;
pub mod protocol;
pub mod registry;

pub use channel::{LedgerChannel, LedgerConnector, WsLedgerChannel, WsLedgerConnector};
pub use connection::TenantConnection;
pub use protocol::{ContractHandle, FrameBuilder, Operation};
pub use registry::{ConnectionRegistry, DeadlineProfile};

pub use crate::types::TxPhase;
