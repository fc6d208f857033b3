//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (secret keys, RPC URL, template)
//!     → keypair.rs (key loading, signing)
//!     → transaction.rs (decode, recompile fee payer, sign, verify)
//!     → client.rs (JSON-RPC with timeouts and failover)
//!     → confirm.rs (send, poll status until commitment)
//! ```
//!
//! # Security Constraints
//! - Secret keys ONLY from environment variables
//! - Never log secret keys
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod confirm;
pub mod keypair;
pub mod shortvec;
pub mod transaction;
pub mod types;

pub use client::{LedgerClient, RpcClient};
pub use confirm::ConfirmOptions;
pub use keypair::SigningIdentity;
pub use transaction::Transaction;
pub use types::{Commitment, Hash, LedgerError, LedgerResult, Pubkey, Signature};
