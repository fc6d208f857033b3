//! Periodic transaction rebroadcaster.
//!
//! Re-signs a precomputed Solana transaction with an authority key and a
//! fee-payer key, refreshes its blockhash, and resubmits it on a timer.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resubmit;
pub mod solana;

pub use config::RebroadcastConfig;
pub use lifecycle::Shutdown;
pub use resubmit::{Resubmitter, Scheduler};
