//! Periodic resubmission subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (scheduler.rs)
//!     tick → run_attempt
//!         → Resubmitter::attempt_submission (attempt.rs)
//!             decode template → fetch blockhash → set fee payer
//!             → sign (fee payer, authority) → submit → confirm
//!         → report (one log line) + metrics
//! ```
//!
//! # Design Decisions
//! - Attempts return `Result`; the scheduler owns logging
//! - Failures never stop the schedule
//! - Overlapping ticks follow `OverlapPolicy`

pub mod attempt;
pub mod explorer;
pub mod scheduler;

pub use attempt::{AttemptError, Confirmation, Identities, Resubmitter, TransactionTemplate};
pub use explorer::ExplorerLinks;
pub use scheduler::{Scheduler, SchedulerStats};
