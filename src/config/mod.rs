//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (.env, CUSTOM_RPC_URL, ...)
//!     → validation.rs (semantic checks)
//!     → RebroadcastConfig (validated, immutable)
//!
//! Secrets (keys, template) are read from the environment only
//!     → loader::Secrets
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets never live in the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, Secrets};
pub use schema::{ExplorerConfig, ObservabilityConfig, OverlapPolicy, RebroadcastConfig, RpcConfig, ScheduleConfig};
