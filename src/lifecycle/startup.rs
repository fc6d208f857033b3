//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn validated config and secrets into a ready [`Resubmitter`]
//! - Log both public identifiers
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - No network traffic before the first scheduled attempt

use std::sync::Arc;

use crate::config::{ConfigError, RebroadcastConfig, Secrets};
use crate::resubmit::{Identities, Resubmitter, TransactionTemplate};
use crate::solana::RpcClient;

/// Build the resubmitter from config and secrets.
pub fn build_resubmitter(
    config: &RebroadcastConfig,
    secrets: &Secrets,
) -> Result<Resubmitter<RpcClient>, ConfigError> {
    let identities = Identities {
        authority: secrets.authority()?,
        fee_payer: secrets.fee_payer()?,
    };
    tracing::info!(
        authority = %identities.authority.pubkey(),
        fee_payer = %identities.fee_payer.pubkey(),
        "Signing identities loaded"
    );

    let template = TransactionTemplate::new(secrets.template_bytes()?);
    // A template that fails to decode is reported per attempt; flag it early too.
    match template.decode() {
        Ok(tx) => tracing::info!(
            template_bytes = template.as_bytes().len(),
            required_signers = tx.message().header.num_required_signatures,
            instructions = tx.message().instructions.len(),
            "Transaction template loaded"
        ),
        Err(e) => tracing::warn!(error = %e, "Transaction template does not decode"),
    }

    let client = RpcClient::new(&config.rpc).map_err(|e| ConfigError::InvalidEnv {
        name: crate::config::loader::RPC_URL_ENV,
        reason: e.to_string(),
    })?;

    Ok(Resubmitter::new(
        Arc::new(client),
        identities,
        template,
        config.rpc.confirm_options(),
    ))
}
