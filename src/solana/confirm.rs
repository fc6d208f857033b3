//! Submission and confirmation monitoring.

use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::solana::client::LedgerClient;
use crate::solana::transaction::Transaction;
use crate::solana::types::{Commitment, LedgerError, LedgerResult, SendOptions, Signature};

/// How a transaction is sent and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmOptions {
    pub skip_preflight: bool,
    pub commitment: Commitment,
    /// Overall deadline for reaching `commitment`.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            commitment: Commitment::Confirmed,
            timeout: Duration::from_secs(90),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Send a signed transaction and wait until it reaches the requested
/// commitment.
pub async fn submit_and_confirm<C: LedgerClient + ?Sized>(
    client: &C,
    transaction: &Transaction,
    last_valid_block_height: u64,
    options: &ConfirmOptions,
) -> LedgerResult<Signature> {
    let send_options = SendOptions {
        skip_preflight: options.skip_preflight,
        preflight_commitment: options.commitment,
    };
    let signature = client.send_transaction(transaction, send_options).await?;
    tracing::debug!(signature = %signature, "Transaction submitted");

    wait_for_confirmation(client, &signature, last_valid_block_height, options).await?;
    Ok(signature)
}

/// Poll the signature status until it satisfies the commitment level.
///
/// Stops early when the transaction fails on chain or the block height
/// passes `last_valid_block_height`. Failed status polls are logged and
/// retried on the next tick.
pub async fn wait_for_confirmation<C: LedgerClient + ?Sized>(
    client: &C,
    signature: &Signature,
    last_valid_block_height: u64,
    options: &ConfirmOptions,
) -> LedgerResult<()> {
    let result = timeout(options.timeout, async {
        let mut ticker = interval(options.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let status = match client.signature_status(signature).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(signature = %signature, error = %e, "Status poll failed");
                    continue;
                }
            };

            match status {
                Some(status) => {
                    if let Some(err) = &status.err {
                        return Err(LedgerError::TransactionFailed {
                            signature: *signature,
                            reason: err.to_string(),
                        });
                    }
                    if status.satisfies(options.commitment) {
                        return Ok(());
                    }
                    tracing::debug!(
                        signature = %signature,
                        reached = %status.commitment(),
                        required = %options.commitment,
                        "Waiting for confirmation"
                    );
                }
                None => match client.block_height(options.commitment).await {
                    Ok(height) if height > last_valid_block_height => {
                        return Err(LedgerError::BlockhashExpired(*signature));
                    }
                    Ok(height) => {
                        tracing::debug!(
                            signature = %signature,
                            block_height = height,
                            last_valid_block_height,
                            "Transaction pending"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Block height poll failed");
                    }
                },
            }
        }
    })
    .await;

    match result {
        Ok(outcome) => outcome,
        Err(_) => Err(LedgerError::ConfirmationTimeout {
            signature: *signature,
            secs: options.timeout.as_secs(),
        }),
    }
}
