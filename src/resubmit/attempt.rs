//! A single re-sign and resubmit attempt.
//!
//! # Steps
//! 1. Decode a fresh copy of the template
//! 2. Fetch a recent blockhash
//! 3. Set blockhash and fee payer
//! 4. Sign: fee payer first, then authority
//! 5. Submit and wait for the configured commitment

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::solana::confirm::{submit_and_confirm, ConfirmOptions};
use crate::solana::{Hash, LedgerClient, LedgerError, LedgerResult, Pubkey, Signature, SigningIdentity, Transaction};

/// Immutable serialized transaction the attempts start from.
#[derive(Debug, Clone)]
pub struct TransactionTemplate {
    bytes: Arc<[u8]>,
}

impl TransactionTemplate {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: bytes.into() }
    }

    pub fn from_base64(encoded: &str) -> LedgerResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LedgerError::Decode(format!("invalid base64: {}", e)))?;
        Ok(Self::new(bytes))
    }

    /// Decode a new mutable transaction; the template itself is untouched.
    pub fn decode(&self) -> LedgerResult<Transaction> {
        Transaction::decode(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// The two key pairs every submission is signed with.
#[derive(Debug, Clone)]
pub struct Identities {
    /// Authorizes the template's instructions ("old owner").
    pub authority: SigningIdentity,
    /// Pays fees ("new owner").
    pub fee_payer: SigningIdentity,
}

/// Successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub signature: Signature,
    pub blockhash: Hash,
    pub fee_payer: Pubkey,
}

/// Why an attempt failed. None of these stop the schedule.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("failed to decode transaction template: {0}")]
    Decode(#[source] LedgerError),

    #[error("failed to fetch recent blockhash: {0}")]
    Network(#[source] LedgerError),

    #[error("failed to sign transaction: {0}")]
    Signing(#[source] LedgerError),

    #[error("failed to submit transaction: {0}")]
    Submission(#[source] LedgerError),
}

impl AttemptError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Decode(_) => "decode",
            AttemptError::Network(_) => "network",
            AttemptError::Signing(_) => "signing",
            AttemptError::Submission(_) => "submission",
        }
    }
}

/// Re-signs the template with fresh blockhashes and submits it.
pub struct Resubmitter<C> {
    client: Arc<C>,
    identities: Identities,
    template: TransactionTemplate,
    options: ConfirmOptions,
}

impl<C> std::fmt::Debug for Resubmitter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resubmitter")
            .field("authority", &self.identities.authority)
            .field("fee_payer", &self.identities.fee_payer)
            .field("template_len", &self.template.as_bytes().len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: LedgerClient> Resubmitter<C> {
    pub fn new(
        client: Arc<C>,
        identities: Identities,
        template: TransactionTemplate,
        options: ConfirmOptions,
    ) -> Self {
        Self {
            client,
            identities,
            template,
            options,
        }
    }

    pub fn authority(&self) -> Pubkey {
        self.identities.authority.pubkey()
    }

    pub fn fee_payer(&self) -> Pubkey {
        self.identities.fee_payer.pubkey()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn template(&self) -> &TransactionTemplate {
        &self.template
    }

    /// Run one attempt. Every failure is returned, never raised.
    pub async fn attempt_submission(&self) -> Result<Confirmation, AttemptError> {
        let transaction = self.template.decode().map_err(AttemptError::Decode)?;

        let latest = self
            .client
            .latest_blockhash(self.options.commitment)
            .await
            .map_err(AttemptError::Network)?;
        tracing::debug!(
            blockhash = %latest.blockhash,
            last_valid_block_height = latest.last_valid_block_height,
            "Fetched recent blockhash"
        );

        let transaction = self.sign_with(transaction, latest.blockhash)?;

        let signature = submit_and_confirm(
            self.client.as_ref(),
            &transaction,
            latest.last_valid_block_height,
            &self.options,
        )
        .await
        .map_err(AttemptError::Submission)?;

        Ok(Confirmation {
            signature,
            blockhash: latest.blockhash,
            fee_payer: self.fee_payer(),
        })
    }

    /// Point `transaction` at `blockhash` and the fee payer, then sign it
    /// with both identities.
    pub fn sign_with(
        &self,
        mut transaction: Transaction,
        blockhash: Hash,
    ) -> Result<Transaction, AttemptError> {
        transaction
            .set_fee_payer(self.fee_payer())
            .map_err(AttemptError::Decode)?;
        transaction.set_recent_blockhash(blockhash);
        transaction
            .sign(&[&self.identities.fee_payer, &self.identities.authority])
            .map_err(AttemptError::Signing)?;
        transaction
            .verify_signatures()
            .map_err(AttemptError::Signing)?;
        Ok(transaction)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::solana::transaction::{AccountMeta, Instruction, Message};
    use crate::solana::types::{Commitment, LatestBlockhash, SendOptions, SignatureStatus};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory ledger that hands out scripted blockhashes and records
    /// every transaction it is sent.
    #[derive(Default)]
    pub(crate) struct StubLedger {
        pub blockhashes: Mutex<VecDeque<LedgerResult<LatestBlockhash>>>,
        pub sent: Mutex<Vec<Transaction>>,
        pub blockhash_calls: Mutex<u32>,
        pub blockhash_delay: Option<Duration>,
    }

    impl StubLedger {
        pub fn with_blockhashes(hashes: Vec<LedgerResult<LatestBlockhash>>) -> Self {
            Self {
                blockhashes: Mutex::new(hashes.into()),
                ..Self::default()
            }
        }
    }

    pub(crate) fn latest(byte: u8) -> LatestBlockhash {
        LatestBlockhash {
            blockhash: Hash([byte; 32]),
            last_valid_block_height: 1_000,
        }
    }

    impl LedgerClient for StubLedger {
        async fn latest_blockhash(&self, _: Commitment) -> LedgerResult<LatestBlockhash> {
            *self.blockhash_calls.lock().unwrap() += 1;
            if let Some(delay) = self.blockhash_delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.blockhashes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(LedgerError::Rpc("connection refused".into())))
        }

        async fn send_transaction(&self, tx: &Transaction, _: SendOptions) -> LedgerResult<Signature> {
            self.sent.lock().unwrap().push(tx.clone());
            tx.signature()
                .copied()
                .ok_or_else(|| LedgerError::Signing("unsigned".into()))
        }

        async fn signature_status(&self, _: &Signature) -> LedgerResult<Option<SignatureStatus>> {
            Ok(Some(SignatureStatus {
                slot: 1,
                confirmations: Some(1),
                err: None,
                confirmation_status: Some(Commitment::Confirmed),
            }))
        }

        async fn block_height(&self, _: Commitment) -> LedgerResult<u64> {
            Ok(1)
        }
    }

    /// Template whose fee payer is neither test identity.
    pub(crate) fn template_for(authority: &SigningIdentity) -> TransactionTemplate {
        let ix = Instruction {
            program_id: Pubkey([200; 32]),
            accounts: vec![
                AccountMeta {
                    pubkey: Pubkey([10; 32]),
                    is_signer: false,
                    is_writable: true,
                },
                AccountMeta {
                    pubkey: authority.pubkey(),
                    is_signer: true,
                    is_writable: false,
                },
            ],
            data: vec![6, 2],
        };
        let message = Message::compile(&[ix], &Pubkey([77; 32]), Hash([1; 32])).unwrap();
        TransactionTemplate::new(Transaction::new_unsigned(message).encode().unwrap())
    }

    pub(crate) fn resubmitter(ledger: StubLedger) -> Resubmitter<StubLedger> {
        let authority = SigningIdentity::generate();
        let template = template_for(&authority);
        Resubmitter::new(
            Arc::new(ledger),
            Identities {
                authority,
                fee_payer: SigningIdentity::generate(),
            },
            template,
            ConfirmOptions {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(5),
                ..ConfirmOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_attempt_overwrites_fee_payer() {
        let job = resubmitter(StubLedger::with_blockhashes(vec![Ok(latest(3))]));
        let confirmation = job.attempt_submission().await.unwrap();

        let sent = job.client().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].fee_payer(), Some(&job.fee_payer()));
        assert!(!sent[0].message().account_keys.contains(&Pubkey([77; 32])));
        assert_eq!(confirmation.fee_payer, job.fee_payer());
        assert_eq!(confirmation.blockhash, Hash([3; 32]));
        assert_eq!(Some(&confirmation.signature), sent[0].signature());
    }

    #[tokio::test]
    async fn test_each_attempt_fetches_fresh_blockhash_and_both_signatures() {
        let job = resubmitter(StubLedger::with_blockhashes(vec![Ok(latest(3)), Ok(latest(4))]));
        job.attempt_submission().await.unwrap();
        job.attempt_submission().await.unwrap();

        assert_eq!(*job.client().blockhash_calls.lock().unwrap(), 2);
        let sent = job.client().sent.lock().unwrap();
        assert_eq!(sent[0].message().recent_blockhash, Hash([3; 32]));
        assert_eq!(sent[1].message().recent_blockhash, Hash([4; 32]));
        for tx in sent.iter() {
            assert_eq!(tx.message().signer_keys(), &[job.fee_payer(), job.authority()]);
            tx.verify_signatures().unwrap();
        }
        assert_ne!(sent[0].signature(), sent[1].signature());
    }

    #[tokio::test]
    async fn test_blockhash_failure_is_returned() {
        let job = resubmitter(StubLedger::default());
        let err = job.attempt_submission().await.unwrap_err();
        assert!(matches!(err, AttemptError::Network(_)));
        assert_eq!(err.kind(), "network");
        assert!(job.client().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_template_is_returned() {
        let mut job = resubmitter(StubLedger::with_blockhashes(vec![Ok(latest(3))]));
        job.template = TransactionTemplate::new(vec![1, 2, 3]);
        let err = job.attempt_submission().await.unwrap_err();
        assert!(matches!(err, AttemptError::Decode(_)));
        assert_eq!(*job.client().blockhash_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_template_needing_third_signer_fails_signing() {
        let mut job = resubmitter(StubLedger::with_blockhashes(vec![Ok(latest(3))]));
        let stranger = SigningIdentity::generate();
        job.template = template_for(&stranger);
        let err = job.attempt_submission().await.unwrap_err();
        assert!(matches!(err, AttemptError::Signing(_)));
    }

    #[test]
    fn test_debug_shows_pubkeys_only() {
        let job = resubmitter(StubLedger::default());
        let rendered = format!("{:?}", job);
        assert!(rendered.contains(&job.authority().to_string()));
        assert!(rendered.contains(&job.fee_payer().to_string()));
        assert!(rendered.contains("template_len"));
        assert!(!rendered.contains(&job.identities.fee_payer.to_json_bytes()[..12]));
    }

    #[test]
    fn test_template_from_base64() {
        assert_eq!(TransactionTemplate::from_base64("AQID").unwrap().as_bytes(), &[1, 2, 3]);
        assert!(TransactionTemplate::from_base64("***").is_err());
    }
}
