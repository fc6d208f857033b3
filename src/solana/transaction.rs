//! Legacy transaction codec, message compilation and signing.
//!
//! # Wire Layout
//! ```text
//! Transaction: [compact-u16 n][n × 64-byte signature] Message
//! Message:     [3-byte header][compact-u16 k][k × 32-byte key]
//!              [32-byte recent blockhash]
//!              [compact-u16 m][m × CompiledInstruction]
//! Instruction: [u8 program index][compact-u16 a][a × u8 account index]
//!              [compact-u16 d][d bytes of data]
//! ```
//!
//! Account keys are ordered: writable signers, read-only signers, writable
//! non-signers, read-only non-signers. Account 0 is the fee payer.

use std::cmp::Ordering;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use crate::solana::keypair::{verify_signature, SigningIdentity};
use crate::solana::shortvec::{encode_len, Reader};
use crate::solana::types::{Hash, LedgerError, LedgerResult, Pubkey, Signature};

/// Versioned messages set the high bit of the first byte.
const VERSION_PREFIX_MASK: u8 = 0x80;

/// Account indices are single bytes on the wire.
const MAX_ACCOUNT_KEYS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// Instruction with account references resolved to indices into the
/// message's account keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

/// Instruction with explicit account metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: Hash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message paid for by `fee_payer`.
    ///
    /// Duplicate accounts are merged (signer and writable flags are OR-ed),
    /// program IDs are appended as read-only non-signers, and the fee payer
    /// is forced to index 0 as a writable signer.
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: &Pubkey,
        recent_blockhash: Hash,
    ) -> LedgerResult<Self> {
        let mut metas: Vec<AccountMeta> = Vec::new();
        let mut program_ids: Vec<Pubkey> = Vec::new();
        for ix in instructions {
            metas.extend(ix.accounts.iter().copied());
            if !program_ids.contains(&ix.program_id) {
                program_ids.push(ix.program_id);
            }
        }
        metas.extend(program_ids.iter().map(|id| AccountMeta {
            pubkey: *id,
            is_signer: false,
            is_writable: false,
        }));

        let mut unique: Vec<AccountMeta> = Vec::with_capacity(metas.len());
        for meta in metas {
            match unique.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                Some(existing) => {
                    existing.is_signer |= meta.is_signer;
                    existing.is_writable |= meta.is_writable;
                }
                None => unique.push(meta),
            }
        }

        unique.sort_by(|a, b| {
            b.is_signer
                .cmp(&a.is_signer)
                .then_with(|| b.is_writable.cmp(&a.is_writable))
                .then_with(|| collation_order(&a.pubkey.to_string(), &b.pubkey.to_string()))
        });

        unique.retain(|m| m.pubkey != *fee_payer);
        unique.insert(
            0,
            AccountMeta {
                pubkey: *fee_payer,
                is_signer: true,
                is_writable: true,
            },
        );

        if unique.len() > MAX_ACCOUNT_KEYS {
            return Err(LedgerError::Decode(format!(
                "message references {} accounts, maximum is {}",
                unique.len(),
                MAX_ACCOUNT_KEYS
            )));
        }

        let signers = unique.iter().filter(|m| m.is_signer).count();
        let readonly_signed = unique.iter().filter(|m| m.is_signer && !m.is_writable).count();
        let readonly_unsigned = unique.iter().filter(|m| !m.is_signer && !m.is_writable).count();
        let header = MessageHeader {
            num_required_signatures: header_count(signers, "signers")?,
            num_readonly_signed_accounts: header_count(readonly_signed, "read-only signers")?,
            num_readonly_unsigned_accounts: header_count(readonly_unsigned, "read-only accounts")?,
        };

        let account_keys: Vec<Pubkey> = unique.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Pubkey| -> u8 {
            // Every key was inserted above and the count is capped at 256.
            account_keys.iter().position(|k| k == key).unwrap_or(0) as u8
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|a| index_of(&a.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        if self.header.num_required_signatures == 0 {
            return None;
        }
        self.account_keys.first()
    }

    /// Keys whose signatures the message requires, in slot order.
    pub fn signer_keys(&self) -> &[Pubkey] {
        let n = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let required = self.header.num_required_signatures as usize;
        if index < required {
            index < required.saturating_sub(self.header.num_readonly_signed_accounts as usize)
        } else {
            let unsigned = self.account_keys.len().saturating_sub(required);
            let writable_unsigned =
                unsigned.saturating_sub(self.header.num_readonly_unsigned_accounts as usize);
            index - required < writable_unsigned
        }
    }

    /// Resolve compiled instructions back to explicit account metadata.
    pub fn decompile(&self) -> LedgerResult<Vec<Instruction>> {
        let key_at = |index: u8| -> LedgerResult<Pubkey> {
            self.account_keys
                .get(index as usize)
                .copied()
                .ok_or_else(|| {
                    LedgerError::Decode(format!(
                        "account index {} out of range ({} keys)",
                        index,
                        self.account_keys.len()
                    ))
                })
        };

        self.instructions
            .iter()
            .map(|ix| {
                let program_id = key_at(ix.program_id_index)?;
                let accounts = ix
                    .accounts
                    .iter()
                    .map(|&index| {
                        Ok(AccountMeta {
                            pubkey: key_at(index)?,
                            is_signer: self.is_signer(index as usize),
                            is_writable: self.is_writable(index as usize),
                        })
                    })
                    .collect::<LedgerResult<Vec<_>>>()?;
                Ok(Instruction {
                    program_id,
                    accounts,
                    data: ix.data.clone(),
                })
            })
            .collect()
    }

    /// Bytes covered by every signature.
    pub fn serialize(&self) -> LedgerResult<Vec<u8>> {
        let mut out = Vec::with_capacity(3 + self.account_keys.len() * 32 + 32 + 64);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed_accounts);
        out.push(self.header.num_readonly_unsigned_accounts);

        encode_len(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_len(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_len(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            encode_len(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }

    fn read(reader: &mut Reader<'_>) -> LedgerResult<Self> {
        if reader.peek_u8()? & VERSION_PREFIX_MASK != 0 {
            return Err(LedgerError::Decode(
                "versioned transactions are not supported".to_string(),
            ));
        }

        let header = MessageHeader {
            num_required_signatures: reader.read_u8()?,
            num_readonly_signed_accounts: reader.read_u8()?,
            num_readonly_unsigned_accounts: reader.read_u8()?,
        };

        let key_count = reader.read_len()?;
        let mut account_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            account_keys.push(Pubkey(reader.read_array()?));
        }
        let recent_blockhash = Hash(reader.read_array()?);

        let ix_count = reader.read_len()?;
        let mut instructions = Vec::with_capacity(ix_count);
        for _ in 0..ix_count {
            let program_id_index = reader.read_u8()?;
            let account_count = reader.read_len()?;
            let accounts = reader.read_bytes(account_count)?.to_vec();
            let data_len = reader.read_len()?;
            let data = reader.read_bytes(data_len)?.to_vec();
            instructions.push(CompiledInstruction {
                program_id_index,
                accounts,
                data,
            });
        }

        let message = Self {
            header,
            account_keys,
            recent_blockhash,
            instructions,
        };
        message.check_header()?;
        Ok(message)
    }

    fn check_header(&self) -> LedgerResult<()> {
        let keys = self.account_keys.len();
        let required = self.header.num_required_signatures as usize;
        if required > keys {
            return Err(LedgerError::Decode(format!(
                "header requires {} signatures but message has {} keys",
                required, keys
            )));
        }
        if self.header.num_readonly_signed_accounts as usize > required
            || self.header.num_readonly_unsigned_accounts as usize > keys - required
        {
            return Err(LedgerError::Decode("inconsistent message header".to_string()));
        }
        Ok(())
    }
}

fn header_count(count: usize, what: &str) -> LedgerResult<u8> {
    u8::try_from(count).map_err(|_| {
        LedgerError::Decode(format!("message has {} {}, maximum is {}", count, what, u8::MAX))
    })
}

/// Order keys the way the JS SDK's `localeCompare` does for base58 text:
/// case-insensitive first, lower case before upper case on ties.
fn collation_order(a: &str, b: &str) -> Ordering {
    a.to_ascii_lowercase()
        .cmp(&b.to_ascii_lowercase())
        .then_with(|| {
            a.bytes()
                .zip(b.bytes())
                .map(|(x, y)| y.cmp(&x))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
}

/// Signed (or partially signed) legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    signatures: Vec<Signature>,
    message: Message,
}

impl Transaction {
    /// Wrap a message with empty signature slots.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        let mut reader = Reader::new(bytes);
        let sig_count = reader.read_len()?;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            signatures.push(Signature(reader.read_array()?));
        }
        let message = Message::read(&mut reader)?;

        if reader.remaining() != 0 {
            return Err(LedgerError::Decode(format!(
                "{} trailing bytes after message at offset {}",
                reader.remaining(),
                reader.position()
            )));
        }
        let required = message.header.num_required_signatures as usize;
        if signatures.len() != required {
            tracing::debug!(
                present = signatures.len(),
                required,
                "Resizing signature slots to match message header"
            );
            signatures.resize(required, Signature::default());
        }

        Ok(Self { signatures, message })
    }

    pub fn from_base64(encoded: &str) -> LedgerResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| LedgerError::Decode(format!("invalid base64: {}", e)))?;
        Self::decode(&bytes)
    }

    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        let mut out = Vec::new();
        encode_len(self.signatures.len(), &mut out)?;
        for sig in &self.signatures {
            out.extend_from_slice(sig.as_bytes());
        }
        out.extend(self.message.serialize()?);
        Ok(out)
    }

    pub fn to_base64(&self) -> LedgerResult<String> {
        Ok(BASE64.encode(self.encode()?))
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn fee_payer(&self) -> Option<&Pubkey> {
        self.message.fee_payer()
    }

    /// The first signature, which identifies the transaction on chain.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first()
    }

    /// Replace the recent blockhash. Existing signatures no longer cover
    /// the message and are cleared.
    pub fn set_recent_blockhash(&mut self, blockhash: Hash) {
        self.message.recent_blockhash = blockhash;
        self.clear_signatures();
    }

    /// Make `fee_payer` account 0, recompiling the message.
    ///
    /// Accounts referenced only as the previous fee payer are dropped;
    /// accounts the instructions reference keep their flags.
    pub fn set_fee_payer(&mut self, fee_payer: Pubkey) -> LedgerResult<()> {
        let instructions = self.message.decompile()?;
        self.message = Message::compile(&instructions, &fee_payer, self.message.recent_blockhash)?;
        self.clear_signatures();
        Ok(())
    }

    /// Fill signature slots for each signer, in the order given.
    ///
    /// Fails if a signer is not one of the message's required signers.
    pub fn sign(&mut self, signers: &[&SigningIdentity]) -> LedgerResult<()> {
        let payload = self.message.serialize()?;
        for signer in signers {
            let pubkey = signer.pubkey();
            let slot = self
                .message
                .signer_keys()
                .iter()
                .position(|k| *k == pubkey)
                .ok_or_else(|| {
                    LedgerError::Signing(format!("unknown signer {}", pubkey))
                })?;
            self.signatures[slot] = signer.sign_message(&payload);
        }
        Ok(())
    }

    /// Check that every required signature is present and valid.
    pub fn verify_signatures(&self) -> LedgerResult<()> {
        let payload = self.message.serialize()?;
        for (key, sig) in self.message.signer_keys().iter().zip(&self.signatures) {
            if *sig == Signature::default() {
                return Err(LedgerError::Signing(format!(
                    "missing signature for public key {}",
                    key
                )));
            }
            if !verify_signature(key, &payload, sig) {
                return Err(LedgerError::Signing(format!(
                    "invalid signature for public key {}",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Human-readable breakdown of the transaction.
    pub fn summary(&self) -> LedgerResult<TransactionSummary> {
        let instructions = self
            .message
            .decompile()?
            .into_iter()
            .map(|ix| InstructionSummary {
                program_id: ix.program_id,
                accounts: ix.accounts,
                data_len: ix.data.len(),
            })
            .collect();
        Ok(TransactionSummary {
            fee_payer: self.fee_payer().copied(),
            recent_blockhash: self.message.recent_blockhash,
            required_signers: self.message.signer_keys().to_vec(),
            present_signatures: self
                .signatures
                .iter()
                .filter(|s| **s != Signature::default())
                .count(),
            header: self.message.header,
            account_keys: self.message.account_keys.clone(),
            instructions,
        })
    }

    fn clear_signatures(&mut self) {
        self.signatures = vec![Signature::default(); self.message.header.num_required_signatures as usize];
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionSummary {
    pub fee_payer: Option<Pubkey>,
    pub recent_blockhash: Hash,
    pub required_signers: Vec<Pubkey>,
    pub present_signatures: usize,
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub instructions: Vec<InstructionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructionSummary {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data_len: usize,
}
