//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use tx_rebroadcaster::config::RpcConfig;
use tx_rebroadcaster::resubmit::{Identities, TransactionTemplate};
use tx_rebroadcaster::solana::transaction::{AccountMeta, Instruction, Message};
use tx_rebroadcaster::solana::{Hash, Pubkey, SigningIdentity, Transaction};

/// Result of a mocked JSON-RPC method: a `result` value or `(code, message)`.
pub type RpcReply = Result<Value, (i64, String)>;

/// Start a programmable JSON-RPC backend on an ephemeral port.
pub async fn start_mock_rpc<F>(handler: F) -> SocketAddr
where
    F: Fn(&str, &Value) -> RpcReply + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let handler = handler.clone();
            async move {
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let body = match handler(&method, &request["params"]) {
                    Ok(result) => json!({"jsonrpc": "2.0", "id": request["id"], "result": result}),
                    Err((code, message)) => json!({
                        "jsonrpc": "2.0",
                        "id": request["id"],
                        "error": {"code": code, "message": message}
                    }),
                };
                Json(body)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A minimal ledger: hands out blockhashes, accepts transactions that carry
/// valid signatures, and reports them confirmed.
#[derive(Clone, Default)]
pub struct MockLedger {
    pub sent: Arc<Mutex<Vec<Transaction>>>,
    pub send_params: Arc<Mutex<Vec<Value>>>,
    pub blockhash_calls: Arc<Mutex<u8>>,
}

impl MockLedger {
    pub fn handle(&self, method: &str, params: &Value) -> RpcReply {
        match method {
            "getLatestBlockhash" => {
                let mut calls = self.blockhash_calls.lock().unwrap();
                *calls += 1;
                Ok(json!({
                    "context": {"slot": 1},
                    "value": {
                        "blockhash": Hash([*calls; 32]).to_string(),
                        "lastValidBlockHeight": 500
                    }
                }))
            }
            "sendTransaction" => {
                let encoded = params[0].as_str().unwrap_or_default();
                let tx = Transaction::from_base64(encoded).map_err(|e| (-32602, e.to_string()))?;
                tx.verify_signatures().map_err(|e| (-32003, e.to_string()))?;
                let signature = tx.signature().copied().unwrap_or_default();
                self.send_params.lock().unwrap().push(params[1].clone());
                self.sent.lock().unwrap().push(tx);
                Ok(json!(signature.to_string()))
            }
            "getSignatureStatuses" => Ok(json!({
                "context": {"slot": 2},
                "value": [{
                    "slot": 2,
                    "confirmations": 1,
                    "err": null,
                    "confirmationStatus": "confirmed"
                }]
            })),
            "getBlockHeight" => Ok(json!(100)),
            other => Err((-32601, format!("Method not found: {}", other))),
        }
    }
}

pub fn rpc_config(addr: SocketAddr) -> RpcConfig {
    RpcConfig {
        url: format!("http://{}", addr),
        timeout_secs: 5,
        confirm_timeout_secs: 5,
        poll_interval_ms: 50,
        ..RpcConfig::default()
    }
}

/// Fresh identities and a template whose instruction needs the authority's
/// signature and whose starting fee payer is some unrelated account.
pub fn identities_and_template() -> (Identities, TransactionTemplate) {
    let authority = SigningIdentity::generate();
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
    let template = TransactionTemplate::new(Transaction::new_unsigned(message).encode().unwrap());
    let identities = Identities {
        authority,
        fee_payer: SigningIdentity::generate(),
    };
    (identities, template)
}
