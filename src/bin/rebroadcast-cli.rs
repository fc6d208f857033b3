use clap::{Parser, Subcommand};
use serde_json::json;

use tx_rebroadcaster::config::{RpcConfig, Secrets};
use tx_rebroadcaster::solana::{LedgerClient, RpcClient, Signature, SigningIdentity, Transaction};

#[derive(Parser)]
#[command(name = "rebroadcast-cli")]
#[command(about = "Key and template utilities for the transaction rebroadcaster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key pair in the JSON byte-array format
    Keygen,
    /// Print the public keys of the configured identities
    Pubkeys,
    /// Decode a base64 transaction template and print its layout
    Inspect {
        #[arg(long, env = "BASE_64_TX", hide_env_values = true)]
        tx: String,
    },
    /// Query the status of a submitted signature
    Status {
        signature: String,
        #[arg(long, env = "CUSTOM_RPC_URL")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let identity = SigningIdentity::generate();
            eprintln!("Public key: {}", identity.pubkey());
            println!("{}", identity.to_json_bytes().as_str());
        }
        Commands::Pubkeys => {
            let secrets = Secrets::from_env()?;
            let out = json!({
                "authority": secrets.authority()?.pubkey(),
                "fee_payer": secrets.fee_payer()?.pubkey(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Inspect { tx } => {
            let transaction = Transaction::from_base64(&tx)?;
            println!("{}", serde_json::to_string_pretty(&transaction.summary()?)?);
        }
        Commands::Status { signature, url } => {
            let signature: Signature = signature.parse()?;
            let client = RpcClient::new(&RpcConfig {
                url,
                ..RpcConfig::default()
            })?;
            match client.signature_status(&signature).await? {
                Some(status) => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "signature": signature,
                        "slot": status.slot,
                        "commitment": status.commitment(),
                        "err": status.err,
                    }))?
                ),
                None => println!("{}: not found", signature),
            }
        }
    }

    Ok(())
}
