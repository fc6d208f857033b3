//! Block explorer links for log output.

use crate::config::ExplorerConfig;
use crate::solana::Signature;

#[derive(Debug, Clone)]
pub struct ExplorerLinks {
    base_url: String,
    cluster: String,
}

impl ExplorerLinks {
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cluster: config.cluster.trim().to_string(),
        }
    }

    pub fn transaction_url(&self, signature: &Signature) -> String {
        if self.cluster.is_empty() {
            format!("{}/tx/{}", self.base_url, signature)
        } else {
            format!("{}/tx/{}?cluster={}", self.base_url, signature, self.cluster)
        }
    }
}

impl Default for ExplorerLinks {
    fn default() -> Self {
        Self::new(&ExplorerConfig::default())
    }
}
