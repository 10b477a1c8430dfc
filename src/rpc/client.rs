use alloy::network::ReceiptResponse;
use alloy::primitives::B256;
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use std::time::Duration;
use tracing::debug;

use super::oracle::ReceiptOracle;
use crate::error::{OracleError, Result};
use crate::types::Receipt;

/// Receipt oracle backed by an EVM JSON-RPC endpoint.
///
/// Polls `eth_getTransactionReceipt` until the node reports the transaction
/// as mined. Transport failures end the attempt immediately.
pub struct JsonRpcReceiptOracle {
    provider: RootProvider,
    endpoint: String,
    poll_interval: Duration,
}

impl JsonRpcReceiptOracle {
    pub async fn connect(rpc_url: &str, poll_interval: Duration) -> Result<Self> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(OracleError::rpc)?;

        Ok(Self {
            provider: provider.root().clone(),
            endpoint: rpc_url.to_string(),
            poll_interval,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl ReceiptOracle for JsonRpcReceiptOracle {
    async fn await_receipt(&self, hash: &str) -> std::result::Result<Receipt, OracleError> {
        let tx_hash = parse_tx_hash(hash)?;

        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(OracleError::rpc)?;

            match receipt {
                Some(receipt) => {
                    let block_number = ReceiptResponse::block_number(&receipt).unwrap_or_default();
                    let success = ReceiptResponse::status(&receipt);

                    debug!(
                        "Receipt for {}: success={}, block={}",
                        hash, success, block_number
                    );
                    return Ok(Receipt::new(success, block_number));
                }
                None => {
                    debug!("Transaction {} not mined yet, polling again", hash);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

/// Parse a `0x`-prefixed 32-byte transaction hash.
fn parse_tx_hash(hash: &str) -> std::result::Result<B256, OracleError> {
    let digits = hash
        .strip_prefix("0x")
        .filter(|digits| digits.len() == 64)
        .ok_or_else(|| OracleError::invalid_hash(hash))?;

    let bytes = hex::decode(digits).map_err(|_| OracleError::invalid_hash(hash))?;
    Ok(B256::from_slice(&bytes))
}
