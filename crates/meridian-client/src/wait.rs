//! Confirmation pollers: block height and transaction inclusion.
//!
//! Deadlines wrap the whole poll loop; the in-flight sleep is dropped when
//! the deadline fires, so cancellation is immediate.

use std::time::Duration;

use tracing::debug;

use crate::rpc::{RpcError, TxResult};
use crate::{Client, ClientError};

impl Client {
    /// Latest block height reported by the node
    pub async fn latest_block_height(&self) -> Result<u64, ClientError> {
        Ok(self.status().await?.latest_block_height)
    }

    /// Wait until the chain produces one more block than the current height.
    pub async fn wait_for_next_block(&self, timeout: Option<Duration>) -> Result<u64, ClientError> {
        let current = self.latest_block_height().await?;
        self.wait_for_block_height(current + 1, timeout).await
    }

    /// Wait until the reported height reaches `height`. Returns the observed
    /// height, which may be past the target.
    pub async fn wait_for_block_height(
        &self,
        height: u64,
        timeout: Option<Duration>,
    ) -> Result<u64, ClientError> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.poll_block_height(height)).await {
                Ok(result) => result,
                Err(_) => Err(ClientError::WaitForBlockTimeout {
                    source: Box::new(ClientError::DeadlineExceeded),
                }),
            },
            None => self.poll_block_height(height).await,
        }
    }

    async fn poll_block_height(&self, height: u64) -> Result<u64, ClientError> {
        loop {
            let latest = self.latest_block_height().await?;
            if latest >= height {
                return Ok(latest);
            }
            debug!(want = height, latest, "waiting for block");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait until the transaction with the given hex hash is included in a
    /// block. A malformed hash fails before any network call.
    pub async fn wait_for_tx(
        &self,
        hash: &str,
        timeout: Option<Duration>,
    ) -> Result<TxResult, ClientError> {
        let hash_bytes = hex::decode(hash).map_err(|source| ClientError::InvalidTxHash {
            hash: hash.to_string(),
            source,
        })?;
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.poll_tx(hash, &hash_bytes)).await
            {
                Ok(result) => result,
                Err(_) => Err(ClientError::DeadlineExceeded),
            },
            None => self.poll_tx(hash, &hash_bytes).await,
        }
    }

    async fn poll_tx(&self, hash: &str, hash_bytes: &[u8]) -> Result<TxResult, ClientError> {
        loop {
            match self.rpc.tx(hash_bytes, false).await {
                Ok(result) => return Ok(result),
                // the only retryable lookup error: the tx may land in an
                // upcoming block
                Err(RpcError::NotFound) => {
                    debug!(hash, "tx not found, waiting for next block");
                    let latest = self.latest_block_height().await?;
                    self.poll_block_height(latest + 1).await?;
                }
                Err(source) => {
                    return Err(ClientError::FetchingTx {
                        hash: hash.to_string(),
                        source: Box::new(self.node_error(source)),
                    })
                }
            }
        }
    }
}
