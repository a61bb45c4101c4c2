//! Gas and fee resolution.
//!
//! The gas limit is finalized first; price-derived fees are computed from
//! the final limit.

use tracing::debug;

use meridian_types::{AnyMessage, Coin, Coins, DecCoin};

use crate::txservice::TxFactory;
use crate::{Client, ClientError, DEFAULT_GAS_LIMIT, GAS_AUTO, SIMULATION_GAS_MARGIN};

impl Client {
    /// Resolve the final gas limit. Empty or "auto" means simulate; a
    /// literal is parsed, with unparseable input falling back to the
    /// default limit.
    pub(crate) async fn resolve_gas(
        &self,
        factory: &TxFactory,
        msgs: &[AnyMessage],
    ) -> Result<u64, ClientError> {
        if self.gas.is_empty() || self.gas == GAS_AUTO {
            let (info, adjusted) = self
                .gasometer
                .calculate_gas(factory, msgs)
                .await
                .map_err(ClientError::Rpc)?;
            let limit = adjusted + SIMULATION_GAS_MARGIN;
            debug!(gas_used = info.gas_used, adjusted, limit, "simulated gas");
            return Ok(limit);
        }
        Ok(self.gas.parse().unwrap_or(DEFAULT_GAS_LIMIT))
    }

    /// Resolve the fee amount: an explicit fee string wins, otherwise gas
    /// prices are charged against the final gas limit.
    pub(crate) fn resolve_fees(&self, gas_limit: u64) -> Result<Vec<Coin>, ClientError> {
        if !self.fees.is_empty() {
            let coins: Coins = self.fees.parse()?;
            return Ok(coins.as_slice().to_vec());
        }
        if !self.gas_prices.is_empty() {
            return DecCoin::parse_list(&self.gas_prices)?
                .iter()
                .map(|price| price.fee_for_gas(gas_limit).map_err(ClientError::from))
                .collect();
        }
        Ok(Vec::new())
    }
}
