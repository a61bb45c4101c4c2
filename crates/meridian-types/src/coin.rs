//! Coin and Coins types for fee and balance amounts.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoinError {
    #[error("invalid denomination:: {0}")]
    InvalidDenom(String),

    #[error("invalid coin amount:: {0}")]
    InvalidAmount(String),

    #[error("invalid coin expression:: {0}")]
    InvalidCoin(String),

    #[error("duplicate denomination:: {0}")]
    DuplicateDenom(String),
}

/// Serialize integer amounts as decimal strings, per the observed wire
/// encoding.
pub(crate) mod amount_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A single coin with denomination and integer amount
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    /// Create a new coin, validating the denomination
    pub fn new(denom: impl Into<String>, amount: u128) -> Result<Self, CoinError> {
        let denom = denom.into();
        if !is_valid_denom(&denom) {
            return Err(CoinError::InvalidDenom(denom));
        }
        Ok(Self { denom, amount })
    }

    /// Check if coin is zero
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinError;

    /// Parse a coin expression such as "10token"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount_str, denom) = split_amount_denom(s)?;
        let amount: u128 = amount_str
            .parse()
            .map_err(|_| CoinError::InvalidAmount(amount_str.to_string()))?;
        Coin::new(denom, amount)
    }
}

/// A collection of coins, always sorted by denomination
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    /// Create a new Coins collection from a vector of coins.
    /// Enforces sorting by denomination and no duplicates; zero coins are
    /// dropped.
    pub fn new(mut coins: Vec<Coin>) -> Result<Self, CoinError> {
        coins.retain(|c| !c.is_zero());
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        for window in coins.windows(2) {
            if window[0].denom == window[1].denom {
                return Err(CoinError::DuplicateDenom(window[0].denom.clone()));
            }
        }
        Ok(Self(coins))
    }

    /// Create an empty Coins collection
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get coins as slice
    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    /// Find amount of a specific denomination
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or(0)
    }
}

impl FromStr for Coins {
    type Err = CoinError;

    /// Parse a comma-separated list of coin expressions ("10token,5stake")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let coins = s
            .split(',')
            .map(|part| part.trim().parse())
            .collect::<Result<Vec<Coin>, CoinError>>()?;
        Coins::new(coins)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// A coin with a decimal amount, used for gas prices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecCoin {
    pub denom: String,
    pub amount: Decimal,
}

impl DecCoin {
    /// Compute the fee charged for the given gas limit, rounding up
    pub fn fee_for_gas(&self, gas_limit: u64) -> Result<Coin, CoinError> {
        let fee = (self.amount * Decimal::from(gas_limit)).ceil();
        let amount = fee
            .to_u128()
            .ok_or_else(|| CoinError::InvalidAmount(fee.to_string()))?;
        Coin::new(self.denom.clone(), amount)
    }

    /// Parse a comma-separated list of decimal coin expressions
    pub fn parse_list(s: &str) -> Result<Vec<DecCoin>, CoinError> {
        if s.is_empty() {
            return Ok(Vec::new());
        }
        s.split(',').map(|part| part.trim().parse()).collect()
    }
}

impl FromStr for DecCoin {
    type Err = CoinError;

    /// Parse a decimal coin expression such as "0.025uatom"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount_str, denom) = split_amount_denom(s)?;
        let amount: Decimal = amount_str
            .parse()
            .map_err(|_| CoinError::InvalidAmount(amount_str.to_string()))?;
        if amount.is_sign_negative() {
            return Err(CoinError::InvalidAmount(amount_str.to_string()));
        }
        if !is_valid_denom(&denom) {
            return Err(CoinError::InvalidDenom(denom));
        }
        Ok(Self { denom, amount })
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Split a coin expression at the first alphabetic character
fn split_amount_denom(s: &str) -> Result<(String, String), CoinError> {
    let split_pos = s
        .chars()
        .position(|c| c.is_alphabetic())
        .ok_or_else(|| CoinError::InvalidCoin(s.to_string()))?;

    let amount_str = s[..split_pos].to_string();
    let denom = s[split_pos..].to_string();
    if amount_str.is_empty() || denom.is_empty() {
        return Err(CoinError::InvalidCoin(s.to_string()));
    }
    Ok((amount_str, denom))
}

/// Denominations are 3-128 characters, start with a letter and contain only
/// letters, digits and the separators "/:._-"
fn is_valid_denom(denom: &str) -> bool {
    if denom.len() < 3 || denom.len() > 128 {
        return false;
    }
    let mut chars = denom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coin() {
        let coin: Coin = "10token".parse().unwrap();
        assert_eq!(coin.denom, "token");
        assert_eq!(coin.amount, 10);

        assert!("token".parse::<Coin>().is_err());
        assert!("10".parse::<Coin>().is_err());
        assert!("".parse::<Coin>().is_err());
        assert!("1.5token".parse::<Coin>().is_err());
    }

    #[test]
    fn test_parse_coins_list() {
        let coins: Coins = "10token,5stake".parse().unwrap();
        // sorted by denom
        assert_eq!(coins.as_slice()[0].denom, "stake");
        assert_eq!(coins.as_slice()[1].denom, "token");
        assert_eq!(coins.amount_of("token"), 10);
        assert_eq!(coins.amount_of("missing"), 0);

        assert!("10token,5token".parse::<Coins>().is_err());
        assert!("".parse::<Coins>().unwrap().is_empty());
    }

    #[test]
    fn test_coins_drop_zero() {
        let coins = Coins::new(vec![
            Coin::new("token", 0).unwrap(),
            Coin::new("stake", 3).unwrap(),
        ])
        .unwrap();
        assert_eq!(coins.as_slice().len(), 1);
        assert_eq!(coins.as_slice()[0].denom, "stake");
    }

    #[test]
    fn test_dec_coin_fee_for_gas() {
        let price: DecCoin = "3token".parse().unwrap();
        let fee = price.fee_for_gas(300_000).unwrap();
        assert_eq!(fee.amount, 900_000);
        assert_eq!(fee.denom, "token");

        let price: DecCoin = "0.025uatom".parse().unwrap();
        let fee = price.fee_for_gas(200_000).unwrap();
        assert_eq!(fee.amount, 5_000);

        // rounds up
        let price: DecCoin = "0.3token".parse().unwrap();
        let fee = price.fee_for_gas(5).unwrap();
        assert_eq!(fee.amount, 2);
    }

    #[test]
    fn test_coin_json_amount_is_string() {
        let coin = Coin::new("token", 10).unwrap();
        let json = serde_json::to_value(&coin).unwrap();
        assert_eq!(json, serde_json::json!({"denom": "token", "amount": "10"}));

        let back: Coin = serde_json::from_value(json).unwrap();
        assert_eq!(back, coin);
    }

    #[test]
    fn test_denom_validation() {
        assert!(Coin::new("ab", 1).is_err());
        assert!(Coin::new("1token", 1).is_err());
        assert!(Coin::new("ibc/ABC123", 1).is_ok());
    }
}
