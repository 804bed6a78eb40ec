use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use cosmwasm_std::Uint128;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use unite_types::OrderAnnouncement;

use crate::QuoteError;

/// Source of the resolver's own valuation of an order
#[async_trait]
pub trait PriceQuoter: Send + Sync {
    fn id(&self) -> &str;

    /// Largest destination amount the resolver can deliver for the order's
    /// source amount and still break even
    async fn max_dst_amount(&self, order: &OrderAnnouncement) -> Result<Uint128, QuoteError>;
}

/// Quotes at fixed destination-per-source rates, keyed by asset pair
#[derive(Debug, Clone)]
pub struct FixedRateQuoter {
    id: String,
    rates: HashMap<(String, String), Decimal>,
    default_rate: Option<Decimal>,
}

impl FixedRateQuoter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rates: HashMap::new(),
            default_rate: None,
        }
    }

    /// Rate used for pairs without their own entry
    pub fn with_default_rate(mut self, rate: Decimal) -> Self {
        self.default_rate = Some(rate);
        self
    }

    pub fn with_rate(
        mut self,
        src_asset: impl Into<String>,
        dst_asset: impl Into<String>,
        rate: Decimal,
    ) -> Self {
        self.rates.insert((src_asset.into(), dst_asset.into()), rate);
        self
    }

    fn rate(&self, src_asset: &str, dst_asset: &str) -> Option<Decimal> {
        self.rates
            .get(&(src_asset.to_string(), dst_asset.to_string()))
            .copied()
            .or(self.default_rate)
    }
}

#[async_trait]
impl PriceQuoter for FixedRateQuoter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn max_dst_amount(&self, order: &OrderAnnouncement) -> Result<Uint128, QuoteError> {
        let rate = self
            .rate(&order.src_asset, &order.dst_asset)
            .ok_or_else(|| QuoteError::UnsupportedPair {
                src_asset: order.src_asset.clone(),
                dst_asset: order.dst_asset.clone(),
            })?;

        let amount = Decimal::from_str(&order.src_amount.to_string())
            .map_err(|e| QuoteError::Overflow(e.to_string()))?;
        let quoted = amount
            .checked_mul(rate)
            .ok_or_else(|| QuoteError::Overflow(format!("{amount} * {rate}")))?
            .floor()
            .to_u128()
            .ok_or_else(|| QuoteError::Overflow(format!("{amount} * {rate}")))?;

        Ok(Uint128::new(quoted))
    }
}

/// Whether filling at `price` leaves at least `min_profit_bps` of margin
/// below `max_dst_amount`
pub fn is_profitable(price: Uint128, max_dst_amount: Uint128, min_profit_bps: u64) -> bool {
    price
        .checked_multiply_ratio(10_000u128 + min_profit_bps as u128, 10_000u128)
        .map(|needed| needed <= max_dst_amount)
        .unwrap_or(false)
}
