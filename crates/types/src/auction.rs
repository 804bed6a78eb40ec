use cosmwasm_std::Uint128;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Dutch auction schedule for the destination amount a resolver must deliver.
///
/// The price starts at `start_price` and decays linearly to `end_price` over
/// `duration_secs`, beginning at `start_timestamp` (unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionParams {
    pub start_price: Uint128,
    pub end_price: Uint128,
    pub duration_secs: u64,
    pub start_timestamp: u64,
}

impl AuctionParams {
    pub fn new(
        start_price: impl Into<Uint128>,
        end_price: impl Into<Uint128>,
        duration_secs: u64,
        start_timestamp: u64,
    ) -> Self {
        Self {
            start_price: start_price.into(),
            end_price: end_price.into(),
            duration_secs,
            start_timestamp,
        }
    }

    /// Timestamp at which the price reaches `end_price`
    pub fn end_timestamp(&self) -> u64 {
        self.start_timestamp.saturating_add(self.duration_secs)
    }

    /// Price schedule must never increase
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start_price < self.end_price {
            return Err(ValidationError::InvalidAuctionBounds(format!(
                "start price {} is below end price {}",
                self.start_price, self.end_price
            )));
        }
        if self.end_price.is_zero() {
            return Err(ValidationError::InvalidAuctionBounds(
                "end price must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Current clearing price, see [`current_price`]
    pub fn price_at(&self, now: u64) -> Uint128 {
        current_price(self, now)
    }

    pub fn is_finished(&self, now: u64) -> bool {
        now >= self.end_timestamp()
    }
}

/// Current Dutch auction price for `auction` at unix time `now`.
///
/// Linear interpolation between start and end price. The decay term is
/// floored, so intermediate prices round toward `start_price`; the schedule
/// stays non-increasing in `now`.
pub fn current_price(auction: &AuctionParams, now: u64) -> Uint128 {
    if now <= auction.start_timestamp {
        return auction.start_price;
    }
    if now >= auction.end_timestamp() {
        return auction.end_price;
    }

    let elapsed = now - auction.start_timestamp;
    let spread = auction.start_price.saturating_sub(auction.end_price);
    let decay = spread.multiply_ratio(elapsed, auction.duration_secs);

    auction.start_price.saturating_sub(decay)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auction() -> AuctionParams {
        AuctionParams::new(110u128, 90u128, 300, 1_000)
    }

    #[test]
    fn test_price_before_start_is_start_price() {
        let a = auction();
        assert_eq!(current_price(&a, 0), Uint128::new(110));
        assert_eq!(current_price(&a, 1_000), Uint128::new(110));
    }

    #[test]
    fn test_price_after_end_is_end_price() {
        let a = auction();
        assert_eq!(current_price(&a, 1_300), Uint128::new(90));
        assert_eq!(current_price(&a, 50_000), Uint128::new(90));
    }

    #[test]
    fn test_price_at_midpoint() {
        let a = auction();
        assert_eq!(current_price(&a, 1_150), Uint128::new(100));
    }

    #[test]
    fn test_price_rounds_toward_start() {
        // spread 20 over 300s: after 1s decay is 0.066.., floored to 0
        let a = auction();
        assert_eq!(current_price(&a, 1_001), Uint128::new(110));
        // after 16s decay is 1.066.., floored to 1
        assert_eq!(current_price(&a, 1_016), Uint128::new(109));
    }

    #[test]
    fn test_price_is_monotone_non_increasing() {
        let a = AuctionParams::new(1_000_000_007u128, 999_999_000u128, 977, 10);
        let mut last = current_price(&a, 10);
        for t in 11..=987 {
            let price = current_price(&a, t);
            assert!(price <= last, "price increased at t={t}");
            last = price;
        }
        assert_eq!(last, a.end_price);
    }

    #[test]
    fn test_flat_auction() {
        let a = AuctionParams::new(500u128, 500u128, 60, 0);
        assert_eq!(current_price(&a, 30), Uint128::new(500));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_zero_duration_jumps_to_end_price() {
        let a = AuctionParams::new(200u128, 100u128, 0, 100);
        assert_eq!(current_price(&a, 100), Uint128::new(200));
        assert_eq!(current_price(&a, 101), Uint128::new(100));
    }

    #[test]
    fn test_large_amounts_do_not_overflow() {
        let a = AuctionParams::new(u128::MAX, 1u128, u64::MAX, 0);
        let price = current_price(&a, u64::MAX / 2);
        assert!(price < Uint128::new(u128::MAX));
        assert!(price > Uint128::new(1));
    }

    #[test]
    fn test_validate_rejects_increasing_schedule() {
        let a = AuctionParams::new(90u128, 110u128, 300, 0);
        assert!(matches!(
            a.validate(),
            Err(ValidationError::InvalidAuctionBounds(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_end_price() {
        let a = AuctionParams::new(90u128, 0u128, 300, 0);
        assert!(a.validate().is_err());
    }
}
