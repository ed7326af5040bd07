use crate::config::ClaimerConfig;
use crate::types::FeeSnapshot;

const MICROS_PER_USD: f64 = 1_000_000.0;

/// Decides whether a pool's accrued partner fee is worth claiming.
///
/// Price and threshold are held in micro-dollars so the inclusive comparison
/// is exact integer arithmetic rather than a float comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdGate {
    minimum_micros: u128,
    price_micros: u128,
    units_per_token: u128,
}

impl ThresholdGate {
    pub fn new(minimum_usd: f64, token_price_usd: f64, token_decimals: u32) -> Self {
        Self {
            minimum_micros: to_micros(minimum_usd),
            price_micros: to_micros(token_price_usd),
            units_per_token: 10u128.checked_pow(token_decimals).unwrap_or(u128::MAX),
        }
    }

    pub fn from_config(config: &ClaimerConfig) -> Self {
        Self::new(
            config.min_claim_usd,
            config.token_price_usd,
            config.token_decimals,
        )
    }

    pub fn minimum_usd(&self) -> f64 {
        self.minimum_micros as f64 / MICROS_PER_USD
    }

    /// Partner fees (base + quote) in display currency.
    pub fn value_usd(&self, fee: &FeeSnapshot) -> f64 {
        let tokens = fee.partner_total() as f64 / self.units_per_token as f64;
        tokens * (self.price_micros as f64 / MICROS_PER_USD)
    }

    /// `value >= minimum`, boundary inclusive.
    pub fn is_claimable(&self, fee: &FeeSnapshot) -> bool {
        // amount / units * price >= minimum  <=>  amount * price >= minimum * units
        fee.partner_total().saturating_mul(self.price_micros)
            >= self.minimum_micros.saturating_mul(self.units_per_token)
    }
}

fn to_micros(usd: f64) -> u128 {
    if usd <= 0.0 || !usd.is_finite() {
        return 0;
    }
    (usd * MICROS_PER_USD).round() as u128
}
