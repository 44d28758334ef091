use super::price::Price;
use crate::config::FeeConfig;

/// Price is carried in ten-thousandths, so P * (1 - P) is scaled by 10^8,
/// the rate by 10^4, and we want cents (x100): 10^8 * 10^4 / 100.
const CENTS_DENOMINATOR: u128 = 10_000_000_000;

/// Kalshi fee in cents using integer math to avoid floating-point errors.
///
/// fee = ceil(rate * C * P * (1 - P)), rounded up to the next whole cent.
/// Taker rate 7%, maker rate 1.75% by default.
pub fn calculate_fee_cents(contracts: u32, price: Price, is_maker: bool, fees: &FeeConfig) -> u64 {
    if contracts == 0 {
        return 0;
    }
    let rate_bps = if is_maker { fees.maker_rate_bps } else { fees.taker_rate_bps } as u128;
    let p = price.ten_thousandths() as u128;
    let spread_factor = p * (10_000 - p);
    let numerator = rate_bps * contracts as u128 * spread_factor;
    numerator.div_ceil(CENTS_DENOMINATOR) as u64
}

/// Same as [`calculate_fee_cents`], in dollars.
pub fn calculate_fee(contracts: u32, price: Price, is_maker: bool, fees: &FeeConfig) -> f64 {
    calculate_fee_cents(contracts, price, is_maker, fees) as f64 / 100.0
}

/// Net payout per contract if the side wins, after the entry fee.
pub fn net_win_per_contract(price: Price, is_maker: bool, fees: &FeeConfig) -> f64 {
    (1.0 - price.as_decimal()) - calculate_fee(1, price, is_maker, fees)
}
