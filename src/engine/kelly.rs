//! Kelly criterion sizing for Kalshi binary options, capped by a drawdown
//! constraint.
//!
//! `max_kelly_for_drawdown` finds the largest fraction `f` such that the
//! probability of a peak-to-trough bankroll decline of `D` stays below
//! `1 - confidence`. `full_kelly` is the unconstrained version used for
//! display only.

use super::fees::calculate_fee;
use super::price::Price;
use super::survival::round_to;
use crate::config::{DrawdownConfig, FeeConfig};
use std::fmt;

/// Lower edge of the root-finding bracket.
const F_EPSILON: f64 = 1e-6;
const ROOT_TOLERANCE: f64 = 1e-6;
const MAX_BISECTIONS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KellyReason {
    NoEdge,
    FullKellySatisfiesConstraint,
    ConstrainedByDrawdown,
    NoSolution,
}

impl fmt::Display for KellyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KellyReason::NoEdge => "no edge",
            KellyReason::FullKellySatisfiesConstraint => "full Kelly satisfies constraint",
            KellyReason::ConstrainedByDrawdown => "constrained by drawdown limit",
            KellyReason::NoSolution => "no solution",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KellyResult {
    pub valid: bool,
    /// Unconstrained Kelly fraction. `<= 0` means no edge.
    pub f_star: f64,
    /// Drawdown-constrained fraction, `0 <= f_max <= f_star` when valid.
    pub f_max: f64,
    pub kelly_multiplier: f64,
    /// Probability of breaching the drawdown limit at `f_max`.
    pub drawdown_prob: Option<f64>,
    pub reason: KellyReason,
}

impl KellyResult {
    fn invalid(f_star: f64, reason: KellyReason) -> Self {
        Self {
            valid: false,
            f_star: round_to(f_star, 4),
            f_max: 0.0,
            kelly_multiplier: 0.0,
            drawdown_prob: None,
            reason,
        }
    }

    /// Placeholder used when sizing never ran (gate blocked first).
    pub fn not_evaluated() -> Self {
        Self::invalid(0.0, KellyReason::NoEdge)
    }
}

/// Unconstrained Kelly fraction for win probability `p` at net odds `b`.
pub fn kelly_fraction(p: f64, b: f64) -> f64 {
    (b * p - (1.0 - p)) / b
}

/// Mean and variance of the per-bet log return when wagering fraction `f`.
pub fn log_return_moments(p: f64, b: f64, f: f64) -> (f64, f64) {
    let q = 1.0 - p;
    let edge = b * p - q;
    let second = b * b * p + q;
    let mu = f * edge - f * f * second / 2.0;
    let var = f * f * second - (f * edge).powi(2);
    (mu, var)
}

/// Continuous-time ruin approximation:
///   P(max drawdown > D) ~= exp(-2 mu D / sigma^2) * (1 - exp(-n mu))
///
/// The horizon factor keeps a handful of bets from hitting the full
/// asymptotic bound. Non-positive drift or variance counts as certain breach.
pub fn drawdown_probability(p: f64, b: f64, f: f64, max_drawdown: f64, n_bets: u32) -> f64 {
    let (mu, var) = log_return_moments(p, b, f);
    if mu <= 0.0 || var <= 0.0 {
        return 1.0;
    }
    let p_ruin = (-2.0 * mu * max_drawdown / var).exp();
    let horizon = 1.0 - (-(n_bets as f64) * mu).exp();
    p_ruin * horizon
}

/// Bisection on a sign-changing bracket `[lo, hi]`. Returns None when the
/// endpoints do not straddle zero.
fn bisect<F: Fn(f64) -> f64>(g: F, mut lo: f64, mut hi: f64) -> Option<f64> {
    let mut g_lo = g(lo);
    let g_hi = g(hi);
    if g_lo == 0.0 {
        return Some(lo);
    }
    if g_hi == 0.0 {
        return Some(hi);
    }
    if g_lo.signum() == g_hi.signum() {
        return None;
    }
    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        let g_mid = g(mid);
        if g_mid == 0.0 || (hi - lo) < ROOT_TOLERANCE {
            return Some(mid);
        }
        if g_mid.signum() == g_lo.signum() {
            lo = mid;
            g_lo = g_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Largest Kelly fraction whose drawdown-breach probability stays within
/// `1 - confidence`.
pub fn max_kelly_for_drawdown(p: f64, b: f64, cfg: &DrawdownConfig) -> KellyResult {
    let alpha = 1.0 - cfg.confidence;
    let f_star = kelly_fraction(p, b);

    if f_star.is_nan() || f_star <= 0.0 {
        return KellyResult::invalid(f_star, KellyReason::NoEdge);
    }

    let ruin = |f: f64| drawdown_probability(p, b, f, cfg.max_drawdown, cfg.n_bets);

    let at_full = ruin(f_star);
    if at_full <= alpha {
        return KellyResult {
            valid: true,
            f_star: round_to(f_star, 4),
            f_max: round_to(f_star, 4),
            kelly_multiplier: 1.0,
            drawdown_prob: Some(round_to(at_full, 4)),
            reason: KellyReason::FullKellySatisfiesConstraint,
        };
    }

    let Some(f_max) = bisect(|f| ruin(f) - alpha, F_EPSILON, f_star) else {
        return KellyResult::invalid(f_star, KellyReason::NoSolution);
    };

    KellyResult {
        valid: true,
        f_star: round_to(f_star, 4),
        f_max: round_to(f_max, 4),
        kelly_multiplier: round_to(f_max / f_star, 4),
        drawdown_prob: Some(round_to(ruin(f_max), 4)),
        reason: KellyReason::ConstrainedByDrawdown,
    }
}

/// Why the display-only sizing did or did not produce contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReason {
    Ok,
    MissingData,
    BelowTargetZone,
    FeeExceedsProfit,
    NegativeEdge,
}

impl fmt::Display for QuickReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuickReason::Ok => "ok",
            QuickReason::MissingData => "missing data",
            QuickReason::BelowTargetZone => "below target zone",
            QuickReason::FeeExceedsProfit => "fee exceeds profit",
            QuickReason::NegativeEdge => "negative edge",
        };
        f.write_str(s)
    }
}

/// Unconstrained sizing for the terminal summary. Never used to gate trades.
#[derive(Debug, Clone, PartialEq)]
pub struct QuickSizing {
    pub valid: bool,
    pub reason: QuickReason,
    pub f_star: Option<f64>,
    pub dollars: f64,
    pub contracts: u32,
    pub ev: f64,
}

impl QuickSizing {
    fn rejected(reason: QuickReason, f_star: Option<f64>) -> Self {
        Self {
            valid: false,
            reason,
            f_star,
            dollars: 0.0,
            contracts: 0,
            ev: 0.0,
        }
    }
}

/// Full-Kelly contracts and EV for a true probability against a quoted ask.
pub fn full_kelly(
    true_probability: Option<f64>,
    ask: Option<Price>,
    bankroll: f64,
    is_maker: bool,
    min_price_cents: u32,
    fees: &FeeConfig,
) -> QuickSizing {
    let (Some(p), Some(ask)) = (true_probability, ask) else {
        return QuickSizing::rejected(QuickReason::MissingData, None);
    };

    if ask.ten_thousandths() < min_price_cents.saturating_mul(100) {
        return QuickSizing::rejected(QuickReason::BelowTargetZone, None);
    }

    let price = ask.as_decimal();
    let fee = calculate_fee(1, ask, is_maker, fees);
    let net_win = round_to((1.0 - price) - fee, 6);
    let net_loss = price;

    if net_win <= 0.0 {
        return QuickSizing::rejected(QuickReason::FeeExceedsProfit, Some(0.0));
    }

    let q = 1.0 - p;
    let b = net_win / net_loss;
    let f_star = kelly_fraction(p, b);

    if f_star <= 0.0 {
        return QuickSizing::rejected(QuickReason::NegativeEdge, Some(round_to(f_star, 4)));
    }

    let dollars = round_to(bankroll * f_star, 2);
    let contracts = ask.contracts_for(dollars);
    let ev = round_to((p * net_win - q * net_loss) * contracts as f64, 2);

    QuickSizing {
        valid: true,
        reason: QuickReason::Ok,
        f_star: Some(round_to(f_star, 4)),
        dollars,
        contracts,
        ev,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dd() -> DrawdownConfig {
        DrawdownConfig::default()
    }

    #[test]
    fn test_no_edge_returns_invalid() {
        let r = max_kelly_for_drawdown(0.40, 0.50, &dd());
        assert!(!r.valid);
        assert_eq!(r.f_max, 0.0);
        assert_eq!(r.reason, KellyReason::NoEdge);
        assert!(r.f_star < 0.0);
    }

    #[test]
    fn test_positive_edge_returns_valid() {
        let r = max_kelly_for_drawdown(0.85, 0.20, &dd());
        assert!(r.valid, "{r:?}");
        assert!(r.f_max > 0.0 && r.f_max <= r.f_star);
        assert!((0.0..=1.0).contains(&r.kelly_multiplier));
    }

    #[test]
    fn test_aggressive_full_kelly_gets_constrained() {
        // p=0.92 at 82c with a 1c maker fee: f* ~ 0.534, far above the
        // drawdown-safe fraction
        let b = 0.17 / 0.82;
        let r = max_kelly_for_drawdown(0.92, b, &dd());
        assert!(r.valid);
        assert_eq!(r.reason, KellyReason::ConstrainedByDrawdown);
        assert!(r.f_max < r.f_star);
        assert!(r.kelly_multiplier < 1.0);
        let prob = r.drawdown_prob.unwrap();
        assert!((prob - 0.05).abs() < 0.002, "drawdown prob at f_max = {prob}");
    }

    #[test]
    fn test_loose_constraint_allows_full_kelly() {
        let cfg = DrawdownConfig {
            max_drawdown: 0.95,
            confidence: 0.50,
            n_bets: 5,
        };
        let r = max_kelly_for_drawdown(0.60, 1.0, &cfg);
        assert!(r.valid);
        assert_eq!(r.reason, KellyReason::FullKellySatisfiesConstraint);
        assert_eq!(r.f_max, r.f_star);
        assert_eq!(r.kelly_multiplier, 1.0);
    }

    #[test]
    fn test_invariants_over_grid() {
        for p in [0.55, 0.7, 0.8, 0.9, 0.97] {
            for b in [0.05, 0.2, 0.5, 1.0, 3.0] {
                let r = max_kelly_for_drawdown(p, b, &dd());
                if r.valid {
                    assert!(r.f_max >= 0.0 && r.f_max <= r.f_star, "p={p} b={b} {r:?}");
                    assert!((0.0..=1.0).contains(&r.kelly_multiplier), "p={p} b={b} {r:?}");
                } else {
                    assert_eq!(r.f_max, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_outputs_rounded_to_four_places() {
        let r = max_kelly_for_drawdown(0.85, 0.20, &dd());
        for x in [r.f_star, r.f_max, r.kelly_multiplier] {
            assert_eq!(x, round_to(x, 4));
        }
    }

    #[test]
    fn test_certain_win_has_no_drawdown_solution() {
        // p = 1 has zero log-return variance, so breach counts as certain
        // at every f and the target is never bracketed
        let r = max_kelly_for_drawdown(1.0, 0.17 / 0.82, &dd());
        assert!(!r.valid);
        assert_eq!(r.f_max, 0.0);
        assert_eq!(r.kelly_multiplier, 0.0);
        assert_eq!(r.reason, KellyReason::NoSolution);
        assert_eq!(r.f_star, 1.0);
    }

    #[test]
    fn test_drawdown_probability_certain_without_drift() {
        // no edge: mu <= 0 for any f
        assert_eq!(drawdown_probability(0.4, 0.5, 0.1, 0.25, 250), 1.0);
    }

    #[test]
    fn test_bisect_unbracketed() {
        assert_eq!(bisect(|x| x * x + 1.0, 0.0, 1.0), None);
        let root = bisect(|x| x - 0.3, 0.0, 1.0).unwrap();
        assert!((root - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_full_kelly_missing_inputs() {
        let fees = FeeConfig::default();
        let ask = Price::from_cents(82).ok();
        assert_eq!(full_kelly(None, ask, 288.0, true, 75, &fees).reason, QuickReason::MissingData);
        assert_eq!(full_kelly(Some(0.85), None, 288.0, true, 75, &fees).reason, QuickReason::MissingData);
    }

    #[test]
    fn test_full_kelly_below_min_price() {
        let r = full_kelly(Some(0.95), Price::from_cents(20).ok(), 288.0, true, 75, &FeeConfig::default());
        assert!(!r.valid);
        assert_eq!(r.reason.to_string(), "below target zone");
    }

    #[test]
    fn test_full_kelly_negative_edge() {
        let r = full_kelly(Some(0.70), Price::from_cents(82).ok(), 288.0, true, 75, &FeeConfig::default());
        assert!(!r.valid);
        assert_eq!(r.reason, QuickReason::NegativeEdge);
        assert_eq!(r.contracts, 0);
    }

    #[test]
    fn test_full_kelly_positive_ev_for_strong_edge() {
        let r = full_kelly(Some(0.90), Price::from_cents(82).ok(), 288.0, true, 75, &FeeConfig::default());
        assert!(r.valid);
        assert!(r.contracts > 0);
        assert!(r.ev > 0.0);
    }

    #[test]
    fn test_full_kelly_absurd_floor_does_not_overflow() {
        let r = full_kelly(Some(0.95), Price::from_cents(82).ok(), 288.0, true, u32::MAX, &FeeConfig::default());
        assert_eq!(r.reason, QuickReason::BelowTargetZone);
    }

    #[test]
    fn test_full_kelly_scales_with_bankroll() {
        let r = full_kelly(Some(0.90), Price::from_cents(82).ok(), 10.0, true, 75, &FeeConfig::default());
        assert!(r.valid);
        assert!(r.dollars <= 10.0);
    }
}
