/// Win-probability survival model.
///
/// Treats the live win-probability path as a Brownian motion over the
/// remaining normalized game time and asks how likely it is to stay above a
/// floor (entry price plus a buffer) until the final horn.
///
/// Volatility: `sigma = base_vol * sqrt(tau) * sqrt(4 p (1 - p))`
///   - `tau = seconds_remaining / total_game_seconds`
///   - widest at 50 %, collapsing toward 0 % / 100 % and as the clock runs out.
///
/// Survival: `Phi(z) - exp(-2 z^2) * Phi(-z)` with `z = (p - floor) / sigma`.
/// The correction term removes paths that dip under the floor and recover,
/// which a plain one-sided tail would count as survivors.
use crate::config::SurvivalConfig;

const MIN_SIGMA: f64 = 1e-6;

/// Standard normal CDF (Abramowitz & Stegun 7.1.26, |error| < 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

fn binary_outcome(p_current: f64, p_floor: f64) -> f64 {
    if p_current >= p_floor {
        1.0
    } else {
        0.0
    }
}

/// Probability that win probability stays above `p_floor` for the rest of
/// the game.
///
/// `_score_diff` is part of the signature for score-conditional models; the
/// Brownian model only looks at the probability and the clock.
pub fn wp_survival_probability(
    p_current: f64,
    p_floor: f64,
    seconds_remaining: u32,
    _score_diff: i32,
    cfg: &SurvivalConfig,
) -> f64 {
    if seconds_remaining == 0 {
        return binary_outcome(p_current, p_floor);
    }

    let tau = seconds_remaining as f64 / cfg.total_game_seconds as f64;
    let sigma = cfg.base_vol * tau.sqrt() * (4.0 * p_current * (1.0 - p_current)).max(0.0).sqrt();

    if sigma < MIN_SIGMA {
        return binary_outcome(p_current, p_floor);
    }

    let z = (p_current - p_floor) / sigma;
    let survival = normal_cdf(z) - (-2.0 * z * z).exp() * normal_cdf(-z);
    survival.clamp(0.0, 1.0)
}

/// Expected win-probability volatility over the remaining game time,
/// independent of any floor.
pub fn wp_volatility_remaining(p_current: f64, seconds_remaining: u32, cfg: &SurvivalConfig) -> f64 {
    let tau = seconds_remaining as f64 / cfg.total_game_seconds as f64;
    let base = p_current * (1.0 - p_current);
    round_to((base * tau).max(0.0).sqrt() * cfg.vol_damping, 4)
}

pub(crate) fn round_to(x: f64, places: i32) -> f64 {
    let m = 10f64.powi(places);
    (x * m).round() / m
}
