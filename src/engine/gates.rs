//! Ordered vetoes evaluated before any sizing. The first gate that fires
//! wins; later gates never see the trade.

use super::price::Price;
use crate::config::GateConfig;
use std::fmt;

/// Why a trade was vetoed before scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum GateBlock {
    BelowTargetZone,
    FeeExceedsProfit,
    EdgeBelowMinimum { edge: f64, min_edge: f64 },
    /// Early period without a lead big enough to call the game.
    PeriodLock {
        period: u32,
        required_lead: f64,
        score_diff: i32,
    },
}

impl GateBlock {
    /// Soft veto: conditions may improve later in the same game.
    pub fn is_wait(&self) -> bool {
        matches!(self, GateBlock::PeriodLock { .. })
    }
}

impl fmt::Display for GateBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateBlock::BelowTargetZone => write!(f, "SKIP — below target zone"),
            GateBlock::FeeExceedsProfit => write!(f, "SKIP — fee exceeds profit"),
            GateBlock::EdgeBelowMinimum { edge, min_edge } => write!(
                f,
                "SKIP — edge {:+.1}% < {:.0}% min",
                edge * 100.0,
                min_edge * 100.0
            ),
            GateBlock::PeriodLock {
                period,
                required_lead,
                score_diff,
            } => write!(
                f,
                "WAIT — Q{} needs +{:.0}pt lead (have {:+})",
                period, required_lead, score_diff
            ),
        }
    }
}

/// Everything the gate chain looks at, already derived by the assembler.
#[derive(Debug, Clone, Copy)]
pub struct GateInputs {
    pub ask: Price,
    pub price_floor_cents: u32,
    pub net_win: f64,
    pub raw_edge: f64,
    pub min_edge: f64,
    pub period: u32,
    pub seconds_remaining: u32,
    pub score_diff: i32,
}

/// Lead (in points) that makes the game effectively decided with
/// `seconds_remaining` left.
///
/// Calibration at 0.3 pts/min:
///   Q2 18:24 clock -> 42.4 min total -> need +13
///   Q4  5:00 clock ->  5.0 min total -> need  +2
pub fn required_lead(seconds_remaining: u32, lead_rate: f64) -> f64 {
    (seconds_remaining as f64 / 60.0) * lead_rate
}

/// True when the lead is large enough relative to the clock that a comeback
/// is unlikely. No time left always counts as locked.
pub fn is_effectively_locked(score_diff: i32, seconds_remaining: u32, lead_rate: f64) -> bool {
    if seconds_remaining == 0 {
        return true;
    }
    score_diff as f64 >= required_lead(seconds_remaining, lead_rate)
}

/// Run the gates in order: price floor, fee, edge, early-period lock.
pub fn first_block(inputs: &GateInputs, cfg: &GateConfig) -> Option<GateBlock> {
    if inputs.ask.ten_thousandths() < inputs.price_floor_cents.saturating_mul(100) {
        return Some(GateBlock::BelowTargetZone);
    }

    if inputs.net_win <= 0.0 {
        return Some(GateBlock::FeeExceedsProfit);
    }

    if inputs.raw_edge <= inputs.min_edge {
        return Some(GateBlock::EdgeBelowMinimum {
            edge: inputs.raw_edge,
            min_edge: inputs.min_edge,
        });
    }

    if inputs.period < cfg.final_period
        && !is_effectively_locked(inputs.score_diff, inputs.seconds_remaining, cfg.lead_rate)
    {
        return Some(GateBlock::PeriodLock {
            period: inputs.period,
            required_lead: required_lead(inputs.seconds_remaining, cfg.lead_rate),
            score_diff: inputs.score_diff,
        });
    }

    None
}
