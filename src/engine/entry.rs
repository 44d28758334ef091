//! Entry quality: fuses edge, survival, clock velocity and drawdown-safe
//! Kelly sizing into one graded decision for a single (game, side).
//!
//! Gates run first (see [`super::gates`]); a blocked trade still returns a
//! fully-populated decision, just with zero sizing.

use super::fees::net_win_per_contract;
use super::gates::{self, GateBlock, GateInputs};
use super::kelly::{max_kelly_for_drawdown, KellyResult};
use super::price::Price;
use super::survival::{round_to, wp_survival_probability, wp_volatility_remaining};
use crate::config::{EngineConfig, FeeConfig};
use crate::error::EngineError;
use std::fmt;

/// Graded outcome. Anything that is not an entry is a no-trade for the
/// executor.
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    StrongEntry,
    Enter,
    Marginal,
    Skip,
    Blocked(GateBlock),
    SurvivalShortfall { survival: f64, min_survival: f64 },
    /// No quote or no live state for this side.
    NoData,
}

impl Recommendation {
    pub fn is_skip(&self) -> bool {
        match self {
            Recommendation::Skip => true,
            Recommendation::Blocked(b) => !b.is_wait(),
            _ => false,
        }
    }

    pub fn is_wait(&self) -> bool {
        match self {
            Recommendation::SurvivalShortfall { .. } => true,
            Recommendation::Blocked(b) => b.is_wait(),
            _ => false,
        }
    }

    /// Vetoed by a gate before scoring.
    pub fn is_hard_block(&self) -> bool {
        matches!(self, Recommendation::Blocked(b) if !b.is_wait())
    }

    pub fn is_no_trade(&self) -> bool {
        self.is_skip() || self.is_wait() || matches!(self, Recommendation::NoData)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::StrongEntry => f.write_str("★ STRONG ENTRY"),
            Recommendation::Enter => f.write_str("ENTER"),
            Recommendation::Marginal => f.write_str("MARGINAL"),
            Recommendation::Skip => f.write_str("SKIP"),
            Recommendation::Blocked(block) => write!(f, "{block}"),
            Recommendation::SurvivalShortfall {
                survival,
                min_survival,
            } => write!(
                f,
                "WAIT — survival {:.0}% < {:.0}%",
                survival * 100.0,
                min_survival * 100.0
            ),
            Recommendation::NoData => f.write_str("— no data"),
        }
    }
}

/// Live snapshot from the perspective of the side being evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameState {
    pub p_current: f64,
    pub seconds_remaining: u32,
    pub score_diff: i32,
    /// 0 = pregame.
    pub period: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryThresholds {
    pub min_edge: f64,
    pub min_survival: f64,
    pub price_floor_cents: u32,
}

impl EntryThresholds {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            min_edge: cfg.min_edge,
            min_survival: cfg.min_survival,
            price_floor_cents: cfg.min_price_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRequest {
    pub game: GameState,
    pub ask: Price,
    pub bankroll: f64,
    pub is_maker: bool,
    pub thresholds: EntryThresholds,
}

impl EntryRequest {
    fn validate(&self) -> Result<(), EngineError> {
        let p = self.game.p_current;
        if !(0.0..=1.0).contains(&p) {
            return Err(EngineError::InvalidProbability(p));
        }
        if !self.bankroll.is_finite() || self.bankroll <= 0.0 {
            return Err(EngineError::InvalidBankroll(self.bankroll));
        }
        let t = &self.thresholds;
        if !t.min_edge.is_finite() {
            return Err(EngineError::InvalidThreshold {
                name: "min_edge",
                value: t.min_edge,
            });
        }
        // min_survival is a divisor in the survival sub-score
        if !(0.0..1.0).contains(&t.min_survival) {
            return Err(EngineError::InvalidThreshold {
                name: "min_survival",
                value: t.min_survival,
            });
        }
        if t.price_floor_cents > 99 {
            return Err(EngineError::InvalidThreshold {
                name: "price_floor_cents",
                value: t.price_floor_cents as f64,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    /// Composite score, 0-100, one decimal.
    pub score: f64,
    pub recommendation: Recommendation,
    pub raw_edge: f64,
    pub survival: f64,
    pub vol_remaining: f64,
    pub velocity: f64,
    pub kelly: KellyResult,
    pub dollars: f64,
    pub contracts: u32,
    pub ev: f64,
}

impl EntryDecision {
    /// Placeholder for a side that could not be evaluated.
    pub fn no_data() -> Self {
        Self {
            score: 0.0,
            recommendation: Recommendation::NoData,
            raw_edge: 0.0,
            survival: 0.0,
            vol_remaining: 0.0,
            velocity: 0.0,
            kelly: KellyResult::not_evaluated(),
            dollars: 0.0,
            contracts: 0,
            ev: 0.0,
        }
    }
}

/// Clock velocity: full marks inside the last minute-hour, decaying with
/// more time on the clock.
pub fn velocity(seconds_remaining: u32) -> f64 {
    (3600.0 / seconds_remaining.max(60) as f64).min(1.0)
}

#[derive(Debug, Clone, Default)]
pub struct EntryModel {
    pub engine: EngineConfig,
    pub fees: FeeConfig,
}

impl EntryModel {
    pub fn new(engine: EngineConfig, fees: FeeConfig) -> Self {
        Self { engine, fees }
    }

    /// Request built from the configured bankroll, maker flag and thresholds.
    pub fn request(&self, game: GameState, ask: Price) -> EntryRequest {
        EntryRequest {
            game,
            ask,
            bankroll: self.engine.bankroll,
            is_maker: self.engine.use_maker,
            thresholds: EntryThresholds::from_config(&self.engine),
        }
    }

    pub fn evaluate(&self, req: &EntryRequest) -> Result<EntryDecision, EngineError> {
        req.validate()?;
        self.engine.validate()?;

        let game = &req.game;
        let t = &req.thresholds;
        let price = req.ask.as_decimal();
        let net_win = net_win_per_contract(req.ask, req.is_maker, &self.fees);
        let raw_edge = game.p_current - price;

        let vol_remaining =
            wp_volatility_remaining(game.p_current, game.seconds_remaining, &self.engine.survival);
        let vel = velocity(game.seconds_remaining);
        let survival = wp_survival_probability(
            game.p_current,
            price + self.engine.survival.floor_buffer,
            game.seconds_remaining,
            game.score_diff,
            &self.engine.survival,
        );

        let gate_inputs = GateInputs {
            ask: req.ask,
            price_floor_cents: t.price_floor_cents,
            net_win,
            raw_edge,
            min_edge: t.min_edge,
            period: game.period,
            seconds_remaining: game.seconds_remaining,
            score_diff: game.score_diff,
        };

        if let Some(block) = gates::first_block(&gate_inputs, &self.engine.gates) {
            tracing::debug!(
                ask = %req.ask,
                p_current = game.p_current,
                block = %block,
                "entry blocked"
            );
            return Ok(EntryDecision {
                score: 0.0,
                recommendation: Recommendation::Blocked(block),
                raw_edge: round_to(raw_edge, 4),
                survival: round_to(survival, 4),
                vol_remaining,
                velocity: round_to(vel, 3),
                kelly: KellyResult::not_evaluated(),
                dollars: 0.0,
                contracts: 0,
                ev: 0.0,
            });
        }

        let kelly = if net_win > 0.0 && raw_edge > 0.0 {
            max_kelly_for_drawdown(game.p_current, net_win / price, &self.engine.drawdown)
        } else {
            KellyResult::not_evaluated()
        };

        let sc = &self.engine.scoring;
        let edge_score = (raw_edge / sc.edge_cap).clamp(0.0, 1.0);
        let survival_score = ((survival - t.min_survival) / (1.0 - t.min_survival)).clamp(0.0, 1.0);
        let kelly_score = if kelly.valid {
            (kelly.f_max / sc.kelly_cap).min(1.0)
        } else {
            0.0
        };
        let score = round_to(
            100.0
                * (sc.edge_weight * edge_score
                    + sc.survival_weight * survival_score
                    + sc.velocity_weight * vel
                    + sc.kelly_weight * kelly_score),
            1,
        );

        let (mut dollars, mut contracts, mut ev) = (0.0, 0, 0.0);
        if kelly.valid && kelly.f_max > 0.0 {
            dollars = round_to((req.bankroll * kelly.f_max).min(self.engine.max_trade), 2);
            contracts = req.ask.contracts_for(dollars);
            let per_contract = game.p_current * net_win - (1.0 - game.p_current) * price;
            ev = round_to(per_contract * contracts as f64, 2);
        }

        let survives = survival >= t.min_survival;
        let recommendation = if score >= sc.strong_entry_score && survives {
            Recommendation::StrongEntry
        } else if score >= sc.enter_score && survives {
            Recommendation::Enter
        } else if !survives {
            Recommendation::SurvivalShortfall {
                survival,
                min_survival: t.min_survival,
            }
        } else if score >= sc.marginal_score {
            Recommendation::Marginal
        } else {
            Recommendation::Skip
        };

        if recommendation.is_no_trade() {
            dollars = 0.0;
            contracts = 0;
            ev = 0.0;
        }

        tracing::debug!(
            ask = %req.ask,
            score,
            survival,
            f_max = kelly.f_max,
            recommendation = %recommendation,
            "entry evaluated"
        );

        Ok(EntryDecision {
            score,
            recommendation,
            raw_edge: round_to(raw_edge, 4),
            survival: round_to(survival, 4),
            vol_remaining,
            velocity: round_to(vel, 3),
            kelly,
            dollars,
            contracts,
            ev,
        })
    }
}
