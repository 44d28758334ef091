use crate::config::{EngineConfig, ExecutionConfig};
use crate::engine::EntryDecision;
use crate::kalshi::rest::KalshiRest;
use crate::kalshi::types::{CreateOrderRequest, Order, Side};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Where live orders go. Implemented by the REST client; tests swap in a mock.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_order(&self, order: &CreateOrderRequest) -> Result<Order>;
}

#[async_trait]
impl OrderGateway for KalshiRest {
    async fn place_order(&self, order: &CreateOrderRequest) -> Result<Order> {
        Ok(self.create_order(order).await?.order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    DryRun,
    Placed,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub status: OrderStatus,
    pub ticker: String,
    pub side: Side,
    pub contracts: u32,
    pub price_cents: u32,
    pub order_id: Option<String>,
    pub error: Option<String>,
}

/// Thresholds every order must clear, independent of the decision's own label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeGuards {
    pub min_price_cents: u32,
    pub min_edge: f64,
    pub min_survival: f64,
    pub min_score: f64,
}

impl TradeGuards {
    pub fn from_config(engine: &EngineConfig, execution: &ExecutionConfig) -> Self {
        Self {
            min_price_cents: engine.min_price_cents,
            min_edge: engine.min_edge,
            min_survival: engine.min_survival,
            min_score: execution.min_score,
        }
    }

    /// First guard that blocks, if any.
    fn blocked_by(&self, decision: &EntryDecision, ask_cents: u32) -> Option<&'static str> {
        if ask_cents < self.min_price_cents {
            return Some("ask below price floor");
        }
        if decision.contracts == 0 {
            return Some("no contracts");
        }
        if decision.raw_edge < self.min_edge {
            return Some("edge below minimum");
        }
        if decision.survival < self.min_survival {
            return Some("survival below minimum");
        }
        if decision.score < self.min_score {
            return Some("score below minimum");
        }
        if decision.recommendation.is_no_trade() {
            return Some("no-trade recommendation");
        }
        None
    }
}

/// Final gate between a decision and the venue. Each (ticker, side) is
/// traded at most once per session.
pub struct OrderExecutor<G: OrderGateway> {
    gateway: Arc<G>,
    guards: TradeGuards,
    dry_run: bool,
    placed: HashSet<(String, Side)>,
}

impl<G: OrderGateway> OrderExecutor<G> {
    pub fn new(gateway: Arc<G>, guards: TradeGuards, dry_run: bool) -> Self {
        Self {
            gateway,
            guards,
            dry_run,
            placed: HashSet::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn already_traded(&self, ticker: &str, side: Side) -> bool {
        self.placed.contains(&(ticker.to_string(), side))
    }

    /// Forget every order issued this session.
    pub fn reset_session(&mut self) {
        self.placed.clear();
    }

    /// Run every guard, then submit. `None` means a guard blocked the trade.
    pub async fn maybe_trade(
        &mut self,
        ticker: &str,
        side: Side,
        decision: &EntryDecision,
        ask_cents: u32,
    ) -> Option<OrderOutcome> {
        if let Some(reason) = self.guards.blocked_by(decision, ask_cents) {
            tracing::debug!(ticker = %ticker, side = %side, reason, "trade blocked");
            return None;
        }
        if self.already_traded(ticker, side) {
            tracing::debug!(ticker = %ticker, side = %side, "already traded this session");
            return None;
        }
        Some(self.submit(ticker, side, decision.contracts, ask_cents).await)
    }

    async fn submit(&mut self, ticker: &str, side: Side, contracts: u32, price_cents: u32) -> OrderOutcome {
        let mut outcome = OrderOutcome {
            status: OrderStatus::DryRun,
            ticker: ticker.to_string(),
            side,
            contracts,
            price_cents,
            order_id: None,
            error: None,
        };

        if self.dry_run {
            tracing::info!(
                ticker = %ticker,
                side = %side,
                contracts,
                price = price_cents,
                "DRY RUN: would submit order"
            );
            self.placed.insert((ticker.to_string(), side));
            return outcome;
        }

        let order = CreateOrderRequest::buy_limit(ticker, side, contracts, price_cents);
        match self.gateway.place_order(&order).await {
            Ok(placed) => {
                tracing::info!(
                    ticker = %ticker,
                    side = %side,
                    contracts,
                    price = price_cents,
                    order_id = %placed.order_id,
                    status = %placed.status,
                    "order placed"
                );
                self.placed.insert((ticker.to_string(), side));
                outcome.status = OrderStatus::Placed;
                outcome.order_id = Some(placed.order_id);
            }
            Err(e) => {
                tracing::warn!(
                    ticker = %ticker,
                    side = %side,
                    contracts,
                    price = price_cents,
                    error = %e,
                    "order failed"
                );
                outcome.status = OrderStatus::Failed;
                outcome.error = Some(format!("{e:#}"));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EntryModel, GameState, Price};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGateway {
        calls: AtomicUsize,
        fail: bool,
    }

    impl MockGateway {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl OrderGateway for MockGateway {
        async fn place_order(&self, order: &CreateOrderRequest) -> Result<Order> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("order failed (400 Bad Request): insufficient balance");
            }
            Ok(Order {
                order_id: "ord-1".to_string(),
                ticker: order.ticker.clone(),
                side: order.side.to_string(),
                action: order.action.clone(),
                status: "executed".to_string(),
                yes_price: order.yes_price.unwrap_or(0),
                no_price: order.no_price.unwrap_or(0),
                fill_count: order.count,
                remaining_count: 0,
            })
        }
    }

    fn guards() -> TradeGuards {
        TradeGuards::from_config(&EngineConfig::default(), &ExecutionConfig::default())
    }

    fn strong_decision() -> EntryDecision {
        let m = EntryModel::default();
        let game = GameState {
            p_current: 0.92,
            seconds_remaining: 120,
            score_diff: 8,
            period: 4,
        };
        m.evaluate(&m.request(game, Price::from_cents(82).unwrap())).unwrap()
    }

    const TICKER: &str = "KXNBAGAME-26FEB25BKNLAC-BKN";

    #[tokio::test]
    async fn test_dry_run_records_key() {
        let gw = MockGateway::new(false);
        let mut ex = OrderExecutor::new(gw.clone(), guards(), true);
        let out = ex.maybe_trade(TICKER, Side::Yes, &strong_decision(), 82).await.unwrap();
        assert_eq!(out.status, OrderStatus::DryRun);
        assert_eq!(out.contracts, 24);
        assert!(ex.already_traded(TICKER, Side::Yes));
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_key_only_once_per_session() {
        let gw = MockGateway::new(false);
        let mut ex = OrderExecutor::new(gw.clone(), guards(), false);
        let d = strong_decision();
        let first = ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.unwrap();
        assert_eq!(first.status, OrderStatus::Placed);
        assert_eq!(first.order_id.as_deref(), Some("ord-1"));
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());
        // other side is a different key
        assert!(ex.maybe_trade(TICKER, Side::No, &d, 82).await.is_some());
        assert_eq!(gw.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reset_session_allows_retrade() {
        let mut ex = OrderExecutor::new(MockGateway::new(false), guards(), true);
        let d = strong_decision();
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_some());
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());
        ex.reset_session();
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_order_not_recorded() {
        let gw = MockGateway::new(true);
        let mut ex = OrderExecutor::new(gw.clone(), guards(), false);
        let out = ex.maybe_trade(TICKER, Side::Yes, &strong_decision(), 82).await.unwrap();
        assert_eq!(out.status, OrderStatus::Failed);
        assert!(out.error.unwrap().contains("insufficient balance"));
        assert!(!ex.already_traded(TICKER, Side::Yes));
    }

    #[tokio::test]
    async fn test_guards_block() {
        let mut ex = OrderExecutor::new(MockGateway::new(false), guards(), true);
        let base = strong_decision();

        assert!(ex.maybe_trade(TICKER, Side::Yes, &base, 74).await.is_none());

        let mut d = base.clone();
        d.contracts = 0;
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());

        let mut d = base.clone();
        d.raw_edge = 0.05;
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());

        let mut d = base.clone();
        d.survival = 0.5;
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());

        let mut d = base.clone();
        d.score = 49.9;
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());

        let mut d = base.clone();
        d.recommendation = crate::engine::Recommendation::Skip;
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());

        assert!(!ex.already_traded(TICKER, Side::Yes));
    }

    #[tokio::test]
    async fn test_unsized_decision_never_trades() {
        // p = 1 leaves the drawdown sizer without a solution
        let m = EntryModel::default();
        let game = GameState {
            p_current: 1.0,
            seconds_remaining: 120,
            score_diff: 20,
            period: 4,
        };
        let d = m.evaluate(&m.request(game, Price::from_cents(82).unwrap())).unwrap();
        assert_eq!(d.contracts, 0);

        let gw = MockGateway::new(false);
        let mut ex = OrderExecutor::new(gw.clone(), guards(), false);
        assert!(ex.maybe_trade(TICKER, Side::Yes, &d, 82).await.is_none());
        assert_eq!(gw.calls.load(Ordering::SeqCst), 0);
        assert!(!ex.already_traded(TICKER, Side::Yes));
    }

    #[tokio::test]
    async fn test_no_data_never_trades() {
        let mut ex = OrderExecutor::new(MockGateway::new(false), guards(), true);
        assert!(ex
            .maybe_trade(TICKER, Side::No, &EntryDecision::no_data(), 90)
            .await
            .is_none());
    }
}
