//! End-to-end pass over one game: ESPN JSON and a Kalshi market listing in,
//! orders out through a recording gateway.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use kalshi_entry::config::Config;
use kalshi_entry::engine::matcher;
use kalshi_entry::engine::{EntryModel, Recommendation};
use kalshi_entry::execution::{OrderExecutor, OrderGateway, TradeGuards};
use kalshi_entry::feed::score_feed::{parse_scoreboard, parse_summary};
use kalshi_entry::kalshi::types::{CreateOrderRequest, Market, MarketPrices, MarketsResponse, Order, Side};
use kalshi_entry::pipeline::{build_report, home_side, trade_report, GameReport};
use std::sync::{Arc, Mutex};

const SCOREBOARD: &str = r#"{
    "events": [
        { "id": "401810001", "shortName": "BKN @ LAC", "date": "2026-02-26T03:30Z",
          "status": { "type": { "name": "STATUS_IN_PROGRESS", "state": "in" } } },
        { "id": "401810002", "shortName": "MIA @ ORL", "date": "2026-02-26T00:00Z",
          "status": { "type": { "name": "STATUS_IN_PROGRESS", "state": "in" } } }
    ]
}"#;

const SUMMARY: &str = r#"{
    "header": {
        "competitions": [{
            "status": {
                "type": { "state": "in", "completed": false, "shortDetail": "2:00 - 4th" },
                "period": 4,
                "displayClock": "2:00"
            },
            "competitors": [
                { "homeAway": "home", "score": "100", "team": { "id": "12" } },
                { "homeAway": "away", "score": "92", "team": { "id": "17" } }
            ]
        }]
    },
    "winprobability": [
        { "homeWinPercentage": 0.874 },
        { "homeWinPercentage": 0.921 }
    ],
    "situation": { "possession": "12" }
}"#;

// Kalshi lists one market per team; BKN and LAC both belong to game 401810001.
const MARKETS: &str = r#"{
    "markets": [
        { "ticker": "KXNBAGAME-26FEB25BKNLAC-BKN", "yes_bid": 17, "yes_ask": 20, "no_bid": 80, "no_ask": 82 },
        { "ticker": "KXNBAGAME-26FEB25BKNLAC-LAC", "yes_bid": 80, "yes_ask": 82, "no_bid": 17, "no_ask": 20 },
        { "ticker": "KXNBAGAME-26FEB24BOSNYK-BOS", "yes_bid": 50, "yes_ask": 52 }
    ],
    "cursor": ""
}"#;

#[derive(Default)]
struct RecordingGateway {
    orders: Mutex<Vec<CreateOrderRequest>>,
}

#[async_trait]
impl OrderGateway for RecordingGateway {
    async fn place_order(&self, order: &CreateOrderRequest) -> Result<Order> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(Order {
            order_id: format!("ord-{}", self.orders.lock().unwrap().len()),
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

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, 25).unwrap()
}

fn markets() -> Vec<Market> {
    serde_json::from_str::<MarketsResponse>(MARKETS).unwrap().markets
}

#[test]
fn test_listing_collapses_to_one_game_per_matchup() {
    let games = matcher::league_games(&markets(), today());
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].date, today());

    let config = Config::default();
    let espn = parse_scoreboard(SCOREBOARD, today()).unwrap();
    let matched = matcher::merge_games(&espn, &games, &config.team_map("nba"));
    assert_eq!(matched.len(), 1, "MIA @ ORL has no market and is dropped");
    assert_eq!(matched[0].espn.game_id, "401810001");
    assert_eq!(matched[0].home_team, "LAC");
    assert_eq!(matched[0].away_team, "BKN");
}

#[tokio::test]
async fn test_live_pass_places_one_order_per_side() {
    let config = Config::default();
    let team_map = config.team_map("nba");
    let espn = parse_scoreboard(SCOREBOARD, today()).unwrap();
    let kalshi = matcher::league_games(&markets(), today());
    let game = matcher::merge_games(&espn, &kalshi, &team_map).remove(0);

    let live = parse_summary(SUMMARY, &game.espn.game_id).unwrap();
    assert_eq!(live.home_wp, Some(92));
    assert_eq!(live.seconds_remaining, Some(120));

    let market = markets()
        .into_iter()
        .find(|m| m.ticker == game.ticker)
        .unwrap();
    let prices = MarketPrices::from(&market);
    let side = home_side(&game, &team_map);

    let model = EntryModel::new(config.engine.clone(), config.fees.clone());
    let report = build_report(&game, &live, &prices, side, &model);
    let GameReport::Live { home, away, .. } = &report else {
        panic!("expected a live report, got {report:?}");
    };
    assert_eq!(home.team, "LAC");
    assert_eq!(home.ask, Some(82));
    assert_eq!(home.entry.as_ref().unwrap().recommendation, Recommendation::StrongEntry);
    assert!(away.entry.as_ref().unwrap().recommendation.is_no_trade());

    let gateway = Arc::new(RecordingGateway::default());
    let guards = TradeGuards::from_config(&config.engine, &config.execution);
    let mut executor = OrderExecutor::new(gateway.clone(), guards, false);

    trade_report(&report, &game.ticker, &mut executor).await;
    // second poll over the same state must not re-order
    trade_report(&report, &game.ticker, &mut executor).await;

    let orders = gateway.orders.lock().unwrap();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.side, side);
    assert_eq!(order.count, home.entry.as_ref().unwrap().contracts);
    assert_eq!(order.time_in_force, "fill_or_kill");
    let priced = match side {
        Side::Yes => order.yes_price,
        Side::No => order.no_price,
    };
    assert_eq!(priced, Some(82));
}

#[tokio::test]
async fn test_dry_run_never_reaches_gateway() {
    let config = Config::default();
    let team_map = config.team_map("nba");
    let espn = parse_scoreboard(SCOREBOARD, today()).unwrap();
    let kalshi = matcher::league_games(&markets(), today());
    let game = matcher::merge_games(&espn, &kalshi, &team_map).remove(0);
    let live = parse_summary(SUMMARY, &game.espn.game_id).unwrap();
    let prices = MarketPrices {
        yes_bid: 80,
        yes_ask: 82,
        no_bid: 17,
        no_ask: 20,
    };

    let model = EntryModel::default();
    let report = build_report(&game, &live, &prices, home_side(&game, &team_map), &model);

    let gateway = Arc::new(RecordingGateway::default());
    let guards = TradeGuards::from_config(&config.engine, &config.execution);
    let mut executor = OrderExecutor::new(gateway.clone(), guards, true);
    trade_report(&report, &game.ticker, &mut executor).await;

    assert!(gateway.orders.lock().unwrap().is_empty());
    assert!(executor.already_traded(&game.ticker, home_side(&game, &team_map)));
}
