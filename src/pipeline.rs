//! Per-league polling pass: discover games, join ESPN and Kalshi, evaluate
//! both sides of every live game and hand the decisions to the executor.

use crate::config::Config;
use crate::display::{calc_edge, fmt_edge, fmt_entry, fmt_kelly, fmt_opt, rule};
use crate::engine::kelly::{full_kelly, QuickSizing};
use crate::engine::matcher::{self, MatchedGame};
use crate::engine::{EntryDecision, EntryModel, GameState, Price};
use crate::execution::{OrderExecutor, OrderGateway, OrderStatus};
use crate::feed::{GamePhase, LiveState, Possession, ScoreFeed};
use crate::kalshi::rest::KalshiRest;
use crate::kalshi::types::{MarketPrices, Side};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::HashMap;

/// One team's view of a matched game.
#[derive(Debug, Clone, PartialEq)]
pub struct SideView {
    pub team: String,
    pub side: Side,
    pub bid: Option<u32>,
    pub ask: Option<u32>,
    pub wp: Option<u32>,
    pub score: Option<i32>,
    pub edge: Option<f64>,
    pub kelly: QuickSizing,
    pub entry: Option<EntryDecision>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameReport {
    Final {
        game_id: String,
    },
    Pregame {
        game_id: String,
        detail: String,
        home: SideView,
        away: SideView,
    },
    Live {
        game_id: String,
        clock: String,
        possession: Option<Possession>,
        home: SideView,
        away: SideView,
    },
}

impl GameReport {
    pub fn render(&self) -> Vec<String> {
        match self {
            GameReport::Final { game_id } => vec![format!("Game {game_id}: FINAL")],
            GameReport::Pregame {
                game_id,
                detail,
                home,
                away,
            } => {
                let mut lines = vec![
                    format!("Game {game_id}:"),
                    format!("  {} vs {}  —  {}", home.team, away.team, detail),
                ];
                for s in [home, away] {
                    lines.push(format!(
                        "  {}  ESPN: {}%  Bid: {}  Ask: {}  Edge: {}  Kelly: {}",
                        s.team,
                        fmt_opt(s.wp),
                        fmt_opt(s.bid),
                        fmt_opt(s.ask),
                        fmt_edge(s.edge),
                        fmt_kelly(&s.kelly)
                    ));
                }
                lines.push(rule());
                lines
            }
            GameReport::Live {
                game_id,
                clock,
                possession,
                home,
                away,
            } => {
                let mut lines = vec![format!("Game {game_id}:")];
                for s in [home, away] {
                    lines.push(format!(
                        "  {}: {} pts  ESPN: {}%  Bid: {}  Ask: {}  Edge: {}  Kelly: {}",
                        s.team,
                        fmt_opt(s.score),
                        fmt_opt(s.wp),
                        fmt_opt(s.bid),
                        fmt_opt(s.ask),
                        fmt_edge(s.edge),
                        fmt_kelly(&s.kelly)
                    ));
                    let entry = s.entry.clone().unwrap_or_else(EntryDecision::no_data);
                    lines.push(format!("    Entry: {}", fmt_entry(&entry)));
                }
                let poss = match possession {
                    Some(Possession::Home) => "home",
                    Some(Possession::Away) => "away",
                    None => "—",
                };
                lines.push(format!("  Clock: {clock}   Possession: {poss}"));
                lines.push(rule());
                lines
            }
        }
    }
}

/// Which contract side backs the home team. The ticker's YES team is
/// normalized before comparing against ESPN's home code.
pub fn home_side(game: &MatchedGame, team_map: &HashMap<String, String>) -> Side {
    let yes_team = matcher::normalize_kalshi_code(&matcher::yes_team_from_ticker(&game.ticker), team_map);
    if yes_team == game.home_team {
        Side::Yes
    } else {
        Side::No
    }
}

fn opposite(side: Side) -> Side {
    match side {
        Side::Yes => Side::No,
        Side::No => Side::Yes,
    }
}

fn bid(prices: &MarketPrices, side: Side) -> Option<u32> {
    let b = match side {
        Side::Yes => prices.yes_bid,
        Side::No => prices.no_bid,
    };
    (b > 0).then_some(b)
}

#[allow(clippy::too_many_arguments)]
fn side_view(
    team: &str,
    side: Side,
    prices: &MarketPrices,
    wp: Option<u32>,
    score: Option<i32>,
    score_diff: Option<i32>,
    live: &LiveState,
    model: &EntryModel,
) -> SideView {
    let ask = prices.ask(side);
    let price = ask.and_then(|a| Price::from_cents(a).ok());
    let p_true = wp.map(|w| w as f64 / 100.0);
    let kelly = full_kelly(
        p_true,
        price,
        model.engine.bankroll,
        model.engine.use_maker,
        model.engine.min_price_cents,
        &model.fees,
    );

    let entry = if live.phase == GamePhase::Live {
        let decision = match (p_true, price, live.seconds_remaining) {
            (Some(p), Some(price), Some(secs)) => {
                let game = GameState {
                    p_current: p,
                    seconds_remaining: secs,
                    score_diff: score_diff.unwrap_or(0),
                    period: live.period,
                };
                match model.evaluate(&model.request(game, price)) {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!(team = %team, error = %e, "entry evaluation rejected inputs");
                        EntryDecision::no_data()
                    }
                }
            }
            _ => EntryDecision::no_data(),
        };
        Some(decision)
    } else {
        None
    };

    SideView {
        team: team.to_string(),
        side,
        bid: bid(prices, side),
        ask,
        wp,
        score,
        edge: calc_edge(wp, ask),
        kelly,
        entry,
    }
}

/// Pure evaluation of one matched game from already-fetched data.
pub fn build_report(
    game: &MatchedGame,
    live: &LiveState,
    prices: &MarketPrices,
    home_side: Side,
    model: &EntryModel,
) -> GameReport {
    let game_id = game.espn.game_id.clone();
    if live.phase == GamePhase::Final {
        return GameReport::Final { game_id };
    }

    let home_diff = match (live.home_score, live.away_score) {
        (Some(h), Some(a)) => Some(h - a),
        _ => None,
    };
    let home = side_view(
        &game.home_team,
        home_side,
        prices,
        live.home_wp,
        live.home_score,
        home_diff,
        live,
        model,
    );
    let away = side_view(
        &game.away_team,
        opposite(home_side),
        prices,
        live.away_wp,
        live.away_score,
        home_diff.map(|d| -d),
        live,
        model,
    );

    match live.phase {
        GamePhase::Pre => GameReport::Pregame {
            game_id,
            detail: if live.detail.is_empty() {
                "Scheduled".to_string()
            } else {
                live.detail.clone()
            },
            home,
            away,
        },
        _ => GameReport::Live {
            game_id,
            clock: format!("{} {}", live.period_label, live.clock),
            possession: live.possession,
            home,
            away,
        },
    }
}

/// Hand both sides of a live report to the executor and print any trades.
pub async fn trade_report<G: OrderGateway>(
    report: &GameReport,
    ticker: &str,
    executor: &mut OrderExecutor<G>,
) {
    let GameReport::Live { home, away, .. } = report else {
        return;
    };
    for s in [home, away] {
        let (Some(entry), Some(ask)) = (&s.entry, s.ask) else {
            continue;
        };
        let Some(outcome) = executor.maybe_trade(ticker, s.side, entry, ask).await else {
            continue;
        };
        match outcome.status {
            OrderStatus::DryRun | OrderStatus::Placed => {
                let tag = if outcome.status == OrderStatus::DryRun {
                    "[DRY RUN] "
                } else {
                    ""
                };
                let cost = outcome.contracts as f64 * ask as f64 / 100.0;
                println!(
                    "  {tag}⚡ TRADE: {}  {}  {} contracts @ {}¢  cost ~${:.2}  survival={:.0}%  score={}",
                    s.team,
                    s.side.as_str().to_uppercase(),
                    outcome.contracts,
                    ask,
                    cost,
                    entry.survival * 100.0,
                    entry.score
                );
            }
            OrderStatus::Failed => {
                println!(
                    "  ✗ ORDER FAILED: {} {} @ {}¢  {}",
                    s.side.as_str().to_uppercase(),
                    outcome.contracts,
                    ask,
                    outcome.error.as_deref().unwrap_or("")
                );
            }
        }
    }
}

/// Games whose scheduled start is still ahead of `now`.
pub fn not_started(game: &MatchedGame, now: DateTime<Utc>) -> bool {
    game.espn.start_time.is_some_and(|t| t > now)
}

/// One polling pass over a league.
pub async fn run_league<F, G>(
    league: &str,
    config: &Config,
    feed: &F,
    rest: &KalshiRest,
    model: &EntryModel,
    executor: &mut OrderExecutor<G>,
) -> Result<()>
where
    F: ScoreFeed,
    G: OrderGateway,
{
    let league_cfg = config
        .leagues
        .get(league)
        .with_context(|| format!("unknown league: {league}"))?;
    let team_map = config.team_map(league);

    let espn_games = feed
        .scoreboard(league)
        .await
        .with_context(|| format!("{league}: scoreboard fetch failed"))?;
    let markets = rest
        .get_markets_by_series(&league_cfg.series)
        .await
        .with_context(|| format!("{league}: market listing failed"))?;
    let today = chrono::Local::now().date_naive();
    let kalshi_games = matcher::league_games(&markets, today);
    let mut matched = matcher::merge_games(&espn_games, &kalshi_games, &team_map);
    matched.sort_by_key(|g| (g.espn.start_time.is_none(), g.espn.start_time));

    tracing::info!(
        league = %league,
        espn = espn_games.len(),
        kalshi = kalshi_games.len(),
        matched = matched.len(),
        "league scan"
    );
    println!("== {} ({} matched games) ==", league.to_uppercase(), matched.len());
    if matched.is_empty() {
        println!("  No matched games");
        println!();
        return Ok(());
    }

    let now = Utc::now();
    let (upcoming, started): (Vec<_>, Vec<_>) = matched.iter().partition(|g| not_started(g, now));
    for g in &upcoming {
        if let Some(start) = g.espn.start_time {
            println!(
                "  {} vs {}  not started (tip {})",
                g.home_team,
                g.away_team,
                start.with_timezone(&chrono::Local).format("%H:%M")
            );
        }
    }

    let fetches = started.iter().map(|g| async move {
        let live = feed.live_state(&g.espn.game_id, league).await;
        let prices = rest.get_prices(&g.ticker).await;
        (live, prices)
    });
    let results = join_all(fetches).await;

    for (game, (live, prices)) in started.into_iter().zip(results) {
        let (live, prices) = match (live, prices) {
            (Ok(l), Ok(p)) => (l, p),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(game_id = %game.espn.game_id, ticker = %game.ticker, error = %e, "game fetch failed");
                println!("Game {}: ERROR — {:#}", game.espn.game_id, e);
                continue;
            }
        };

        let side = home_side(game, &team_map);
        tracing::debug!(
            ticker = %game.ticker,
            yes_bid = prices.yes_bid,
            yes_ask = prices.yes_ask,
            no_bid = prices.no_bid,
            no_ask = prices.no_ask,
            home_side = %side,
            "raw prices"
        );

        let report = build_report(game, &live, &prices, side, model);
        for line in report.render() {
            println!("{line}");
        }
        trade_report(&report, &game.ticker, executor).await;
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Recommendation;
    use crate::feed::ScheduledGame;
    use chrono::NaiveDate;

    fn matched(ticker: &str, home: &str, away: &str) -> MatchedGame {
        let date = NaiveDate::from_ymd_opt(2026, 2, 25).unwrap();
        MatchedGame {
            espn: ScheduledGame {
                game_id: "401".to_string(),
                home_team: home.to_string(),
                away_team: away.to_string(),
                status: "STATUS_IN_PROGRESS".to_string(),
                date,
                start_time: None,
            },
            ticker: ticker.to_string(),
            date,
            home_team: home.to_string(),
            away_team: away.to_string(),
        }
    }

    fn live(home_wp: u32, home_score: i32, away_score: i32, period: u32, secs: u32) -> LiveState {
        LiveState {
            game_id: "401".to_string(),
            phase: GamePhase::Live,
            period,
            period_label: format!("Q{period}"),
            clock: "2:00".to_string(),
            detail: String::new(),
            home_wp: Some(home_wp),
            away_wp: Some(100 - home_wp),
            home_score: Some(home_score),
            away_score: Some(away_score),
            seconds_remaining: Some(secs),
            possession: Some(Possession::Home),
        }
    }

    fn prices(yes_ask: u32, no_ask: u32) -> MarketPrices {
        MarketPrices {
            yes_bid: yes_ask.saturating_sub(1),
            yes_ask,
            no_bid: no_ask.saturating_sub(1),
            no_ask,
        }
    }

    #[test]
    fn test_home_side_from_yes_team() {
        let map = Config::default().team_map("nba");
        let g = matched("KXNBAGAME-26FEB25GSPHO-GS", "GSW", "PHX");
        assert_eq!(home_side(&g, &map), Side::Yes);
        let g = matched("KXNBAGAME-26FEB25GSPHO-GS", "PHX", "GSW");
        assert_eq!(home_side(&g, &map), Side::No);
    }

    #[test]
    fn test_live_report_maps_sides() {
        let g = matched("KXNBAGAME-26FEB25BKNLAC-BKN", "LAC", "BKN");
        // home (LAC) trades NO because BKN is the YES team
        let report = build_report(&g, &live(92, 100, 92, 4, 120), &prices(20, 82), Side::No, &EntryModel::default());
        let GameReport::Live { home, away, .. } = &report else {
            panic!("expected live report");
        };
        assert_eq!(home.side, Side::No);
        assert_eq!(home.ask, Some(82));
        assert_eq!(away.side, Side::Yes);
        assert_eq!(away.ask, Some(20));

        let home_entry = home.entry.as_ref().unwrap();
        assert_eq!(home_entry.recommendation, Recommendation::StrongEntry);
        assert!(home_entry.contracts > 0);
        let away_entry = away.entry.as_ref().unwrap();
        assert!(away_entry.recommendation.is_hard_block());
        assert_eq!(away_entry.contracts, 0);
    }

    #[test]
    fn test_missing_ask_is_no_data() {
        let g = matched("KXNBAGAME-26FEB25BKNLAC-LAC", "LAC", "BKN");
        let report = build_report(&g, &live(92, 100, 92, 4, 120), &prices(82, 0), Side::Yes, &EntryModel::default());
        let GameReport::Live { away, .. } = &report else {
            panic!("expected live report");
        };
        assert_eq!(away.entry.as_ref().unwrap().recommendation, Recommendation::NoData);
        assert_eq!(away.kelly.reason.to_string(), "missing data");
    }

    #[test]
    fn test_final_and_pregame_reports() {
        let g = matched("KXNBAGAME-26FEB25BKNLAC-LAC", "LAC", "BKN");
        let mut state = live(92, 100, 92, 4, 0);
        state.phase = GamePhase::Final;
        let report = build_report(&g, &state, &prices(82, 20), Side::Yes, &EntryModel::default());
        assert_eq!(report.render(), vec!["Game 401: FINAL".to_string()]);

        let mut state = live(60, 0, 0, 0, 2880);
        state.phase = GamePhase::Pre;
        state.detail = "7:30 PM ET".to_string();
        let report = build_report(&g, &state, &prices(60, 42), Side::Yes, &EntryModel::default());
        let lines = report.render();
        assert_eq!(lines[1], "  LAC vs BKN  —  7:30 PM ET");
        assert!(matches!(report, GameReport::Pregame { ref home, .. } if home.entry.is_none()));
    }

    #[test]
    fn test_live_render_lines() {
        let g = matched("KXNBAGAME-26FEB25BKNLAC-LAC", "LAC", "BKN");
        let lines = build_report(&g, &live(92, 100, 92, 4, 120), &prices(82, 20), Side::Yes, &EntryModel::default()).render();
        assert_eq!(lines[0], "Game 401:");
        assert!(lines[1].starts_with("  LAC: 100 pts  ESPN: 92%  Bid: 81  Ask: 82"), "{}", lines[1]);
        assert!(lines[2].starts_with("    Entry: ★ STRONG ENTRY"), "{}", lines[2]);
        assert_eq!(lines[5], "  Clock: Q4 2:00   Possession: home");
    }

    #[tokio::test]
    async fn test_trade_report_dry_run() {
        use crate::execution::TradeGuards;
        use crate::kalshi::types::{CreateOrderRequest, Order};

        struct NeverCalled;
        #[async_trait::async_trait]
        impl OrderGateway for NeverCalled {
            async fn place_order(&self, _order: &CreateOrderRequest) -> Result<Order> {
                anyhow::bail!("dry run must not reach the gateway")
            }
        }

        let cfg = Config::default();
        let mut executor = OrderExecutor::new(
            std::sync::Arc::new(NeverCalled),
            TradeGuards::from_config(&cfg.engine, &cfg.execution),
            true,
        );
        let g = matched("KXNBAGAME-26FEB25BKNLAC-LAC", "LAC", "BKN");
        let report = build_report(&g, &live(92, 100, 92, 4, 120), &prices(82, 20), Side::Yes, &EntryModel::default());
        trade_report(&report, &g.ticker, &mut executor).await;
        assert!(executor.already_traded(&g.ticker, Side::Yes));
        assert!(!executor.already_traded(&g.ticker, Side::No));
    }

    #[test]
    fn test_not_started() {
        let mut g = matched("KXNBAGAME-26FEB25BKNLAC-LAC", "LAC", "BKN");
        let now = Utc::now();
        assert!(!not_started(&g, now));
        g.espn.start_time = Some(now + chrono::Duration::hours(2));
        assert!(not_started(&g, now));
    }
}
