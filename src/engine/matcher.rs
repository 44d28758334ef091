//! Joins ESPN's game list with Kalshi's open game markets.
//!
//! Kalshi tickers name the YES team as "home", which may not match ESPN's
//! home/away assignment. Keys use sorted team codes so a swap still matches.

use crate::feed::ScheduledGame;
use crate::kalshi::types::Market;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct MarketKey {
    pub date: NaiveDate,
    pub teams: [String; 2], // sorted alphabetically
}

/// One Kalshi game market, with team codes as they appear in the ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct KalshiGame {
    pub ticker: String,
    pub date: NaiveDate,
    /// The ticker's YES team.
    pub home_team: String,
    pub away_team: String,
}

/// A game present on both sides, oriented the way ESPN reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedGame {
    pub espn: ScheduledGame,
    pub ticker: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
}

/// Translate a Kalshi team code to its ESPN equivalent. Unknown codes come
/// back unchanged (uppercased).
pub fn normalize_kalshi_code(code: &str, team_map: &HashMap<String, String>) -> String {
    let code = code.trim().to_uppercase();
    team_map.get(&code).cloned().unwrap_or(code)
}

/// YES-side team code, e.g. `KXNBAGAME-26FEB25BKNLAC-BKN` -> `BKN`.
pub fn yes_team_from_ticker(ticker: &str) -> String {
    ticker.rsplit('-').next().unwrap_or_default().to_uppercase()
}

pub fn generate_key(team1: &str, team2: &str, date: NaiveDate) -> Option<MarketKey> {
    if team1.is_empty() || team2.is_empty() {
        return None;
    }
    let mut teams = [team1.to_string(), team2.to_string()];
    teams.sort();
    Some(MarketKey { date, teams })
}

/// Parse the game date from a ticker segment like "26JAN19...".
pub fn parse_date_from_ticker(ticker: &str) -> Option<NaiveDate> {
    for part in ticker.split('-').skip(1) {
        if part.len() >= 7 && part.is_char_boundary(7) {
            let year_str = &part[0..2];
            let month_str = &part[2..5];
            let day_str = &part[5..7];

            if let (Ok(year), Ok(day)) = (year_str.parse::<i32>(), day_str.parse::<u32>()) {
                let month = match month_str {
                    "JAN" => Some(1),
                    "FEB" => Some(2),
                    "MAR" => Some(3),
                    "APR" => Some(4),
                    "MAY" => Some(5),
                    "JUN" => Some(6),
                    "JUL" => Some(7),
                    "AUG" => Some(8),
                    "SEP" => Some(9),
                    "OCT" => Some(10),
                    "NOV" => Some(11),
                    "DEC" => Some(12),
                    _ => None,
                };
                if let Some(m) = month {
                    return NaiveDate::from_ymd_opt(2000 + year, m, day);
                }
            }
        }
    }
    None
}

/// `SERIES-YYMONDD<TEAMS>-<YES>` -> game with the YES team as home.
pub fn parse_game_ticker(ticker: &str) -> Option<KalshiGame> {
    let mut parts = ticker.split('-');
    let _series = parts.next()?;
    let segment = parts.next()?;
    let yes = parts.next()?.to_uppercase();
    if yes.is_empty() || !segment.is_char_boundary(7) {
        return None;
    }

    let date = parse_date_from_ticker(ticker)?;
    let teams = segment[7..].to_uppercase();
    let away = if let Some(rest) = teams.strip_prefix(&yes) {
        rest.to_string()
    } else if let Some(rest) = teams.strip_suffix(&yes) {
        rest.to_string()
    } else {
        return None;
    };
    if away.is_empty() {
        return None;
    }

    Some(KalshiGame {
        ticker: ticker.to_string(),
        date,
        home_team: yes,
        away_team: away,
    })
}

/// Today's games from an open-markets listing, one per matchup (Kalshi lists
/// a market per team).
pub fn league_games(markets: &[Market], today: NaiveDate) -> Vec<KalshiGame> {
    let mut seen: HashSet<MarketKey> = HashSet::new();
    let mut games = Vec::new();
    for market in markets {
        let Some(game) = parse_game_ticker(&market.ticker) else {
            tracing::debug!(ticker = %market.ticker, "unparseable game ticker");
            continue;
        };
        if game.date != today {
            continue;
        }
        let Some(key) = generate_key(&game.home_team, &game.away_team, game.date) else {
            continue;
        };
        if seen.insert(key) {
            games.push(game);
        }
    }
    games
}

/// Match ESPN games to Kalshi games by (date, sorted normalized teams).
/// Unmatched ESPN games are logged and dropped.
pub fn merge_games(
    espn: &[ScheduledGame],
    kalshi: &[KalshiGame],
    team_map: &HashMap<String, String>,
) -> Vec<MatchedGame> {
    let mut lookup: HashMap<MarketKey, KalshiGame> = HashMap::new();
    for g in kalshi {
        let mut g = g.clone();
        g.home_team = normalize_kalshi_code(&g.home_team, team_map);
        g.away_team = normalize_kalshi_code(&g.away_team, team_map);
        if let Some(key) = generate_key(&g.home_team, &g.away_team, g.date) {
            lookup.insert(key, g);
        }
    }

    let mut merged = Vec::new();
    for e in espn {
        let Some(kalshi_game) = generate_key(&e.home_team, &e.away_team, e.date)
            .and_then(|key| lookup.get(&key))
        else {
            tracing::debug!(
                home = %e.home_team,
                away = %e.away_team,
                date = %e.date,
                "no kalshi match"
            );
            continue;
        };

        let (home_team, away_team) = if kalshi_game.home_team == e.home_team {
            (kalshi_game.home_team.clone(), kalshi_game.away_team.clone())
        } else {
            (kalshi_game.away_team.clone(), kalshi_game.home_team.clone())
        };

        merged.push(MatchedGame {
            espn: e.clone(),
            ticker: kalshi_game.ticker.clone(),
            date: kalshi_game.date,
            home_team,
            away_team,
        });
    }
    merged
}
