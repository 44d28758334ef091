use super::ScoreFeed;
use crate::config::LeagueConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Regulation quarter length in seconds.
const QUARTER_SECONDS: u32 = 12 * 60;
const REGULATION_PERIODS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Pre,
    Live,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Possession {
    Home,
    Away,
}

/// One scoreboard entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledGame {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub status: String,
    pub date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
}

/// Current state of a game from the summary endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveState {
    pub game_id: String,
    pub phase: GamePhase,
    pub period: u32,
    pub period_label: String,
    pub clock: String,
    pub detail: String,
    /// Home win probability in whole percent.
    pub home_wp: Option<u32>,
    pub away_wp: Option<u32>,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub seconds_remaining: Option<u32>,
    pub possession: Option<Possession>,
}

impl LiveState {
    fn without_play(game_id: &str, phase: GamePhase, period: u32, detail: String) -> Self {
        Self {
            game_id: game_id.to_string(),
            phase,
            period,
            period_label: period_label(period, phase),
            clock: String::new(),
            detail,
            home_wp: None,
            away_wp: None,
            home_score: None,
            away_score: None,
            seconds_remaining: None,
            possession: None,
        }
    }
}

/// "Q1".."Q4", "OT1".., "PRE" or "FINAL".
pub fn period_label(period: u32, phase: GamePhase) -> String {
    match (phase, period) {
        (GamePhase::Final, _) => "FINAL".to_string(),
        (_, 1..=REGULATION_PERIODS) => format!("Q{}", period),
        (_, p) if p > REGULATION_PERIODS => format!("OT{}", p - REGULATION_PERIODS),
        _ => "PRE".to_string(),
    }
}

/// Seconds left in regulation from a display clock ("5:30" or "42.7") and
/// the current period. Unparseable clocks give None.
pub fn parse_seconds_remaining(clock: &str, period: u32) -> Option<u32> {
    let clock = clock.trim();
    let clock_seconds = if let Some((min_str, sec_str)) = clock.split_once(':') {
        let minutes: u32 = min_str.parse().ok()?;
        let seconds: f64 = sec_str.parse().ok()?;
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        minutes * 60 + seconds as u32
    } else {
        let seconds: f64 = clock.parse().ok()?;
        if !seconds.is_finite() || seconds < 0.0 {
            return None;
        }
        seconds as u32
    };
    let quarters_left = REGULATION_PERIODS.saturating_sub(period);
    Some(clock_seconds + quarters_left * QUARTER_SECONDS)
}

// ── Scoreboard Deserialization ───────────────────────────────────────

#[derive(Deserialize)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Deserialize)]
struct EspnEvent {
    id: String,
    #[serde(rename = "shortName", default)]
    short_name: String,
    date: Option<String>,
    status: Option<EspnEventStatus>,
}

#[derive(Deserialize)]
struct EspnEventStatus {
    #[serde(rename = "type")]
    status_type: EspnStatusType,
}

#[derive(Deserialize, Default)]
struct EspnStatusType {
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    completed: bool,
    #[serde(rename = "shortDetail", default)]
    short_detail: String,
}

/// ESPN writes "2026-02-26T00:30Z" (no seconds), which RFC 3339 rejects.
fn parse_espn_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Today's games. `shortName` is "AWY @ HOM"; anything else yields "?" teams.
pub fn parse_scoreboard(json: &str, today: NaiveDate) -> Result<Vec<ScheduledGame>> {
    let scoreboard: EspnScoreboard =
        serde_json::from_str(json).context("failed to parse ESPN scoreboard")?;
    let games = scoreboard
        .events
        .into_iter()
        .map(|event| {
            let (away, home) = event
                .short_name
                .split_once(" @ ")
                .map(|(a, h)| (a.trim().to_string(), h.trim().to_string()))
                .unwrap_or_else(|| ("?".to_string(), "?".to_string()));
            ScheduledGame {
                game_id: event.id,
                home_team: home,
                away_team: away,
                status: event
                    .status
                    .map(|s| s.status_type.name)
                    .unwrap_or_else(|| "?".to_string()),
                date: today,
                start_time: event.date.as_deref().and_then(parse_espn_time),
            }
        })
        .collect();
    Ok(games)
}

// ── Summary Deserialization ──────────────────────────────────────────

#[derive(Deserialize)]
struct EspnSummary {
    header: EspnHeader,
    #[serde(default)]
    winprobability: Vec<EspnWinProbability>,
    situation: Option<EspnSituation>,
}

#[derive(Deserialize)]
struct EspnHeader {
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    status: EspnCompetitionStatus,
    situation: Option<EspnSituation>,
}

#[derive(Deserialize)]
struct EspnCompetitionStatus {
    #[serde(rename = "type", default)]
    status_type: EspnStatusType,
    #[serde(default)]
    period: u32,
    #[serde(rename = "displayClock", default)]
    display_clock: String,
}

#[derive(Deserialize)]
struct EspnCompetitor {
    #[serde(rename = "homeAway")]
    home_away: String,
    #[serde(default)]
    score: Option<String>,
    team: Option<EspnTeam>,
}

#[derive(Deserialize)]
struct EspnTeam {
    id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct EspnWinProbability {
    #[serde(rename = "homeWinPercentage")]
    home_win_percentage: f64,
}

#[derive(Deserialize)]
struct EspnSituation {
    possession: Option<serde_json::Value>,
}

fn id_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_summary(json: &str, game_id: &str) -> Result<LiveState> {
    let summary: EspnSummary =
        serde_json::from_str(json).context("failed to parse ESPN summary")?;
    let comp = summary
        .header
        .competitions
        .into_iter()
        .next()
        .context("ESPN summary has no competitions")?;

    let stype = &comp.status.status_type;
    let period = comp.status.period;
    let detail = stype.short_detail.clone();

    if stype.completed || stype.state == "post" {
        return Ok(LiveState::without_play(game_id, GamePhase::Final, period, detail));
    }
    if stype.state == "pre" || stype.state.is_empty() {
        return Ok(LiveState::without_play(game_id, GamePhase::Pre, 0, detail));
    }

    let mut home_score = None;
    let mut away_score = None;
    let mut home_id = None;
    let mut away_id = None;
    for c in &comp.competitors {
        let score = c.score.as_deref().and_then(|s| s.trim().parse::<i32>().ok());
        let id = c.team.as_ref().and_then(|t| t.id.as_ref()).and_then(id_string);
        if c.home_away == "home" {
            home_score = score;
            home_id = id;
        } else {
            away_score = score;
            away_id = id;
        }
    }

    let home_wp = summary
        .winprobability
        .last()
        .map(|wp| (wp.home_win_percentage * 100.0).round().clamp(0.0, 100.0) as u32);
    let away_wp = home_wp.map(|h| 100 - h);

    let possession = summary
        .situation
        .or(comp.situation)
        .and_then(|s| s.possession)
        .and_then(|v| id_string(&v))
        .and_then(|poss| {
            if home_id.as_deref() == Some(poss.as_str()) {
                Some(Possession::Home)
            } else if away_id.as_deref() == Some(poss.as_str()) {
                Some(Possession::Away)
            } else {
                None
            }
        });

    let clock = comp.status.display_clock.clone();
    Ok(LiveState {
        game_id: game_id.to_string(),
        phase: GamePhase::Live,
        period,
        period_label: period_label(period, GamePhase::Live),
        seconds_remaining: parse_seconds_remaining(&clock, period),
        clock,
        detail,
        home_wp,
        away_wp,
        home_score,
        away_score,
        possession,
    })
}

// ── HTTP Feed ────────────────────────────────────────────────────────

pub struct EspnFeed {
    client: Client,
    leagues: HashMap<String, LeagueConfig>,
}

impl EspnFeed {
    pub fn new(leagues: HashMap<String, LeagueConfig>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, leagues })
    }

    fn league(&self, league: &str) -> Result<&LeagueConfig> {
        self.leagues
            .get(league)
            .with_context(|| format!("unknown league: {league}"))
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .context("ESPN request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("ESPN {} ({}): {}", url, status, body);
        }
        resp.text().await.context("failed to read ESPN response")
    }
}

#[async_trait]
impl ScoreFeed for EspnFeed {
    async fn scoreboard(&self, league: &str) -> Result<Vec<ScheduledGame>> {
        let url = self.league(league)?.scoreboard_url.clone();
        let body = self.get_text(&url, &[]).await?;
        parse_scoreboard(&body, chrono::Local::now().date_naive())
    }

    async fn live_state(&self, game_id: &str, league: &str) -> Result<LiveState> {
        let url = self.league(league)?.summary_url.clone();
        let body = self.get_text(&url, &[("event", game_id)]).await?;
        parse_summary(&body, game_id)
    }
}
