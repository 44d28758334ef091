use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub kalshi: KalshiConfig,
    #[serde(default = "default_leagues")]
    pub leagues: HashMap<String, LeagueConfig>,
    /// Kalshi ticker code -> ESPN code, keyed by map name ("nba", "ncaa").
    /// Only non-obvious codes are listed; anything else passes through.
    #[serde(default = "default_team_codes")]
    pub team_codes: HashMap<String, HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            fees: FeeConfig::default(),
            execution: ExecutionConfig::default(),
            kalshi: KalshiConfig::default(),
            leagues: default_leagues(),
            team_codes: default_team_codes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub bankroll: f64,
    pub use_maker: bool,
    /// Hard cap per trade in dollars.
    pub max_trade: f64,
    pub min_survival: f64,
    /// Minimum edge as a decimal (0.06 = 6 points).
    pub min_edge: f64,
    /// Never buy below this ask.
    pub min_price_cents: u32,
    pub scoring: ScoringConfig,
    pub survival: SurvivalConfig,
    pub drawdown: DrawdownConfig,
    pub gates: GateConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bankroll: 288.0,
            use_maker: true,
            max_trade: 20.0,
            min_survival: 0.70,
            min_edge: 0.06,
            min_price_cents: 75,
            scoring: ScoringConfig::default(),
            survival: SurvivalConfig::default(),
            drawdown: DrawdownConfig::default(),
            gates: GateConfig::default(),
        }
    }
}

/// Composite score weights and caps. Calibration values, not derived ones.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    pub edge_weight: f64,
    pub survival_weight: f64,
    pub velocity_weight: f64,
    pub kelly_weight: f64,
    /// Edge at which the edge sub-score saturates.
    pub edge_cap: f64,
    /// f_max at which the Kelly sub-score saturates.
    pub kelly_cap: f64,
    pub strong_entry_score: f64,
    pub enter_score: f64,
    pub marginal_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            edge_weight: 0.30,
            survival_weight: 0.40,
            velocity_weight: 0.20,
            kelly_weight: 0.10,
            edge_cap: 0.15,
            kelly_cap: 0.10,
            strong_entry_score: 70.0,
            enter_score: 50.0,
            marginal_score: 30.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SurvivalConfig {
    pub base_vol: f64,
    /// Regulation length used to normalize the clock (NBA: 48 min).
    pub total_game_seconds: u32,
    pub vol_damping: f64,
    /// Survival floor sits this far above the entry price.
    pub floor_buffer: f64,
}

impl Default for SurvivalConfig {
    fn default() -> Self {
        Self {
            base_vol: 0.28,
            total_game_seconds: 2880,
            vol_damping: 0.85,
            floor_buffer: 0.02,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DrawdownConfig {
    /// Peak-to-trough decline we refuse to risk (0.25 = 25%).
    pub max_drawdown: f64,
    pub confidence: f64,
    pub n_bets: u32,
}

impl Default for DrawdownConfig {
    fn default() -> Self {
        Self {
            max_drawdown: 0.25,
            confidence: 0.95,
            n_bets: 250,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GateConfig {
    /// Periods before this one require a locked-in lead.
    pub final_period: u32,
    /// Points of lead required per minute of game time left.
    pub lead_rate: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            final_period: 4,
            lead_rate: 0.3,
        }
    }
}

fn require(name: &'static str, value: f64, ok: bool) -> std::result::Result<(), EngineError> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(EngineError::InvalidThreshold { name, value })
    }
}

impl EngineConfig {
    /// Reject calibration values the model cannot evaluate with: zero
    /// clock lengths, non-positive caps, probabilities outside (0, 1).
    pub fn validate(&self) -> std::result::Result<(), EngineError> {
        require("bankroll", self.bankroll, self.bankroll > 0.0)?;
        require("max_trade", self.max_trade, self.max_trade > 0.0)?;
        require("min_edge", self.min_edge, true)?;
        require("min_survival", self.min_survival, (0.0..1.0).contains(&self.min_survival))?;
        require("min_price_cents", self.min_price_cents as f64, self.min_price_cents <= 99)?;

        let sc = &self.scoring;
        for (name, w) in [
            ("edge_weight", sc.edge_weight),
            ("survival_weight", sc.survival_weight),
            ("velocity_weight", sc.velocity_weight),
            ("kelly_weight", sc.kelly_weight),
        ] {
            require(name, w, w >= 0.0)?;
        }
        require("edge_cap", sc.edge_cap, sc.edge_cap > 0.0)?;
        require("kelly_cap", sc.kelly_cap, sc.kelly_cap > 0.0)?;
        require("strong_entry_score", sc.strong_entry_score, true)?;
        require("enter_score", sc.enter_score, true)?;
        require("marginal_score", sc.marginal_score, true)?;

        let sv = &self.survival;
        require("total_game_seconds", sv.total_game_seconds as f64, sv.total_game_seconds > 0)?;
        require("base_vol", sv.base_vol, sv.base_vol > 0.0)?;
        require("vol_damping", sv.vol_damping, sv.vol_damping >= 0.0)?;
        require("floor_buffer", sv.floor_buffer, sv.floor_buffer >= 0.0)?;

        let dd = &self.drawdown;
        require("confidence", dd.confidence, dd.confidence > 0.0 && dd.confidence < 1.0)?;
        require("max_drawdown", dd.max_drawdown, dd.max_drawdown > 0.0 && dd.max_drawdown <= 1.0)?;
        require("n_bets", dd.n_bets as f64, dd.n_bets >= 1)?;

        require("lead_rate", self.gates.lead_rate, self.gates.lead_rate >= 0.0)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeeConfig {
    pub taker_rate_bps: u32,
    pub maker_rate_bps: u32,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            taker_rate_bps: 700,
            maker_rate_bps: 175,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Decisions scoring below this never reach the venue.
    pub min_score: f64,
    pub poll_interval_s: u64,
    pub request_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            poll_interval_s: 30,
            request_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KalshiConfig {
    pub api_base: String,
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.elections.kalshi.com".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeagueConfig {
    pub series: String,
    pub scoreboard_url: String,
    pub summary_url: String,
    /// Which `team_codes` table applies.
    pub team_map: String,
}

fn default_leagues() -> HashMap<String, LeagueConfig> {
    let espn = "https://site.api.espn.com/apis/site/v2/sports/basketball";
    let league = |series: &str, path: &str, query: &str, team_map: &str| LeagueConfig {
        series: series.to_string(),
        scoreboard_url: format!("{espn}/{path}/scoreboard{query}"),
        summary_url: format!("{espn}/{path}/summary"),
        team_map: team_map.to_string(),
    };
    HashMap::from([
        ("nba".to_string(), league("KXNBAGAME", "nba", "", "nba")),
        (
            "ncaabbm".to_string(),
            league("KXNCAAMBGAME", "mens-college-basketball", "?groups=50&limit=357", "ncaa"),
        ),
        (
            "ncaabbw".to_string(),
            league("KXNCAAWBGAME", "womens-college-basketball", "?groups=50&limit=357", "ncaa"),
        ),
    ])
}

fn default_team_codes() -> HashMap<String, HashMap<String, String>> {
    let table = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    };
    HashMap::from([
        (
            "nba".to_string(),
            table(&[
                ("BRK", "BKN"),
                ("GS", "GSW"),
                ("CHO", "CHA"),
                ("NO", "NOP"),
                ("NY", "NYK"),
                ("PHO", "PHX"),
                ("SA", "SAS"),
            ]),
        ),
        (
            "ncaa".to_string(),
            table(&[
                ("CLT", "CHAR"),
                ("L-MD", "LMD"),
                ("OMA", "NEOM"),
                ("DETM", "DET"),
                ("CLE", "CLEV"),
                ("WGA", "UWGA"),
                ("EKU", "EKY"),
                ("VAL", "VALP"),
                ("APSU", "PEAY"),
                ("GCU", "GC"),
                ("TXAM", "TA&M"),
                ("AF", "AFA"),
                ("SBU", "SBON"),
                ("M-OH", "MOH"),
                ("LUC", "LCHI"),
                ("IU", "IND"),
                ("PRES", "PRE"),
                ("GWEB", "WEBB"),
                ("JAX", "JAC"),
                ("STMN", "STET"),
                ("KC", "UMKC"),
                ("BOIS", "BSU"),
                ("BUF", "BUFF"),
                ("NW", "NU"),
                ("NU", "NW"),
                ("UPST", "UNF"),
                ("EMU", "MOH"),
                ("DAY", "LCHI"),
            ]),
        ),
    ])
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate().context("invalid [engine] config")?;
        for (name, bps) in [
            ("taker_rate_bps", self.fees.taker_rate_bps),
            ("maker_rate_bps", self.fees.maker_rate_bps),
        ] {
            if bps > 10_000 {
                anyhow::bail!("invalid [fees] config: {name} = {bps} exceeds 10000");
            }
        }
        Ok(())
    }

    /// Team-code table for a league, empty if none is configured.
    pub fn team_map(&self, league: &str) -> HashMap<String, String> {
        let key = self
            .leagues
            .get(league)
            .map(|l| l.team_map.as_str())
            .unwrap_or(league);
        self.team_codes.get(key).cloned().unwrap_or_default()
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// API key from the environment, or prompted at startup and saved to .env.
    pub fn kalshi_api_key() -> Result<String> {
        match std::env::var("KALSHI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(sanitize_key(&key)),
            _ => {
                let key = prompt("Kalshi API Key")?;
                save_env_var("KALSHI_API_KEY", &key);
                Ok(key)
            }
        }
    }

    /// Returns the PEM content of the private key.
    /// Checks KALSHI_PRIVATE_KEY_PATH first, then prompts for a file path.
    pub fn kalshi_private_key_pem() -> Result<String> {
        let path = match std::env::var("KALSHI_PRIVATE_KEY_PATH") {
            Ok(p) if !p.is_empty() => sanitize_key(&p),
            _ => {
                let p = prompt("Kalshi Private Key file path")?;
                save_env_var("KALSHI_PRIVATE_KEY_PATH", &p);
                p
            }
        };

        let expanded = if path.starts_with('~') {
            let home = std::env::var("HOME").unwrap_or_default();
            path.replacen('~', &home, 1)
        } else {
            path.clone()
        };

        let pem = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read private key file: {}", expanded))?;

        tracing::debug!(path = %expanded, bytes = pem.len(), "loaded private key");

        let pem = pem.strip_prefix('\u{feff}').unwrap_or(&pem).replace('\r', "");
        Ok(pem)
    }
}

/// Read one trimmed line from stdin after printing a label.
pub fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Live-mode confirmation: "yes" in any case, surrounding space ignored.
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Strip carriage returns, BOM, and other invisible chars from a key/path value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    let _ = std::fs::write(path, contents);
}
