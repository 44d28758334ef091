pub mod score_feed;

use anyhow::Result;
use async_trait::async_trait;

pub use score_feed::{EspnFeed, GamePhase, LiveState, Possession, ScheduledGame};

/// Game discovery and live state for one league.
#[async_trait]
pub trait ScoreFeed: Send + Sync {
    async fn scoreboard(&self, league: &str) -> Result<Vec<ScheduledGame>>;
    async fn live_state(&self, game_id: &str, league: &str) -> Result<LiveState>;
}
