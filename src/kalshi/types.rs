use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderRequest {
    pub ticker: String,
    pub action: String, // "buy" or "sell"
    pub side: Side,
    pub count: u32,
    #[serde(rename = "type")]
    pub order_type: String, // "limit"
    pub time_in_force: String,
    pub post_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl CreateOrderRequest {
    /// Fill-or-kill, post-only limit buy priced on the side's own field.
    pub fn buy_limit(ticker: &str, side: Side, contracts: u32, price_cents: u32) -> Self {
        let (yes_price, no_price) = match side {
            Side::Yes => (Some(price_cents), None),
            Side::No => (None, Some(price_cents)),
        };
        Self {
            ticker: ticker.to_string(),
            action: "buy".to_string(),
            side,
            count: contracts,
            order_type: "limit".to_string(),
            time_in_force: "fill_or_kill".to_string(),
            post_only: true,
            yes_price,
            no_price,
            client_order_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub order: Order,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub ticker: String,
    pub side: String,
    pub action: String,
    pub status: String,
    #[serde(default)]
    pub yes_price: u32,
    #[serde(default)]
    pub no_price: u32,
    #[serde(default)]
    pub fill_count: u32,
    #[serde(default)]
    pub remaining_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<Order>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketResponse {
    pub market: Market,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Market {
    pub ticker: String,
    #[serde(default)]
    pub yes_bid: u32,
    #[serde(default)]
    pub yes_ask: u32,
    #[serde(default)]
    pub no_bid: u32,
    #[serde(default)]
    pub no_ask: u32,
    pub yes_bid_dollars: Option<String>,
    pub yes_ask_dollars: Option<String>,
    pub no_bid_dollars: Option<String>,
    pub no_ask_dollars: Option<String>,
}

/// Parse a fixed-point dollar string ("0.8200") to whole cents.
pub fn dollars_to_cents(dollars: Option<&str>) -> u32 {
    dollars
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| (d * 100.0).round() as u32)
        .unwrap_or(0)
}

/// Top of book for both sides, in cents. Zero means no quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarketPrices {
    pub yes_bid: u32,
    pub yes_ask: u32,
    pub no_bid: u32,
    pub no_ask: u32,
}

impl MarketPrices {
    pub fn ask(&self, side: Side) -> Option<u32> {
        let ask = match side {
            Side::Yes => self.yes_ask,
            Side::No => self.no_ask,
        };
        (ask > 0).then_some(ask)
    }
}

/// Integer cents when the venue sends them, else the dollar string.
impl From<&Market> for MarketPrices {
    fn from(m: &Market) -> Self {
        let pick = |cents: u32, dollars: &Option<String>| {
            if cents > 0 {
                cents
            } else {
                dollars_to_cents(dollars.as_deref())
            }
        };
        Self {
            yes_bid: pick(m.yes_bid, &m.yes_bid_dollars),
            yes_ask: pick(m.yes_ask, &m.yes_ask_dollars),
            no_bid: pick(m.no_bid, &m.no_bid_dollars),
            no_ask: pick(m.no_ask, &m.no_ask_dollars),
        }
    }
}
