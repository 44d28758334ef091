use super::auth::KalshiAuth;
use super::types::*;
use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

const API_PREFIX: &str = "/trade-api/v2";

pub struct KalshiRest {
    client: Client,
    auth: Arc<KalshiAuth>,
    base_url: String,
}

impl KalshiRest {
    pub fn new(auth: Arc<KalshiAuth>, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch all open markets for a given series ticker. Paginates automatically.
    pub async fn get_markets_by_series(&self, series_ticker: &str) -> Result<Vec<Market>> {
        let mut all_markets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut path = format!(
                "{}/markets?series_ticker={}&limit=200&status=open",
                API_PREFIX, series_ticker
            );
            if let Some(ref c) = cursor {
                path.push_str(&format!("&cursor={}", c));
            }

            let parsed: MarketsResponse = self.get_authed(&path).await?;

            let done = parsed.markets.is_empty()
                || parsed.cursor.as_deref().is_none_or(|c| c.is_empty());
            all_markets.extend(parsed.markets);
            if done {
                break;
            }
            cursor = parsed.cursor;
        }

        tracing::debug!(series = %series_ticker, count = all_markets.len(), "fetched markets");
        Ok(all_markets)
    }

    pub async fn get_market(&self, ticker: &str) -> Result<Market> {
        let path = format!("{}/markets/{}", API_PREFIX, ticker);
        let resp: MarketResponse = self.get_authed(&path).await?;
        Ok(resp.market)
    }

    /// Current bid/ask for both sides of a market.
    pub async fn get_prices(&self, ticker: &str) -> Result<MarketPrices> {
        let market = self.get_market(ticker).await?;
        Ok(MarketPrices::from(&market))
    }

    pub async fn create_order(&self, order: &CreateOrderRequest) -> Result<OrderResponse> {
        let path = format!("{}/portfolio/orders", API_PREFIX);
        let url = format!("{}{}", self.base_url, path);

        let headers = self.auth.headers("POST", &path)?;
        let mut req = self.client.post(&url).json(order);
        for (k, v) in &headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.context("order request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("order failed ({}): {}", status, body);
        }
        resp.json().await.context("failed to parse order response")
    }

    /// All currently resting (unfilled) orders.
    pub async fn get_resting_orders(&self) -> Result<Vec<Order>> {
        let mut all_orders = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut path = format!("{}/portfolio/orders?status=resting", API_PREFIX);
            if let Some(ref c) = cursor {
                path.push_str(&format!("&cursor={}", c));
            }
            let parsed: OrdersResponse = self.get_authed(&path).await?;

            let done = parsed.orders.is_empty()
                || parsed.cursor.as_deref().is_none_or(|c| c.is_empty());
            all_orders.extend(parsed.orders);
            if done {
                break;
            }
            cursor = parsed.cursor;
        }
        Ok(all_orders)
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let path = format!("{}/portfolio/orders/{}", API_PREFIX, order_id);
        let url = format!("{}{}", self.base_url, path);

        let headers = self.auth.headers("DELETE", &path)?;
        let mut req = self.client.delete(&url);
        for (k, v) in &headers {
            req = req.header(k, v);
        }

        let resp = req.send().await.context("cancel request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("cancel {} failed ({}): {}", order_id, status, body);
        }
        tracing::info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// Authenticated GET. `path` may carry a query string; it is stripped
    /// before signing.
    async fn get_authed<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let headers = self.auth.headers("GET", path)?;
        let mut req = self.client.get(&url);
        for (k, v) in &headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.context("GET request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed ({}): {}", path, status, body);
        }
        resp.json().await.context("failed to parse response")
    }
}
