use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

use common::{Error, ExchangeClient, LimitOrderRequest, Order, OrderSide, OrderStatus, Result};

const RECV_WINDOW_MS: u64 = 5_000;
const SNAPSHOT_DEPTH: u32 = 5;
const SNAPSHOT_TRADES: u32 = 3;

/// REST API client for Binance spot. Used for order placement and account queries.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    base_url: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn sign(&self, query: &str) -> String {
        sign_query(&self.secret, query)
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        } else {
            format!("{params}&recvWindow={RECV_WINDOW_MS}&timestamp={ts}")
        };
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn signed(&self, method: Method, path: &str, params: &str) -> Result<String> {
        let query = self.signed_query(params);
        let request = if method == Method::POST {
            self.http
                .post(format!("{}{path}", self.base_url))
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(query)
        } else {
            self.http
                .request(method, format!("{}{path}?{query}", self.base_url))
        };

        let resp = request
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        read_body(resp).await
    }

    async fn public<T: DeserializeOwned>(&self, path: &str, params: &str) -> Result<T> {
        let url = if params.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{params}", self.base_url)
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let body = read_body(resp).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Order book top, latest trades and ticker for a symbol.
    ///
    /// Informational only; the maker cycle never trades on it.
    pub async fn market_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let time: ServerTime = self.public("/api/v3/time", "").await?;
        let depth: DepthResponse = self
            .public("/api/v3/depth", &format!("symbol={symbol}&limit={SNAPSHOT_DEPTH}"))
            .await?;
        let agg_trades: Vec<AggTrade> = self
            .public("/api/v3/aggTrades", &format!("symbol={symbol}&limit={SNAPSHOT_TRADES}"))
            .await?;
        let recent_trades: Vec<RecentTrade> = self
            .public("/api/v3/trades", &format!("symbol={symbol}&limit={SNAPSHOT_TRADES}"))
            .await?;
        let price = self.current_price(symbol).await?;

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            server_time_ms: time.server_time,
            bids: depth.bids,
            asks: depth.asks,
            agg_trades,
            recent_trades,
            price,
        })
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let ticker: PriceTicker = self
            .public("/api/v3/ticker/price", &format!("symbol={symbol}"))
            .await?;
        Ok(ticker.price)
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        let body = self.signed(Method::GET, "/api/v3/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        Ok(account.free(asset))
    }

    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<Order> {
        let params = format!(
            "symbol={}&side={}&type=LIMIT&timeInForce=GTC&quantity={}&price={}&newClientOrderId={}&newOrderRespType=RESULT",
            request.symbol, request.side, request.quantity, request.price, request.client_order_id
        );

        debug!(symbol = %request.symbol, side = %request.side, price = %request.price, "Submitting limit order to Binance");
        let body = self.signed(Method::POST, "/api/v3/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(resp.into())
    }

    async fn order_status(&self, symbol: &str, order_id: u64) -> Result<OrderStatus> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        let body = self.signed(Method::GET, "/api/v3/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;
        Ok(resp.status)
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        let params = format!("symbol={symbol}");
        let body = self.signed(Method::GET, "/api/v3/openOrders", &params).await?;
        let resp: Vec<OrderResponse> = serde_json::from_str(&body)?;
        Ok(resp.into_iter().map(Order::from).collect())
    }

    async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()> {
        let params = format!("symbol={symbol}&orderId={order_id}");
        self.signed(Method::DELETE, "/api/v3/order", &params).await?;
        Ok(())
    }
}

/// HMAC-SHA256 of a query string, hex encoded.
pub fn sign_query(secret: &str, query: &str) -> String {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    check_status(status, body)
}

fn check_status(status: StatusCode, body: String) -> Result<String> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Auth(format!("HTTP {status}: {body}")));
    }
    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

// ─── Market snapshot ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub server_time_ms: i64,
    /// (price, quantity), best first.
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub agg_trades: Vec<AggTrade>,
    pub recent_trades: Vec<RecentTrade>,
    pub price: Decimal,
}

impl MarketSnapshot {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|(p, _)| *p)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|(p, _)| *p)
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggTrade {
    #[serde(rename = "a")]
    pub id: u64,
    #[serde(rename = "p")]
    pub price: Decimal,
    #[serde(rename = "q")]
    pub quantity: Decimal,
    #[serde(rename = "T")]
    pub time_ms: i64,
    #[serde(rename = "m")]
    pub buyer_is_maker: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub id: u64,
    pub price: Decimal,
    pub qty: Decimal,
    pub time: i64,
    pub is_buyer_maker: bool,
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Deserialize)]
struct DepthResponse {
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: u64,
    client_order_id: String,
    price: Decimal,
    orig_qty: Decimal,
    status: OrderStatus,
    side: OrderSide,
}

impl From<OrderResponse> for Order {
    fn from(resp: OrderResponse) -> Self {
        Order {
            order_id: resp.order_id,
            client_order_id: resp.client_order_id,
            symbol: resp.symbol,
            side: resp.side,
            quantity: resp.orig_qty,
            price: resp.price,
            status: resp.status,
        }
    }
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

impl AccountResponse {
    fn free(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset == asset)
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: Decimal,
}

#[derive(Deserialize)]
struct PriceTicker {
    price: Decimal,
}
