use std::collections::HashSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::{error, info};
use uuid::Uuid;

use common::models::Side;

use crate::gateway::{AssetBalance, ExchangeGateway, GatewayError, OrderReceipt};

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_BASE_URL: &str = "https://api.coinbase.com";

/// HTTP gateway for the Coinbase Advanced Trade API. Requests are signed
/// with HMAC-SHA256 over `timestamp + method + path + body`.
pub struct CoinbaseGateway {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct Product {
    product_id: String,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductList {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct MoneyAmount {
    value: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    currency: String,
    available_balance: MoneyAmount,
    hold: MoneyAmount,
}

#[derive(Debug, Deserialize)]
struct AccountList {
    accounts: Vec<Account>,
}

impl CoinbaseGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http: Client::builder()
                .user_agent("signalbot/0.1.0")
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client."),
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Canonical `BASE/QUOTE` to Coinbase `BASE-QUOTE`.
    fn product_id(pair: &str) -> String {
        pair.replace('/', "-")
    }

    fn sign(&self, timestamp: u64, method: &Method, path: &str, body: &str) -> String {
        let prehash = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(prehash.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, GatewayError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_secs();

        let body_str = body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let signature = self.sign(timestamp, &method, path, &body_str);
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http
            .request(method, &url)
            .header("CB-ACCESS-KEY", &self.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp.to_string());

        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!("Coinbase API error: status {}, response: {}", status, text);
            return Err(GatewayError::Api(format!(
                "status {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl ExchangeGateway for CoinbaseGateway {
    async fn fetch_ticker(&self, pair: &str) -> Result<f64, GatewayError> {
        let path = format!("/api/v3/brokerage/products/{}", Self::product_id(pair));
        let text = self.request(Method::GET, &path, None).await?;

        let product: Product = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("failed to parse product: {}", e)))?;

        product
            .price
            .as_deref()
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| GatewayError::Api(format!("no price for {}", product.product_id)))
    }

    async fn load_markets(&self) -> Result<HashSet<String>, GatewayError> {
        let text = self
            .request(Method::GET, "/api/v3/brokerage/products", None)
            .await?;

        let list: ProductList = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("failed to parse products: {}", e)))?;

        Ok(list
            .products
            .into_iter()
            .map(|p| p.product_id.replace('-', "/"))
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let text = self
            .request(Method::GET, "/api/v3/brokerage/accounts", None)
            .await?;

        let list: AccountList = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("failed to parse accounts: {}", e)))?;

        Ok(list
            .accounts
            .into_iter()
            .map(|a| AssetBalance {
                asset: a.currency,
                available: a.available_balance.value.parse().unwrap_or(0.0),
                hold: a.hold.value.parse().unwrap_or(0.0),
            })
            .collect())
    }

    async fn create_market_order(
        &self,
        pair: &str,
        side: Side,
        amount: Decimal,
    ) -> Result<OrderReceipt, GatewayError> {
        let product_id = Self::product_id(pair);
        let order_side = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };

        let body = json!({
            "client_order_id": Uuid::new_v4().to_string(),
            "product_id": product_id,
            "side": order_side,
            "order_configuration": {
                "market_market_ioc": { "base_size": amount.to_string() }
            }
        });

        info!("Placing order: {} {} {}", order_side, amount, product_id);

        let text = self
            .request(Method::POST, "/api/v3/brokerage/orders", Some(body))
            .await?;

        let v: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Api(format!("failed to parse order response: {}", e)))?;

        if v.get("success").and_then(|s| s.as_bool()) == Some(false) {
            let reason = v
                .pointer("/error_response/message")
                .and_then(|m| m.as_str())
                .unwrap_or("order rejected");
            return Err(GatewayError::Api(reason.to_string()));
        }

        // The create response carries the order id; fill details are only
        // present when the exchange reports them, and stay None otherwise.
        let order_id = v
            .pointer("/success_response/order_id")
            .or_else(|| v.get("order_id"))
            .and_then(|id| id.as_str())
            .map(str::to_string);

        Ok(OrderReceipt {
            order_id,
            status: v.get("status").and_then(|s| s.as_str()).map(str::to_string),
            timestamp_ms: v.get("timestamp").and_then(|t| t.as_i64()),
            filled_amount: v.get("filled_size").and_then(|f| f.as_str()?.parse().ok()),
            price: v
                .get("average_filled_price")
                .and_then(|p| p.as_str()?.parse().ok()),
            cost: v.get("total_value_after_fees").and_then(|c| c.as_str()?.parse().ok()),
        })
    }
}
