//! Live WooCommerce REST API fetcher.
//!
//! Pulls the orders placed inside the fetch window (following
//! `X-WP-TotalPages` pagination) and the five most popular products, then
//! summarizes them with [`summarize_orders`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use secrecy::ExposeSecret;
use serde_json::Value;
use url::Url;

use super::MetricsSource;
use super::credentials::{CredentialStore, WooCommerceCredentials};
use crate::domain::{DomainId, FetchWindow, SourcePayload, SourceTag};
use crate::error::GatewayError;
use crate::metrics::summarize_orders;

const ORDERS_PATH: &str = "/wp-json/wc/v3/orders";
const PRODUCTS_PATH: &str = "/wp-json/wc/v3/products";
const ORDERS_PER_PAGE: &str = "100";
const TOP_PRODUCTS: &str = "5";
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Fetches WooCommerce orders and products over HTTP.
#[derive(Debug, Clone)]
pub struct WooCommerceSource {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    max_pages: u32,
}

impl WooCommerceSource {
    /// Creates a fetcher sharing `client`.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<dyn CredentialStore>,
        max_pages: u32,
    ) -> Self {
        Self {
            client,
            credentials,
            max_pages: max_pages.max(1),
        }
    }

    fn upstream(message: impl Into<String>) -> GatewayError {
        GatewayError::upstream(SourceTag::WooCommerce.as_str(), message)
    }

    fn endpoint(
        base: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Url, GatewayError> {
        let raw = format!("{}{path}", base.trim_end_matches('/'));
        Url::parse_with_params(&raw, params)
            .map_err(|e| GatewayError::InvalidInput(format!("bad store url `{raw}`: {e}")))
    }

    /// GETs one page and returns its rows plus the advertised page count.
    async fn get_page(
        &self,
        url: Url,
        creds: &WooCommerceCredentials,
    ) -> Result<(Vec<Value>, u32), GatewayError> {
        let response = self
            .client
            .get(url)
            .basic_auth(
                creds.consumer_key.expose_secret(),
                Some(creds.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| Self::upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::upstream(format!("HTTP {}: {body}", status.as_u16())));
        }

        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok())
            .unwrap_or(1);

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| Self::upstream(format!("unreadable body: {e}")))?;

        Ok((rows, total_pages))
    }

    async fn orders(
        &self,
        base: &str,
        creds: &WooCommerceCredentials,
        window: &FetchWindow,
    ) -> Result<Vec<Value>, GatewayError> {
        let after = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let before = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut orders = Vec::new();
        let mut page: u32 = 1;
        loop {
            let url = Self::endpoint(
                base,
                ORDERS_PATH,
                &[
                    ("after", after.clone()),
                    ("before", before.clone()),
                    ("per_page", ORDERS_PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            let (rows, total_pages) = self.get_page(url, creds).await?;
            let empty = rows.is_empty();
            orders.extend(rows);

            if empty || page >= total_pages {
                break;
            }
            if page >= self.max_pages {
                tracing::warn!(
                    base,
                    total_pages,
                    max_pages = self.max_pages,
                    "order pagination truncated"
                );
                break;
            }
            page += 1;
        }
        Ok(orders)
    }

    async fn top_products(
        &self,
        base: &str,
        creds: &WooCommerceCredentials,
    ) -> Result<Vec<Value>, GatewayError> {
        let url = Self::endpoint(
            base,
            PRODUCTS_PATH,
            &[
                ("orderby", "popularity".to_string()),
                ("order", "desc".to_string()),
                ("per_page", TOP_PRODUCTS.to_string()),
            ],
        )?;
        let (rows, _) = self.get_page(url, creds).await?;
        Ok(rows)
    }
}

#[async_trait]
impl MetricsSource for WooCommerceSource {
    fn tag(&self) -> SourceTag {
        SourceTag::WooCommerce
    }

    async fn fetch(
        &self,
        domain: &DomainId,
        window: &FetchWindow,
    ) -> Result<Option<SourcePayload>, GatewayError> {
        let Some(creds) = self.credentials.woocommerce(domain).await? else {
            tracing::debug!(%domain, "no woocommerce credentials configured");
            return Ok(None);
        };

        let base = creds
            .api_url
            .clone()
            .unwrap_or_else(|| format!("https://{domain}"));

        let orders = self.orders(&base, &creds, window).await?;
        let products = self.top_products(&base, &creds).await?;
        let metrics = summarize_orders(&orders, &products);

        tracing::info!(
            %domain,
            orders = metrics.total_orders,
            total_sales = %metrics.total_sales,
            "woocommerce metrics fetched"
        );
        Ok(Some(SourcePayload::WooCommerce(metrics)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::sources::credentials::{DomainCredentials, StaticCredentialStore};

    #[derive(Clone, Default)]
    struct Hits(Arc<AtomicUsize>);

    async fn orders(
        State(hits): State<Hits>,
        headers: HeaderMap,
        Query(q): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        hits.0.fetch_add(1, Ordering::SeqCst);
        if !headers.contains_key("authorization") {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        let page = q.get("page").cloned().unwrap_or_default();
        let rows = match page.as_str() {
            "1" => json!([{ "total": "100.00" }, { "total": "oops" }]),
            "2" => json!([{ "total": 50 }]),
            _ => json!([]),
        };
        ([(TOTAL_PAGES_HEADER, "2")], axum::Json(rows)).into_response()
    }

    async fn products() -> axum::Json<Value> {
        axum::Json(json!([
            { "id": 101, "name": "Premium T-Shirt", "price": "29.99", "total_sales": 156 },
            { "id": 102, "name": "Slim Fit Jeans", "price": "49.99", "total_sales": 132 }
        ]))
    }

    async fn spawn_store(hits: Hits) -> String {
        let app = Router::new()
            .route(ORDERS_PATH, get(orders))
            .route(PRODUCTS_PATH, get(products))
            .with_state(hits);
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn domain() -> DomainId {
        let Ok(d) = DomainId::parse("shop.example.com") else {
            panic!("valid domain");
        };
        d
    }

    fn window() -> FetchWindow {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        FetchWindow::trailing(7, now)
    }

    fn source(base: Option<String>, max_pages: u32) -> WooCommerceSource {
        source_with(reqwest::Client::new(), base, max_pages)
    }

    fn source_with(client: reqwest::Client, base: Option<String>, max_pages: u32) -> WooCommerceSource {
        let creds = DomainCredentials {
            woocommerce: Some(WooCommerceCredentials {
                api_url: base,
                consumer_key: SecretString::from("ck_test"),
                consumer_secret: SecretString::from("cs_test"),
            }),
            google_analytics: None,
        };
        let store = StaticCredentialStore::new().with_domain(&domain(), creds);
        WooCommerceSource::new(client, Arc::new(store), max_pages)
    }

    #[tokio::test]
    async fn follows_pages_and_summarizes() {
        let hits = Hits::default();
        let base = spawn_store(hits.clone()).await;
        let fetcher = source(Some(base), 10);

        let Ok(Some(SourcePayload::WooCommerce(metrics))) = fetcher.fetch(&domain(), &window()).await
        else {
            panic!("expected woocommerce payload");
        };
        assert_eq!(metrics.total_orders, 2);
        assert_eq!(metrics.total_sales, Decimal::new(15000, 2));
        assert_eq!(metrics.avg_order_value, Decimal::new(7500, 2));
        assert_eq!(metrics.top_products.len(), 2);
        assert_eq!(hits.0.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn page_cap_truncates() {
        let hits = Hits::default();
        let base = spawn_store(hits.clone()).await;
        let fetcher = source(Some(base), 1);

        let Ok(Some(SourcePayload::WooCommerce(metrics))) = fetcher.fetch(&domain(), &window()).await
        else {
            panic!("expected woocommerce payload");
        };
        assert_eq!(metrics.total_orders, 1);
        assert_eq!(hits.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credentials_is_skip() {
        let fetcher = WooCommerceSource::new(
            reqwest::Client::new(),
            Arc::new(StaticCredentialStore::new()),
            10,
        );
        let Ok(result) = fetcher.fetch(&domain(), &window()).await else {
            panic!("missing credentials is not an error");
        };
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn non_2xx_is_upstream_failure() {
        let app = Router::new().route(
            ORDERS_PATH,
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let fetcher = source(Some(format!("http://{addr}")), 10);
        let result = fetcher.fetch(&domain(), &window()).await;
        assert!(matches!(result, Err(GatewayError::UpstreamFailure { .. })));
    }

    #[tokio::test]
    async fn slow_store_times_out_as_upstream_failure() {
        let app = Router::new().route(
            ORDERS_PATH,
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                axum::Json(json!([]))
            }),
        );
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let Ok(client) = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
        else {
            panic!("client build failed");
        };
        let fetcher = source_with(client, Some(format!("http://{addr}")), 10);
        let result = fetcher.fetch(&domain(), &window()).await;
        assert!(matches!(result, Err(GatewayError::UpstreamFailure { .. })));
    }
}
