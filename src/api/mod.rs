//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Every route except `GET /health` requires `Authorization: Bearer <token>`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new().merge(handlers::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
    };

    router.fallback(route_not_found)
}

async fn route_not_found() -> GatewayError {
    GatewayError::NotFound("route not found".to_string())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::TokenAuthority;
    use crate::domain::{
        AnalyticsMetrics, DomainId, EventBus, MetricsRecord, RecordBody, UserId,
        WooCommerceMetrics,
    };
    use crate::persistence::{InMemoryMetricsStore, InMemoryTenantStore, MetricsStore};
    use crate::service::MetricsService;

    fn user(s: &str) -> UserId {
        let Ok(u) = UserId::parse(s) else {
            panic!("valid user");
        };
        u
    }

    fn domain(s: &str) -> DomainId {
        let Ok(d) = DomainId::parse(s) else {
            panic!("valid domain");
        };
        d
    }

    struct Harness {
        state: AppState,
        metrics: Arc<InMemoryMetricsStore>,
    }

    impl Harness {
        async fn new() -> Self {
            let metrics = Arc::new(InMemoryMetricsStore::new());
            let service = MetricsService::new(
                Arc::new(InMemoryTenantStore::new()),
                Arc::clone(&metrics) as Arc<dyn MetricsStore>,
                EventBus::new(16),
                90,
            );
            let Ok(_) = service
                .upsert_domain(&user("alice"), domain("shop.com"), "Shop", true, true)
                .await
            else {
                panic!("seed failed");
            };
            let state = AppState {
                metrics_service: Arc::new(service),
                token_authority: Arc::new(TokenAuthority::new(SecretString::from("router-secret"))),
            };
            Self { state, metrics }
        }

        fn token(&self, name: &str, ttl: Duration) -> String {
            let Ok(token) = self.state.token_authority.issue(&user(name), ttl, Utc::now()) else {
                panic!("issue failed");
            };
            token
        }

        async fn call(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = if method == "PUT" {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(r#"{"name":"Other","woocommerce_enabled":true}"#)
            } else {
                Body::empty()
            };
            let Ok(request) = builder.body(body) else {
                panic!("bad request");
            };
            let app = build_router().with_state(self.state.clone());
            let Ok(response) = app.oneshot(request).await else {
                panic!("router failed");
            };
            let status = response.status();
            let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
                panic!("body read failed");
            };
            let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, json)
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new().await;
        let (status, body) = h.call("GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn expired_and_missing_tokens_look_the_same() {
        let h = Harness::new().await;
        let expired = h.token("alice", Duration::seconds(-60));

        let missing = h.call("GET", "/metrics/shop.com", None).await;
        let stale = h.call("GET", "/metrics/shop.com", Some(&expired)).await;
        let garbage = h.call("GET", "/metrics/shop.com", Some("a.b.c")).await;

        assert_eq!(missing.0, StatusCode::UNAUTHORIZED);
        assert_eq!(missing, stale);
        assert_eq!(missing, garbage);
    }

    #[tokio::test]
    async fn foreign_domain_is_forbidden() {
        let h = Harness::new().await;
        let bob = h.token("bob", Duration::hours(1));

        let (read, _) = h.call("GET", "/metrics/shop.com", Some(&bob)).await;
        let (unknown, _) = h.call("GET", "/metrics/nowhere.com", Some(&bob)).await;
        let (takeover, _) = h.call("PUT", "/domains/shop.com", Some(&bob)).await;
        let (delete, _) = h.call("DELETE", "/domains/shop.com", Some(&bob)).await;

        assert_eq!(read, StatusCode::FORBIDDEN);
        assert_eq!(unknown, StatusCode::FORBIDDEN);
        assert_eq!(takeover, StatusCode::FORBIDDEN);
        assert_eq!(delete, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn info_reports_caller() {
        let h = Harness::new().await;
        let alice = h.token("alice", Duration::hours(1));
        let (status, body) = h.call("GET", "/", Some(&alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], "alice");
        assert_eq!(body["message"], "Dashora Analytics API");
    }

    #[tokio::test]
    async fn lists_only_owned_domains() {
        let h = Harness::new().await;
        let bob = h.token("bob", Duration::hours(1));
        let (status, _) = h.call("PUT", "/domains/bob.io", Some(&bob)).await;
        assert_eq!(status, StatusCode::OK);

        let alice = h.token("alice", Duration::hours(1));
        let (status, body) = h.call("GET", "/domains", Some(&alice)).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body["domains"]
            .as_array()
            .map(|d| d.iter().filter_map(|d| d["domain_id"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec!["shop.com"]);
    }

    #[tokio::test]
    async fn combine_then_read_latest() {
        let h = Harness::new().await;
        let alice = h.token("alice", Duration::hours(1));
        let ts = Utc::now().timestamp() - 60;
        for body in [
            RecordBody::WooCommerce(WooCommerceMetrics {
                total_sales: Decimal::new(15000, 2),
                total_orders: 2,
                avg_order_value: Decimal::new(7500, 2),
                top_products: Vec::new(),
            }),
            RecordBody::GoogleAnalytics(AnalyticsMetrics {
                total_sessions: 225,
                ..AnalyticsMetrics::default()
            }),
        ] {
            let record = MetricsRecord {
                domain: domain("shop.com"),
                timestamp: ts,
                expires_at: ts + 86_400,
                body,
            };
            let Ok(()) = h.metrics.put(&record).await else {
                panic!("put failed");
            };
        }

        let (status, combined) = h
            .call("POST", "/metrics/shop.com/combine?period=7d", Some(&alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(combined["days"], 7);
        assert_eq!(combined["metrics"]["source"], "combined");
        assert_eq!(
            combined["metrics"]["metrics"]["combined"]["conversion_rate"],
            "0.89"
        );

        let (status, latest) = h
            .call("GET", "/metrics/shop.com/latest", Some(&alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["metrics"], combined["metrics"]);

        let (status, listed) = h
            .call("GET", "/metrics/shop.com?source=combined", Some(&alice))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["metrics"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn bad_query_is_a_json_400() {
        let h = Harness::new().await;
        let alice = h.token("alice", Duration::hours(1));
        let (status, body) = h
            .call("GET", "/metrics/shop.com?days=1000", Some(&alice))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn empty_window_is_not_found() {
        let h = Harness::new().await;
        let alice = h.token("alice", Duration::hours(1));
        let (status, _) = h
            .call("GET", "/metrics/shop.com/latest", Some(&alice))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let h = Harness::new().await;
        let (status, body) = h.call("GET", "/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
