//! OpenAPI document for the REST surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{
    ApiInfoResponse, DomainDto, DomainListResponse, MetricsResponse, RecordResponse,
    RemoveDomainResponse, UpsertDomainRequest,
};
use crate::api::handlers::system::HealthResponse;
use crate::api::handlers::{domains, metrics, system};
use crate::error::ErrorResponse;

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Dashora Analytics API",
        description = "Per-domain WooCommerce and Google Analytics metrics, merged into one view."
    ),
    paths(
        system::health_handler,
        system::info_handler,
        domains::list_domains,
        domains::upsert_domain,
        domains::remove_domain,
        metrics::get_metrics,
        metrics::get_latest,
        metrics::combine,
    ),
    components(schemas(
        HealthResponse,
        ApiInfoResponse,
        DomainDto,
        DomainListResponse,
        UpsertDomainRequest,
        RemoveDomainResponse,
        MetricsResponse,
        RecordResponse,
        ErrorResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Health and API info"),
        (name = "Domains", description = "Tracked domain registry"),
        (name = "Metrics", description = "Stored and combined metrics"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/",
            "/domains",
            "/domains/{domain}",
            "/metrics/{domain}",
            "/metrics/{domain}/latest",
            "/metrics/{domain}/combine",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let schemes = doc.components.map(|c| c.security_schemes).unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }
}
