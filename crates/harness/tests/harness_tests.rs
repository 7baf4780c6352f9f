mod common;

use crate::common::{test_case, test_config};
use serde_json::json;
use storeroom_api::{FieldKind, FieldRule, ResourceCatalog, ResourceDefinition};
use storeroom_harness::{
    ApiTestCase, Method, RequestBody, RequestOptions, ResourceResetter, StatusCode, assert_validation_errors, kernel,
    violations,
};

// ============================================================================
// Client provisioning and tokens
// ============================================================================

#[tokio::test]
async fn test_token_lazily_provisions_client() -> color_eyre::Result<()> {
    let mut case = ApiTestCase::builder(test_config()).set_up()?;
    assert!(case.clients().is_empty());

    let token = case.get_bearer_token(&["zone_read"]).await?;
    assert!(!token.is_empty());
    assert_eq!(case.clients().len(), 1);
    assert_eq!(case.state().clients.len(), 1);

    case.tear_down()
}

#[tokio::test]
async fn test_superset_client_is_reused_for_narrower_scopes() -> color_eyre::Result<()> {
    let mut case = test_case(&[], &["zone_read", "zone_write", "tax_read"])?;

    case.get_bearer_token(&["zone_read"]).await?;
    case.get_bearer_token(&["tax_read", "zone_write"]).await?;
    assert_eq!(case.clients().len(), 1);

    case.get_bearer_token(&["customer_read"]).await?;
    assert_eq!(case.clients().len(), 2);

    case.tear_down()
}

#[tokio::test]
async fn test_token_carries_only_requested_scopes() -> color_eyre::Result<()> {
    let mut case = test_case(&[], &["zone_read", "zone_write"])?;

    let token = case.get_bearer_token(&["zone_read"]).await?;
    let claims = case.state().auth.verify_token(&token)?;
    assert_eq!(claims.scopes, vec!["zone_read".to_string()]);
    assert_eq!(claims.exp - claims.iat, 10_000);

    case.request_with_token(
        Method::POST,
        "/zones",
        json!({ "name": "Antarctica" }).into(),
        &token,
        StatusCode::FORBIDDEN,
    )
    .await?;

    case.tear_down()
}

#[tokio::test]
async fn test_tokens_exchanged_per_call_without_cache() -> color_eyre::Result<()> {
    let mut case = test_case(&[], &["zone_read"])?;

    let first = case.get_bearer_token(&["zone_read"]).await?;
    let second = case.get_bearer_token(&["zone_read"]).await?;
    assert_ne!(first, second);

    case.tear_down()
}

#[tokio::test]
async fn test_tokens_reused_with_cache() -> color_eyre::Result<()> {
    let mut config = test_config();
    config.cache_tokens = true;
    let mut case = ApiTestCase::builder(config).api_client(&["zone_read"]).set_up()?;

    let first = case.get_bearer_token(&["zone_read"]).await?;
    let second = case.get_bearer_token(&["zone_read"]).await?;
    assert_eq!(first, second);

    case.tear_down()
}

#[tokio::test]
async fn test_explicit_client_lifetime() -> color_eyre::Result<()> {
    let mut case = ApiTestCase::builder(test_config())
        .api_client_with_lifetime(&["zone_read"], 120)
        .set_up()?;

    let token = case.get_bearer_token(&["zone_read"]).await?;
    let claims = case.state().auth.verify_token(&token)?;
    assert_eq!(claims.exp - claims.iat, 120);

    let credentials = case.create_api_client(&["tax_read"], Some(30))?;
    assert_eq!(credentials.lifetime, 30);
    assert_eq!(case.clients().len(), 2);

    case.tear_down()
}

// ============================================================================
// Status handling
// ============================================================================

#[tokio::test]
async fn test_anonymous_request_is_unauthorized() -> color_eyre::Result<()> {
    let case = test_case(&[], &[])?;

    let body = case
        .anonymous_request(Method::GET, "/zones", RequestBody::Empty, StatusCode::UNAUTHORIZED)
        .await?
        .unwrap_or_default();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    case.request_with_token(
        Method::GET,
        "/zones",
        RequestBody::Empty,
        "not-a-token",
        StatusCode::UNAUTHORIZED,
    )
    .await?;

    case.tear_down()
}

#[tokio::test]
async fn test_unexpected_status_is_an_error() -> color_eyre::Result<()> {
    let mut case = test_case(&["zones"], &["zone_read"])?;

    let error = case
        .get_item("/zones/999", &["zone_read"])
        .await
        .expect_err("a missing zone must fail the request");
    let message = error.to_string();
    assert!(message.contains("GET /zones/999 returned 404 Not Found, expected 200 OK"), "{message}");
    assert!(message.contains("Zone 999 not found"), "{message}");

    case.tear_down()
}

#[tokio::test]
async fn test_extra_query_options() -> color_eyre::Result<()> {
    let mut case = test_case(&["zones"], &["zone_read"])?;

    let body = case
        .request_api(
            Method::GET,
            "/zones",
            RequestBody::Empty,
            &["zone_read"],
            StatusCode::OK,
            RequestOptions::new().query("limit", "1").header("x-request-id", "harness"),
        )
        .await?
        .unwrap_or_default();
    assert_eq!(body["limit"], 1);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));

    case.request_api(
        Method::GET,
        "/zones",
        RequestBody::Empty,
        &["zone_read"],
        StatusCode::BAD_REQUEST,
        RequestOptions::new().query("sortOrder", "random"),
    )
    .await?;

    case.tear_down()
}

#[tokio::test]
async fn test_malformed_body_reports_violations() -> color_eyre::Result<()> {
    let mut case = test_case(&["zones"], &["zone_write"])?;

    let errors = case
        .request_api(
            Method::PUT,
            "/zones/bulk-delete",
            RequestBody::from(json!({ "ids": "x" })),
            &["zone_write"],
            StatusCode::UNPROCESSABLE_ENTITY,
            RequestOptions::new(),
        )
        .await?
        .unwrap_or_default();
    assert_validation_errors(&violations(&[("ids", "")]), &errors);

    let body = case
        .get_item_expecting("/zones/abc", &["zone_write"], StatusCode::BAD_REQUEST)
        .await?
        .unwrap_or_default();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    case.tear_down()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_tear_down_restores_baseline_and_clients() -> color_eyre::Result<()> {
    let mut case = test_case(&["zones"], &["zone_read", "zone_write"])?;
    case.bulk_delete_items("/zones", &[1, 2, 3], &["zone_write"]).await?;
    assert_eq!(case.state().store.count("zones"), 2);

    let state = case.state().clone();
    case.tear_down()?;

    assert_eq!(state.store.count("zones"), 5);
    assert!(state.clients.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_current_kernel_follows_test_case() -> color_eyre::Result<()> {
    let case = test_case(&[], &[])?;
    let current = kernel::current().expect("kernel registered on this thread");
    assert!(std::sync::Arc::ptr_eq(&current, case.state()));
    drop(current);

    case.tear_down()?;
    assert!(kernel::current().is_none());
    Ok(())
}

#[tokio::test]
async fn test_custom_catalog() -> color_eyre::Result<()> {
    let mut catalog = ResourceCatalog::new();
    catalog.register(
        ResourceDefinition::new("carriers", "/carriers", "carrierId", "Carrier")
            .field(FieldRule::required("name", FieldKind::text(64)))
            .field(FieldRule::optional("maxWeight", FieldKind::Integer { min: 0, max: 1000 }))
            .seed(json!({ "name": "Pick up in store" })),
    )?;

    let mut case = ApiTestCase::builder(test_config())
        .catalog(catalog)
        .resetter(ResourceResetter::new("carriers"))
        .api_client(&["carriers_read", "carriers_write"])
        .set_up()?;

    assert_eq!(case.count_items("/carriers", &["carriers_read"]).await?, 1);
    let carrier = case
        .create_item("/carriers", json!({ "name": "Express", "maxWeight": 30 }), &["carriers_write"])
        .await?;
    assert_eq!(carrier["carrierId"], 2);

    case.tear_down()
}
