#![allow(dead_code)]
use storeroom_harness::{ApiTestCase, HarnessConfig};

pub fn test_case(resources: &[&str], scopes: &[&str]) -> color_eyre::Result<ApiTestCase> {
    ApiTestCase::builder(test_config())
        .reset_resources(resources)
        .api_client(scopes)
        .set_up()
}

pub fn test_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.server.signing_key = Some("harness-test-signing-key".to_string());
    config
}

/// Reads a numeric id from a created item.
pub fn id_of(item: &serde_json::Value, id_field: &str) -> color_eyre::Result<u64> {
    item[id_field]
        .as_u64()
        .ok_or_else(|| color_eyre::eyre::eyre!("{id_field} missing from {item}"))
}
