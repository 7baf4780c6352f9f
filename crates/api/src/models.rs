use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub expires_in: u64,
    pub access_token: String,
}

/// Envelope returned by every list endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEnvelope {
    pub total_items: usize,
    pub sort_order: String,
    pub limit: usize,
    pub offset: usize,
    pub order_by: String,
    pub filters: BTreeMap<String, String>,
    pub items: Vec<Value>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub resources: Vec<String>,
    pub api_clients: usize,
}
