#![allow(dead_code)]
use axum_test::TestServer;
use color_eyre::eyre::eyre;
use serde_json::Value;
use std::sync::Arc;
use storeroom_api::models::TokenResponse;
use storeroom_api::{AppState, CreateApiClient, ResourceCatalog, ServerConfig, build_router};

pub const SIGNING_KEY: &str = "integration-test-signing-key";

pub struct TestContext {
    pub server: TestServer,
    pub state: Arc<AppState>,
    next_client: usize,
}

impl TestContext {
    pub fn new() -> color_eyre::Result<Self> {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> color_eyre::Result<Self> {
        let state = Arc::new(AppState::new(config, ResourceCatalog::default_catalog()?)?);
        let app = build_router(Arc::clone(&state))?;
        let server = TestServer::new(app).unwrap();

        Ok(Self {
            server,
            state,
            next_client: 0,
        })
    }

    /// Registers a client directly in the registry and returns `(client_id, secret)`.
    pub fn register_client(&mut self, scopes: &[&str]) -> color_eyre::Result<(String, String)> {
        self.next_client += 1;
        let client_id = format!("test-client-{}", self.next_client);
        let command = CreateApiClient::new(&client_id, scopes.iter().map(ToString::to_string).collect());
        let secret = self.state.clients.create(command).map_err(|e| eyre!("{e}"))?;
        Ok((client_id, secret))
    }

    pub async fn request_token(&self, client_id: &str, secret: &str, scopes: &[&str]) -> axum_test::TestResponse {
        let mut form = vec![
            ("grant_type".to_string(), "client_credentials".to_string()),
            ("client_id".to_string(), client_id.to_string()),
            ("client_secret".to_string(), secret.to_string()),
        ];
        form.extend(scopes.iter().map(|scope| ("scope[]".to_string(), (*scope).to_string())));

        self.server.post("/access_token").form(&form).await
    }

    /// Registers a client granted `scopes` and returns a bearer token requesting all of them.
    pub async fn token_for(&mut self, scopes: &[&str]) -> color_eyre::Result<String> {
        let (client_id, secret) = self.register_client(scopes)?;
        let response = self.request_token(&client_id, &secret, scopes).await;

        if response.status_code() != 200 {
            return Err(eyre!("Token request failed with status: {}", response.status_code()));
        }

        let body: TokenResponse = response.json();
        Ok(body.access_token)
    }

    pub async fn create(&self, token: &str, path: &str, payload: &Value) -> color_eyre::Result<Value> {
        let response = self.server.post(path).authorization_bearer(token).json(payload).await;

        if response.status_code() != 201 {
            return Err(eyre!(
                "Create on {path} failed with status {}: {}",
                response.status_code(),
                response.text()
            ));
        }

        Ok(response.json())
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        signing_key: Some(SIGNING_KEY.to_string()),
        ..ServerConfig::default()
    }
}
