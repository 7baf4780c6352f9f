//! The `ApiTestCase` harness.
//!
//! A test case owns a booted [`Kernel`], the resetters restoring its baseline and
//! the API clients provisioned for it. Every request helper obtains a bearer
//! token for the scopes it is given, sends the request and checks the status:
//!
//! ```no_run
//! # async fn example() -> color_eyre::Result<()> {
//! use serde_json::json;
//! use storeroom_harness::{ApiTestCase, HarnessConfig};
//!
//! let mut case = ApiTestCase::builder(HarnessConfig::default())
//!     .reset_resources(&["zones"])
//!     .api_client(&["zone_read", "zone_write"])
//!     .set_up()?;
//!
//! let zone = case.create_item("/zones", json!({ "name": "Antarctica" }), &["zone_write"]).await?;
//! let id = zone["zoneId"].as_u64().unwrap_or_default();
//! case.delete_item(&format!("/zones/{id}"), &["zone_write"]).await?;
//! case.tear_down()?;
//! # Ok(())
//! # }
//! ```

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde_json::{Value, json};
use std::sync::{Arc, Once};
use storeroom_api::{AppState, CreateApiClient, ResourceCatalog, TokenResponse};
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{ApiClientCredentials, ClientCache, ScopeSet};
use crate::config::HarnessConfig;
use crate::kernel::Kernel;
use crate::listing::{ListQuery, PaginatedList};
use crate::request::{RequestBody, RequestOptions, parse_headers};
use crate::resetter::{ApiClientResetter, Resetter, ResourceResetter};

static TRACING_INIT: Once = Once::new();

fn init_test_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct ApiTestCaseBuilder {
    config: HarnessConfig,
    catalog: Option<ResourceCatalog>,
    resetters: Vec<Box<dyn Resetter>>,
    client: Option<(ScopeSet, Option<u64>)>,
}

impl ApiTestCaseBuilder {
    /// Serves `catalog` instead of the default one.
    #[must_use]
    pub fn catalog(mut self, catalog: ResourceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn resetter(mut self, resetter: impl Resetter + 'static) -> Self {
        self.resetters.push(Box::new(resetter));
        self
    }

    /// Adds a [`ResourceResetter`] for each named resource.
    #[must_use]
    pub fn reset_resources(mut self, resources: &[&str]) -> Self {
        for resource in resources {
            self.resetters.push(Box::new(ResourceResetter::new(*resource)));
        }
        self
    }

    /// Pre-provisions an API client granted `scopes` during `set_up`.
    #[must_use]
    pub fn api_client(mut self, scopes: &[&str]) -> Self {
        self.client = Some((ScopeSet::from(scopes), None));
        self
    }

    #[must_use]
    pub fn api_client_with_lifetime(mut self, scopes: &[&str], lifetime: u64) -> Self {
        self.client = Some((ScopeSet::from(scopes), Some(lifetime)));
        self
    }

    /// Boots the kernel, runs the resetters and provisions the declared API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the kernel fails to boot,
    /// a resetter fails, or the API client cannot be created.
    pub fn set_up(self) -> Result<ApiTestCase> {
        self.config.validate()?;
        if self.config.init_tracing {
            init_test_tracing();
        }

        let kernel = match self.catalog {
            Some(catalog) => Kernel::boot_with_catalog(self.config.server.clone(), catalog)?,
            None => Kernel::boot(self.config.server.clone())?,
        };
        let default_headers = parse_headers(&self.config.default_headers)?;

        let mut case = ApiTestCase {
            config: self.config,
            kernel,
            resetters: self.resetters,
            clients: ClientCache::new(),
            default_headers,
        };
        case.run_resetters()?;

        if let Some((scopes, lifetime)) = self.client {
            case.provision_client(scopes, lifetime)?;
        }

        info!(resetters = case.resetters.len(), clients = case.clients.len(), "test case set up");
        Ok(case)
    }
}

pub struct ApiTestCase {
    config: HarnessConfig,
    kernel: Kernel,
    resetters: Vec<Box<dyn Resetter>>,
    clients: ClientCache,
    default_headers: Vec<(HeaderName, HeaderValue)>,
}

impl ApiTestCase {
    #[must_use]
    pub fn builder(config: HarnessConfig) -> ApiTestCaseBuilder {
        ApiTestCaseBuilder {
            config,
            catalog: None,
            resetters: Vec::new(),
            client: None,
        }
    }

    /// A test case with the default configuration and no resetters.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel fails to boot.
    pub fn set_up() -> Result<Self> {
        Self::builder(HarnessConfig::default()).set_up()
    }

    /// Restores the baseline and drops every API client.
    ///
    /// # Errors
    ///
    /// Returns an error if a resetter fails.
    pub fn tear_down(mut self) -> Result<()> {
        self.run_resetters()?;
        ApiClientResetter.reset(self.kernel.state())?;
        self.clients.clear();
        debug!("test case torn down");
        Ok(())
    }

    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        self.kernel.state()
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub fn clients(&self) -> &ClientCache {
        &self.clients
    }

    fn run_resetters(&self) -> Result<()> {
        for resetter in &self.resetters {
            resetter
                .reset(self.kernel.state())
                .wrap_err_with(|| format!("Resetter {} failed", resetter.name()))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clients and tokens
    // ------------------------------------------------------------------

    /// Registers an API client granted `scopes` and caches its secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel refuses to create the client.
    pub fn create_api_client(&mut self, scopes: &[&str], lifetime: Option<u64>) -> Result<ApiClientCredentials> {
        self.provision_client(ScopeSet::from(scopes), lifetime)
    }

    fn provision_client(&mut self, scopes: ScopeSet, lifetime: Option<u64>) -> Result<ApiClientCredentials> {
        let lifetime = lifetime.unwrap_or(self.config.default_lifetime);
        let client_id = format!("{}-{}", self.config.client_name_prefix, Uuid::new_v4().simple());

        let command = CreateApiClient {
            client_id: client_id.clone(),
            client_name: client_id.clone(),
            description: Some("Provisioned by ApiTestCase".to_string()),
            scopes: scopes.to_vec(),
            lifetime_seconds: Some(lifetime),
            enabled: true,
        };
        let secret = self
            .kernel
            .state()
            .clients
            .create(command)
            .wrap_err_with(|| format!("Failed to create API client for scopes [{scopes}]"))?;

        let credentials = ApiClientCredentials {
            client_name: client_id.clone(),
            client_id,
            secret,
            scopes,
            lifetime,
        };
        debug!(client_id = %credentials.client_id, scopes = %credentials.scopes, "provisioned api client");
        self.clients.insert(credentials.clone());

        Ok(credentials)
    }

    /// Exchanges client credentials for a bearer token carrying `scopes`.
    ///
    /// Reuses a cached client covering the scopes, or provisions one. Each call is
    /// a round trip to the token endpoint unless token caching is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint does not answer 200 with a token.
    pub async fn get_bearer_token(&mut self, scopes: &[&str]) -> Result<String> {
        let scopes = ScopeSet::from(scopes);

        if self.config.cache_tokens {
            if let Some(token) = self.clients.token(&scopes) {
                return Ok(token.to_string());
            }
        }

        let cached = self.clients.find_covering(&scopes).cloned();
        let credentials = match cached {
            Some(credentials) => credentials,
            None => self.provision_client(scopes.clone(), None)?,
        };

        let mut form = vec![
            ("client_id".to_string(), credentials.client_id.clone()),
            ("client_secret".to_string(), credentials.secret.clone()),
            ("grant_type".to_string(), "client_credentials".to_string()),
        ];
        form.extend(scopes.iter().map(|scope| ("scope[]".to_string(), scope.to_string())));

        let response = self
            .kernel
            .server()
            .post(&self.config.token_endpoint)
            .form(&form)
            .await;
        let status = response.status_code();
        if status != StatusCode::OK {
            return Err(eyre!(
                "Token request for [{scopes}] with client {} returned {status}: {}",
                credentials.client_id,
                response.text()
            ));
        }

        let token: TokenResponse =
            serde_json::from_str(&response.text()).wrap_err("Token endpoint returned an unexpected body")?;
        debug!(client_id = %credentials.client_id, %scopes, "obtained bearer token");

        if self.config.cache_tokens {
            self.clients.store_token(scopes, token.access_token.clone());
        }
        Ok(token.access_token)
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Sends an authenticated request and checks its status.
    ///
    /// Returns the decoded JSON body, or `None` when the body is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained, the status differs from
    /// `expected`, or a non-empty body is not JSON.
    pub async fn request_api(
        &mut self,
        method: Method,
        uri: &str,
        body: RequestBody,
        scopes: &[&str],
        expected: StatusCode,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        let token = self.get_bearer_token(scopes).await?;
        self.send(method, uri, body, Some(&token), expected, options).await
    }

    /// Sends a request without any bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn anonymous_request(
        &self,
        method: Method,
        uri: &str,
        body: RequestBody,
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.send(method, uri, body, None, expected, RequestOptions::default())
            .await
    }

    /// Sends a request with a caller-provided bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn request_with_token(
        &self,
        method: Method,
        uri: &str,
        body: RequestBody,
        token: &str,
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.send(method, uri, body, Some(token), expected, RequestOptions::default())
            .await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: RequestBody,
        token: Option<&str>,
        expected: StatusCode,
        options: RequestOptions,
    ) -> Result<Option<Value>> {
        let mut request = self.kernel.server().method(method.clone(), uri);
        for (name, value) in &self.default_headers {
            request = request.add_header(name.clone(), value.clone());
        }
        request = options.apply(request)?;
        if let Some(token) = token {
            request = request.authorization_bearer(token);
        }

        let response = body.apply(request).await;
        let status = response.status_code();
        let text = response.text();
        debug!(%method, uri, status = status.as_u16(), "api request");

        if status != expected {
            return Err(eyre!("{method} {uri} returned {status}, expected {expected}\n{text}"));
        }
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .wrap_err_with(|| format!("{method} {uri} returned a body that is not JSON"))
    }

    // ------------------------------------------------------------------
    // CRUD helpers
    // ------------------------------------------------------------------

    /// GET an item, expecting 200.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or an empty body.
    pub async fn get_item(&mut self, uri: &str, scopes: &[&str]) -> Result<Value> {
        let body = self.get_item_expecting(uri, scopes, StatusCode::OK).await?;
        require_body(&Method::GET, uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn get_item_expecting(&mut self, uri: &str, scopes: &[&str], expected: StatusCode) -> Result<Option<Value>> {
        self.request_api(Method::GET, uri, RequestBody::Empty, scopes, expected, RequestOptions::default())
            .await
    }

    /// POST a JSON payload or multipart form, expecting 201.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or an empty body.
    pub async fn create_item(&mut self, uri: &str, body: impl Into<RequestBody>, scopes: &[&str]) -> Result<Value> {
        let body = self
            .create_item_expecting(uri, body, scopes, StatusCode::CREATED)
            .await?;
        require_body(&Method::POST, uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn create_item_expecting(
        &mut self,
        uri: &str,
        body: impl Into<RequestBody>,
        scopes: &[&str],
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.request_api(Method::POST, uri, body.into(), scopes, expected, RequestOptions::default())
            .await
    }

    /// PUT a full payload, expecting 200.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or an empty body.
    pub async fn update_item(&mut self, uri: &str, payload: Value, scopes: &[&str]) -> Result<Value> {
        let body = self
            .update_item_expecting(uri, payload, scopes, StatusCode::OK)
            .await?;
        require_body(&Method::PUT, uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn update_item_expecting(
        &mut self,
        uri: &str,
        payload: Value,
        scopes: &[&str],
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.request_api(Method::PUT, uri, payload.into(), scopes, expected, RequestOptions::default())
            .await
    }

    /// PATCH some fields, expecting 200.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or an empty body.
    pub async fn partial_update_item(&mut self, uri: &str, payload: Value, scopes: &[&str]) -> Result<Value> {
        let body = self
            .partial_update_item_expecting(uri, payload, scopes, StatusCode::OK)
            .await?;
        require_body(&Method::PATCH, uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn partial_update_item_expecting(
        &mut self,
        uri: &str,
        payload: Value,
        scopes: &[&str],
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.request_api(Method::PATCH, uri, payload.into(), scopes, expected, RequestOptions::default())
            .await
    }

    /// DELETE an item, expecting 204 and no body.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or a non-empty body.
    pub async fn delete_item(&mut self, uri: &str, scopes: &[&str]) -> Result<()> {
        let body = self
            .delete_item_expecting(uri, scopes, StatusCode::NO_CONTENT)
            .await?;
        require_empty(&Method::DELETE, uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn delete_item_expecting(
        &mut self,
        uri: &str,
        scopes: &[&str],
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        self.request_api(Method::DELETE, uri, RequestBody::Empty, scopes, expected, RequestOptions::default())
            .await
    }

    /// PUT `{collection}/bulk-delete` with the given ids, expecting 204.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or a non-empty body.
    pub async fn bulk_delete_items(&mut self, collection: &str, ids: &[u64], scopes: &[&str]) -> Result<()> {
        let uri = bulk_delete_uri(collection);
        let body = self
            .bulk_delete_items_expecting(collection, ids, scopes, StatusCode::NO_CONTENT)
            .await?;
        require_empty(&Method::PUT, &uri, body)
    }

    /// # Errors
    ///
    /// Returns an error if the status differs from `expected`.
    pub async fn bulk_delete_items_expecting(
        &mut self,
        collection: &str,
        ids: &[u64],
        scopes: &[&str],
        expected: StatusCode,
    ) -> Result<Option<Value>> {
        let uri = bulk_delete_uri(collection);
        self.request_api(
            Method::PUT,
            &uri,
            json!({ "ids": ids }).into(),
            scopes,
            expected,
            RequestOptions::default(),
        )
        .await
    }

    /// GET a collection, expecting 200 and a complete list envelope.
    ///
    /// # Errors
    ///
    /// Returns an error on any other status or a body missing an envelope key.
    pub async fn list_items(&mut self, uri: &str, scopes: &[&str], query: &ListQuery) -> Result<PaginatedList> {
        let options = RequestOptions::new().queries(query.to_query_pairs());
        let body = self
            .request_api(Method::GET, uri, RequestBody::Empty, scopes, StatusCode::OK, options)
            .await?;
        PaginatedList::from_value(require_body(&Method::GET, uri, body)?)
    }

    /// `totalItems` of an unfiltered list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list request fails.
    pub async fn count_items(&mut self, uri: &str, scopes: &[&str]) -> Result<usize> {
        Ok(self.list_items(uri, scopes, &ListQuery::default()).await?.total_items)
    }
}

fn bulk_delete_uri(collection: &str) -> String {
    format!("{}/bulk-delete", collection.trim_end_matches('/'))
}

fn require_body(method: &Method, uri: &str, body: Option<Value>) -> Result<Value> {
    body.ok_or_else(|| eyre!("{method} {uri} returned an empty body"))
}

fn require_empty(method: &Method, uri: &str, body: Option<Value>) -> Result<()> {
    match body {
        None => Ok(()),
        Some(body) => Err(eyre!("{method} {uri} was expected to return no content, got {body}")),
    }
}
