use rand::distr::{Alphanumeric, SampleString};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::validation::Violation;

const SECRET_LENGTH: usize = 40;
const MAX_CLIENT_ID_LENGTH: usize = 255;

/// Command that registers a new API client.
#[derive(Debug, Clone)]
pub struct CreateApiClient {
    pub client_id: String,
    pub client_name: String,
    pub description: Option<String>,
    pub scopes: Vec<String>,
    /// Token lifetime in seconds, the registry default when `None`
    pub lifetime_seconds: Option<u64>,
    pub enabled: bool,
}

impl CreateApiClient {
    #[must_use]
    pub fn new(client_id: impl Into<String>, scopes: Vec<String>) -> Self {
        let client_id = client_id.into();
        Self {
            client_name: client_id.clone(),
            client_id,
            description: None,
            scopes,
            lifetime_seconds: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiClient {
    pub client_id: String,
    pub client_name: String,
    pub description: Option<String>,
    #[serde(skip)]
    secret_hash: Vec<u8>,
    pub scopes: BTreeSet<String>,
    pub lifetime_seconds: u64,
    pub enabled: bool,
}

impl ApiClient {
    fn secret_matches(&self, secret: &str) -> bool {
        hash_secret(secret) == self.secret_hash
    }

    #[must_use]
    pub fn grants(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}

/// In-memory registry of OAuth clients allowed to use the client-credentials grant.
#[derive(Debug, Clone)]
pub struct ApiClientRegistry {
    clients: Arc<RwLock<HashMap<String, ApiClient>>>,
    default_lifetime: u64,
}

impl ApiClientRegistry {
    #[must_use]
    pub fn new(default_lifetime: u64) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            default_lifetime,
        }
    }

    /// Registers a client and returns its generated secret. Only a hash of the secret is kept.
    ///
    /// # Errors
    ///
    /// - `ApiError::Validation` if the client id is blank, too long, or already registered
    /// - `ApiError::InternalError` if the registry lock is poisoned
    pub fn create(&self, command: CreateApiClient) -> ApiResult<String> {
        let client_id = command.client_id.trim().to_string();
        if client_id.is_empty() {
            return Err(ApiError::Validation(vec![Violation::new(
                "clientId",
                "This value should not be blank.",
            )]));
        }
        if client_id.chars().count() > MAX_CLIENT_ID_LENGTH {
            return Err(ApiError::Validation(vec![Violation::new(
                "clientId",
                format!("This value is too long. It should have {MAX_CLIENT_ID_LENGTH} characters or less."),
            )]));
        }

        let mut clients = self
            .clients
            .write()
            .map_err(|_| ApiError::InternalError("Client registry lock poisoned".to_string()))?;

        if clients.contains_key(&client_id) {
            return Err(ApiError::Validation(vec![Violation::new(
                "clientId",
                format!("Client id \"{client_id}\" is already used."),
            )]));
        }

        let secret = Alphanumeric.sample_string(&mut rand::rng(), SECRET_LENGTH);
        let client = ApiClient {
            client_id: client_id.clone(),
            client_name: command.client_name,
            description: command.description,
            secret_hash: hash_secret(&secret),
            scopes: command.scopes.into_iter().collect(),
            lifetime_seconds: command.lifetime_seconds.unwrap_or(self.default_lifetime),
            enabled: command.enabled,
        };

        debug!(client_id = %client_id, scopes = ?client.scopes, "registered api client");
        clients.insert(client_id, client);

        Ok(secret)
    }

    /// Checks client credentials for the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidClient` for an unknown or disabled client and for a wrong secret.
    pub fn authenticate(&self, client_id: &str, secret: &str) -> ApiResult<ApiClient> {
        let client = self.get(client_id).ok_or(ApiError::InvalidClient)?;

        if !client.enabled || !client.secret_matches(secret) {
            warn!(client_id, "rejected client credentials");
            return Err(ApiError::InvalidClient);
        }

        Ok(client)
    }

    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<ApiClient> {
        self.clients.read().ok()?.get(client_id).cloned()
    }

    /// A client is active while it is registered and enabled.
    #[must_use]
    pub fn is_active(&self, client_id: &str) -> bool {
        self.get(client_id).is_some_and(|client| client.enabled)
    }

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the client does not exist.
    pub fn set_enabled(&self, client_id: &str, enabled: bool) -> ApiResult<()> {
        let mut clients = self
            .clients
            .write()
            .map_err(|_| ApiError::InternalError("Client registry lock poisoned".to_string()))?;
        let client = clients
            .get_mut(client_id)
            .ok_or_else(|| ApiError::NotFound(format!("Api client {client_id} not found")))?;
        client.enabled = enabled;
        Ok(())
    }

    pub fn remove(&self, client_id: &str) -> bool {
        self.clients
            .write()
            .map(|mut clients| clients.remove(client_id).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut clients) = self.clients.write() {
            clients.clear();
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().map(|clients| clients.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn list(&self) -> Vec<ApiClient> {
        let mut clients: Vec<ApiClient> = self
            .clients
            .read()
            .map(|clients| clients.values().cloned().collect())
            .unwrap_or_default();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        clients
    }
}

fn hash_secret(secret: &str) -> Vec<u8> {
    Sha256::digest(secret.as_bytes()).to_vec()
}
