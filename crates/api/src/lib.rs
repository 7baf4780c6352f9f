pub mod auth;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod listing;
pub mod models;
pub mod server;
pub mod store;
pub mod validation;

pub use auth::{AuthState, TokenClaims};
pub use catalog::{FieldKind, FieldRule, ResourceCatalog, ResourceDefinition};
pub use clients::{ApiClient, ApiClientRegistry, CreateApiClient};
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use models::{ListEnvelope, TokenResponse};
pub use server::{ApiServer, AppState, build_router};
pub use store::ResourceStore;
pub use validation::Violation;

use color_eyre::Result;

/// Initializes the sandbox API server with the default resource catalog.
///
/// # Arguments
///
/// * `config` - Server settings (page limits, locales, token lifetime, signing key).
/// * `bind_address` - A `&str` that specifies the address and port the server will bind to (e.g., "127.0.0.1:8080").
///
/// # Errors
///
/// This function may return an error if:
/// * The server fails to bind to the specified address and port.
/// * The configuration is invalid.
pub async fn init_api_server(config: ServerConfig, bind_address: &str) -> Result<ApiServer> {
    ApiServer::new(config, ResourceCatalog::default_catalog()?, bind_address).await
}
