use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{AuthState, auth_middleware};
use crate::catalog::ResourceCatalog;
use crate::clients::ApiClientRegistry;
use crate::config::ServerConfig;
use crate::handlers;
use crate::store::ResourceStore;
use crate::validation::ValidationContext;

pub struct ApiServer {
    app: Router,
    listener: TcpListener,
    state: Arc<AppState>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub auth: AuthState,
    pub clients: ApiClientRegistry,
    pub catalog: Arc<ResourceCatalog>,
    pub store: ResourceStore,
}

impl AppState {
    /// # Errors
    ///
    /// Returns an error if the configuration or the catalog is invalid.
    pub fn new(config: ServerConfig, catalog: ResourceCatalog) -> color_eyre::Result<Self> {
        config.validate()?;
        catalog.validate()?;

        let store = ResourceStore::from_catalog(&catalog);
        Ok(Self {
            auth: AuthState::new(config.signing_key.as_deref()),
            clients: ApiClientRegistry::new(config.default_token_lifetime),
            catalog: Arc::new(catalog),
            store,
            config,
        })
    }

    #[must_use]
    pub fn validation(&self) -> ValidationContext<'_> {
        ValidationContext {
            catalog: &self.catalog,
            store: &self.store,
            locales: &self.config.locales,
        }
    }
}

impl ApiServer {
    /// # Errors
    /// This function will return an error if:
    /// - The TCP binding to the specified address fails.
    /// - The configuration or catalog is invalid.
    pub async fn new(config: ServerConfig, catalog: ResourceCatalog, bind_address: &str) -> color_eyre::Result<Self> {
        let state = Arc::new(AppState::new(config, catalog)?);
        let app = build_router(Arc::clone(&state))?;

        let listener = TcpListener::bind(bind_address).await?;
        info!("API server will bind to: {}", bind_address);

        Ok(Self { app, listener, state })
    }

    /// # Errors
    /// This function will return an error if:
    /// - Retrieving the local socket's address fails.
    /// - Axum fails to serve the application.
    pub async fn serve(self) -> color_eyre::Result<()> {
        let addr = self.listener.local_addr()?;
        info!("API server listening on http://{}", addr);
        if !addr.ip().is_loopback() {
            warn!("Sandbox API is reachable from other machines on {}", addr);
        }

        axum::serve(self.listener, self.app).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if getting the local address from the TCP listener fails.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

/// Builds the sandbox router: the token endpoint, a health check, and for every
/// catalog resource its collection, item and bulk-delete routes.
///
/// # Errors
///
/// Returns an error if there are any issues configuring the router or applying the middleware.
pub fn build_router(state: Arc<AppState>) -> color_eyre::Result<Router> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(Any);

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/access_token", post(handlers::access_token));

    for definition in state.catalog.iter() {
        let extension = Extension(Arc::clone(definition));

        let collection = if definition.multipart {
            get(handlers::list_resources).post(handlers::upload_attachment)
        } else {
            get(handlers::list_resources).post(handlers::create_resource)
        };

        app = app
            .route(&definition.collection, collection.layer(extension.clone()))
            .route(
                &definition.bulk_delete_path(),
                put(handlers::bulk_delete_resources).layer(extension.clone()),
            )
            .route(
                &definition.item_path(),
                get(handlers::get_resource)
                    .put(handlers::replace_resource)
                    .patch(handlers::patch_resource)
                    .delete(handlers::delete_resource)
                    .layer(extension),
            );
    }

    let app = app
        .layer(middleware::from_fn_with_state(Arc::clone(&state), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .with_state(state);

    Ok(app)
}
