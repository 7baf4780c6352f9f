use color_eyre::Result;
use std::sync::Once;
use storeroom_api::{CreateApiClient, ServerConfig, init_api_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::resolve_bind_address;

static TRACING_INIT: Once = Once::new();

pub async fn handle_serve_command(
    config: ServerConfig,
    bind: Option<String>,
    port: Option<u16>,
    clients: Vec<(String, Vec<String>)>,
) -> Result<()> {
    // Initialize tracing if not already done
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    });

    let bind_address = resolve_bind_address(&config.bind_address, bind, port);

    println!("🚀 Starting Storeroom sandbox API...");
    println!("📡 Binding to: {bind_address}");

    let api_server = init_api_server(config, &bind_address).await?;
    let addr = api_server.local_addr()?;

    println!("✅ Storeroom API running on http://{addr}");
    println!("📖 Health check: http://{addr}/health");
    println!("🔒 Token endpoint: http://{addr}/access_token");

    if !clients.is_empty() {
        println!();
        println!("Registered API clients:");
    }
    for (client_id, scopes) in clients {
        let command = CreateApiClient::new(&client_id, scopes.clone());
        let secret = api_server.state().clients.create(command)?;
        info!(client_id = %client_id, ?scopes, "pre-registered api client");
        println!("  {client_id}  secret={secret}  scopes={}", scopes.join(","));
    }

    println!();
    println!("Example usage:");
    println!("  # Exchange client credentials for a bearer token");
    println!("  curl -X POST http://{addr}/access_token \\");
    println!("    -d grant_type=client_credentials -d client_id=ID -d client_secret=SECRET \\");
    println!("    -d 'scope[]=zone_read'");
    println!();
    println!("  # List zones with the returned token");
    println!("  curl -H 'Authorization: Bearer YOUR_TOKEN' http://{addr}/zones");
    println!();
    println!("📋 Press Ctrl+C to stop the server");

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = api_server.serve() => {
            if let Err(e) = result {
                warn!("API server error: {}", e);
                return Err(e);
            }
        }
        () = shutdown_signal => {
            info!("Shutting down API server...");
            println!("👋 API server shutting down...");
        }
    }

    Ok(())
}
