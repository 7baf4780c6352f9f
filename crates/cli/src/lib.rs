mod api;
mod resources;

use crate::api::handle_serve_command;
use crate::resources::handle_resources_command;
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use storeroom_api::ServerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "storeroom",
    about = "An in-memory sandbox admin REST API for exercising authenticated API test suites",
    long_about = "Storeroom serves a catalog of admin resources (customers, customer groups, \
                  addresses, zones, taxes, suppliers, attachments) behind an OAuth2 \
                  client-credentials token endpoint with scoped bearer tokens.\n\n\
                  Quick start:\n\
                  1. storeroom serve --client demo=zone_read,zone_write\n\
                  2. curl -X POST http://127.0.0.1:8080/access_token \\\n     \
                  -d grant_type=client_credentials -d client_id=demo -d client_secret=SECRET -d 'scope[]=zone_read'\n\
                  3. curl -H 'Authorization: Bearer TOKEN' http://127.0.0.1:8080/zones"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the sandbox API server
    Serve {
        #[arg(short, long, help = "Address to bind the API server to (defaults to the configured one)")]
        bind: Option<String>,
        #[arg(short, long, help = "Port to bind the API server to")]
        port: Option<u16>,
        #[arg(short, long, help = "Path of a JSON server configuration file")]
        config: Option<PathBuf>,
        /// API client to register at start, as ID=SCOPE,SCOPE (repeatable)
        #[arg(long = "client", value_name = "ID=SCOPES")]
        clients: Vec<String>,
    },

    /// List the resources served by the sandbox API
    Resources {
        #[arg(short, long, help = "Path of a JSON server configuration file")]
        config: Option<PathBuf>,
    },
}

/// Handles the execution of a CLI command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a `--client` value is
/// malformed, or the server fails to start.
pub async fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Serve {
            bind,
            port,
            config,
            clients,
        } => {
            let config = load_config(config.as_deref())?;
            let clients = clients
                .iter()
                .map(String::as_str)
                .map(parse_client_spec)
                .collect::<Result<Vec<_>>>()?;
            handle_serve_command(config, bind, port, clients).await?;
        }
        Commands::Resources { config } => {
            let config = load_config(config.as_deref())?;
            handle_resources_command(&config)?;
        }
    }

    Ok(())
}

/// Explicit file, else the default config file when it exists, else defaults;
/// `STOREROOM_*` variables apply on top.
fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let config = match path {
        Some(path) => ServerConfig::load(path)?,
        None => {
            let default_path = ServerConfig::default_path();
            if default_path.exists() {
                ServerConfig::load(&default_path)?
            } else {
                ServerConfig::default()
            }
        }
    };
    config.with_env_overrides()
}

/// Parses `ID=SCOPE,SCOPE` into a client id and its scopes.
fn parse_client_spec(spec: &str) -> Result<(String, Vec<String>)> {
    let (id, scopes) = spec
        .split_once('=')
        .ok_or_else(|| eyre!("Invalid client {spec:?}: expected ID=SCOPE,SCOPE"))?;

    let id = id.trim();
    if id.is_empty() {
        return Err(eyre!("Invalid client {spec:?}: the client id is empty"));
    }

    let scopes = scopes
        .split(',')
        .map(str::trim)
        .filter(|scope| !scope.is_empty())
        .map(String::from)
        .collect();

    Ok((id.to_string(), scopes))
}

fn resolve_bind_address(configured: &str, bind: Option<String>, port: Option<u16>) -> String {
    let bind = bind.unwrap_or_else(|| configured.to_string());
    let Some(port) = port else {
        return bind;
    };

    if let Ok(addr) = bind.parse::<SocketAddr>() {
        return SocketAddr::new(addr.ip(), port).to_string();
    }
    if let Ok(ip) = bind.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }

    let host = bind.rsplit_once(':').map_or(bind.as_str(), |(host, _)| host);
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_clients() {
        let cli = Cli::parse_from([
            "storeroom",
            "serve",
            "--port",
            "9000",
            "--client",
            "shop=zone_read,zone_write",
            "--client",
            "reader=tax_read",
        ]);

        match cli.command {
            Commands::Serve { port, clients, .. } => {
                assert_eq!(port, Some(9000));
                assert_eq!(clients.len(), 2);
            }
            Commands::Resources { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_client_spec() {
        let (id, scopes) = parse_client_spec("shop= zone_read, zone_write ,").unwrap();
        assert_eq!(id, "shop");
        assert_eq!(scopes, vec!["zone_read", "zone_write"]);

        let (id, scopes) = parse_client_spec("empty=").unwrap();
        assert_eq!(id, "empty");
        assert!(scopes.is_empty());

        assert!(parse_client_spec("no-scopes").is_err());
        assert!(parse_client_spec("=zone_read").is_err());
    }

    #[test]
    fn test_resolve_bind_address() {
        assert_eq!(resolve_bind_address("127.0.0.1:8080", None, None), "127.0.0.1:8080");
        assert_eq!(resolve_bind_address("127.0.0.1:8080", None, Some(9000)), "127.0.0.1:9000");
        assert_eq!(
            resolve_bind_address("127.0.0.1:8080", Some("0.0.0.0".to_string()), Some(9000)),
            "0.0.0.0:9000"
        );
        assert_eq!(
            resolve_bind_address("127.0.0.1:8080", Some("localhost:3000".to_string()), None),
            "localhost:3000"
        );
        assert_eq!(
            resolve_bind_address("127.0.0.1:8080", Some("localhost:3000".to_string()), Some(9000)),
            "localhost:9000"
        );
    }

    #[test]
    fn test_resolve_ipv6_bind_address() {
        assert_eq!(
            resolve_bind_address("127.0.0.1:8080", Some("[::1]:8080".to_string()), Some(9000)),
            "[::1]:9000"
        );
        assert_eq!(resolve_bind_address("[::1]:8080", Some("::".to_string()), Some(9000)), "[::]:9000");
        assert_eq!(resolve_bind_address("[::1]:8080", None, None), "[::1]:8080");
    }

    #[test]
    fn test_load_explicit_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "bind_address": "127.0.0.1:9999", "default_page_limit": 20 }}"#).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9999");
        assert_eq!(config.default_page_limit, 20);
    }

    #[tokio::test]
    async fn test_resources_command_runs() {
        let cmd = Commands::Resources { config: None };
        assert!(handle_command(cmd).await.is_ok());
    }
}
