use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use storeroom_api::ServerConfig;

/// Environment variable naming a JSON file to load the harness configuration from.
pub const CONFIG_PATH_VAR: &str = "STOREROOM_HARNESS_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Path of the client-credentials token endpoint
    pub token_endpoint: String,

    /// Token lifetime of provisioned API clients (in seconds)
    pub default_lifetime: u64,

    /// Prefix of generated client ids and names
    pub client_name_prefix: String,

    /// Headers sent with every request
    pub default_headers: BTreeMap<String, String>,

    /// Reuse bearer tokens per scope set instead of exchanging credentials on every request
    pub cache_tokens: bool,

    /// Install a `tracing` subscriber writing to the test output
    pub init_tracing: bool,

    /// Configuration of the booted kernel
    pub server: ServerConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let mut default_headers = BTreeMap::new();
        default_headers.insert("accept".to_string(), "application/json".to_string());

        Self {
            token_endpoint: "/access_token".to_string(),
            default_lifetime: 10_000,
            client_name_prefix: "test-client".to_string(),
            default_headers,
            cache_tokens: false,
            init_tracing: false,
            server: ServerConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read harness config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Failed to parse harness config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file named by `STOREROOM_HARNESS_CONFIG` when set, then applies
    /// `STOREROOM_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or an override is invalid.
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.apply_overrides(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or the result fails validation.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(lifetime) = lookup("STOREROOM_CLIENT_LIFETIME") {
            self.default_lifetime = lifetime
                .parse()
                .wrap_err("STOREROOM_CLIENT_LIFETIME must be a number of seconds")?;
        }
        if let Some(flag) = lookup("STOREROOM_CACHE_TOKENS") {
            self.cache_tokens = parse_flag(&flag)?;
        }
        if let Some(flag) = lookup("STOREROOM_TEST_TRACING") {
            self.init_tracing = parse_flag(&flag)?;
        }

        self.server = self.server.apply_overrides(&lookup)?;
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error for a relative token endpoint or a zero client lifetime.
    pub fn validate(&self) -> Result<()> {
        if !self.token_endpoint.starts_with('/') {
            return Err(eyre!("token_endpoint must be an absolute path"));
        }
        if self.default_lifetime == 0 {
            return Err(eyre!("default_lifetime must be greater than zero"));
        }
        self.server.validate()
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(eyre!("Expected a boolean flag, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.token_endpoint, "/access_token");
        assert_eq!(config.default_lifetime, 10_000);
        assert!(!config.cache_tokens);
        assert_eq!(
            config.default_headers.get("accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STOREROOM_CLIENT_LIFETIME", "60"),
            ("STOREROOM_CACHE_TOKENS", "yes"),
            ("STOREROOM_LOCALES", "fr-FR"),
        ]
        .into_iter()
        .collect();

        let config = HarnessConfig::default()
            .apply_overrides(|key| vars.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.default_lifetime, 60);
        assert!(config.cache_tokens);
        assert_eq!(config.server.default_locale(), "fr-FR");
    }

    #[test]
    fn test_invalid_flag_rejected() {
        let result = HarnessConfig::default().apply_overrides(|key| {
            (key == "STOREROOM_CACHE_TOKENS").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cache_tokens": true, "server": {{ "default_page_limit": 10 }} }}"#).unwrap();

        let config = HarnessConfig::load(file.path()).unwrap();
        assert!(config.cache_tokens);
        assert_eq!(config.server.default_page_limit, 10);
        assert_eq!(config.token_endpoint, "/access_token");
    }
}
