use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the sandbox API binds to
    pub bind_address: String,

    /// Token lifetime for clients created without one (in seconds)
    pub default_token_lifetime: u64,

    /// Page size used when a list request has no `limit`
    pub default_page_limit: usize,

    /// Largest accepted `limit`
    pub max_page_limit: usize,

    /// Maximum request body size (in bytes)
    pub max_body_bytes: usize,

    /// Locales accepted in localized fields. The first one is the default language.
    pub locales: Vec<String>,

    /// HS256 key used to sign access tokens, generated at startup when absent
    pub signing_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            default_token_lifetime: 3600,
            default_page_limit: 50,
            max_page_limit: 500,
            max_body_bytes: 4 * 1024 * 1024,
            locales: vec!["en-US".to_string(), "fr-FR".to_string()],
            signing_key: None,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("storeroom")
            .join("server.json")
    }

    /// Reads a JSON configuration file. Missing keys fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read server config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("Failed to parse server config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `STOREROOM_*` environment variables on top of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric variable cannot be parsed or the result fails validation.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns an error if a numeric value cannot be parsed or the result fails validation.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("STOREROOM_BIND") {
            self.bind_address = bind;
        }
        if let Some(lifetime) = lookup("STOREROOM_TOKEN_LIFETIME") {
            self.default_token_lifetime = lifetime
                .parse()
                .wrap_err("STOREROOM_TOKEN_LIFETIME must be a number of seconds")?;
        }
        if let Some(limit) = lookup("STOREROOM_PAGE_LIMIT") {
            self.default_page_limit = limit.parse().wrap_err("STOREROOM_PAGE_LIMIT must be a number")?;
        }
        if let Some(locales) = lookup("STOREROOM_LOCALES") {
            self.locales = locales
                .split(',')
                .map(str::trim)
                .filter(|locale| !locale.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(key) = lookup("STOREROOM_SIGNING_KEY") {
            self.signing_key = Some(key);
        }

        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns an error if no locale is configured or the page limits are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.locales.is_empty() {
            return Err(eyre!("At least one locale must be configured"));
        }
        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(eyre!(
                "default_page_limit must be between 1 and max_page_limit ({})",
                self.max_page_limit
            ));
        }
        if self.signing_key.as_deref().is_some_and(str::is_empty) {
            return Err(eyre!("signing_key cannot be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn default_locale(&self) -> &str {
        self.locales.first().map_or("en-US", String::as_str)
    }
}
