use color_eyre::Result;
use color_eyre::eyre::eyre;
use storeroom_api::AppState;
use tracing::debug;

/// Restores part of the kernel state to a known baseline between test cases.
pub trait Resetter: Send + Sync {
    fn name(&self) -> String;

    /// # Errors
    ///
    /// Returns an error if the baseline cannot be restored.
    fn reset(&self, state: &AppState) -> Result<()>;
}

/// Restores one catalog resource to its seed rows.
#[derive(Debug, Clone)]
pub struct ResourceResetter {
    resource: String,
}

impl ResourceResetter {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl Resetter for ResourceResetter {
    fn name(&self) -> String {
        format!("resource:{}", self.resource)
    }

    fn reset(&self, state: &AppState) -> Result<()> {
        let definition = state
            .catalog
            .get(&self.resource)
            .ok_or_else(|| eyre!("Cannot reset unknown resource {:?}", self.resource))?;
        state.store.reset(&definition)?;
        Ok(())
    }
}

/// Drops every registered API client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiClientResetter;

impl Resetter for ApiClientResetter {
    fn name(&self) -> String {
        "api_clients".to_string()
    }

    fn reset(&self, state: &AppState) -> Result<()> {
        let removed = state.clients.len();
        state.clients.clear();
        debug!(removed, "api clients reset");
        Ok(())
    }
}
