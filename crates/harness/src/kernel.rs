use axum_test::TestServer;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::cell::RefCell;
use std::sync::Arc;
use storeroom_api::{AppState, ResourceCatalog, ServerConfig, build_router};
use tracing::info;

thread_local! {
    static CURRENT_KERNEL: RefCell<Option<Arc<AppState>>> = const { RefCell::new(None) };
}

/// A booted sandbox application served in-process through [`TestServer`].
///
/// Booting registers the state as the current kernel of the calling thread so that
/// helpers without access to the test case (resetters, fixtures) can reach it.
pub struct Kernel {
    state: Arc<AppState>,
    server: TestServer,
}

impl Kernel {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the test server cannot start.
    pub fn boot(config: ServerConfig) -> Result<Self> {
        Self::boot_with_catalog(config, ResourceCatalog::default_catalog()?)
    }

    /// # Errors
    ///
    /// Returns an error if the configuration or catalog is invalid, or the test server cannot start.
    pub fn boot_with_catalog(config: ServerConfig, catalog: ResourceCatalog) -> Result<Self> {
        let state = Arc::new(AppState::new(config, catalog)?);
        let router = build_router(Arc::clone(&state))?;
        let server = TestServer::new(router).map_err(|e| eyre!("Failed to start test server: {e}"))?;

        CURRENT_KERNEL.with(|current| *current.borrow_mut() = Some(Arc::clone(&state)));
        info!(resources = state.catalog.len(), "kernel booted");

        Ok(Self { state, server })
    }

    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    #[must_use]
    pub fn server(&self) -> &TestServer {
        &self.server
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        CURRENT_KERNEL.with(|current| {
            let mut current = current.borrow_mut();
            if current.as_ref().is_some_and(|state| Arc::ptr_eq(state, &self.state)) {
                *current = None;
            }
        });
    }
}

/// State of the kernel most recently booted on this thread, if it is still alive.
#[must_use]
pub fn current() -> Option<Arc<AppState>> {
    CURRENT_KERNEL.with(|current| current.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boot_registers_current_kernel() {
        assert!(current().is_none());

        let kernel = Kernel::boot(ServerConfig::default()).unwrap();
        let registered = current().unwrap();
        assert!(Arc::ptr_eq(&registered, kernel.state()));

        drop(kernel);
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn test_later_boot_replaces_current() {
        let first = Kernel::boot(ServerConfig::default()).unwrap();
        let second = Kernel::boot(ServerConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&current().unwrap(), second.state()));

        drop(first);
        assert!(Arc::ptr_eq(&current().unwrap(), second.state()));
    }
}
