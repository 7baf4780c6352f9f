//! Test harness for authenticated admin REST APIs.
//!
//! An [`ApiTestCase`] boots the sandbox kernel, provisions OAuth clients for the
//! scopes a test needs, exchanges their credentials for bearer tokens and drives
//! CRUD requests, failing with a descriptive error on any unexpected status.

pub mod case;
pub mod client;
pub mod config;
pub mod kernel;
pub mod listing;
pub mod request;
pub mod resetter;
pub mod violations;

pub use axum::http::{Method, StatusCode};
pub use axum_test::multipart::{MultipartForm, Part};
pub use case::{ApiTestCase, ApiTestCaseBuilder};
pub use client::{ApiClientCredentials, ClientCache, ScopeSet};
pub use config::HarnessConfig;
pub use kernel::Kernel;
pub use listing::{ListQuery, PaginatedList};
pub use request::{RequestBody, RequestOptions};
pub use resetter::{ApiClientResetter, Resetter, ResourceResetter};
pub use violations::{ExpectedViolation, assert_validation_errors, missing_violations, violations};
