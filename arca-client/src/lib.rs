//! Arca deposition client
//!
//! A type-safe HTTP client for the remote deposition/repository service.
//!
//! The service is hypermedia-style: every response embeds the action links
//! valid for the record's current state (update, publish, discard,
//! new-version, upload bucket). Apart from the two documented entry points
//! (draft creation and the public record endpoint used for publish
//! re-verification), every request URL comes from a link on a previous
//! response.
//!
//! # Example
//!
//! ```no_run
//! use arca_client::{DepositionApi, DepositionClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arca_client::ClientError> {
//!     let client = DepositionClient::new("https://repo.example", Some("token".into()));
//!
//!     let draft = client.create_draft(&json!({"title": "Survey data"})).await?;
//!     println!("Created draft: {}", draft.id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod files;
mod records;

// Re-export commonly used types
pub use error::{ClientError, Result};

use arca_core::dto::deposition::{DepositionFile, DepositionRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Operations the record lifecycle needs from the deposition service
///
/// The lifecycle manager is written against this trait so tests can drive it
/// with an in-process fake, and so cross-cutting concerns (rate limiting) can
/// wrap the real client.
#[async_trait]
pub trait DepositionApi: Send + Sync {
    /// Create a new draft deposition with the given metadata
    async fn create_draft(&self, metadata: &serde_json::Value) -> Result<DepositionRecord>;

    /// Replace a draft's metadata via its update link
    async fn update_draft(
        &self,
        link: &str,
        metadata: &serde_json::Value,
    ) -> Result<DepositionRecord>;

    /// Publish a draft via its publish link
    async fn publish(&self, link: &str) -> Result<DepositionRecord>;

    /// Discard a draft via its discard link
    async fn discard(&self, link: &str) -> Result<()>;

    /// Create a new draft version of a published record via its new-version
    /// link, returning the new draft shell
    async fn new_version(&self, link: &str) -> Result<DepositionRecord>;

    /// Read the public record endpoint for a record id
    ///
    /// This is the read-only fetch used for publish re-verification.
    async fn fetch_record(&self, record_id: &str) -> Result<DepositionRecord>;

    /// List the files currently attached to a draft via its files link
    async fn list_files(&self, link: &str) -> Result<Vec<DepositionFile>>;

    /// Upload a local file into a draft's bucket under the given name
    async fn upload_file(
        &self,
        bucket_link: &str,
        name: &str,
        path: &Path,
    ) -> Result<DepositionFile>;

    /// Delete a file from a draft via the file's self link
    async fn delete_file(&self, link: &str) -> Result<()>;
}

/// HTTP client for the deposition service
#[derive(Debug, Clone)]
pub struct DepositionClient {
    /// Base URL of the service (e.g., "https://repo.example")
    base_url: String,
    /// Bearer token, sent with every request when present
    token: Option<String>,
    /// HTTP client instance
    client: Client,
}

impl DepositionClient {
    /// Create a new deposition client
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    /// Create a client with a custom reqwest client (timeouts, proxies, TLS)
    pub fn with_client(
        base_url: impl Into<String>,
        token: Option<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attaches the bearer token to a request when configured
    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}
