//! Record lifecycle API endpoints

use crate::error::Result;
use crate::{DepositionApi, DepositionClient};
use arca_core::dto::deposition::DepositionRecord;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

#[async_trait]
impl DepositionApi for DepositionClient {
    /// Create a new draft deposition
    ///
    /// This is one of the two fixed entry points; every subsequent action
    /// on the draft follows a link from its response.
    async fn create_draft(&self, metadata: &serde_json::Value) -> Result<DepositionRecord> {
        let url = format!("{}/api/deposit/depositions", self.base_url);
        debug!("Creating draft deposition");

        let body = json!({ "metadata": metadata });
        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Replace a draft's metadata via its update link
    async fn update_draft(
        &self,
        link: &str,
        metadata: &serde_json::Value,
    ) -> Result<DepositionRecord> {
        debug!("Updating draft via {}", link);

        let body = json!({ "metadata": metadata });
        let response = self.authorize(self.client.put(link)).json(&body).send().await?;

        self.handle_response(response).await
    }

    /// Publish a draft via its publish link
    async fn publish(&self, link: &str) -> Result<DepositionRecord> {
        debug!("Publishing via {}", link);

        let response = self.authorize(self.client.post(link)).send().await?;

        self.handle_response(response).await
    }

    /// Discard a draft via its discard link
    async fn discard(&self, link: &str) -> Result<()> {
        debug!("Discarding via {}", link);

        let response = self.authorize(self.client.post(link)).send().await?;

        self.handle_empty_response(response).await
    }

    /// Create a new draft version of a published record
    async fn new_version(&self, link: &str) -> Result<DepositionRecord> {
        debug!("Creating new version via {}", link);

        let response = self.authorize(self.client.post(link)).send().await?;

        self.handle_response(response).await
    }

    /// Read the public record endpoint for a record id
    async fn fetch_record(&self, record_id: &str) -> Result<DepositionRecord> {
        let url = format!("{}/api/records/{}", self.base_url, record_id);
        debug!("Fetching public record {}", record_id);

        let response = self.authorize(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }

    async fn list_files(
        &self,
        link: &str,
    ) -> Result<Vec<arca_core::dto::deposition::DepositionFile>> {
        self.fetch_file_list(link).await
    }

    async fn upload_file(
        &self,
        bucket_link: &str,
        name: &str,
        path: &std::path::Path,
    ) -> Result<arca_core::dto::deposition::DepositionFile> {
        self.put_file(bucket_link, name, path).await
    }

    /// Delete a file from a draft via the file's self link
    async fn delete_file(&self, link: &str) -> Result<()> {
        debug!("Deleting file via {}", link);

        let response = self.authorize(self.client.delete(link)).send().await?;

        self.handle_empty_response(response).await
    }
}
