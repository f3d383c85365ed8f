//! File upload endpoints

use crate::DepositionClient;
use crate::error::Result;
use arca_core::dto::deposition::DepositionFile;
use std::path::Path;
use tracing::debug;

impl DepositionClient {
    /// Uploads a local file into a draft's bucket under the given name
    ///
    /// The bucket link comes from the draft's latest response; the filename
    /// is appended as a path segment per the bucket contract.
    pub(crate) async fn put_file(
        &self,
        bucket_link: &str,
        name: &str,
        path: &Path,
    ) -> Result<DepositionFile> {
        let url = format!("{}/{}", bucket_link.trim_end_matches('/'), name);
        debug!("Uploading {} to {}", path.display(), url);

        let bytes = tokio::fs::read(path).await?;
        let response = self
            .authorize(self.client.put(&url))
            .body(bytes)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Lists the files currently attached to a draft
    pub(crate) async fn fetch_file_list(&self, files_link: &str) -> Result<Vec<DepositionFile>> {
        debug!("Listing files via {}", files_link);

        let response = self.authorize(self.client.get(files_link)).send().await?;

        self.handle_response(response).await
    }
}
