// src/fetch/mod.rs

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};
use url::Url;

use crate::error::FetchError;

pub mod zips;

/// Somewhere a missing dataset can be fetched from.
#[async_trait]
pub trait DatasetSource {
    /// Fetch the archive at `url` and unpack its CSV files into `dest_dir`.
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError>;
}

/// Downloads a zip archive over HTTP and extracts its `.csv` members.
#[derive(Clone, Default)]
pub struct HttpZipSource {
    client: Client,
}

impl HttpZipSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatasetSource for HttpZipSource {
    #[instrument(level = "info", skip(self, url, dest_dir), fields(url = %url, dest = %dest_dir.display()))]
    async fn fetch(&self, url: &Url, dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        tokio::fs::create_dir_all(dest_dir).await.map_err(|source| FetchError::Io {
            path: dest_dir.to_path_buf(),
            source,
        })?;

        let bytes = zips::download_zip(&self.client, url.as_str()).await?;
        // zip entries borrow the archive and are not Send, so unpacking stays synchronous
        let written = zips::extract_csv_entries(&bytes, dest_dir)?;
        info!(files = written.len(), "dataset extracted");
        Ok(written)
    }
}
