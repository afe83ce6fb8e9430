//! Media download for actions that need a local file (welcome posters).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Fetch a remote image into a local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_image(&self, url: &str) -> anyhow::Result<PathBuf>;
}

/// Downloads over HTTP into a directory (the system temp dir by default).
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    dir: PathBuf,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_dir(std::env::temp_dir(), timeout)
    }

    pub fn with_dir(dir: impl Into<PathBuf>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            dir: dir.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        self.dir.join(format!("{}.png", Uuid::new_v4()))
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch_image(&self, url: &str) -> anyhow::Result<PathBuf> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        let path = self.next_path();
        tokio::fs::write(&path, &bytes).await?;
        tracing::debug!(url = %url, path = %path.display(), size = bytes.len(), "Image downloaded");
        Ok(path)
    }
}
