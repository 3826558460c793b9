use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Where schedule documents come from.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, SourceError>> + Send;
}

/// `http(s)` URLs via reqwest, anything else as a local path.
pub struct HttpSource {
    client: reqwest::Client,
    download_dir: Option<PathBuf>,
}

impl HttpSource {
    pub fn new(download_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_dir,
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        let request_err = |source| SourceError::Request {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(request_err)?;
        Ok(bytes.to_vec())
    }

    async fn keep_copy(&self, url: &str, bytes: &[u8]) -> Result<(), SourceError> {
        let Some(dir) = &self.download_dir else {
            return Ok(());
        };
        let path = dir.join(file_name(url));
        let io_err = |source| SourceError::Io {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

impl DocumentSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        if !is_remote(url) {
            debug!("Reading local document {}", url);
            return tokio::fs::read(url).await.map_err(|source| SourceError::Io {
                path: url.to_string(),
                source,
            });
        }

        debug!("Fetching {}", url);
        let bytes = self.get(url).await?;
        self.keep_copy(url, &bytes).await?;
        Ok(bytes)
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Last path segment of a URL, e.g. `erode.pdf`.
pub fn file_name(url: &str) -> &str {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("document.pdf")
}
