mod error;
mod pool;
mod retry;

pub use error::{FetchError, FetchResult};
pub use pool::{run_all, SegmentOutcome};
pub use retry::RetryPolicy;

pub(crate) use retry::run_with_retry;

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::config::DownloadSection;

/// One fetchable chunk of a playlist-based stream: its 0-based position in
/// the playlist and the resolved source URL. Never persisted; segments live
/// only within the pipeline run that enumerated them.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub url: String,
}

#[derive(Clone)]
pub struct SegmentFetcher {
    client: Client,
    referer: Option<String>,
}

impl SegmentFetcher {
    pub fn new(section: &DownloadSection) -> FetchResult<Self> {
        let client = Client::builder()
            .user_agent("vodfetch/0.1")
            .build()
            .map_err(|err| FetchError::Network {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            referer: section.referer.clone(),
        })
    }

    /// Fetch a small text body (playlists). No retry here; resolution
    /// failures are permanent at the job level.
    pub async fn fetch_text(&self, url: &str) -> FetchResult<String> {
        if let Some(path) = local_path(url) {
            return fs::read_to_string(&path)
                .await
                .map_err(|source| FetchError::Io { path, source });
        }
        let response = self
            .request(url, None)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| FetchError::from_reqwest(err, url))?;
        response
            .text()
            .await
            .map_err(|err| FetchError::from_reqwest(err, url))
    }

    /// Stream `url` into `path` under the retry policy. Segment fetches are
    /// not time-bounded beyond the per-attempt retry limits.
    pub async fn fetch_to_file(
        &self,
        url: &str,
        path: &Path,
        policy: &RetryPolicy,
    ) -> FetchResult<u64> {
        run_with_retry(policy, |_| self.attempt(url, path, None)).await
    }

    /// Single-file variant: every attempt carries a fixed request timeout.
    pub async fn fetch_to_file_with_timeout(
        &self,
        url: &str,
        path: &Path,
        policy: &RetryPolicy,
        timeout: Duration,
    ) -> FetchResult<u64> {
        run_with_retry(policy, |_| self.attempt(url, path, Some(timeout))).await
    }

    async fn attempt(&self, url: &str, path: &Path, timeout: Option<Duration>) -> FetchResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        if let Some(source_path) = local_path(url) {
            return fs::copy(&source_path, path)
                .await
                .map_err(|source| FetchError::Io {
                    path: source_path,
                    source,
                });
        }

        let response = self
            .request(url, timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| FetchError::from_reqwest(err, url))?;

        // Recreated every attempt, so a failed attempt never leaves bytes
        // behind for the next one to interleave with.
        let mut file = fs::File::create(path)
            .await
            .map_err(|source| FetchError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let data = chunk.map_err(|err| FetchError::from_reqwest(err, url))?;
            file.write_all(&data)
                .await
                .map_err(|source| FetchError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            written += data.len() as u64;
        }
        file.flush().await.map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(written)
    }

    fn request(&self, url: &str, timeout: Option<Duration>) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(url);
        if let Some(referer) = &self.referer {
            builder = builder.header("Referer", referer);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn local_path(url: &str) -> Option<std::path::PathBuf> {
    let parsed = Url::parse(url).ok()?;
    if parsed.scheme() == "file" {
        parsed.to_file_path().ok()
    } else {
        None
    }
}
