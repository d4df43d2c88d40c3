// src/fetch/mod.rs

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::{fmt, path::PathBuf, time::Duration};
use tokio::{fs, time::sleep};
use tracing::{info, warn};
use url::Url;

const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Where a dataset's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Http(Url),
    File(PathBuf),
}

impl Source {
    /// `http(s)://` and `file://` locations are URLs; anything else is a path.
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(anyhow!("empty source location"));
        }
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Source::Http(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Source::File)
                .map_err(|_| anyhow!("bad file URL {}", location)),
            _ => Ok(Source::File(PathBuf::from(location))),
        }
    }

    /// Stable key for caching.
    pub fn identity(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Http(url) => write!(f, "{}", url),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Read the raw bytes behind `source`. HTTP fetches retry transient failures;
/// a non-success status is returned as an error straight away.
#[tracing::instrument(level = "info", skip(client), fields(source = %source))]
pub async fn fetch_bytes(client: &Client, source: &Source) -> Result<Vec<u8>> {
    let url = match source {
        Source::File(path) => {
            let bytes = fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            info!(bytes = bytes.len(), "read local source");
            return Ok(bytes);
        }
        Source::Http(url) => url,
    };

    let mut attempt = 0;
    loop {
        attempt += 1;
        let resp = client.get(url.clone()).send().await;
        match resp {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => {
                    info!(bytes = bytes.len(), attempt, "fetched");
                    return Ok(bytes.to_vec());
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(attempt, error = %e, "body read failed; retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(e) => return Err(e).with_context(|| format!("reading body from {}", url)),
            },
            Ok(resp) => return Err(anyhow!("HTTP error {} from {}", resp.status(), url)),
            Err(e) if attempt < MAX_RETRIES => {
                warn!(attempt, error = %e, "request failed; retrying");
                sleep(RETRY_DELAY).await;
            }
            Err(e) => return Err(e).with_context(|| format!("GET {}", url)),
        }
    }
}
