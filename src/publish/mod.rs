// src/publish/mod.rs

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, RequestBuilder, StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use url::Url;

use crate::error::DashboardError;
use crate::load::Table;

pub const GITHUB_API: &str = "https://api.github.com/";

/// Destination file in a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinate {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
}

impl RepoCoordinate {
    pub fn blob_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/blob/{}/{}",
            self.owner, self.repo, self.branch, self.path
        )
    }
}

/// Body of the contents-API PUT.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PutContents<'a> {
    pub message: &'a str,
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

impl<'a> PutContents<'a> {
    pub fn new(message: &'a str, bytes: &[u8], branch: &'a str, sha: Option<String>) -> Self {
        Self {
            message,
            content: STANDARD.encode(bytes),
            branch,
            sha,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExistingFile {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: Option<PutResponseContent>,
}

#[derive(Debug, Deserialize)]
struct PutResponseContent {
    html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// `true` when the file did not exist before
    pub created: bool,
    pub html_url: String,
}

/// Pushes tables to a repository through the GitHub contents API.
pub struct Publisher {
    client: Client,
    api_base: Url,
    token: Option<String>,
}

impl Publisher {
    pub fn new(client: Client, token: Option<String>) -> Result<Self> {
        Ok(Self {
            client,
            api_base: Url::parse(GITHUB_API)?,
            token,
        })
    }

    /// Point at another API root, e.g. an Enterprise host.
    pub fn with_api_base(mut self, base: &str) -> Result<Self> {
        let mut url = Url::parse(base).with_context(|| format!("parsing API base {}", base))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.api_base = url;
        Ok(self)
    }

    pub fn contents_url(&self, coord: &RepoCoordinate) -> Result<Url> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("API base cannot be a base URL"))?;
            segments.pop_if_empty();
            segments.extend(["repos", coord.owner.as_str(), coord.repo.as_str(), "contents"]);
            segments.extend(coord.path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn token(&self) -> Result<&str> {
        match self.token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(DashboardError::AuthenticationMissing.into()),
        }
    }

    fn authed(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header(AUTHORIZATION, format!("token {}", token))
            .header(ACCEPT, "application/vnd.github.v3+json")
            .header(USER_AGENT, concat!("wcsb-dashboard/", env!("CARGO_PKG_VERSION")))
    }

    /// The current blob sha of the destination, `None` if it doesn't exist.
    async fn existing_sha(
        &self,
        url: &Url,
        coord: &RepoCoordinate,
        token: &str,
    ) -> Result<Option<String>> {
        let resp = self
            .authed(self.client.get(url.clone()), token)
            .query(&[("ref", coord.branch.as_str())])
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        match resp.status() {
            StatusCode::OK => {
                let file: ExistingFile = resp.json().await.context("decoding contents response")?;
                Ok(Some(file.sha))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = resp
                    .text()
                    .await
                    .with_context(|| format!("reading GET {} response body", status))?;
                Err(DashboardError::RemoteRejected {
                    status: status.as_u16(),
                    body,
                }
                .into())
            }
        }
    }

    /// Create or overwrite `coord` with `table` serialised as CSV. Never retried.
    #[instrument(level = "info", skip(self, table), fields(repo = %format!("{}/{}", coord.owner, coord.repo), path = %coord.path))]
    pub async fn publish(
        &self,
        table: &Table,
        coord: &RepoCoordinate,
        message: &str,
    ) -> Result<PublishOutcome> {
        let token = self.token()?;
        let csv = table.to_csv()?;
        let url = self.contents_url(coord)?;

        let sha = self.existing_sha(&url, coord, token).await?;
        let created = sha.is_none();
        let payload = PutContents::new(message, &csv, &coord.branch, sha);

        let resp = self
            .authed(self.client.put(url.clone()), token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("PUT {}", url))?;
        let status = resp.status();
        let body = resp.text().await.context("reading PUT response")?;
        if !(status == StatusCode::OK || status == StatusCode::CREATED) {
            error!(status = status.as_u16(), "push rejected");
            return Err(DashboardError::RemoteRejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let html_url = serde_json::from_str::<PutResponse>(&body)
            .ok()
            .and_then(|r| r.content)
            .and_then(|c| c.html_url)
            .unwrap_or_else(|| coord.blob_url());
        info!(rows = table.len(), created, url = %html_url, "file pushed");
        Ok(PublishOutcome { created, html_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn coord() -> RepoCoordinate {
        RepoCoordinate {
            owner: "someone".into(),
            repo: "WCSB_Supply_Demand".into(),
            path: "clean_data/st53/st53_cleaned.csv".into(),
            branch: "main".into(),
        }
    }

    fn table() -> Table {
        let mut t = Table::new(vec!["Label".into(), "2024-01".into()]);
        t.push_row(vec!["Fuel".into(), "12".into()]);
        t
    }

    fn reply(status: u16, body: &str) -> String {
        format!(
            "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    async fn mock_server(
        responses: Vec<(u16, &'static str)>,
    ) -> Result<(String, Arc<Mutex<Vec<String>>>)> {
        mock_raw(responses.into_iter().map(|(s, b)| reply(s, b)).collect()).await
    }

    /// Serve one raw reply per connection, recording each request.
    async fn mock_raw(replies: Vec<String>) -> Result<(String, Arc<Mutex<Vec<String>>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            for reply in replies {
                let Ok((mut sock, _)) = listener.accept().await else { return };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    let n = sock.read(&mut chunk).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    let text = String::from_utf8_lossy(&buf).to_string();
                    if let Some(end) = text.find("\r\n\r\n") {
                        let len = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if buf.len() >= end + 4 + len {
                            break;
                        }
                    }
                }
                log.lock().unwrap().push(String::from_utf8_lossy(&buf).to_string());
                let _ = sock.write_all(reply.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        Ok((format!("http://{}/", addr), seen))
    }

    #[test]
    fn contents_url_keeps_path_segments() -> Result<()> {
        let p = Publisher::new(Client::new(), None)?;
        assert_eq!(
            p.contents_url(&coord())?.as_str(),
            "https://api.github.com/repos/someone/WCSB_Supply_Demand/contents/clean_data/st53/st53_cleaned.csv"
        );
        let p = p.with_api_base("https://ghe.example.com/api/v3")?;
        assert!(p
            .contents_url(&coord())?
            .as_str()
            .starts_with("https://ghe.example.com/api/v3/repos/someone/"));
        Ok(())
    }

    #[test]
    fn payload_is_base64_csv_and_omits_missing_sha() -> Result<()> {
        let csv = table().to_csv()?;
        let body = serde_json::to_value(PutContents::new("upload", &csv, "main", None))?;
        assert_eq!(body["content"], "TGFiZWwsMjAyNC0wMQpGdWVsLDEyCg==");
        assert_eq!(body["branch"], "main");
        assert!(body.get("sha").is_none());

        let body = serde_json::to_value(PutContents::new("upload", &csv, "main", Some("abc".into())))?;
        assert_eq!(body["sha"], "abc");
        Ok(())
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() -> Result<()> {
        for token in [None, Some("   ".to_string())] {
            let p = Publisher::new(Client::new(), token)?.with_api_base("http://127.0.0.1:9/")?;
            let err = p.publish(&table(), &coord(), "msg").await.unwrap_err();
            assert_eq!(
                err.downcast_ref::<DashboardError>(),
                Some(&DashboardError::AuthenticationMissing)
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn overwrite_sends_existing_sha() -> Result<()> {
        let (base, seen) = mock_server(vec![
            (200, r#"{"sha":"deadbeef"}"#),
            (200, r#"{"content":{"html_url":"https://github.com/x/y/blob/main/z.csv"}}"#),
        ])
        .await?;
        let p = Publisher::new(Client::new(), Some("t0k".into()))?.with_api_base(&base)?;
        let out = p.publish(&table(), &coord(), "refresh").await?;
        assert!(!out.created);
        assert_eq!(out.html_url, "https://github.com/x/y/blob/main/z.csv");

        let seen = seen.lock().unwrap();
        assert!(seen[0].starts_with("GET /repos/someone/WCSB_Supply_Demand/contents/clean_data/st53/st53_cleaned.csv?ref=main"));
        assert!(seen[0].to_lowercase().contains("authorization: token t0k"));
        assert!(seen[1].starts_with("PUT "));
        assert!(seen[1].contains(r#""sha":"deadbeef""#));
        Ok(())
    }

    #[tokio::test]
    async fn new_file_is_created_without_sha() -> Result<()> {
        let (base, seen) = mock_server(vec![
            (404, r#"{"message":"Not Found"}"#),
            (201, r#"{"content":{}}"#),
        ])
        .await?;
        let p = Publisher::new(Client::new(), Some("t0k".into()))?.with_api_base(&base)?;
        let out = p.publish(&table(), &coord(), "first").await?;
        assert!(out.created);
        assert_eq!(out.html_url, coord().blob_url());
        assert!(!seen.lock().unwrap()[1].contains("\"sha\""));
        Ok(())
    }

    #[tokio::test]
    async fn rejection_body_is_reported_verbatim() -> Result<()> {
        let body = r#"{"message":"Invalid request.\n\n\"sha\" wasn't supplied."}"#;
        let (base, _) = mock_server(vec![(404, "{}"), (422, body)]).await?;
        let p = Publisher::new(Client::new(), Some("t0k".into()))?.with_api_base(&base)?;
        let err = p.publish(&table(), &coord(), "x").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<DashboardError>(),
            Some(&DashboardError::RemoteRejected {
                status: 422,
                body: body.to_string()
            })
        );
        Ok(())
    }

    #[tokio::test]
    async fn lookup_rejection_keeps_body() -> Result<()> {
        let body = r#"{"message":"Bad credentials"}"#;
        let (base, seen) = mock_server(vec![(401, body)]).await?;
        let p = Publisher::new(Client::new(), Some("t0k".into()))?.with_api_base(&base)?;
        let err = p.publish(&table(), &coord(), "x").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<DashboardError>(),
            Some(&DashboardError::RemoteRejected {
                status: 401,
                body: body.to_string()
            })
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_rejection_body_is_an_error_not_an_empty_body() -> Result<()> {
        // promises 64 bytes, sends 7, then hangs up
        let truncated = "HTTP/1.1 500 X\r\ncontent-length: 64\r\nconnection: close\r\n\r\n{\"mess".to_string();
        let (base, _) = mock_raw(vec![truncated]).await?;
        let p = Publisher::new(Client::new(), Some("t0k".into()))?.with_api_base(&base)?;
        let err = p.publish(&table(), &coord(), "x").await.unwrap_err();
        assert!(err.downcast_ref::<DashboardError>().is_none());
        assert!(format!("{:#}", err).contains("reading GET 500"));
        Ok(())
    }
}
