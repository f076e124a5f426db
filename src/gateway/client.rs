//! HTTP endpoint: the gateway protocol as seen by the synchronizer.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, LAST_MODIFIED};
use reqwest::{Body, Client, Method, Response, StatusCode, Url};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::gateway::server::CHECKSUM_HEADER;
use crate::sync::{ContentStat, DirStat, Download, Endpoint, ResourcePath};

/// Gateway reachable at a base URL.
///
/// No request timeout is configured: a hung gateway holds the calling
/// worker until the connection fails.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: Client,
    base: Url,
}

impl HttpEndpoint {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| SyncError::Config(format!("invalid URL '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "'{}' is not an http(s) base URL",
                base_url
            )));
        }
        Ok(Self { client, base })
    }

    /// Base URL with the path segments appended, percent-encoded.
    /// Directory paths keep their trailing `/`.
    pub fn url_for(&self, path: &ResourcePath) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(path.segments());
            if path.is_dir() {
                segments.push("");
            }
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<Body>,
        last_modified: Option<&str>,
    ) -> Result<Response> {
        debug!("{} {}", method, url);
        let mut request = self.client.request(method, url.clone());
        if let Some(value) = last_modified {
            request = request.header(LAST_MODIFIED, value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request
            .send()
            .await
            .map_err(|e| SyncError::transport(url.as_str(), e))
    }

    fn expect_ok(method: &'static str, url: &Url, response: &Response) -> Result<()> {
        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(SyncError::Protocol {
                method,
                url: url.to_string(),
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    async fn stat_dir(&self, dir: &ResourcePath) -> Result<Option<DirStat>> {
        let url = self.url_for(dir);
        let response = self.send(Method::HEAD, &url, None, None).await?;
        if response.status() != StatusCode::OK {
            debug!("HEAD {}: status {}", url, response.status());
            return Ok(None);
        }
        Ok(Some(DirStat {
            last_modified: header_string(response.headers(), LAST_MODIFIED.as_str()),
        }))
    }

    async fn stat_content(&self, path: &ResourcePath) -> Result<Option<ContentStat>> {
        let url = self.url_for(path);
        let response = self.send(Method::HEAD, &url, None, None).await?;
        if response.status() != StatusCode::OK {
            debug!("HEAD {}: status {}", url, response.status());
            return Ok(None);
        }

        let headers = response.headers();
        let size = match header_string(headers, CONTENT_LENGTH.as_str()) {
            None => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| SyncError::Malformed {
                url: url.to_string(),
                reason: format!("bad Content-Length {:?}", raw),
            })?),
        };
        Ok(Some(ContentStat {
            last_modified: header_string(headers, LAST_MODIFIED.as_str()),
            size,
            checksum: header_string(headers, CHECKSUM_HEADER),
        }))
    }

    async fn list(&self, dir: &ResourcePath) -> Result<Vec<ResourcePath>> {
        let url = self.url_for(dir);
        let response = self.send(Method::GET, &url, None, None).await?;
        Self::expect_ok("GET", &url, &response)?;

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::transport(url.as_str(), e))?;
        parse_listing(dir, &body).map_err(|reason| SyncError::Malformed {
            url: url.to_string(),
            reason,
        })
    }

    async fn make_dir(&self, dir: &ResourcePath, recursive: bool) -> Result<()> {
        let mut url = self.url_for(dir);
        if recursive {
            url.set_query(Some("recursive"));
        }
        let response = self.send(Method::PUT, &url, Some(Body::from("")), None).await?;
        Self::expect_ok("PUT", &url, &response)
    }

    async fn download(&self, path: &ResourcePath, dest: &mut File) -> Result<Download> {
        let url = self.url_for(path);
        let mut response = self.send(Method::GET, &url, None, None).await?;
        Self::expect_ok("GET", &url, &response)?;

        let last_modified = header_string(response.headers(), LAST_MODIFIED.as_str());
        let mut bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SyncError::transport(url.as_str(), e))?
        {
            dest.write_all(&chunk)
                .await
                .map_err(|e| SyncError::io(format!("staging {}", path), e))?;
            bytes += chunk.len() as u64;
        }
        dest.flush()
            .await
            .map_err(|e| SyncError::io(format!("staging {}", path), e))?;

        Ok(Download {
            last_modified,
            bytes,
        })
    }

    async fn upload(
        &self,
        path: &ResourcePath,
        src: File,
        last_modified: Option<&str>,
    ) -> Result<()> {
        let url = self.url_for(path);
        let response = self
            .send(Method::PUT, &url, Some(Body::from(src)), last_modified)
            .await?;
        Self::expect_ok("PUT", &url, &response)
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Parse a listing body for `dir`.
///
/// Reads lines up to the first empty line (or the end of the body). Every
/// line must be a resource path naming a direct child of `dir`.
pub fn parse_listing(
    dir: &ResourcePath,
    body: &str,
) -> std::result::Result<Vec<ResourcePath>, String> {
    let mut entries = Vec::new();
    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        let entry = ResourcePath::parse(line).map_err(|e| e.to_string())?;
        if !entry.is_child_of(dir) {
            return Err(format!("entry {} is not a child of {}", entry, dir));
        }
        entries.push(entry);
    }
    Ok(entries)
}
