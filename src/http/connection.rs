use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, Version, header, redirect};
use url::Url;

use crate::error::{AppError, AppResult, HttpError};

/// What one GET produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    /// Kept only when the response log is enabled.
    pub body: Option<Bytes>,
    /// The server will close the connection after this reply.
    pub peer_closed: bool,
}

/// One logical keep-alive connection to the target.
#[async_trait]
pub trait Connection: Send {
    async fn get(&mut self) -> Result<Reply, HttpError>;
}

/// Acquires fresh connections for runners.
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection + 'static;

    async fn connect(&self) -> AppResult<Self::Conn>;
}

/// Production transport: one reqwest client per connection, so dropping the
/// connection drops its socket.
#[derive(Debug, Clone)]
pub struct ReqwestConnector {
    url: Url,
    keep_body: bool,
}

impl ReqwestConnector {
    #[must_use]
    pub const fn new(url: Url, keep_body: bool) -> Self {
        Self { url, keep_body }
    }
}

#[async_trait]
impl Connector for ReqwestConnector {
    type Conn = ReqwestConnection;

    async fn connect(&self) -> AppResult<Self::Conn> {
        // Client construction blocks on TLS setup; keep it off the loop.
        let client = tokio::task::spawn_blocking(build_client)
            .await?
            .map_err(|source| AppError::http(HttpError::BuildClient { source }))?;
        Ok(ReqwestConnection {
            client,
            url: self.url.clone(),
            keep_body: self.keep_body,
        })
    }
}

fn build_client() -> Result<Client, reqwest::Error> {
    // Targets are plain `http://`; skip loading the system trust store.
    Client::builder()
        .http1_only()
        .pool_max_idle_per_host(1)
        .tcp_nodelay(true)
        .no_proxy()
        .redirect(redirect::Policy::none())
        .tls_built_in_root_certs(false)
        .build()
}

#[derive(Debug)]
pub struct ReqwestConnection {
    client: Client,
    url: Url,
    keep_body: bool,
}

#[async_trait]
impl Connection for ReqwestConnection {
    async fn get(&mut self) -> Result<Reply, HttpError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|source| HttpError::Transport { source })?;
        let status = response.status().as_u16();
        let peer_closed = peer_will_close(response.version(), response.headers());
        let body = if self.keep_body {
            Some(collect_body(response).await?)
        } else {
            drain_body(response).await?;
            None
        };
        Ok(Reply {
            status,
            body,
            peer_closed,
        })
    }
}

/// `Connection: close` ends any connection; HTTP/1.0 replies end it unless
/// they opt into keep-alive.
pub(crate) fn peer_will_close(version: Version, headers: &HeaderMap) -> bool {
    let has_token = |token: &str| {
        headers
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|item| item.trim().eq_ignore_ascii_case(token))
    };
    if has_token("close") {
        return true;
    }
    version <= Version::HTTP_10 && !has_token("keep-alive")
}

async fn drain_body(response: Response) -> Result<(), HttpError> {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        chunk.map_err(|source| HttpError::ReadBody { source })?;
    }
    Ok(())
}

async fn collect_body(response: Response) -> Result<Bytes, HttpError> {
    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = chunk.map_err(|source| HttpError::ReadBody { source })?;
        body.extend_from_slice(&bytes);
    }
    Ok(body.freeze())
}
