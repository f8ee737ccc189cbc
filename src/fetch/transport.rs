// src/fetch/transport.rs
// =============================================================================
// How a single request reaches a server.
//
// - PlainTransport: http pages. Resolve the host, open a TCP stream, write
//   the request bytes, read until the server closes the connection.
// - TlsTransport: https pages. These go through reqwest (rustls) so they are
//   actually encrypted. We never send an https request over a plain socket.
// - SchemeTransport: picks one of the two by the URL's scheme.
//
// Every transport returns the same Response type, so the redirect loop in
// fetch/mod.rs doesn't care which one did the work. Tests plug in their own
// Transport that serves pages from memory.
//
// Rust concepts:
// - Traits: a shared interface with several implementations
// - impl Future + Send: lets generic callers hand the future to tokio::spawn
// =============================================================================

use super::http::{build_request, Response, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use crate::error::FetchError;
use crate::url::{Scheme, UrlRecord};
use reqwest::header;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// Sends one GET request for `url` and returns the full response
pub trait Transport: Send + Sync {
    fn send(&self, url: &UrlRecord) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, url: &UrlRecord) -> impl Future<Output = Result<Response, FetchError>> + Send {
        T::send(self, url)
    }
}

// Raw HTTP/1.1 over TCP
#[derive(Debug, Clone)]
pub struct PlainTransport {
    timeout: Duration,
}

impl PlainTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn round_trip(&self, url: &UrlRecord) -> Result<Vec<u8>, FetchError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((url.host(), url.port()))
            .await
            .map_err(|source| FetchError::ResolveFailed {
                host: url.host().to_string(),
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(FetchError::ResolveFailed {
                host: url.host().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            });
        }

        let mut stream = TcpStream::connect(&addrs[..])
            .await
            .map_err(|source| FetchError::ConnectFailed {
                addr: format!("{}:{}", url.host(), url.port()),
                source,
            })?;

        let request = build_request(url);
        tracing::debug!(url = %url, "sending request");
        stream
            .write_all(request.as_bytes())
            .await
            .map_err(FetchError::SendFailed)?;

        // Connection: close means EOF marks the end of the response
        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .map_err(FetchError::ReadFailed)?;

        Ok(raw)
    }
}

impl Transport for PlainTransport {
    async fn send(&self, url: &UrlRecord) -> Result<Response, FetchError> {
        let raw = tokio::time::timeout(self.timeout, self.round_trip(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;
        Response::parse(raw)
    }
}

// HTTPS through reqwest, with redirects left to our own loop
#[derive(Debug, Clone)]
pub struct TlsTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl TlsTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self { client, timeout })
    }
}

impl Transport for TlsTransport {
    async fn send(&self, url: &UrlRecord) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url.to_string())
            .header(header::ACCEPT, ACCEPT)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .header(header::ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| self.categorize(e))?;

        let status = response.status().as_u16();

        // HeaderMap iterates repeated headers in order, so the last one wins
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.categorize(e))?
            .to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl TlsTransport {
    fn categorize(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Tls(error)
        }
    }
}

// Routes each request by scheme
#[derive(Debug, Clone)]
pub struct SchemeTransport {
    plain: PlainTransport,
    tls: TlsTransport,
}

impl SchemeTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            plain: PlainTransport::new(timeout),
            tls: TlsTransport::new(timeout)?,
        })
    }
}

impl Transport for SchemeTransport {
    async fn send(&self, url: &UrlRecord) -> Result<Response, FetchError> {
        match url.scheme() {
            Scheme::Http => self.plain.send(url).await,
            Scheme::Https => self.tls.send(url).await,
        }
    }
}
