// src/error.rs
// =============================================================================
// Error types shared by the crawler components.
//
// Every failure here is local to one crawl task: workers log it, drop the
// task and keep going. Only a malformed seed URL stops the whole crawl, and
// that decision is made in main.rs, not here.
//
// QueueClosed is listed here too, but it is not really an error. It is how
// the work queue tells a worker that the crawl is over.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

// Problems turning a string into a URL record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown scheme '{0}' (only http and https are supported)")]
    UnknownScheme(String),
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("URL '{0}' has no host")]
    MissingHost(String),
}

// Problems fetching a single page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not resolve host {host}: {source}")]
    ResolveFailed {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not send request: {0}")]
    SendFailed(#[source] std::io::Error),
    #[error("could not read response: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("tls request failed: {0}")]
    Tls(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(&'static str),
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),
    #[error("bad redirect target '{location}': {source}")]
    BadRedirect {
        location: String,
        #[source]
        source: ParseError,
    },
}

// Problems writing a page into the mirror
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not create directory {path}: {source}")]
    CannotCreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not open {path} for writing: {source}")]
    CannotOpenDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// Returned by the work queue once the crawl has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("work queue is closed")]
pub struct QueueClosed;
