// src/fetch/http.rs
// =============================================================================
// The HTTP/1.1 wire format, both directions.
//
// Outgoing: one GET request with a fixed set of headers. We ask for an
// uncompressed body (Accept-Encoding: identity) because we never decompress,
// and we send Connection: close so the server ends the stream when the
// response is complete. That lets us simply read until EOF.
//
// Incoming: the raw bytes of the whole response. We split them at the first
// blank line ("\r\n\r\n"): the status line and headers come before it, the
// body is everything after.
//
// Rust concepts:
// - Vec<u8>: a growable byte buffer, so bodies of any size fit
// - split_off: hands over the tail of a Vec without copying the head
// =============================================================================

use crate::error::FetchError;
use crate::url::UrlRecord;
use std::collections::HashMap;

pub const USER_AGENT: &str = concat!("mirror-crawl/", env!("CARGO_PKG_VERSION"));
pub const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

// Builds the exact request we put on the wire for a URL
pub fn build_request(url: &UrlRecord) -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Host: {}\r\n\
         User-Agent: {}\r\n\
         Accept: {}\r\n\
         Accept-Language: {}\r\n\
         Accept-Encoding: identity\r\n\
         Connection: close\r\n\
         \r\n",
        url.request_target(),
        url.authority(),
        USER_AGENT,
        ACCEPT,
        ACCEPT_LANGUAGE,
    )
}

// A parsed HTTP response
//
// Header names are stored lowercase; if a header repeats, the last value wins.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    // Parses a complete response as read from the socket
    //
    // Fails with MalformedResponse when there is no status line, the status
    // line isn't "HTTP/x.y <code> ...", or the header block never ends.
    pub fn parse(mut raw: Vec<u8>) -> Result<Self, FetchError> {
        if find(&raw, b"\r\n").is_none() {
            return Err(FetchError::MalformedResponse("no status line"));
        }
        let head_end = find(&raw, b"\r\n\r\n")
            .ok_or(FetchError::MalformedResponse("no end of headers"))?;

        let body = raw.split_off(head_end + 4);
        let head = String::from_utf8_lossy(&raw[..head_end]);

        let mut lines = head.split("\r\n");
        let status = parse_status_line(lines.next().unwrap_or_default())?;

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    // Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302)
    }

    // Only HTML gets its links rewritten and followed
    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .map(|value| value.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

fn parse_status_line(line: &str) -> Result<u16, FetchError> {
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(FetchError::MalformedResponse("bad status line"));
    }

    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or(FetchError::MalformedResponse("bad status code"))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
