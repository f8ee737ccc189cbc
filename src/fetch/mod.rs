// src/fetch/mod.rs
// =============================================================================
// The fetch engine: get one page, following redirects.
//
// Redirect handling is a plain loop with a budget. Each 301/302 builds a new
// URL record from the Location header (the old record is left alone), and
// each hop spends one unit of the budget. When a redirect arrives with no
// budget left, the fetch fails with TooManyRedirects.
//
// Submodules:
// - http: request bytes and response parsing
// - transport: getting those bytes to and from a server
// =============================================================================

mod http;
mod transport;

pub use http::Response;
pub use transport::{SchemeTransport, Transport};

use crate::error::FetchError;
use crate::url::UrlRecord;

// Default bound on redirect hops for a single fetch
pub const DEFAULT_MAX_REDIRECTS: u32 = 3;

// The outcome of a successful fetch
#[derive(Debug)]
pub struct Fetched {
    // Where the content actually came from, after redirects
    pub url: UrlRecord,
    pub response: Response,
    pub redirects: u32,
}

// Fetches `url`, following at most `max_redirects` redirects
//
// A redirect without a Location header can't be followed; it is returned
// as the final response.
pub async fn fetch<T: Transport>(
    transport: &T,
    url: &UrlRecord,
    max_redirects: u32,
) -> Result<Fetched, FetchError> {
    let mut current = url.clone();
    let mut redirects = 0;

    loop {
        let response = transport.send(&current).await?;
        tracing::debug!(url = %current, status = response.status, "received response");

        if !response.is_redirect() {
            return Ok(Fetched {
                url: current,
                response,
                redirects,
            });
        }

        let Some(location) = response.header("location") else {
            tracing::warn!(url = %current, status = response.status, "redirect without Location header");
            return Ok(Fetched {
                url: current,
                response,
                redirects,
            });
        };

        if redirects == max_redirects {
            return Err(FetchError::TooManyRedirects(max_redirects));
        }

        let next = current
            .apply_redirect(location)
            .map_err(|source| FetchError::BadRedirect {
                location: location.to_string(),
                source,
            })?;

        tracing::info!(from = %current, to = %next, "following redirect");
        current = next;
        redirects += 1;
    }
}
