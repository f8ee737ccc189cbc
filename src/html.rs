// src/html.rs
// =============================================================================
// Finds and rewrites links in HTML pages.
//
// This is NOT an HTML parser. We look for the literal text href="..." and
// nothing else: no single quotes, no unquoted values, no <base> tags. That
// is the whole contract, and it keeps the rewritten copy byte-for-byte
// identical to the original everywhere except inside those attributes.
//
// Both functions work on raw bytes, since pages aren't always valid UTF-8.
//
// An href=" with no closing quote ends the scan: extraction stops there and
// rewriting copies the rest of the page untouched.
// =============================================================================

use crate::url::UrlRecord;

const HREF: &[u8] = b"href=\"";

// One href="..." occurrence
struct Href {
    // Offset of the first byte of the value
    start: usize,
    // Offset of the closing quote
    end: usize,
}

// Finds the next complete href="..." in `html`
fn next_href(html: &[u8]) -> Option<Href> {
    let at = html.windows(HREF.len()).position(|w| w == HREF)?;
    let start = at + HREF.len();
    let len = html[start..].iter().position(|&b| b == b'"')?;
    Some(Href {
        start,
        end: start + len,
    })
}

// Extracts every link on a page as an absolute, normalized URL string
//
// Parameters:
//   html: the page body
//   base: the URL the page was fetched from
//
// Example:
//   html = <a href="/docs">Docs</a>, base = http://example.com/page
//   result = ["http://example.com/docs"]
pub fn extract_links(html: &[u8], base: &UrlRecord) -> Vec<String> {
    let mut links = Vec::new();
    let mut rest = html;

    while let Some(href) = next_href(rest) {
        let value = String::from_utf8_lossy(&rest[href.start..href.end]);
        rest = &rest[href.end + 1..];

        let value = value.trim();
        // Same-page anchors point at a page we already have
        if value.is_empty() || value.starts_with('#') {
            continue;
        }

        match base.resolve(value) {
            Ok(url) if !url.is_relative() => links.push(url.to_string()),
            Ok(_) => {}
            Err(e) => tracing::debug!(href = value, error = %e, "skipping link"),
        }
    }

    links
}

// Returns a copy of the page where every href="X" becomes
// href="<mirror_root>/X". Everything else is copied unchanged.
pub fn rewrite_links(html: &[u8], mirror_root: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(html.len());
    let mut rest = html;

    while let Some(href) = next_href(rest) {
        out.extend_from_slice(&rest[..href.start]);
        out.extend_from_slice(mirror_root.as_bytes());
        out.push(b'/');
        out.extend_from_slice(&rest[href.start..href.end]);
        // The closing quote is copied with the next chunk
        rest = &rest[href.end..];
    }

    out.extend_from_slice(rest);
    out
}
