// src/url.rs
// =============================================================================
// The URL model used by every other part of the crawler.
//
// A UrlRecord is {scheme, host, port, path}. The path is stored WITHOUT its
// leading slash ("docs/intro.html") and rendered with one. Relative inputs
// ("/about", "about.html") parse into a record with an empty host; they must
// be resolved against the page they came from before they can be fetched.
//
// We deliberately don't do browser-style resolution here ("../x", "./x"):
// every relative reference is taken relative to the site root. That is how
// the mirror lays out files, so the two stay in agreement.
//
// Rust concepts:
// - FromStr / Display: the standard traits for "parse from text" and
//   "render to text"
// - Immutability: a record never changes in place; redirects build a new one
// =============================================================================

use crate::error::ParseError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UrlRecord {
    scheme: Scheme,
    host: String,
    port: u16,
    path: String,
}

impl UrlRecord {
    // Parses absolute URLs, host-relative paths ("/x") and bare relative
    // paths ("x"). Relative forms come back with scheme http and an empty
    // host. Any "#fragment" is dropped since servers never see it.
    //
    // Examples:
    //   "http://Example.com:8080/a/b" -> http, "example.com", 8080, "a/b"
    //   "https://example.com"         -> https, "example.com", 443, ""
    //   "/about"                      -> http, "", 80, "about"
    //   "ftp://example.com/x"         -> Err(UnknownScheme)
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        let raw = match raw.find('#') {
            Some(i) => &raw[..i],
            None => raw,
        };

        let absolute = raw
            .split_once("://")
            .filter(|(scheme, _)| is_scheme_token(scheme));
        let Some((scheme, rest)) = absolute else {
            if let Some(scheme) = opaque_scheme(raw) {
                return Err(ParseError::UnknownScheme(scheme.to_string()));
            }
            return Ok(Self::relative(raw.trim_start_matches('/')));
        };

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            _ => return Err(ParseError::UnknownScheme(scheme.to_string())),
        };

        // The authority runs until the path or query begins
        let split = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, path) = rest.split_at(split);
        let path = path.strip_prefix('/').unwrap_or(path);

        // Credentials are never used for crawling, drop them
        let authority = match authority.rsplit_once('@') {
            Some((_, host)) => host,
            None => authority,
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ParseError::InvalidPort(port.to_string()))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };
        // An absolute URL without a host would read as a relative one later
        if host.is_empty() {
            return Err(ParseError::MissingHost(raw.to_string()));
        }

        Ok(Self {
            scheme,
            host: host.to_ascii_lowercase(),
            port,
            path: path.to_string(),
        })
    }

    fn relative(path: &str) -> Self {
        Self {
            scheme: Scheme::Http,
            host: String::new(),
            port: Scheme::Http.default_port(),
            path: path.to_string(),
        }
    }

    // Resolves a reference found on this page.
    //
    //   absolute ("http://b.com/x") -> returned as parsed
    //   scheme-relative ("//b.com/x") -> takes this page's scheme
    //   relative ("/x" or "x")        -> this page's scheme, host and port
    //                                    with the reference as the path
    pub fn resolve(&self, reference: &str) -> Result<Self, ParseError> {
        let reference = reference.trim();
        if reference.starts_with("//") {
            return Self::parse(&format!("{}:{}", self.scheme.as_str(), reference));
        }

        let parsed = Self::parse(reference)?;
        if parsed.is_relative() {
            Ok(self.with_path(parsed.path))
        } else {
            Ok(parsed)
        }
    }

    // Builds the record a `Location` header points at. A relative location
    // only swaps the path, "//host/x" keeps the current scheme, and an
    // absolute one replaces the whole record. Same rules as a link.
    pub fn apply_redirect(&self, location: &str) -> Result<Self, ParseError> {
        self.resolve(location)
    }

    fn with_path(&self, path: String) -> Self {
        Self {
            scheme: self.scheme,
            host: self.host.clone(),
            port: self.port,
            path,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    // A record without a host came from a relative reference
    pub fn is_relative(&self) -> bool {
        self.host.is_empty()
    }

    // Value for the Host header: the port is only spelled out when it is
    // not the scheme's default
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    // "/<path>" as it appears on the request line
    pub fn request_target(&self) -> String {
        format!("/{}", self.path)
    }
}

// Recognizes "mailto:", "javascript:", "tel:" and friends: a scheme token
// followed by ':' that is not the start of a port number.
fn opaque_scheme(raw: &str) -> Option<&str> {
    let (scheme, rest) = raw.split_once(':')?;
    let looks_like_port = rest.starts_with(|c: char| c.is_ascii_digit());

    (is_scheme_token(scheme) && !looks_like_port).then_some(scheme)
}

fn is_scheme_token(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl FromStr for UrlRecord {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Renders the normalized form. This string is also the deduplication key,
// so two spellings of the same page render identically.
impl fmt::Display for UrlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_relative() {
            return write!(f, "/{}", self.path);
        }
        write!(f, "{}://{}/{}", self.scheme.as_str(), self.authority(), self.path)
    }
}
