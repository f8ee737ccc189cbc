// src/mirror.rs
// =============================================================================
// Writes fetched pages into the local mirror.
//
// Layout: <root>/<host>/<path>, or <root>/<host>/index.html for the site
// root. HTML pages have their links rewritten before they are written;
// everything else is written byte-for-byte.
//
// Writes are not coordinated between workers. If two URLs map to the same
// file, whichever worker writes last wins.
// =============================================================================

use crate::error::PersistError;
use crate::html::rewrite_links;
use std::path::PathBuf;

pub const DEFAULT_MIRROR_ROOT: &str = "downloads";

// Maps a page to its file, relative to the mirror root
//
// Examples:
//   ("example.com", "")            -> "example.com/index.html"
//   ("example.com", "docs/a.html") -> "example.com/docs/a.html"
//   ("example.com", "docs/")       -> "example.com/docs/index.html"
//
// "." and ".." segments are dropped so nothing lands outside the host's
// directory.
pub fn local_path(host: &str, path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect();

    if segments.is_empty() {
        return format!("{}/index.html", host);
    }

    let joined = segments.join("/");
    if path.ends_with('/') {
        format!("{}/{}/index.html", host, joined)
    } else {
        format!("{}/{}", host, joined)
    }
}

#[derive(Debug, Clone)]
pub struct Mirror {
    root: PathBuf,
}

impl Mirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Creates the mirror root itself; safe to call when it already exists
    pub async fn create_root(&self) -> Result<(), PersistError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| PersistError::CannotCreateDirectory {
                path: self.root.clone(),
                source,
            })
    }

    // Writes `content` to <root>/<local_path>, replacing any existing file
    //
    // Returns the path that was written.
    pub async fn save(
        &self,
        local_path: &str,
        content: &[u8],
        is_html: bool,
    ) -> Result<PathBuf, PersistError> {
        let destination = self.root.join(local_path);

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PersistError::CannotCreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let result = if is_html {
            let rewritten = rewrite_links(content, &self.root.to_string_lossy());
            tokio::fs::write(&destination, rewritten).await
        } else {
            tokio::fs::write(&destination, content).await
        };

        result.map_err(|source| PersistError::CannotOpenDestination {
            path: destination.clone(),
            source,
        })?;

        Ok(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("example.com", ""), "example.com/index.html");
        assert_eq!(local_path("example.com", "about"), "example.com/about");
        assert_eq!(local_path("example.com", "docs/a.html"), "example.com/docs/a.html");
        assert_eq!(local_path("example.com", "docs/"), "example.com/docs/index.html");
    }

    #[test]
    fn test_local_path_stays_inside_host() {
        assert_eq!(local_path("a.com", "../../etc/passwd"), "a.com/etc/passwd");
        assert_eq!(local_path("a.com", "./x//y"), "a.com/x/y");
    }

    #[tokio::test]
    async fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(dir.path());

        let written = mirror
            .save("example.com/docs/deep/a.bin", b"\x00\x01binary", false)
            .await
            .unwrap();

        assert_eq!(written, dir.path().join("example.com/docs/deep/a.bin"));
        assert_eq!(std::fs::read(&written).unwrap(), b"\x00\x01binary");
    }

    #[tokio::test]
    async fn test_save_rewrites_html_only() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(dir.path());
        let page = b"<a href=\"/x\">x</a>";

        let html = mirror.save("h/index.html", page, true).await.unwrap();
        let expected = format!("<a href=\"{}//x\">x</a>", dir.path().display());
        assert_eq!(std::fs::read_to_string(html).unwrap(), expected);

        let raw = mirror.save("h/raw", page, false).await.unwrap();
        assert_eq!(std::fs::read(raw).unwrap(), page);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(dir.path());

        mirror.save("h/f", b"first", false).await.unwrap();
        let path = mirror.save("h/f", b"second", false).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_save_reports_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = Mirror::new(dir.path());

        // "h/page" is a file, so "h/page/child" can't get a directory
        mirror.save("h/page", b"file", false).await.unwrap();
        let err = mirror.save("h/page/child", b"x", false).await.unwrap_err();
        assert!(matches!(err, PersistError::CannotCreateDirectory { .. }));

        // A directory where the file should go
        mirror.save("h/dir/inner", b"x", false).await.unwrap();
        let err = mirror.save("h/dir", b"x", false).await.unwrap_err();
        assert!(matches!(err, PersistError::CannotOpenDestination { .. }));
    }
}
