//! Application location resolution
//!
//! A scenario names the application under test either as a URL or as a
//! filesystem path. Paths become absolute, percent-encoded `file://` URLs;
//! relative navigate targets are joined onto the application location.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// Schemes a browser can load directly
const NAVIGABLE_SCHEMES: &[&str] = &["http", "https", "file", "about", "data", "chrome"];

fn invalid(location: &str, reason: impl Into<String>) -> Error {
    Error::InvalidLocation {
        location: location.to_string(),
        reason: reason.into(),
    }
}

/// Parse a location that is already a navigable URL
///
/// `localhost:8080` parses with scheme `localhost` and a Windows drive parses
/// with a one-letter scheme, so only known schemes count.
pub fn parse_url(location: &str) -> Option<Url> {
    Url::parse(location)
        .ok()
        .filter(|url| NAVIGABLE_SCHEMES.contains(&url.scheme()))
}

/// Whether a string is a URL rather than a filesystem path
pub fn has_scheme(location: &str) -> bool {
    parse_url(location).is_some()
}

/// `host:port` without a scheme is served over http
fn host_port(location: &str) -> Option<Url> {
    let (host, port) = location.split_once(':')?;
    let port = port.split('/').next()?;
    if host.is_empty() || host.contains(['/', '\\']) || port.parse::<u16>().is_err() {
        return None;
    }
    Url::parse(&format!("http://{}", location)).ok()
}

/// Turn an application location into a navigable URL
pub fn resolve_app(location: &str) -> Result<String> {
    Ok(app_url(location)?.to_string())
}

fn app_url(location: &str) -> Result<Url> {
    let location = location.trim();
    if location.is_empty() {
        return Err(invalid(location, "empty location"));
    }
    if let Some(url) = parse_url(location).or_else(|| host_port(location)) {
        return Ok(url);
    }
    let path = absolute(Path::new(location))?;
    Url::from_file_path(&path).map_err(|()| invalid(location, "not an absolute file path"))
}

/// Resolve a navigate target against the application location
pub fn resolve_url(app: Option<&str>, url: Option<&str>) -> Result<String> {
    let url = url.map(str::trim).filter(|u| !u.is_empty());

    match (app, url) {
        (_, Some(url)) if has_scheme(url) => resolve_app(url),
        (Some(app), None) => resolve_app(app),
        (Some(app), Some(url)) => {
            let base = app_url(app)?;
            base.join(url)
                .map(|joined| joined.to_string())
                .map_err(|e| invalid(url, e.to_string()))
        }
        (None, Some(url)) => Err(invalid(url, "relative url without an application location")),
        (None, None) => Err(invalid("", "no url and no application location")),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://example.com", true ; "https")]
    #[test_case("file:///tmp/index.html", true ; "file url")]
    #[test_case("about:blank", true ; "about")]
    #[test_case("index.html", false ; "relative path")]
    #[test_case("/tmp/index.html", false ; "absolute path")]
    #[test_case("C:\\app\\index.html", false ; "windows drive")]
    #[test_case("localhost:8080", false ; "host and port")]
    fn test_has_scheme(location: &str, expected: bool) {
        assert_eq!(has_scheme(location), expected);
    }

    #[cfg(unix)]
    #[test_case("/srv/app/index.html", "file:///srv/app/index.html" ; "plain path")]
    #[test_case("/tmp/build#2/index.html", "file:///tmp/build%232/index.html" ; "hash in path")]
    #[test_case("/tmp/my app/index.html", "file:///tmp/my%20app/index.html" ; "space in path")]
    #[test_case("/tmp/100%/index.html", "file:///tmp/100%25/index.html" ; "percent in path")]
    fn test_absolute_path_becomes_file_url(path: &str, expected: &str) {
        let url = resolve_app(path).unwrap();
        assert_eq!(url, expected);
        let back = Url::parse(&url).unwrap().to_file_path().unwrap();
        assert_eq!(back, Path::new(path));
    }

    #[test]
    fn test_relative_path_is_made_absolute() {
        let url = resolve_app("index.html").unwrap();
        let cwd = std::env::current_dir().unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("index.html"));
        assert_eq!(
            Url::parse(&url).unwrap().to_file_path().unwrap(),
            cwd.join("index.html")
        );
    }

    #[test_case("localhost:8080", "http://localhost:8080/" ; "bare host and port")]
    #[test_case("127.0.0.1:3000/app/", "http://127.0.0.1:3000/app/" ; "host port and path")]
    fn test_host_port_is_served_over_http(location: &str, expected: &str) {
        assert_eq!(resolve_app(location).unwrap(), expected);
    }

    #[cfg(unix)]
    #[test_case(Some("/srv/app/index.html"), None, "file:///srv/app/index.html" ; "app only")]
    #[test_case(Some("/srv/app/index.html"), Some("login.html"), "file:///srv/app/login.html" ; "sibling file")]
    #[test_case(Some("/srv/my app/index.html"), Some("login.html"), "file:///srv/my%20app/login.html" ; "sibling of encoded dir")]
    #[test_case(Some("/srv/app/index.html"), Some("/other/index.html"), "file:///other/index.html" ; "rooted file target")]
    #[test_case(Some("http://127.0.0.1:8080/app/"), Some("login"), "http://127.0.0.1:8080/app/login" ; "http relative")]
    #[test_case(Some("http://127.0.0.1:8080/app/index.html"), Some("/health"), "http://127.0.0.1:8080/health" ; "http rooted")]
    #[test_case(Some("http://127.0.0.1:8080"), Some("/login"), "http://127.0.0.1:8080/login" ; "origin only")]
    #[test_case(Some("http://127.0.0.1:8080/app/"), Some("#settings"), "http://127.0.0.1:8080/app/#settings" ; "fragment target")]
    #[test_case(None, Some("https://example.com/x"), "https://example.com/x" ; "absolute url wins")]
    fn test_resolve_url(app: Option<&str>, url: Option<&str>, expected: &str) {
        assert_eq!(resolve_url(app, url).unwrap(), expected);
    }

    #[test]
    fn test_relative_url_without_app_fails() {
        assert!(matches!(
            resolve_url(None, Some("login.html")),
            Err(Error::InvalidLocation { .. })
        ));
        assert!(resolve_url(None, None).is_err());
        assert!(resolve_app("   ").is_err());
    }
}
