//! GET with at most one redirect hop
//!
//! 301 and 302 responses are followed exactly once through the transport the
//! `Location` URL selects. Whatever the second request returns is final, even
//! another redirect. There are no retries.

use reqwest::Url;

use super::transport::{TransportError, TransportPicker, TransportResponse};

/// Status codes observed during the most recent exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpTrace {
    /// Final status
    pub response_code: Option<u16>,
    /// Redirect status that preceded the final one
    pub first_code: Option<u16>,
}

/// Why an exchange produced no final response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// No transport for the URL's scheme; nothing was sent
    Unresolved(String),
    /// Redirect without a usable `Location` header
    MissingLocation(u16),
    Transport(TransportError),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::Unresolved(url) => write!(f, "no transport for URL: {}", url),
            ExchangeError::MissingLocation(status) => {
                write!(f, "{} response without a usable Location header", status)
            }
            ExchangeError::Transport(e) => write!(f, "{}", e),
        }
    }
}

/// Final response of an exchange plus the URL it came from
#[derive(Debug)]
pub struct Exchange {
    pub url: String,
    pub response: TransportResponse,
}

pub fn is_followed_redirect(status: u16) -> bool {
    matches!(status, 301 | 302)
}

/// Resolve a `Location` header against the URL that produced it
pub fn resolve_location(base: &str, location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    match Url::parse(base) {
        Ok(base) => base.join(location).ok().map(String::from),
        Err(_) => Url::parse(location).ok().map(String::from),
    }
}

/// GET `url`, following one 301/302 hop, recording statuses into `trace`
pub async fn get_following_once(
    picker: &TransportPicker,
    url: &str,
    trace: &mut HttpTrace,
) -> Result<Exchange, ExchangeError> {
    *trace = HttpTrace::default();

    let transport = picker
        .select(url)
        .ok_or_else(|| ExchangeError::Unresolved(url.to_string()))?;
    let first = transport.get(url).await.map_err(ExchangeError::Transport)?;
    trace.response_code = Some(first.status);

    if !is_followed_redirect(first.status) {
        return Ok(Exchange {
            url: url.to_string(),
            response: first,
        });
    }

    let first_status = first.status;
    let target = first
        .location
        .as_deref()
        .and_then(|location| resolve_location(url, location))
        .ok_or(ExchangeError::MissingLocation(first_status))?;

    tracing::debug!(from = %url, to = %target, status = first_status, "Following redirect");
    trace.first_code = Some(first_status);
    trace.response_code = None;

    let transport = picker
        .select(&target)
        .ok_or_else(|| ExchangeError::Unresolved(target.clone()))?;
    let second = transport.get(&target).await.map_err(ExchangeError::Transport)?;

    trace.response_code = Some(second.status);

    Ok(Exchange {
        url: target,
        response: second,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_location() {
        assert_eq!(
            resolve_location("http://eol.org/a/b.jpg", "https://cdn.example.org/c.jpg").as_deref(),
            Some("https://cdn.example.org/c.jpg")
        );
    }

    #[test]
    fn test_resolve_relative_location() {
        assert_eq!(
            resolve_location("http://eol.org/media/a/b.jpg", "/data/c.jpg").as_deref(),
            Some("http://eol.org/data/c.jpg")
        );
        assert_eq!(
            resolve_location("http://eol.org/media/a/b.jpg", "c.jpg").as_deref(),
            Some("http://eol.org/media/a/c.jpg")
        );
    }

    #[test]
    fn test_resolve_empty_location() {
        assert_eq!(resolve_location("http://eol.org/", "  "), None);
    }

    #[test]
    fn test_only_301_and_302_are_followed() {
        assert!(is_followed_redirect(301));
        assert!(is_followed_redirect(302));
        assert!(!is_followed_redirect(200));
        assert!(!is_followed_redirect(307));
        assert!(!is_followed_redirect(404));
    }
}
