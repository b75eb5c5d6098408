//! Token extraction from the probe endpoint's headers echo.
//!
//! The probe endpoint sits behind the identity gateway and answers with a
//! JSON document echoing the request headers it saw. Once the session is
//! authenticated, the gateway attaches the `_oauth2_proxy` cookie to every
//! request, so the token shows up in that echo.

use serde_json::{Map, Value};
use tracing::debug;

use crate::driver::PageDriver;
use crate::error::{Error, Result};

/// Cookie set by the identity gateway; also the prefix of the stored wire
/// format.
pub const COOKIE_NAME: &str = "_oauth2_proxy";

/// Extract the gateway token visible to the authenticated session,
/// normalized to the `_oauth2_proxy=<value>` wire format.
///
/// Prefers the rendered page body; when that is not a headers document
/// (some engines refuse to render raw JSON), falls back to a direct
/// request that reuses the session's cookies.
pub async fn token_from_session(driver: &dyn PageDriver, probe_url: &str) -> Result<String> {
    let rendered = driver.read_body().await.unwrap_or_default();
    if let Some(headers) = parse_headers(&rendered) {
        return find_token(&headers);
    }

    debug!(target = "oxy", "rendered probe body unusable, retrying with a direct request");
    let headers = fetch_headers(driver, probe_url).await?;
    find_token(&headers)
}

/// GET the probe endpoint directly, reusing the browser session's cookies.
async fn fetch_headers(driver: &dyn PageDriver, probe_url: &str) -> Result<Map<String, Value>> {
    let cookie_header = driver.cookie_header().await?;
    let probe_error = |reason: String| Error::ProbeNavigation {
        url: probe_url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| probe_error(e.to_string()))?;
    let body = client
        .get(probe_url)
        .header(reqwest::header::COOKIE, cookie_header)
        .send()
        .await
        .map_err(|e| probe_error(e.to_string()))?
        .error_for_status()
        .map_err(|e| probe_error(e.to_string()))?
        .text()
        .await
        .map_err(|e| probe_error(e.to_string()))?;

    parse_headers(&body)
        .ok_or_else(|| Error::TokenNotFound("probe response carried no headers object".into()))
}

/// Parse a headers-echo document, tolerating page chrome around the JSON
/// payload. Returns `None` when the body is not such a document.
pub fn parse_headers(body: &str) -> Option<Map<String, Value>> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&body[start..=end]).ok()?;
    let headers = value.get("headers")?.as_object()?;
    if headers.is_empty() {
        None
    } else {
        Some(headers.clone())
    }
}

/// Locate the gateway token in a header map.
///
/// The `Cookie` header is scanned first since the gateway cookie rides
/// along on every authenticated request; after that, any header whose name
/// contains both `oauth2` and `proxy` is accepted, splitting its value on
/// the first `=` only (a value without `=` is taken verbatim).
pub fn find_token(headers: &Map<String, Value>) -> Result<String> {
    if let Some(cookie_header) = header_str(headers, "Cookie") {
        for pair in cookie_header.split(';') {
            if let Some(value) = pair
                .trim()
                .strip_prefix(COOKIE_NAME)
                .and_then(|rest| rest.strip_prefix('='))
            {
                if !value.trim().is_empty() {
                    return Ok(format!("{COOKIE_NAME}={value}"));
                }
            }
        }
    }

    for (name, value) in headers {
        let lower = name.to_lowercase();
        if !(lower.contains("oauth2") && lower.contains("proxy")) {
            continue;
        }
        if let Some(raw) = value.as_str() {
            let token = match raw.split_once('=') {
                Some((_, rest)) => rest,
                None => raw,
            };
            if !token.trim().is_empty() {
                return Ok(format!("{COOKIE_NAME}={token}"));
            }
        }
    }

    Err(Error::TokenNotFound(format!(
        "headers present: {}",
        headers.keys().cloned().collect::<Vec<_>>().join(", ")
    )))
}

fn header_str<'m>(headers: &'m Map<String, Value>, name: &str) -> Option<&'m str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, value)| value.as_str())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn headers(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn oauth2_proxy_header_value_splits_on_first_equals() {
        let map = headers(json!({"X-Oauth2-Proxy": "_oauth2_proxy=abc123"}));
        assert_eq!(find_token(&map).unwrap(), "_oauth2_proxy=abc123");
    }

    #[test]
    fn value_with_multiple_equals_splits_only_once() {
        let map = headers(json!({"X-Oauth2-Proxy": "_oauth2_proxy=abc=123=xyz"}));
        assert_eq!(find_token(&map).unwrap(), "_oauth2_proxy=abc=123=xyz");
    }

    #[test]
    fn value_without_equals_is_taken_verbatim() {
        let map = headers(json!({"X-Oauth2-Proxy": "rawtoken"}));
        assert_eq!(find_token(&map).unwrap(), "_oauth2_proxy=rawtoken");
    }

    #[test]
    fn header_name_matching_is_case_insensitive() {
        let map = headers(json!({"x-OAUTH2-pRoXy": "_oauth2_proxy=zzz"}));
        assert_eq!(find_token(&map).unwrap(), "_oauth2_proxy=zzz");
    }

    #[test]
    fn cookie_header_is_preferred_over_key_scan() {
        let map = headers(json!({
            "Cookie": "theme=dark; _oauth2_proxy=fromcookie; lang=en",
            "X-Oauth2-Proxy": "_oauth2_proxy=fromheader"
        }));
        assert_eq!(find_token(&map).unwrap(), "_oauth2_proxy=fromcookie");
    }

    #[test]
    fn unrelated_headers_fail_with_token_not_found() {
        let map = headers(json!({"X-Other": "v", "Accept": "*/*"}));
        assert!(matches!(find_token(&map), Err(Error::TokenNotFound(_))));
    }

    #[test]
    fn empty_token_value_is_not_accepted() {
        let map = headers(json!({"X-Oauth2-Proxy": "_oauth2_proxy="}));
        assert!(matches!(find_token(&map), Err(Error::TokenNotFound(_))));
    }

    #[test]
    fn parse_headers_reads_the_probe_document() {
        let body = r#"{"headers": {"Host": "probe.internal", "Cookie": "_oauth2_proxy=t"}}"#;
        let map = parse_headers(body).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn parse_headers_tolerates_surrounding_page_chrome() {
        let body = "Response:\n{\"headers\": {\"Host\": \"probe.internal\"}}\n";
        assert!(parse_headers(body).is_some());
    }

    #[test]
    fn parse_headers_rejects_login_page_text() {
        assert!(parse_headers("Sign in to your organization").is_none());
        assert!(parse_headers("function () { return 1; }").is_none());
        assert!(parse_headers(r#"{"detail": "not authorized"}"#).is_none());
    }
}
