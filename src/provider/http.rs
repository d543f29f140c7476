//! Shared HTTP client, broker header sets and status mapping.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::BrokerError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

pub const KITE_VERSION: &str = "3";

/// Get (or create) the shared reqwest client.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Headers for an authenticated Kite Connect call.
pub fn kite_headers(api_key: &str, access_token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("X-Kite-Version", HeaderValue::from_static(KITE_VERSION));
    if let Ok(val) = HeaderValue::from_str(&format!("token {api_key}:{access_token}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// SmartAPI header set. The client IP and MAC headers are required by the
/// gateway but not validated, so placeholders are sent.
pub fn angel_headers(api_key: &str, jwt: Option<&str>, client_code: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    insert(&mut headers, "x-usertype", "USER");
    insert(&mut headers, "x-sourceid", "WEB");
    insert(&mut headers, "x-clientlocalip", "CLIENT_LOCAL_IP");
    insert(&mut headers, "x-clientpublicip", "CLIENT_PUBLIC_IP");
    insert(&mut headers, "x-macaddress", "MAC_ADDRESS");
    insert(&mut headers, "x-privatekey", api_key);
    if let Some(code) = client_code {
        insert(&mut headers, "x-clientcode", code);
    }
    if let Some(jwt) = jwt {
        if let Ok(val) = HeaderValue::from_str(&bearer(jwt)) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(val) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), val);
    }
}

/// `Bearer <jwt>`, without doubling a prefix the broker already added.
pub fn bearer(jwt: &str) -> String {
    let jwt = jwt.trim();
    match jwt.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => {
            format!("Bearer {}", jwt[7..].trim_start())
        }
        _ => format!("Bearer {jwt}"),
    }
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> BrokerError {
    match status {
        401 | 403 => BrokerError::Authentication(body.to_string()),
        429 => BrokerError::RateLimited,
        _ => BrokerError::api(status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_does_not_double_prefix() {
        assert_eq!(bearer("eyJ.abc"), "Bearer eyJ.abc");
        assert_eq!(bearer("Bearer eyJ.abc"), "Bearer eyJ.abc");
        assert_eq!(bearer("bearer  eyJ.abc"), "Bearer eyJ.abc");
    }

    #[test]
    fn kite_headers_use_token_scheme() {
        let headers = kite_headers("key", "tok");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "token key:tok");
        assert_eq!(headers.get("x-kite-version").unwrap(), "3");
    }

    #[test]
    fn angel_headers_carry_private_key_and_client_code() {
        let headers = angel_headers("api", Some("jwt"), Some("C123"));
        assert_eq!(headers.get("x-privatekey").unwrap(), "api");
        assert_eq!(headers.get("x-clientcode").unwrap(), "C123");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer jwt");
        assert_eq!(headers.get("x-usertype").unwrap(), "USER");
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_to_error(403, "denied"),
            BrokerError::Authentication(_)
        ));
        assert!(matches!(status_to_error(429, ""), BrokerError::RateLimited));
        assert!(matches!(
            status_to_error(500, "boom"),
            BrokerError::Api { status: 500, .. }
        ));
    }
}
