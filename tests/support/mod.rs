#![allow(dead_code)]

use std::path::Path;

use brokerlink::config::{AngelConfig, KiteConfig};
use wiremock::MockServer;

/// Kite settings pointed at a mock server, with token and env files inside `dir`.
pub fn kite_config(server: &MockServer, dir: &Path) -> KiteConfig {
    KiteConfig {
        api_key: Some("kite_key".to_string()),
        api_secret: Some("kite_secret".to_string()),
        api_url: server.uri(),
        token_file: dir.join(".kite_access_token"),
        env_file: dir.join(".env"),
        ..KiteConfig::default()
    }
}

/// SmartAPI settings pointed at a mock server. The TOTP secret is the RFC
/// 6238 test key.
pub fn angel_config(server: &MockServer) -> AngelConfig {
    AngelConfig {
        api_key: Some("angel_key".to_string()),
        client_code: Some("A123456".to_string()),
        password: Some("1234".to_string()),
        totp_secret: Some("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string()),
        api_url: server.uri(),
    }
}
