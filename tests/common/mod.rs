use reqwest::Client;
use std::time::{SystemTime, UNIX_EPOCH};

/// Server under test; override with `TEST_BASE_URL`.
pub fn base_url() -> String {
    std::env::var("TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

/// Timestamp-derived suffix, so repeated runs use fresh usernames.
pub fn unique_suffix() -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}", ts % 1_000_000_000)
}

/// Build a URL for an API endpoint.
pub fn url(path: &str) -> String {
    format!("{}{}", base_url(), path)
}
