//! Environment-driven configuration.
//! Token lifetime and the signing key are policy parameters, not constants, so
//! they live here alongside the usual port/path settings.

use base64::Engine;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// SQLite database file; ":memory:" is accepted for ad-hoc runs.
    pub db_path: String,
    /// Session token lifetime, in days.
    pub token_ttl_days: i64,
    /// Base64url-encoded 32-byte Ed25519 seed. When unset a fresh ephemeral key
    /// is generated at startup and every outstanding token dies with the process.
    pub token_key: Option<[u8; 32]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 5000,
            db_path: "agencyd.db".to_string(),
            token_ttl_days: 30,
            token_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let http_port = std::env::var("AGENCYD_HTTP_PORT").ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.http_port);
        let db_path = std::env::var("AGENCYD_DB_PATH").unwrap_or(defaults.db_path);
        let token_ttl_days = std::env::var("AGENCYD_TOKEN_TTL_DAYS").ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(defaults.token_ttl_days);
        let token_key = std::env::var("AGENCYD_TOKEN_KEY").ok().and_then(|s| decode_seed(&s));
        Self { http_port, db_path, token_ttl_days, token_key }
    }
}

fn decode_seed(s: &str) -> Option<[u8; 32]> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s.trim()).ok()?;
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Some(arr)
}
