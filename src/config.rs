//! C10 — configuration (`[AMBIENT]` in SPEC_FULL.md).
//!
//! Loaded from CLI flags / environment variables via `clap`, the way
//! sockudo wires `AppManagerConfig`/`DatabaseConfig` through its own `clap`
//! dependency. Every field maps 1:1 onto spec.md §6's env var table.

use clap::Parser;

pub const DEFAULT_SECRET_SENTINEL: &str = "change-me-in-production";

#[derive(Debug, Clone, Parser)]
#[command(name = "pulsegate", about = "Pusher-compatible pub/sub WebSocket server")]
pub struct ServerOptions {
    /// TCP port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Shared HMAC secret used to sign/verify private & presence channel auth.
    #[arg(long, env = "AUTH_SECRET", default_value = "change-me-in-production")]
    pub auth_secret: String,

    /// Path the WebSocket upgrade is served from.
    #[arg(long, env = "WS_PATH", default_value = "/ws")]
    pub ws_path: String,

    /// Comma-separated list of allowed `Origin` headers, or `*` for any.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Maximum concurrent connections accepted from a single IP.
    #[arg(long, env = "CONNECTION_LIMIT_PER_IP", default_value_t = 10)]
    pub connection_limit_per_ip: usize,

    /// Maximum channels a single connection may be subscribed to at once.
    #[arg(long, env = "CHANNEL_LIMIT_PER_CONNECTION", default_value_t = 50)]
    pub channel_limit_per_connection: usize,

    /// Maximum inbound messages per connection per rate window.
    #[arg(long, env = "MESSAGE_RATE_LIMIT", default_value_t = 100)]
    pub message_rate_limit: u32,

    /// Length of the fixed rate-limit window, in milliseconds.
    #[arg(long, env = "MESSAGE_RATE_WINDOW_MS", default_value_t = 60_000)]
    pub message_rate_window_ms: u64,

    /// Refuse to start with the sentinel auth secret. Set this in
    /// production deployments.
    #[arg(long, env = "PRODUCTION", default_value_t = false)]
    pub production: bool,
}

impl ServerOptions {
    /// Fatal startup check (spec.md §6/§7): a production deployment must
    /// not run with the placeholder secret.
    pub fn validate(&self) -> Result<(), String> {
        if self.production && self.auth_secret == DEFAULT_SECRET_SENTINEL {
            return Err(
                "AUTH_SECRET must be set to a real secret when --production is enabled"
                    .to_string(),
            );
        }
        if self.allowed_origins.trim().is_empty() {
            return Err("ALLOWED_ORIGINS must not be empty (use \"*\" to allow any)".to_string());
        }
        Ok(())
    }

    pub fn origin_allow_list(&self) -> Option<Vec<String>> {
        if self.allowed_origins.trim() == "*" {
            None
        } else {
            Some(
                self.allowed_origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opts() -> ServerOptions {
        ServerOptions {
            port: 3000,
            auth_secret: DEFAULT_SECRET_SENTINEL.to_string(),
            ws_path: "/ws".to_string(),
            allowed_origins: "*".to_string(),
            connection_limit_per_ip: 10,
            channel_limit_per_connection: 50,
            message_rate_limit: 100,
            message_rate_window_ms: 60_000,
            production: false,
        }
    }

    #[test]
    fn rejects_default_secret_in_production() {
        let mut opts = base_opts();
        opts.production = true;
        assert!(opts.validate().is_err());
    }

    #[test]
    fn accepts_custom_secret_in_production() {
        let mut opts = base_opts();
        opts.production = true;
        opts.auth_secret = "a-real-secret".to_string();
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn wildcard_origin_means_no_allow_list() {
        let opts = base_opts();
        assert!(opts.origin_allow_list().is_none());
    }

    #[test]
    fn comma_list_parses_into_trimmed_entries() {
        let mut opts = base_opts();
        opts.allowed_origins = "https://a.example, https://b.example".to_string();
        assert_eq!(
            opts.origin_allow_list().unwrap(),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
