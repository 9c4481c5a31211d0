//! Server configuration.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults; a `.env` file is honored when present.

use chrono::Duration;

use portico_oidc::request::{RESPONSE_TYPE_CODE, RESPONSE_TYPE_ID_TOKEN, RESPONSE_TYPE_TOKEN};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Issuer URL: the `iss` claim and the base of every advertised
    /// endpoint. No trailing slash.
    pub issuer: String,

    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// ID-token lifetime in seconds.
    pub id_tokens_valid_for: i64,

    /// Authorization-request lifetime in seconds.
    pub auth_requests_valid_for: i64,

    /// Authorization-code lifetime in seconds.
    pub auth_codes_valid_for: i64,

    /// Skip the consent page and issue the code response directly.
    pub skip_approval: bool,

    /// Response types the server offers.
    pub supported_response_types: Vec<String>,

    /// Seconds between garbage-collection passes.
    pub gc_interval: u64,
}

impl ServerConfig {
    /// Loads configuration from `PORTICO_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured response type is unknown.
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let host = std::env::var("PORTICO_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORTICO_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5556);

        let issuer = std::env::var("PORTICO_ISSUER")
            .unwrap_or_else(|_| format!("http://{host}:{port}"))
            .trim_end_matches('/')
            .to_string();

        let id_tokens_valid_for = std::env::var("PORTICO_ID_TOKENS_VALID_FOR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24 * 60 * 60);

        let skip_approval = std::env::var("PORTICO_SKIP_APPROVAL")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let supported_response_types = std::env::var("PORTICO_RESPONSE_TYPES")
            .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
            .unwrap_or_else(|_| vec![RESPONSE_TYPE_CODE.to_string()]);
        validate_response_types(&supported_response_types)?;

        let gc_interval = std::env::var("PORTICO_GC_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5 * 60);

        Ok(Self {
            issuer,
            host,
            port,
            id_tokens_valid_for,
            auth_requests_valid_for: 30 * 60,
            auth_codes_valid_for: 30 * 60,
            skip_approval,
            supported_response_types,
            gc_interval,
        })
    }

    /// Creates a configuration for tests.
    #[must_use]
    pub fn for_testing(issuer: &str) -> Self {
        Self {
            issuer: issuer.trim_end_matches('/').to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            id_tokens_valid_for: 24 * 60 * 60,
            auth_requests_valid_for: 30 * 60,
            auth_codes_valid_for: 30 * 60,
            skip_approval: false,
            supported_response_types: vec![RESPONSE_TYPE_CODE.to_string()],
            gc_interval: 5 * 60,
        }
    }

    /// ID-token lifetime.
    #[must_use]
    pub fn id_token_lifetime(&self) -> Duration {
        Duration::seconds(self.id_tokens_valid_for)
    }

    /// Authorization-request lifetime.
    #[must_use]
    pub fn auth_request_lifetime(&self) -> Duration {
        Duration::seconds(self.auth_requests_valid_for)
    }

    /// Authorization-code lifetime.
    #[must_use]
    pub fn auth_code_lifetime(&self) -> Duration {
        Duration::seconds(self.auth_codes_valid_for)
    }
}

fn validate_response_types(types: &[String]) -> anyhow::Result<()> {
    for response_type in types {
        match response_type.as_str() {
            RESPONSE_TYPE_CODE | RESPONSE_TYPE_TOKEN | RESPONSE_TYPE_ID_TOKEN => {}
            other => anyhow::bail!("unknown response type {other:?}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_defaults() {
        let config = ServerConfig::for_testing("https://idp.example.com/");
        assert_eq!(config.issuer, "https://idp.example.com");
        assert_eq!(config.supported_response_types, vec!["code"]);
        assert_eq!(config.id_token_lifetime(), Duration::hours(24));
        assert_eq!(config.auth_code_lifetime(), Duration::minutes(30));
    }

    #[test]
    fn unknown_response_type_rejected() {
        assert!(validate_response_types(&["code".to_string()]).is_ok());
        assert!(validate_response_types(&["tokens".to_string()]).is_err());
    }
}
