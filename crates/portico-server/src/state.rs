//! Application state shared across request handlers.
//!
//! Holds the configuration, the storage handle, the connector registry
//! (populated at startup, read-only afterwards), and the discovery document
//! marshalled once. ID-token minting lives here because it needs storage
//! for cross-client trust checks and for the signing key.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use portico_connector::Connector;
use portico_crypto::{Signer, sign::sign_payload};
use portico_model::Claims;
use portico_oidc::claims::id_token_claims;
use portico_oidc::discovery::Discovery;
use portico_oidc::error::{OauthError, OauthResult};
use portico_oidc::scopes::parse_cross_client_scope;
use portico_storage::Storage;

use crate::config::ServerConfig;

/// A connector registered with the server.
pub struct RegisteredConnector {
    /// Name shown on the connector chooser page.
    pub display_name: String,

    /// The connector implementation.
    pub connector: Arc<dyn Connector>,
}

/// Shared state for all endpoints.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Persistence backend.
    pub storage: Arc<dyn Storage>,

    /// Registered connectors by ID.
    pub connectors: Arc<HashMap<String, RegisteredConnector>>,

    /// Discovery document, marshalled once at startup.
    pub discovery_json: Arc<String>,
}

impl AppState {
    /// Creates the application state and builds the discovery document.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        connectors: HashMap<String, RegisteredConnector>,
    ) -> Self {
        let discovery = Discovery::new(&config.issuer, &config.supported_response_types);
        let discovery_json = serde_json::to_string_pretty(&discovery)
            .expect("discovery document serializes");
        Self {
            config: Arc::new(config),
            storage,
            connectors: Arc::new(connectors),
            discovery_json: Arc::new(discovery_json),
        }
    }

    /// Current time. Single call site for the clock, mirrored by the expiry
    /// checks in the handlers.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Builds an absolute URL under the issuer.
    #[must_use]
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.issuer)
    }

    /// Whether `peer_id` may be requested as an audience by `client_id`.
    ///
    /// A client always trusts itself; otherwise the peer's registration
    /// must list the client. An unknown peer is simply untrusted.
    pub async fn cross_client_trusted(&self, client_id: &str, peer_id: &str) -> OauthResult<bool> {
        if peer_id == client_id {
            return Ok(true);
        }
        match self.storage.get_client(peer_id).await {
            Ok(peer) => Ok(peer.trusts_peer(client_id)),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => {
                tracing::error!("failed to get client {peer_id:?}: {err}");
                Err(OauthError::server_error())
            }
        }
    }

    /// Mints a signed ID token for a grant.
    ///
    /// Returns the compact JWS and its expiry. Cross-client scopes are
    /// resolved against storage here; the grant was validated at `/auth`,
    /// so a trust failure at this point is a server error.
    pub async fn mint_id_token(
        &self,
        client_id: &str,
        connector_id: &str,
        claims: &Claims,
        scopes: &[String],
        nonce: &str,
    ) -> OauthResult<(String, DateTime<Utc>)> {
        let mut peer_audiences = Vec::new();
        for scope in scopes {
            let Some(peer_id) = parse_cross_client_scope(scope) else {
                continue;
            };
            if self.cross_client_trusted(client_id, peer_id).await? {
                peer_audiences.push(peer_id.to_string());
            } else {
                tracing::error!("peer {peer_id:?} does not trust client {client_id:?}");
                return Err(OauthError::server_error());
            }
        }

        let issued_at = self.now();
        let expiry = issued_at + self.config.id_token_lifetime();
        let token_claims = id_token_claims(
            &self.config.issuer,
            client_id,
            connector_id,
            claims,
            scopes,
            nonce,
            peer_audiences,
            issued_at,
            expiry,
        );

        let payload = serde_json::to_vec(&token_claims).map_err(|err| {
            tracing::error!("failed to serialize ID token claims: {err}");
            OauthError::server_error()
        })?;

        let keys = self.storage.get_keys().await.map_err(|err| {
            tracing::error!("failed to get keys: {err}");
            OauthError::server_error()
        })?;
        let Some(signing_key) = keys.signing_key else {
            tracing::error!("no signing key installed");
            return Err(OauthError::server_error());
        };
        let signer = Signer::from_key(&signing_key).map_err(|err| {
            tracing::error!("failed to load signing key: {err}");
            OauthError::server_error()
        })?;
        let id_token = sign_payload(&signer, &payload).map_err(|err| {
            tracing::error!("failed to sign ID token: {err}");
            OauthError::server_error()
        })?;

        Ok((id_token, expiry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_model::Client;
    use portico_storage::MemoryStorage;

    fn state_with(storage: Arc<dyn Storage>) -> AppState {
        AppState::new(
            ServerConfig::for_testing("https://idp.example.com"),
            storage,
            HashMap::new(),
        )
    }

    #[test]
    fn absolute_url_joins_issuer() {
        let state = state_with(Arc::new(MemoryStorage::new()));
        assert_eq!(
            state.absolute_url("/callback"),
            "https://idp.example.com/callback"
        );
    }

    #[tokio::test]
    async fn self_trust_is_implicit() {
        let state = state_with(Arc::new(MemoryStorage::new()));
        assert!(state.cross_client_trusted("app", "app").await.unwrap());
    }

    #[tokio::test]
    async fn peer_trust_requires_registration() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .create_client(Client {
                id: "peer".to_string(),
                trusted_peers: vec!["cli".to_string()],
                ..Client::default()
            })
            .await
            .unwrap();

        let state = state_with(storage);
        assert!(state.cross_client_trusted("cli", "peer").await.unwrap());
        assert!(!state.cross_client_trusted("other", "peer").await.unwrap());
        // Unknown peers are untrusted, not an error.
        assert!(!state.cross_client_trusted("cli", "ghost").await.unwrap());
    }
}
