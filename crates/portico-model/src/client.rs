//! Registered OAuth 2.0 client applications.

use serde::{Deserialize, Serialize};
use url::Url;

/// Out-of-band redirect sentinel: the code is rendered in the browser
/// instead of redirected to the client.
pub const REDIRECT_URI_OOB: &str = "urn:ietf:wg:oauth:2.0:oob";

/// A registered client application.
///
/// Clients are long-lived and externally administered; the provider only
/// reads them. Non-public clients must register at least one redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier (the OAuth `client_id`).
    pub id: String,

    /// Client secret for token-endpoint authentication. Empty for public
    /// clients.
    pub secret: String,

    /// Redirect URIs accepted for this client, matched exactly.
    pub redirect_uris: Vec<String>,

    /// IDs of clients allowed to request this client as a token audience.
    pub trusted_peers: Vec<String>,

    /// Public clients may redirect to loopback addresses and the OOB
    /// sentinel without pre-registration.
    pub public: bool,

    /// Human-readable name shown on the consent page.
    pub name: String,

    /// Logo shown on the consent page.
    pub logo_url: String,
}

impl Client {
    /// Checks whether `redirect_uri` is acceptable for this client.
    ///
    /// Confidential clients require exact membership in the registered set.
    /// Public clients additionally accept the OOB sentinel and loopback
    /// redirects per RFC 8252 §7.3: `http` scheme, host `localhost`,
    /// `127.0.0.1`, or `[::1]`, any port, any path.
    #[must_use]
    pub fn accepts_redirect_uri(&self, redirect_uri: &str) -> bool {
        if self.redirect_uris.iter().any(|uri| uri == redirect_uri) {
            return true;
        }
        if !self.public {
            return false;
        }
        if redirect_uri == REDIRECT_URI_OOB {
            return true;
        }
        let Ok(url) = Url::parse(redirect_uri) else {
            return false;
        };
        url.scheme() == "http"
            && matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"))
    }

    /// Whether `peer_id` may request this client as an audience.
    #[must_use]
    pub fn trusts_peer(&self, peer_id: &str) -> bool {
        self.trusted_peers.iter().any(|id| id == peer_id)
    }
}
