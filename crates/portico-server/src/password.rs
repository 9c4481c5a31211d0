//! Local password connector.
//!
//! A [`PasswordConnector`] backed by the storage `Password` records: users
//! log in with a lowercased email and an argon2-verified password. Also
//! implements [`RefreshConnector`] by re-reading the record, so renames
//! propagate on refresh.

use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;

use portico_connector::{
    Connector, ConnectorError, ConnectorResult, Identity, PasswordConnector, RefreshConnector,
    Scopes,
};
use portico_model::Password;
use portico_storage::Storage;

/// Hashes a plaintext password into a PHC string for a [`Password`] record.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> ConnectorResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ConnectorError::Config(format!("failed to hash password: {err}")))
}

/// A password connector over stored [`Password`] records.
pub struct StoredPasswordConnector {
    storage: Arc<dyn Storage>,
}

impl StoredPasswordConnector {
    /// Creates the connector over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    async fn lookup(&self, email: &str) -> ConnectorResult<Option<Password>> {
        match self.storage.get_password(email).await {
            Ok(password) => Ok(Some(password)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(ConnectorError::Upstream(format!(
                "failed to get password: {err}"
            ))),
        }
    }
}

fn identity_for(password: &Password) -> Identity {
    Identity {
        user_id: password.user_id.clone(),
        username: password.username.clone(),
        email: password.email.clone(),
        email_verified: true,
        groups: Vec::new(),
        connector_data: Vec::new(),
    }
}

impl Connector for StoredPasswordConnector {
    fn as_password(&self) -> Option<&dyn PasswordConnector> {
        Some(self)
    }

    fn as_refresh(&self) -> Option<&dyn RefreshConnector> {
        Some(self)
    }
}

#[async_trait]
impl PasswordConnector for StoredPasswordConnector {
    async fn login(
        &self,
        _scopes: &Scopes,
        username: &str,
        password: &str,
    ) -> ConnectorResult<Option<Identity>> {
        let Some(record) = self.lookup(username).await? else {
            return Ok(None);
        };
        let parsed = PasswordHash::new(&record.hash).map_err(|err| {
            ConnectorError::Upstream(format!("stored hash for {username:?} is malformed: {err}"))
        })?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Ok(None);
        }
        Ok(Some(identity_for(&record)))
    }
}

#[async_trait]
impl RefreshConnector for StoredPasswordConnector {
    async fn refresh(&self, _scopes: &Scopes, identity: Identity) -> ConnectorResult<Identity> {
        let Some(record) = self.lookup(&identity.email).await? else {
            return Err(ConnectorError::Upstream(format!(
                "user {:?} no longer exists",
                identity.email
            )));
        };
        Ok(identity_for(&record))
    }
}
