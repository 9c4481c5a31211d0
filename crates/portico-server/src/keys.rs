//! Signing-key bootstrap.
//!
//! The core consumes whatever key the storage singleton holds; rotation
//! policy lives elsewhere. On a fresh store there is nothing to consume, so
//! startup installs a generated key once. The install goes through the
//! storage update contract, which makes concurrent bootstrapping servers
//! converge on whichever key lands first.

use chrono::{Duration, Utc};

use portico_crypto::{Signer, SigningKey};
use portico_storage::{Storage, StorageError};

/// How far ahead the bootstrap key advertises its next rotation. Only the
/// JWKS `Cache-Control` header derives from this.
const BOOTSTRAP_ROTATION: i64 = 6;

/// Ensures the storage holds a signing key, generating one if needed.
///
/// # Errors
///
/// Returns an error if generation or the storage update fails.
pub async fn ensure_signing_keys(storage: &dyn Storage) -> anyhow::Result<()> {
    let keys = storage.get_keys().await?;
    if keys.signing_key.is_some() {
        return Ok(());
    }

    let signing_key = SigningKey::generate()?;
    let public = Signer::from_key(&signing_key)?.public_jwk()?;
    tracing::info!("installing generated signing key {}", signing_key.kid);

    storage
        .update_keys(&mut |mut keys| {
            if keys.signing_key.is_some() {
                // Another replica won the race; keep its key.
                return Ok(keys);
            }
            keys.signing_key = Some(signing_key.clone());
            keys.signing_key_pub = Some(public.clone());
            keys.next_rotation = Utc::now() + Duration::hours(BOOTSTRAP_ROTATION);
            Ok(keys)
        })
        .await
        .map_err(|err: StorageError| anyhow::anyhow!("failed to install signing key: {err}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_storage::MemoryStorage;

    #[tokio::test]
    async fn installs_key_on_empty_store() {
        let storage = MemoryStorage::new();
        ensure_signing_keys(&storage).await.unwrap();

        let keys = storage.get_keys().await.unwrap();
        let signing_key = keys.signing_key.expect("key installed");
        let public = keys.signing_key_pub.expect("public key installed");
        assert_eq!(signing_key.kid, public.kid);
        assert!(keys.next_rotation > Utc::now());
    }

    #[tokio::test]
    async fn keeps_existing_key() {
        let storage = MemoryStorage::new();
        ensure_signing_keys(&storage).await.unwrap();
        let first = storage.get_keys().await.unwrap().signing_key.unwrap();

        ensure_signing_keys(&storage).await.unwrap();
        let second = storage.get_keys().await.unwrap().signing_key.unwrap();
        assert_eq!(first.kid, second.kid);
    }
}
