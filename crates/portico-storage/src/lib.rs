//! # portico-storage
//!
//! The storage contract the flow orchestrator is written against, plus an
//! in-memory backend for development and tests.
//!
//! Backends are key/value-like: one mapping per entity kind, keyed by the
//! entity's opaque ID. Mutation goes through [`Storage::update_auth_request`]
//! and friends, which take a mutator closure and must apply it atomically —
//! backends with optimistic concurrency re-read and re-run the mutator on
//! conflict (so mutators may be invoked more than once), serialized backends
//! hold the row lock across the call. This compare-and-swap discipline is
//! what keeps concurrent requests to the same grant from losing updates.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use portico_model::{AuthCode, AuthRequest, Client, KeySet, Password, RefreshToken};

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;

/// A mutator passed to the update operations: receives the current entity
/// and returns the new one, or an error to abort the update.
///
/// Mutators must not change the entity's ID, and must tolerate being called
/// more than once.
pub type Mutator<'a, T> = &'a mut (dyn FnMut(T) -> StorageResult<T> + Send);

/// Counts of rows removed by a garbage-collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcResult {
    /// Expired auth requests deleted.
    pub auth_requests: usize,
    /// Expired auth codes deleted.
    pub auth_codes: usize,
}

impl GcResult {
    /// Whether the pass removed anything.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.auth_requests == 0 && self.auth_codes == 0
    }
}

/// The persistence contract for the identity provider core.
///
/// Implementations must be thread-safe; handlers on separate tasks share one
/// instance. Every `create_*` fails with [`StorageError::AlreadyExists`] on
/// an ID collision, every `get_*`/`delete_*` with
/// [`StorageError::NotFound`] for a missing row. The `list_*` operations may
/// be unimplemented; the default bodies return
/// [`StorageError::Unsupported`].
#[async_trait]
pub trait Storage: Send + Sync {
    // === Create ===

    /// Persists a new client.
    async fn create_client(&self, client: Client) -> StorageResult<()>;

    /// Persists a new authorization request.
    async fn create_auth_request(&self, request: AuthRequest) -> StorageResult<()>;

    /// Persists a new authorization code.
    async fn create_auth_code(&self, code: AuthCode) -> StorageResult<()>;

    /// Persists a new refresh token.
    async fn create_refresh(&self, token: RefreshToken) -> StorageResult<()>;

    /// Persists a new local password. The email is stored lowercased.
    async fn create_password(&self, password: Password) -> StorageResult<()>;

    // === Read ===

    /// Fetches a client by ID.
    async fn get_client(&self, id: &str) -> StorageResult<Client>;

    /// Fetches an authorization request by ID.
    async fn get_auth_request(&self, id: &str) -> StorageResult<AuthRequest>;

    /// Fetches an authorization code by ID.
    async fn get_auth_code(&self, id: &str) -> StorageResult<AuthCode>;

    /// Fetches a refresh token by ID.
    async fn get_refresh(&self, id: &str) -> StorageResult<RefreshToken>;

    /// Fetches a local password by email (case-insensitive).
    async fn get_password(&self, email: &str) -> StorageResult<Password>;

    /// Fetches the signing-key singleton. Returns the default (empty) key
    /// set if none has been installed yet.
    async fn get_keys(&self) -> StorageResult<KeySet>;

    // === List ===

    /// Lists all clients.
    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        Err(StorageError::Unsupported("listing clients"))
    }

    /// Lists all refresh tokens.
    async fn list_refresh(&self) -> StorageResult<Vec<RefreshToken>> {
        Err(StorageError::Unsupported("listing refresh tokens"))
    }

    /// Lists all local passwords.
    async fn list_passwords(&self) -> StorageResult<Vec<Password>> {
        Err(StorageError::Unsupported("listing passwords"))
    }

    // === Delete ===

    /// Deletes a client.
    async fn delete_client(&self, id: &str) -> StorageResult<()>;

    /// Deletes an authorization request.
    async fn delete_auth_request(&self, id: &str) -> StorageResult<()>;

    /// Deletes an authorization code. This is the commit point of code
    /// redemption.
    async fn delete_auth_code(&self, id: &str) -> StorageResult<()>;

    /// Deletes a refresh token.
    async fn delete_refresh(&self, id: &str) -> StorageResult<()>;

    /// Deletes a local password by email (case-insensitive).
    async fn delete_password(&self, email: &str) -> StorageResult<()>;

    // === Update ===

    /// Atomically updates a client through the mutator.
    async fn update_client(&self, id: &str, mutator: Mutator<'_, Client>) -> StorageResult<()>;

    /// Atomically updates an authorization request through the mutator.
    async fn update_auth_request(
        &self,
        id: &str,
        mutator: Mutator<'_, AuthRequest>,
    ) -> StorageResult<()>;

    /// Atomically updates a refresh token through the mutator.
    async fn update_refresh(
        &self,
        id: &str,
        mutator: Mutator<'_, RefreshToken>,
    ) -> StorageResult<()>;

    /// Atomically updates a local password through the mutator.
    async fn update_password(
        &self,
        email: &str,
        mutator: Mutator<'_, Password>,
    ) -> StorageResult<()>;

    /// Atomically updates the signing-key singleton. The mutator receives
    /// the default key set if none has been installed yet.
    async fn update_keys(&self, mutator: Mutator<'_, KeySet>) -> StorageResult<()>;

    // === Maintenance ===

    /// Removes every auth request and auth code whose expiry is at or
    /// before `now`.
    async fn garbage_collect(&self, now: DateTime<Utc>) -> StorageResult<GcResult>;
}
