//! In-memory storage backend.
//!
//! Used for development and tests. A single `RwLock` over the whole state
//! serializes writes, which trivially satisfies the compare-and-swap
//! requirement of the update operations: mutators run under the write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use portico_model::{AuthCode, AuthRequest, Client, KeySet, Password, RefreshToken};

use crate::error::{StorageError, StorageResult};
use crate::{GcResult, Mutator, Storage};

#[derive(Default)]
struct State {
    clients: HashMap<String, Client>,
    auth_requests: HashMap<String, AuthRequest>,
    auth_codes: HashMap<String, AuthCode>,
    refresh_tokens: HashMap<String, RefreshToken>,
    passwords: HashMap<String, Password>,
    keys: KeySet,
}

/// An in-memory [`Storage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert<T>(
    map: &mut HashMap<String, T>,
    kind: &'static str,
    id: String,
    value: T,
) -> StorageResult<()> {
    if map.contains_key(&id) {
        return Err(StorageError::already_exists(kind, id));
    }
    map.insert(id, value);
    Ok(())
}

fn fetch<T: Clone>(map: &HashMap<String, T>, kind: &'static str, id: &str) -> StorageResult<T> {
    map.get(id)
        .cloned()
        .ok_or_else(|| StorageError::not_found(kind, id))
}

fn remove<T>(map: &mut HashMap<String, T>, kind: &'static str, id: &str) -> StorageResult<()> {
    map.remove(id)
        .map(|_| ())
        .ok_or_else(|| StorageError::not_found(kind, id))
}

fn apply<T: Clone>(
    map: &mut HashMap<String, T>,
    kind: &'static str,
    id: &str,
    key_of: fn(&T) -> &str,
    mutator: Mutator<'_, T>,
) -> StorageResult<()> {
    let current = map
        .get(id)
        .cloned()
        .ok_or_else(|| StorageError::not_found(kind, id))?;
    let updated = mutator(current)?;
    if key_of(&updated) != id {
        return Err(StorageError::Internal(format!(
            "mutator changed the id of {kind} {id:?}"
        )));
    }
    map.insert(id.to_string(), updated);
    Ok(())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_client(&self, client: Client) -> StorageResult<()> {
        let mut state = self.state.write();
        insert(&mut state.clients, "client", client.id.clone(), client)
    }

    async fn create_auth_request(&self, request: AuthRequest) -> StorageResult<()> {
        let mut state = self.state.write();
        insert(
            &mut state.auth_requests,
            "auth request",
            request.id.clone(),
            request,
        )
    }

    async fn create_auth_code(&self, code: AuthCode) -> StorageResult<()> {
        let mut state = self.state.write();
        insert(&mut state.auth_codes, "auth code", code.id.clone(), code)
    }

    async fn create_refresh(&self, token: RefreshToken) -> StorageResult<()> {
        let mut state = self.state.write();
        insert(
            &mut state.refresh_tokens,
            "refresh token",
            token.id.clone(),
            token,
        )
    }

    async fn create_password(&self, mut password: Password) -> StorageResult<()> {
        password.email = password.email.to_lowercase();
        let mut state = self.state.write();
        insert(
            &mut state.passwords,
            "password",
            password.email.clone(),
            password,
        )
    }

    async fn get_client(&self, id: &str) -> StorageResult<Client> {
        fetch(&self.state.read().clients, "client", id)
    }

    async fn get_auth_request(&self, id: &str) -> StorageResult<AuthRequest> {
        fetch(&self.state.read().auth_requests, "auth request", id)
    }

    async fn get_auth_code(&self, id: &str) -> StorageResult<AuthCode> {
        fetch(&self.state.read().auth_codes, "auth code", id)
    }

    async fn get_refresh(&self, id: &str) -> StorageResult<RefreshToken> {
        fetch(&self.state.read().refresh_tokens, "refresh token", id)
    }

    async fn get_password(&self, email: &str) -> StorageResult<Password> {
        fetch(
            &self.state.read().passwords,
            "password",
            &email.to_lowercase(),
        )
    }

    async fn get_keys(&self) -> StorageResult<KeySet> {
        Ok(self.state.read().keys.clone())
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        Ok(self.state.read().clients.values().cloned().collect())
    }

    async fn list_refresh(&self) -> StorageResult<Vec<RefreshToken>> {
        Ok(self.state.read().refresh_tokens.values().cloned().collect())
    }

    async fn list_passwords(&self) -> StorageResult<Vec<Password>> {
        Ok(self.state.read().passwords.values().cloned().collect())
    }

    async fn delete_client(&self, id: &str) -> StorageResult<()> {
        remove(&mut self.state.write().clients, "client", id)
    }

    async fn delete_auth_request(&self, id: &str) -> StorageResult<()> {
        remove(&mut self.state.write().auth_requests, "auth request", id)
    }

    async fn delete_auth_code(&self, id: &str) -> StorageResult<()> {
        remove(&mut self.state.write().auth_codes, "auth code", id)
    }

    async fn delete_refresh(&self, id: &str) -> StorageResult<()> {
        remove(&mut self.state.write().refresh_tokens, "refresh token", id)
    }

    async fn delete_password(&self, email: &str) -> StorageResult<()> {
        remove(
            &mut self.state.write().passwords,
            "password",
            &email.to_lowercase(),
        )
    }

    async fn update_client(&self, id: &str, mutator: Mutator<'_, Client>) -> StorageResult<()> {
        let mut state = self.state.write();
        apply(&mut state.clients, "client", id, |c| c.id.as_str(), mutator)
    }

    async fn update_auth_request(
        &self,
        id: &str,
        mutator: Mutator<'_, AuthRequest>,
    ) -> StorageResult<()> {
        let mut state = self.state.write();
        apply(
            &mut state.auth_requests,
            "auth request",
            id,
            |a| a.id.as_str(),
            mutator,
        )
    }

    async fn update_refresh(
        &self,
        id: &str,
        mutator: Mutator<'_, RefreshToken>,
    ) -> StorageResult<()> {
        let mut state = self.state.write();
        apply(
            &mut state.refresh_tokens,
            "refresh token",
            id,
            |r| r.id.as_str(),
            mutator,
        )
    }

    async fn update_password(
        &self,
        email: &str,
        mutator: Mutator<'_, Password>,
    ) -> StorageResult<()> {
        let email = email.to_lowercase();
        let mut state = self.state.write();
        apply(
            &mut state.passwords,
            "password",
            &email,
            |p| p.email.as_str(),
            mutator,
        )
    }

    async fn update_keys(&self, mutator: Mutator<'_, KeySet>) -> StorageResult<()> {
        let mut state = self.state.write();
        let updated = mutator(state.keys.clone())?;
        state.keys = updated;
        Ok(())
    }

    async fn garbage_collect(&self, now: DateTime<Utc>) -> StorageResult<GcResult> {
        let mut state = self.state.write();
        let mut result = GcResult::default();

        let before = state.auth_requests.len();
        state.auth_requests.retain(|_, a| a.expiry > now);
        result.auth_requests = before - state.auth_requests.len();

        let before = state.auth_codes.len();
        state.auth_codes.retain(|_, c| c.expiry > now);
        result.auth_codes = before - state.auth_codes.len();

        Ok(result)
    }
}
