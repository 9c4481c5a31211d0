//! # portico-model
//!
//! Entity types persisted by the storage layer: registered clients,
//! in-flight authorization requests, single-use codes, refresh tokens, the
//! signing-key singleton, and local passwords.
//!
//! These are plain data shuttled between the storage backend and the flow
//! orchestrator; all ownership lives with storage.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod claims;
pub mod client;
pub mod code;
pub mod keys;
pub mod password;
pub mod refresh;
pub mod request;

pub use claims::Claims;
pub use client::Client;
pub use code::AuthCode;
pub use keys::{KeySet, VerificationKey};
pub use password::Password;
pub use refresh::RefreshToken;
pub use request::AuthRequest;
